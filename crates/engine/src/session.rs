use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::GridError;
use crate::model::{
    BlockedPeriod, BookingKind, ConfirmedBooking, EntryId, GridEntry, GridSnapshot, Participant,
    PaymentDetails, PaymentStatus, RentalItem,
};
use crate::pricing::{self, PricingCatalog, Quote, QuoteSubject};
use crate::resolver::{self, ResolutionPlan};
use crate::selection::{PointerTarget, Selection, SelectionMachine, SelectionPhase};
use crate::time_grid::TimeGrid;

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// What the admin wants to create on a finalized selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EntryAction {
    Block {
        #[serde(default)]
        reason: Option<String>,
    },
    Booking(BookingDraft),
}

impl EntryAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            EntryAction::Block { .. } => ActionKind::Block,
            EntryAction::Booking(_) => ActionKind::Booking,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Block,
    Booking,
}

/// Booking details collected before confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDraft {
    pub kind: BookingKind,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Explicit payment for the whole range, charged on the first court; the
    /// others carry an empty pending payment. When absent each booking gets a
    /// pending payment for its own quoted amount.
    #[serde(default)]
    pub payment: Option<PaymentDetails>,
    #[serde(default)]
    pub rental_items: Vec<RentalItem>,
    /// Per-resource price entered by hand; overrides the price tables.
    #[serde(default)]
    pub manual_price: Option<u64>,
}

/// Resolve `action` on `selection` and build the resulting plan.
///
/// Bookings are checked before anything is computed: single bookings need a
/// participant, and a paid booking needs a price for every resource.
pub fn plan_action(
    snapshot: &GridSnapshot,
    catalog: &PricingCatalog,
    selection: &Selection,
    action: &EntryAction,
) -> Result<ResolutionPlan, GridError> {
    match action {
        EntryAction::Block { reason } => Ok(resolver::resolve(
            snapshot,
            selection,
            |_, resource_id, span| {
                GridEntry::Block(BlockedPeriod {
                    id: EntryId::generate(),
                    resource_id: resource_id.to_string(),
                    span,
                    reason: reason.clone(),
                })
            },
        )),
        EntryAction::Booking(draft) => {
            let payments = booking_payments(catalog, selection, draft)?;
            Ok(resolver::resolve(snapshot, selection, |i, resource_id, span| {
                GridEntry::Booking(ConfirmedBooking {
                    id: EntryId::generate(),
                    resource_id: resource_id.to_string(),
                    span,
                    kind: draft.kind,
                    participants: draft.participants.clone(),
                    title: draft.title.clone(),
                    description: draft.description.clone(),
                    payment: payments[i].clone(),
                    // rentals travel with the first court of the range
                    rental_items: if i == 0 {
                        draft.rental_items.clone()
                    } else {
                        Vec::new()
                    },
                })
            }))
        }
    }
}

fn booking_payments(
    catalog: &PricingCatalog,
    selection: &Selection,
    draft: &BookingDraft,
) -> Result<Vec<PaymentDetails>, GridError> {
    if draft.kind == BookingKind::Single && draft.participants.is_empty() {
        return Err(GridError::MissingParticipants);
    }

    let quote = pricing::quote(
        catalog,
        selection.resource_ids(),
        selection.span().duration_mins(),
        &draft.rental_items,
    );

    if draft.manual_price.is_none() {
        let paid = draft
            .payment
            .as_ref()
            .is_some_and(|p| p.payment_status() != PaymentStatus::Pending);
        let unpriced = quote.lines.iter().find_map(|l| match &l.subject {
            QuoteSubject::Resource { resource_id } if l.manual_price_required => {
                Some(resource_id.clone())
            }
            _ => None,
        });
        if let (true, Some(resource_id)) = (paid, unpriced) {
            return Err(GridError::ManualPriceRequired(resource_id));
        }
    }

    let rentals = quote.rentals_total();
    let payments = selection
        .resource_ids()
        .iter()
        .enumerate()
        .map(|(i, resource_id)| match &draft.payment {
            // an explicit payment covers the whole range, charged on the first court
            Some(payment) if i == 0 => payment.clone(),
            Some(_) => PaymentDetails::pending(0),
            None => {
                let court = draft.manual_price.unwrap_or_else(|| {
                    quote
                        .resource_line(resource_id)
                        .map(|l| l.amount)
                        .unwrap_or(0)
                });
                PaymentDetails::pending(court + if i == 0 { rentals } else { 0 })
            }
        })
        .collect();
    Ok(payments)
}

// ---------------------------------------------------------------------------
// Commands and intents
// ---------------------------------------------------------------------------

/// Everything the hosting UI can tell the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Command {
    PointerDown(PointerTarget),
    PointerMove(PointerTarget),
    PointerUp,
    OutsideClick,
    Cancel,
    RequestBlock {
        #[serde(default)]
        reason: Option<String>,
    },
    RequestBooking(BookingDraft),
    #[serde(rename_all = "camelCase")]
    RequestQuote {
        #[serde(default)]
        rental_items: Vec<RentalItem>,
    },
    ConfirmOverlap {
        proceed: bool,
    },
    #[serde(rename_all = "camelCase")]
    CommitSucceeded {
        /// Local id → persisted id, for entries the server renamed.
        #[serde(default)]
        assigned_ids: HashMap<EntryId, EntryId>,
    },
    CommitFailed {
        reason: String,
    },
}

/// Handed to the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    pub action: ActionKind,
    pub plan: ResolutionPlan,
}

/// What the session asks of the hosting UI after a command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "intent", rename_all = "camelCase")]
pub enum Intent {
    SelectionChanged {
        phase: SelectionPhase,
        selection: Selection,
    },
    SelectionCleared,
    #[serde(rename_all = "camelCase")]
    ConfirmOverlap {
        overlap_count: usize,
    },
    Commit(CommitRequest),
    Quote(Quote),
    #[serde(rename_all = "camelCase")]
    SnapshotChanged {
        entry_count: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    AwaitingConfirmation,
    AwaitingPersistence,
}

#[derive(Debug, Clone)]
struct PendingCommit {
    action: ActionKind,
    plan: ResolutionPlan,
    stage: Stage,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// State owner for one rendered day.
///
/// Every change goes through [`GridSession::handle`]; the session never
/// performs I/O. Commits are emitted as [`Intent::Commit`] and only applied to
/// the snapshot once the host reports [`Command::CommitSucceeded`].
#[derive(Debug, Clone)]
pub struct GridSession {
    grid: TimeGrid,
    snapshot: GridSnapshot,
    catalog: PricingCatalog,
    selection: SelectionMachine,
    pending: Option<PendingCommit>,
}

impl GridSession {
    pub fn new(grid: TimeGrid, snapshot: GridSnapshot) -> Self {
        GridSession {
            grid,
            snapshot,
            catalog: PricingCatalog::default(),
            selection: SelectionMachine::new(),
            pending: None,
        }
    }

    pub fn with_catalog(mut self, catalog: PricingCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    pub fn snapshot(&self) -> &GridSnapshot {
        &self.snapshot
    }

    pub fn phase(&self) -> SelectionPhase {
        self.selection.phase()
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.selection()
    }

    /// Plan waiting for confirmation or persistence, if any.
    pub fn pending_plan(&self) -> Option<&ResolutionPlan> {
        self.pending.as_ref().map(|p| &p.plan)
    }

    /// Replace the snapshot after a re-fetch. Drops any selection and
    /// pending commit, since both were computed against the old data.
    pub fn load_snapshot(&mut self, snapshot: GridSnapshot) {
        self.snapshot = snapshot;
        self.selection.cancel();
        self.pending = None;
    }

    pub fn handle(&mut self, command: Command) -> Result<Vec<Intent>, GridError> {
        if self.in_flight() && is_pointer(&command) {
            log::debug!("ignoring pointer input while a commit is in flight");
            return Ok(Vec::new());
        }

        match command {
            Command::PointerDown(target) => {
                let selection =
                    self.selection
                        .pointer_down(&self.grid, &self.snapshot.resources, &target)?;
                self.pending = None;
                Ok(vec![Intent::SelectionChanged {
                    phase: SelectionPhase::Dragging,
                    selection,
                }])
            }
            Command::PointerMove(target) => {
                let moved =
                    self.selection
                        .pointer_move(&self.grid, &self.snapshot.resources, &target)?;
                Ok(moved
                    .map(|selection| Intent::SelectionChanged {
                        phase: SelectionPhase::Dragging,
                        selection: selection.clone(),
                    })
                    .into_iter()
                    .collect())
            }
            Command::PointerUp => Ok(self
                .selection
                .pointer_up()
                .map(|selection| Intent::SelectionChanged {
                    phase: SelectionPhase::Finalized,
                    selection: selection.clone(),
                })
                .into_iter()
                .collect()),
            Command::OutsideClick | Command::Cancel => {
                self.pending = None;
                if self.selection.cancel() {
                    Ok(vec![Intent::SelectionCleared])
                } else {
                    Ok(Vec::new())
                }
            }
            Command::RequestBlock { reason } => self.request(EntryAction::Block { reason }),
            Command::RequestBooking(draft) => self.request(EntryAction::Booking(draft)),
            Command::RequestQuote { rental_items } => {
                let selection = self.finalized()?;
                Ok(vec![Intent::Quote(pricing::quote(
                    &self.catalog,
                    selection.resource_ids(),
                    selection.span().duration_mins(),
                    &rental_items,
                ))])
            }
            Command::ConfirmOverlap { proceed } => self.confirm(proceed),
            Command::CommitSucceeded { assigned_ids } => self.commit_succeeded(&assigned_ids),
            Command::CommitFailed { reason } => {
                self.take_in_flight()?;
                log::warn!("commit failed, selection kept for retry: {}", reason);
                Err(GridError::PersistenceFailure(reason))
            }
        }
    }

    fn finalized(&self) -> Result<&Selection, GridError> {
        self.selection
            .finalized()
            .ok_or_else(|| GridError::bounds("no finalized selection"))
    }

    fn in_flight(&self) -> bool {
        matches!(
            self.pending,
            Some(PendingCommit {
                stage: Stage::AwaitingPersistence,
                ..
            })
        )
    }

    fn request(&mut self, action: EntryAction) -> Result<Vec<Intent>, GridError> {
        if self.in_flight() {
            return Err(GridError::bounds("a commit is already in flight"));
        }
        let selection = self.finalized()?;
        let plan = plan_action(&self.snapshot, &self.catalog, selection, &action)?;

        if plan.requires_confirmation() {
            let overlap_count = plan.overlap_count;
            self.pending = Some(PendingCommit {
                action: action.kind(),
                plan,
                stage: Stage::AwaitingConfirmation,
            });
            return Ok(vec![Intent::ConfirmOverlap { overlap_count }]);
        }

        let request = CommitRequest {
            action: action.kind(),
            plan: plan.clone(),
        };
        self.pending = Some(PendingCommit {
            action: action.kind(),
            plan,
            stage: Stage::AwaitingPersistence,
        });
        Ok(vec![Intent::Commit(request)])
    }

    fn confirm(&mut self, proceed: bool) -> Result<Vec<Intent>, GridError> {
        let pending = match self.pending.as_mut() {
            Some(p) if p.stage == Stage::AwaitingConfirmation => p,
            _ => return Err(GridError::bounds("nothing is awaiting confirmation")),
        };
        if !proceed {
            log::debug!("overlap adjustment declined");
            self.pending = None;
            return Ok(Vec::new());
        }
        pending.stage = Stage::AwaitingPersistence;
        Ok(vec![Intent::Commit(CommitRequest {
            action: pending.action,
            plan: pending.plan.clone(),
        })])
    }

    fn take_in_flight(&mut self) -> Result<PendingCommit, GridError> {
        if !self.in_flight() {
            return Err(GridError::bounds("no commit is in flight"));
        }
        self.pending
            .take()
            .ok_or_else(|| GridError::bounds("no commit is in flight"))
    }

    fn commit_succeeded(
        &mut self,
        assigned_ids: &HashMap<EntryId, EntryId>,
    ) -> Result<Vec<Intent>, GridError> {
        if !self.in_flight() {
            return Err(GridError::bounds("no commit is in flight"));
        }
        let pending = self
            .pending
            .as_ref()
            .ok_or_else(|| GridError::bounds("no commit is in flight"))?;
        // confirmation was obtained before the plan went in flight
        let mut next = resolver::apply_plan(&self.snapshot, &pending.plan, true)?;
        resolver::remap_ids(&mut next, assigned_ids);

        log::info!(
            "{:?} committed on {:?}",
            pending.action,
            self.selection.finalized().map(|s| s.resource_ids().to_vec())
        );
        self.snapshot = next;
        self.pending = None;
        self.selection.commit();
        Ok(vec![
            Intent::SelectionCleared,
            Intent::SnapshotChanged {
                entry_count: self.snapshot.entry_count(),
            },
        ])
    }
}

fn is_pointer(command: &Command) -> bool {
    matches!(
        command,
        Command::PointerDown(_)
            | Command::PointerMove(_)
            | Command::PointerUp
            | Command::OutsideClick
            | Command::Cancel
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
