#![deny(clippy::all)]

use std::collections::HashMap;

use courtgrid_engine::config::GridConfig as EngineGridConfig;
use courtgrid_engine::model as engine;
use courtgrid_engine::pricing::{self, DurationPriceTable, QuoteSubject};
use courtgrid_engine::selection::Selection;
use courtgrid_engine::session::{self, EntryAction};
use courtgrid_engine::{resolver, validator, GridError, GridSession, TimeGrid};
use napi_derive::napi;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn to_napi(e: GridError) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn amount(v: i64) -> Result<u64, GridError> {
    u64::try_from(v).map_err(|_| GridError::InvalidPayment(format!("negative amount {}", v)))
}

/// Amounts past `i64::MAX` saturate on the way out.
fn money(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

/// Stored spans are taken as-is; the resolver reports broken ones.
fn stored_span(start: &str, end: &str) -> Result<engine::TimeSpan, GridError> {
    Ok(engine::TimeSpan {
        start: engine::ClockTime::parse(start)?,
        end: engine::ClockTime::parse(end)?,
    })
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[napi(string_enum)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingKind {
    Single,
    Class,
}

#[napi(string_enum)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticipantKind {
    Member,
    Guest,
}

#[napi(string_enum)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Partial,
    Completed,
}

#[napi(string_enum)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionPhase {
    Idle,
    Dragging,
    Finalized,
}

// ---------------------------------------------------------------------------
// Enum conversions
// ---------------------------------------------------------------------------

impl From<BookingKind> for engine::BookingKind {
    fn from(v: BookingKind) -> Self {
        match v {
            BookingKind::Single => engine::BookingKind::Single,
            BookingKind::Class => engine::BookingKind::Class,
        }
    }
}

impl From<engine::BookingKind> for BookingKind {
    fn from(v: engine::BookingKind) -> Self {
        match v {
            engine::BookingKind::Single => BookingKind::Single,
            engine::BookingKind::Class => BookingKind::Class,
        }
    }
}

impl From<ParticipantKind> for engine::ParticipantKind {
    fn from(v: ParticipantKind) -> Self {
        match v {
            ParticipantKind::Member => engine::ParticipantKind::Member,
            ParticipantKind::Guest => engine::ParticipantKind::Guest,
        }
    }
}

impl From<engine::ParticipantKind> for ParticipantKind {
    fn from(v: engine::ParticipantKind) -> Self {
        match v {
            engine::ParticipantKind::Member => ParticipantKind::Member,
            engine::ParticipantKind::Guest => ParticipantKind::Guest,
        }
    }
}

impl From<PaymentStatus> for engine::PaymentStatus {
    fn from(v: PaymentStatus) -> Self {
        match v {
            PaymentStatus::Pending => engine::PaymentStatus::Pending,
            PaymentStatus::Partial => engine::PaymentStatus::Partial,
            PaymentStatus::Completed => engine::PaymentStatus::Completed,
        }
    }
}

impl From<engine::PaymentStatus> for PaymentStatus {
    fn from(v: engine::PaymentStatus) -> Self {
        match v {
            engine::PaymentStatus::Pending => PaymentStatus::Pending,
            engine::PaymentStatus::Partial => PaymentStatus::Partial,
            engine::PaymentStatus::Completed => PaymentStatus::Completed,
        }
    }
}

impl From<courtgrid_engine::SelectionPhase> for SelectionPhase {
    fn from(v: courtgrid_engine::SelectionPhase) -> Self {
        match v {
            courtgrid_engine::SelectionPhase::Idle => SelectionPhase::Idle,
            courtgrid_engine::SelectionPhase::Dragging => SelectionPhase::Dragging,
            courtgrid_engine::SelectionPhase::Finalized => SelectionPhase::Finalized,
        }
    }
}

// ---------------------------------------------------------------------------
// Mirror types: grid configuration
// ---------------------------------------------------------------------------

/// Any field left out keeps its default (15 minutes, 06:00-23:00).
#[napi(object)]
#[derive(Debug, Clone, Default)]
pub struct GridConfig {
    pub interval_minutes: Option<u32>,
    pub day_start: Option<String>,
    pub day_end: Option<String>,
}

fn time_grid(config: Option<GridConfig>) -> Result<TimeGrid, GridError> {
    let config = config.unwrap_or_default();
    let defaults = EngineGridConfig::default();
    TimeGrid::from_config(&EngineGridConfig {
        interval_minutes: config.interval_minutes.unwrap_or(defaults.interval_minutes),
        day_start: config.day_start.unwrap_or(defaults.day_start),
        day_end: config.day_end.unwrap_or(defaults.day_end),
    })
}

// ---------------------------------------------------------------------------
// Mirror types: snapshot side
// ---------------------------------------------------------------------------

#[napi(object)]
#[derive(Debug, Clone)]
pub struct Resource {
    pub id: String,
    pub name: Option<String>,
}

impl From<Resource> for engine::Resource {
    fn from(v: Resource) -> Self {
        engine::Resource {
            id: v.id,
            name: v.name,
        }
    }
}

impl From<engine::Resource> for Resource {
    fn from(v: engine::Resource) -> Self {
        Resource {
            id: v.id,
            name: v.name,
        }
    }
}

#[napi(object)]
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: Option<String>,
    pub name: String,
    pub kind: ParticipantKind,
}

impl From<Participant> for engine::Participant {
    fn from(v: Participant) -> Self {
        engine::Participant {
            id: v.id,
            name: v.name,
            kind: v.kind.into(),
        }
    }
}

impl From<engine::Participant> for Participant {
    fn from(v: engine::Participant) -> Self {
        Participant {
            id: v.id,
            name: v.name,
            kind: v.kind.into(),
        }
    }
}

/// Amounts in minor currency units.
#[napi(object)]
#[derive(Debug, Clone)]
pub struct PaymentDetails {
    pub total_amount: i64,
    pub deposit: i64,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
}

impl TryFrom<PaymentDetails> for engine::PaymentDetails {
    type Error = GridError;

    fn try_from(v: PaymentDetails) -> Result<Self, Self::Error> {
        engine::PaymentDetails::new(
            amount(v.total_amount)?,
            amount(v.deposit)?,
            v.payment_status.into(),
            v.payment_method,
        )
    }
}

impl From<engine::PaymentDetails> for PaymentDetails {
    fn from(v: engine::PaymentDetails) -> Self {
        PaymentDetails {
            total_amount: money(v.total_amount()),
            deposit: money(v.deposit()),
            payment_status: v.payment_status().into(),
            payment_method: v.payment_method().map(str::to_string),
        }
    }
}

#[napi(object)]
#[derive(Debug, Clone)]
pub struct RentalItem {
    pub item_id: String,
    pub quantity: u32,
}

impl From<RentalItem> for engine::RentalItem {
    fn from(v: RentalItem) -> Self {
        engine::RentalItem {
            item_id: v.item_id,
            quantity: v.quantity,
        }
    }
}

impl From<engine::RentalItem> for RentalItem {
    fn from(v: engine::RentalItem) -> Self {
        RentalItem {
            item_id: v.item_id,
            quantity: v.quantity,
        }
    }
}

#[napi(object)]
#[derive(Debug, Clone)]
pub struct BlockedPeriod {
    pub id: String,
    pub resource_id: String,
    pub start: String,
    pub end: String,
    pub reason: Option<String>,
}

impl TryFrom<BlockedPeriod> for engine::BlockedPeriod {
    type Error = GridError;

    fn try_from(v: BlockedPeriod) -> Result<Self, Self::Error> {
        Ok(engine::BlockedPeriod {
            span: stored_span(&v.start, &v.end)?,
            id: engine::EntryId(v.id),
            resource_id: v.resource_id,
            reason: v.reason,
        })
    }
}

impl From<engine::BlockedPeriod> for BlockedPeriod {
    fn from(v: engine::BlockedPeriod) -> Self {
        BlockedPeriod {
            id: v.id.0,
            resource_id: v.resource_id,
            start: v.span.start.to_string(),
            end: v.span.end.to_string(),
            reason: v.reason,
        }
    }
}

#[napi(object)]
#[derive(Debug, Clone)]
pub struct ConfirmedBooking {
    pub id: String,
    pub resource_id: String,
    pub start: String,
    pub end: String,
    pub kind: BookingKind,
    pub participants: Vec<Participant>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub payment: PaymentDetails,
    pub rental_items: Vec<RentalItem>,
}

impl TryFrom<ConfirmedBooking> for engine::ConfirmedBooking {
    type Error = GridError;

    fn try_from(v: ConfirmedBooking) -> Result<Self, Self::Error> {
        Ok(engine::ConfirmedBooking {
            span: stored_span(&v.start, &v.end)?,
            payment: v.payment.try_into()?,
            id: engine::EntryId(v.id),
            resource_id: v.resource_id,
            kind: v.kind.into(),
            participants: v.participants.into_iter().map(Into::into).collect(),
            title: v.title,
            description: v.description,
            rental_items: v.rental_items.into_iter().map(Into::into).collect(),
        })
    }
}

impl From<engine::ConfirmedBooking> for ConfirmedBooking {
    fn from(v: engine::ConfirmedBooking) -> Self {
        ConfirmedBooking {
            id: v.id.0,
            resource_id: v.resource_id,
            start: v.span.start.to_string(),
            end: v.span.end.to_string(),
            kind: v.kind.into(),
            participants: v.participants.into_iter().map(Into::into).collect(),
            title: v.title,
            description: v.description,
            payment: v.payment.into(),
            rental_items: v.rental_items.into_iter().map(Into::into).collect(),
        }
    }
}

#[napi(object)]
#[derive(Debug, Clone)]
pub struct GridSnapshot {
    pub resources: Vec<Resource>,
    pub blocks: Vec<BlockedPeriod>,
    pub bookings: Vec<ConfirmedBooking>,
}

impl TryFrom<GridSnapshot> for engine::GridSnapshot {
    type Error = GridError;

    fn try_from(v: GridSnapshot) -> Result<Self, Self::Error> {
        Ok(engine::GridSnapshot {
            resources: v.resources.into_iter().map(Into::into).collect(),
            blocks: v
                .blocks
                .into_iter()
                .map(TryInto::try_into)
                .collect::<Result<_, _>>()?,
            bookings: v
                .bookings
                .into_iter()
                .map(TryInto::try_into)
                .collect::<Result<_, _>>()?,
        })
    }
}

impl From<engine::GridSnapshot> for GridSnapshot {
    fn from(v: engine::GridSnapshot) -> Self {
        GridSnapshot {
            resources: v.resources.into_iter().map(Into::into).collect(),
            blocks: v.blocks.into_iter().map(Into::into).collect(),
            bookings: v.bookings.into_iter().map(Into::into).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Mirror types: selection, drafts and pricing
// ---------------------------------------------------------------------------

#[napi(object)]
#[derive(Debug, Clone)]
pub struct SelectionRequest {
    /// `[from, to]` in either order.
    pub resource_range: Vec<String>,
    pub start: String,
    pub end: String,
}

fn build_selection(
    grid: &TimeGrid,
    snapshot: &engine::GridSnapshot,
    request: SelectionRequest,
) -> Result<Selection, GridError> {
    let [from, to]: [String; 2] = request.resource_range.try_into().map_err(|r: Vec<String>| {
        GridError::InvalidSelectionBounds(format!(
            "resource range needs two ids, got {}",
            r.len()
        ))
    })?;
    let span = engine::TimeSpan::parse(&request.start, &request.end)?;
    Selection::new(grid, &snapshot.resources, &from, &to, span)
}

#[napi(object)]
#[derive(Debug, Clone)]
pub struct BookingDraft {
    pub kind: BookingKind,
    pub participants: Vec<Participant>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub payment: Option<PaymentDetails>,
    pub rental_items: Option<Vec<RentalItem>>,
    pub manual_price: Option<i64>,
}

impl TryFrom<BookingDraft> for session::BookingDraft {
    type Error = GridError;

    fn try_from(v: BookingDraft) -> Result<Self, Self::Error> {
        Ok(session::BookingDraft {
            kind: v.kind.into(),
            participants: v.participants.into_iter().map(Into::into).collect(),
            title: v.title,
            description: v.description,
            payment: v.payment.map(TryInto::try_into).transpose()?,
            rental_items: v
                .rental_items
                .unwrap_or_default()
                .into_iter()
                .map(Into::into)
                .collect(),
            manual_price: v.manual_price.map(amount).transpose()?,
        })
    }
}

/// Duration-price tables keyed by duration in minutes (`{"30": 1000}`).
#[napi(object)]
#[derive(Debug, Clone, Default)]
pub struct PricingCatalog {
    pub resources: HashMap<String, HashMap<String, i64>>,
    pub rental_items: Option<HashMap<String, HashMap<String, i64>>>,
}

fn price_tables(
    raw: HashMap<String, HashMap<String, i64>>,
) -> Result<HashMap<String, DurationPriceTable>, GridError> {
    raw.into_iter()
        .map(|(id, table)| {
            let table = table
                .into_iter()
                .map(|(mins, price)| Ok((mins, amount(price)?)))
                .collect::<Result<HashMap<String, u64>, GridError>>()?;
            Ok((id, DurationPriceTable::try_from(table)?))
        })
        .collect()
}

impl TryFrom<PricingCatalog> for pricing::PricingCatalog {
    type Error = GridError;

    fn try_from(v: PricingCatalog) -> Result<Self, Self::Error> {
        Ok(pricing::PricingCatalog {
            resources: price_tables(v.resources)?,
            rental_items: price_tables(v.rental_items.unwrap_or_default())?,
        })
    }
}

#[napi(object)]
#[derive(Debug, Clone)]
pub struct QuoteLine {
    /// Set for court lines.
    pub resource_id: Option<String>,
    /// Set for rental lines, together with `quantity`.
    pub item_id: Option<String>,
    pub quantity: Option<u32>,
    pub amount: i64,
    pub manual_price_required: bool,
}

impl From<pricing::QuoteLine> for QuoteLine {
    fn from(v: pricing::QuoteLine) -> Self {
        let (resource_id, item_id, quantity) = match v.subject {
            QuoteSubject::Resource { resource_id } => (Some(resource_id), None, None),
            QuoteSubject::RentalItem { item_id, quantity } => (None, Some(item_id), Some(quantity)),
        };
        QuoteLine {
            resource_id,
            item_id,
            quantity,
            amount: money(v.amount),
            manual_price_required: v.manual_price_required,
        }
    }
}

#[napi(object)]
#[derive(Debug, Clone)]
pub struct Quote {
    pub duration_mins: u32,
    pub lines: Vec<QuoteLine>,
    pub total: i64,
    pub manual_price_required: bool,
}

impl From<pricing::Quote> for Quote {
    fn from(v: pricing::Quote) -> Self {
        Quote {
            duration_mins: v.duration_mins,
            lines: v.lines.into_iter().map(Into::into).collect(),
            total: money(v.total),
            manual_price_required: v.manual_price_required,
        }
    }
}

// ---------------------------------------------------------------------------
// Mirror types: resolution plan
// ---------------------------------------------------------------------------

#[napi(object)]
#[derive(Debug, Clone)]
pub struct EntryUpdate {
    pub id: String,
    pub resource_id: String,
    pub start: String,
    pub end: String,
    pub payment: Option<PaymentDetails>,
}

impl TryFrom<EntryUpdate> for resolver::EntryUpdate {
    type Error = GridError;

    fn try_from(v: EntryUpdate) -> Result<Self, Self::Error> {
        Ok(resolver::EntryUpdate {
            span: stored_span(&v.start, &v.end)?,
            id: engine::EntryId(v.id),
            resource_id: v.resource_id,
            payment: v.payment.map(TryInto::try_into).transpose()?,
        })
    }
}

impl From<resolver::EntryUpdate> for EntryUpdate {
    fn from(v: resolver::EntryUpdate) -> Self {
        EntryUpdate {
            id: v.id.0,
            resource_id: v.resource_id,
            start: v.span.start.to_string(),
            end: v.span.end.to_string(),
            payment: v.payment.map(Into::into),
        }
    }
}

/// JS objects cannot carry the engine's tagged entry enum, so new entries are
/// split by kind.
#[napi(object)]
#[derive(Debug, Clone)]
pub struct ResolutionPlan {
    pub overlap_count: u32,
    pub deletes: Vec<String>,
    pub updates: Vec<EntryUpdate>,
    pub fragment_blocks: Vec<BlockedPeriod>,
    pub fragment_bookings: Vec<ConfirmedBooking>,
    pub insert_blocks: Vec<BlockedPeriod>,
    pub insert_bookings: Vec<ConfirmedBooking>,
    pub skipped: Vec<String>,
}

fn split_entries(entries: Vec<engine::GridEntry>) -> (Vec<BlockedPeriod>, Vec<ConfirmedBooking>) {
    let mut blocks = Vec::new();
    let mut bookings = Vec::new();
    for entry in entries {
        match entry {
            engine::GridEntry::Block(b) => blocks.push(b.into()),
            engine::GridEntry::Booking(b) => bookings.push(b.into()),
        }
    }
    (blocks, bookings)
}

fn join_entries(
    blocks: Vec<BlockedPeriod>,
    bookings: Vec<ConfirmedBooking>,
) -> Result<Vec<engine::GridEntry>, GridError> {
    let mut entries = Vec::with_capacity(blocks.len() + bookings.len());
    for b in blocks {
        entries.push(engine::GridEntry::Block(b.try_into()?));
    }
    for b in bookings {
        entries.push(engine::GridEntry::Booking(b.try_into()?));
    }
    Ok(entries)
}

impl From<resolver::ResolutionPlan> for ResolutionPlan {
    fn from(v: resolver::ResolutionPlan) -> Self {
        let (fragment_blocks, fragment_bookings) = split_entries(v.fragments);
        let (insert_blocks, insert_bookings) = split_entries(v.inserts);
        ResolutionPlan {
            overlap_count: v.overlap_count as u32,
            deletes: v.deletes.into_iter().map(|id| id.0).collect(),
            updates: v.updates.into_iter().map(Into::into).collect(),
            fragment_blocks,
            fragment_bookings,
            insert_blocks,
            insert_bookings,
            skipped: v.skipped.into_iter().map(|id| id.0).collect(),
        }
    }
}

impl TryFrom<ResolutionPlan> for resolver::ResolutionPlan {
    type Error = GridError;

    fn try_from(v: ResolutionPlan) -> Result<Self, Self::Error> {
        Ok(resolver::ResolutionPlan {
            overlap_count: v.overlap_count as usize,
            deletes: v.deletes.into_iter().map(engine::EntryId).collect(),
            updates: v
                .updates
                .into_iter()
                .map(TryInto::try_into)
                .collect::<Result<_, _>>()?,
            fragments: join_entries(v.fragment_blocks, v.fragment_bookings)?,
            inserts: join_entries(v.insert_blocks, v.insert_bookings)?,
            skipped: v.skipped.into_iter().map(engine::EntryId).collect(),
        })
    }
}

#[napi(object)]
#[derive(Debug, Clone)]
pub struct ResolveResult {
    /// Ask the admin before applying: existing entries would be trimmed.
    pub requires_confirmation: bool,
    pub plan: ResolutionPlan,
}

// ---------------------------------------------------------------------------
// Validation result
// ---------------------------------------------------------------------------

#[napi(object)]
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl From<validator::ValidationResult> for ValidationResult {
    fn from(v: validator::ValidationResult) -> Self {
        ValidationResult {
            errors: v.errors,
            warnings: v.warnings,
        }
    }
}

// ---------------------------------------------------------------------------
// Exported functions
// ---------------------------------------------------------------------------

fn resolve_action(
    snapshot: GridSnapshot,
    request: SelectionRequest,
    action: EntryAction,
    catalog: Option<PricingCatalog>,
    grid: Option<GridConfig>,
) -> Result<ResolveResult, GridError> {
    let grid = time_grid(grid)?;
    let snapshot = engine::GridSnapshot::try_from(snapshot)?;
    let catalog = catalog
        .map(pricing::PricingCatalog::try_from)
        .transpose()?
        .unwrap_or_default();
    let selection = build_selection(&grid, &snapshot, request)?;
    let plan = session::plan_action(&snapshot, &catalog, &selection, &action)?;
    Ok(ResolveResult {
        requires_confirmation: plan.requires_confirmation(),
        plan: plan.into(),
    })
}

/// Plan blocking the selected range. Nothing is changed until `applyPlan`.
#[napi]
pub fn resolve_block(
    snapshot: GridSnapshot,
    selection: SelectionRequest,
    reason: Option<String>,
    grid: Option<GridConfig>,
) -> napi::Result<ResolveResult> {
    resolve_action(snapshot, selection, EntryAction::Block { reason }, None, grid)
        .map_err(to_napi)
}

/// Plan booking the selected range, pricing it from `catalog`.
#[napi]
pub fn resolve_booking(
    snapshot: GridSnapshot,
    selection: SelectionRequest,
    draft: BookingDraft,
    catalog: Option<PricingCatalog>,
    grid: Option<GridConfig>,
) -> napi::Result<ResolveResult> {
    let draft = session::BookingDraft::try_from(draft).map_err(to_napi)?;
    resolve_action(snapshot, selection, EntryAction::Booking(draft), catalog, grid)
        .map_err(to_napi)
}

/// Apply a plan. Plans that trim existing entries need `confirmed`.
#[napi]
pub fn apply_plan(
    snapshot: GridSnapshot,
    plan: ResolutionPlan,
    confirmed: bool,
    assigned_ids: Option<HashMap<String, String>>,
) -> napi::Result<GridSnapshot> {
    let run = || -> Result<GridSnapshot, GridError> {
        let snapshot = engine::GridSnapshot::try_from(snapshot)?;
        let plan = resolver::ResolutionPlan::try_from(plan)?;
        let mut next = resolver::apply_plan(&snapshot, &plan, confirmed)?;
        let assigned = assigned_ids
            .unwrap_or_default()
            .into_iter()
            .map(|(local, remote)| (engine::EntryId(local), engine::EntryId(remote)))
            .collect();
        resolver::remap_ids(&mut next, &assigned);
        Ok(next.into())
    };
    run().map_err(to_napi)
}

#[napi]
pub fn quote_price(
    catalog: PricingCatalog,
    resource_ids: Vec<String>,
    duration_mins: u32,
    rental_items: Option<Vec<RentalItem>>,
) -> napi::Result<Quote> {
    let catalog = pricing::PricingCatalog::try_from(catalog).map_err(to_napi)?;
    let rentals: Vec<engine::RentalItem> = rental_items
        .unwrap_or_default()
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(pricing::quote(&catalog, &resource_ids, duration_mins, &rentals).into())
}

/// Check a snapshot and return errors and warnings without changing it.
#[napi]
pub fn validate(snapshot: GridSnapshot, grid: Option<GridConfig>) -> napi::Result<ValidationResult> {
    let grid = time_grid(grid).map_err(to_napi)?;
    let snapshot = engine::GridSnapshot::try_from(snapshot).map_err(to_napi)?;
    Ok(validator::validate(&snapshot, Some(&grid)).into())
}

/// Round an `HH:MM` time to the nearest grid boundary.
#[napi]
pub fn snap_to_interval(time: String, grid: Option<GridConfig>) -> napi::Result<String> {
    let grid = time_grid(grid).map_err(to_napi)?;
    let offset = grid.time_to_offset(&time).map_err(to_napi)?;
    Ok(grid.offset_to_time(grid.snap_to_interval(offset)))
}

// ---------------------------------------------------------------------------
// Session class
// ---------------------------------------------------------------------------

/// A stateful grid for one rendered day. Commands and intents travel as JSON
/// so the host can forward pointer events without building mirror objects.
#[napi]
pub struct GridSessionHandle {
    inner: GridSession,
}

#[napi]
impl GridSessionHandle {
    #[napi(constructor)]
    pub fn new(
        snapshot: GridSnapshot,
        grid: Option<GridConfig>,
        catalog: Option<PricingCatalog>,
    ) -> napi::Result<Self> {
        let grid = time_grid(grid).map_err(to_napi)?;
        let snapshot = engine::GridSnapshot::try_from(snapshot).map_err(to_napi)?;
        let catalog = catalog
            .map(pricing::PricingCatalog::try_from)
            .transpose()
            .map_err(to_napi)?
            .unwrap_or_default();
        Ok(GridSessionHandle {
            inner: GridSession::new(grid, snapshot).with_catalog(catalog),
        })
    }

    /// Feed one command (e.g. `{"command":"pointerUp"}`) and get back the
    /// resulting intents as a JSON array.
    #[napi]
    pub fn handle(&mut self, command_json: String) -> napi::Result<String> {
        let command = serde_json::from_str(&command_json)
            .map_err(|e| napi::Error::from_reason(format!("Invalid command: {}", e)))?;
        let intents = self.inner.handle(command).map_err(to_napi)?;
        serde_json::to_string(&intents).map_err(|e| napi::Error::from_reason(e.to_string()))
    }

    #[napi(getter)]
    pub fn phase(&self) -> SelectionPhase {
        self.inner.phase().into()
    }

    #[napi]
    pub fn snapshot(&self) -> GridSnapshot {
        self.inner.snapshot().clone().into()
    }

    /// Swap in freshly fetched data. Drops the current selection.
    #[napi]
    pub fn load_snapshot(&mut self, snapshot: GridSnapshot) -> napi::Result<()> {
        let snapshot = engine::GridSnapshot::try_from(snapshot).map_err(to_napi)?;
        self.inner.load_snapshot(snapshot);
        Ok(())
    }
}
