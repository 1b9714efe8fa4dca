use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::GridError;
use crate::model::{EntryId, GridEntry, GridSnapshot, PaymentDetails, TimeSpan};
use crate::selection::Selection;

// ---------------------------------------------------------------------------
// Plan types
// ---------------------------------------------------------------------------

/// New bounds for an existing entry that survives partially.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryUpdate {
    pub id: EntryId,
    pub resource_id: String,
    #[serde(flatten)]
    pub span: TimeSpan,
    /// Share of a split booking's payment the original keeps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentDetails>,
}

/// Everything needed to reconcile a selection with the existing blocks and
/// bookings, computed up front so the caller can commit it all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionPlan {
    /// Existing entries that intersect the selection, summed over resources.
    pub overlap_count: usize,
    pub deletes: Vec<EntryId>,
    pub updates: Vec<EntryUpdate>,
    /// Trailing remnants of entries that strictly contained the selection.
    /// A split booking's payment is divided between the original and its
    /// remnant by duration, so the two still add up to what was charged.
    pub fragments: Vec<GridEntry>,
    /// Exactly one new entry per selected resource.
    pub inserts: Vec<GridEntry>,
    /// Entries left untouched because their own span was already broken.
    pub skipped: Vec<EntryId>,
}

impl ResolutionPlan {
    /// True when committing would delete or reshape existing entries.
    pub fn requires_confirmation(&self) -> bool {
        self.overlap_count > 0
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// How one existing entry must change to make room for the selection.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Trim {
    Delete,
    Reshape(TimeSpan),
    /// Keep `[E.start, S.start)` on the original and add `[S.end, E.end)`.
    Split { head: TimeSpan, tail: TimeSpan },
}

fn trim(existing: TimeSpan, selection: TimeSpan) -> Trim {
    if selection.contains(&existing) {
        return Trim::Delete;
    }
    let cuts_tail = selection.start > existing.start;
    let cuts_head = selection.end < existing.end;
    match (cuts_tail, cuts_head) {
        (true, true) => Trim::Split {
            head: TimeSpan {
                start: existing.start,
                end: selection.start,
            },
            tail: TimeSpan {
                start: selection.end,
                end: existing.end,
            },
        },
        (true, false) => Trim::Reshape(TimeSpan {
            start: existing.start,
            end: selection.start,
        }),
        // Not containing and not cutting the tail means the head is cut.
        _ => Trim::Reshape(TimeSpan {
            start: selection.end,
            end: existing.end,
        }),
    }
}

/// Compute the plan that commits one new entry per selected resource.
///
/// `make_entry` builds the new block or booking for the resource at position
/// `i` within the selection. The snapshot is not touched; apply the returned
/// plan with [`apply_plan`].
pub fn resolve<F>(
    snapshot: &GridSnapshot,
    selection: &Selection,
    mut make_entry: F,
) -> ResolutionPlan
where
    F: FnMut(usize, &str, TimeSpan) -> GridEntry,
{
    let s = selection.span();
    let mut plan = ResolutionPlan::default();

    for (i, resource_id) in selection.resource_ids().iter().enumerate() {
        for entry in snapshot.entries_on(resource_id) {
            let e = entry.span();
            if !e.is_valid() {
                let err = GridError::AmbiguousOverlap(
                    entry.id().to_string(),
                    e.start.to_string(),
                    e.end.to_string(),
                );
                log::warn!("skipping entry during resolution: {}", err);
                plan.skipped.push(entry.id().clone());
                continue;
            }
            if !e.overlaps(&s) {
                continue;
            }
            plan.overlap_count += 1;
            match trim(e, s) {
                Trim::Delete => plan.deletes.push(entry.id().clone()),
                Trim::Reshape(span) => plan.updates.push(EntryUpdate {
                    id: entry.id().clone(),
                    resource_id: resource_id.clone(),
                    span,
                    payment: None,
                }),
                Trim::Split { head, tail } => {
                    let mut remnant = entry.clone();
                    remnant.set_id(EntryId::generate());
                    remnant.set_span(tail);
                    let mut head_payment = None;
                    if let GridEntry::Booking(booking) = &mut remnant {
                        let (kept, moved) = booking
                            .payment
                            .split(head.duration_mins(), tail.duration_mins());
                        booking.payment = moved;
                        head_payment = Some(kept);
                    }
                    plan.updates.push(EntryUpdate {
                        id: entry.id().clone(),
                        resource_id: resource_id.clone(),
                        span: head,
                        payment: head_payment,
                    });
                    plan.fragments.push(remnant);
                }
            }
        }
        plan.inserts.push(make_entry(i, resource_id, s));
    }

    log::debug!(
        "resolved {} on {:?}: {} overlaps, {} deletes, {} updates, {} fragments",
        s,
        selection.resource_ids(),
        plan.overlap_count,
        plan.deletes.len(),
        plan.updates.len(),
        plan.fragments.len()
    );
    plan
}

/// Apply a plan to a snapshot, returning the new snapshot.
///
/// Refuses to mutate existing entries unless `confirmed` is set. All ids are
/// checked before anything changes, so an error leaves nothing half-applied.
pub fn apply_plan(
    snapshot: &GridSnapshot,
    plan: &ResolutionPlan,
    confirmed: bool,
) -> Result<GridSnapshot, GridError> {
    let destructive = !plan.deletes.is_empty() || !plan.updates.is_empty();
    if destructive && !confirmed {
        return Err(GridError::ConfirmationRequired(plan.overlap_count));
    }

    let known: HashSet<&EntryId> = snapshot
        .blocks
        .iter()
        .map(|b| &b.id)
        .chain(snapshot.bookings.iter().map(|b| &b.id))
        .collect();
    for id in plan.deletes.iter().chain(plan.updates.iter().map(|u| &u.id)) {
        if !known.contains(id) {
            return Err(GridError::UnknownEntry(id.to_string()));
        }
    }
    for update in &plan.updates {
        if !update.span.is_valid() {
            return Err(GridError::bounds(format!(
                "update for '{}' has empty span {}",
                update.id, update.span
            )));
        }
    }
    for entry in plan.fragments.iter().chain(plan.inserts.iter()) {
        if snapshot.resource_index(entry.resource_id()).is_none() {
            return Err(GridError::UnknownResource(entry.resource_id().to_string()));
        }
    }

    let deletes: HashSet<&EntryId> = plan.deletes.iter().collect();
    let updates: HashMap<&EntryId, &EntryUpdate> =
        plan.updates.iter().map(|u| (&u.id, u)).collect();

    let mut next = GridSnapshot {
        resources: snapshot.resources.clone(),
        blocks: Vec::with_capacity(snapshot.blocks.len() + plan.inserts.len()),
        bookings: Vec::with_capacity(snapshot.bookings.len() + plan.inserts.len()),
    };
    for block in &snapshot.blocks {
        if deletes.contains(&block.id) {
            continue;
        }
        let mut block = block.clone();
        if let Some(update) = updates.get(&block.id) {
            block.span = update.span;
        }
        next.blocks.push(block);
    }
    for booking in &snapshot.bookings {
        if deletes.contains(&booking.id) {
            continue;
        }
        let mut booking = booking.clone();
        if let Some(update) = updates.get(&booking.id) {
            booking.span = update.span;
            if let Some(payment) = &update.payment {
                booking.payment = payment.clone();
            }
        }
        next.bookings.push(booking);
    }
    for entry in plan.fragments.iter().chain(plan.inserts.iter()) {
        next.push(entry.clone());
    }

    log::info!(
        "applied plan: -{} ~{} +{} entries",
        plan.deletes.len(),
        plan.updates.len(),
        plan.fragments.len() + plan.inserts.len()
    );
    Ok(next)
}

/// Replace locally generated ids with ones assigned by the persistence side.
pub fn remap_ids(snapshot: &mut GridSnapshot, assigned: &HashMap<EntryId, EntryId>) {
    if assigned.is_empty() {
        return;
    }
    for block in &mut snapshot.blocks {
        if let Some(id) = assigned.get(&block.id) {
            block.id = id.clone();
        }
    }
    for booking in &mut snapshot.bookings {
        if let Some(id) = assigned.get(&booking.id) {
            booking.id = id.clone();
        }
    }
}

/// All pairs of entries on the same resource that overlap.
pub fn find_overlaps(snapshot: &GridSnapshot) -> Vec<(EntryId, EntryId)> {
    let mut pairs = Vec::new();
    for resource in &snapshot.resources {
        let entries = snapshot.entries_on(&resource.id);
        for (i, a) in entries.iter().enumerate() {
            for b in &entries[i + 1..] {
                if a.span().is_valid() && b.span().is_valid() && a.span().overlaps(&b.span()) {
                    pairs.push((a.id().clone(), b.id().clone()));
                }
            }
        }
    }
    pairs
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{
        BlockedPeriod, BookingKind, ClockTime, ConfirmedBooking, PaymentStatus, Resource,
    };
    use crate::time_grid::TimeGrid;

    fn span(start: &str, end: &str) -> TimeSpan {
        TimeSpan::parse(start, end).unwrap()
    }

    fn block(id: &str, resource: &str, start: &str, end: &str) -> BlockedPeriod {
        BlockedPeriod {
            id: id.into(),
            resource_id: resource.to_string(),
            span: span(start, end),
            reason: None,
        }
    }

    fn snapshot(blocks: Vec<BlockedPeriod>) -> GridSnapshot {
        GridSnapshot {
            resources: (1..=3)
                .map(|i| Resource {
                    id: i.to_string(),
                    name: None,
                })
                .collect(),
            blocks,
            bookings: vec![],
        }
    }

    fn select(snap: &GridSnapshot, from: &str, to: &str, start: &str, end: &str) -> Selection {
        Selection::new(&TimeGrid::default(), &snap.resources, from, to, span(start, end)).unwrap()
    }

    fn new_block(_: usize, resource_id: &str, span: TimeSpan) -> GridEntry {
        GridEntry::Block(BlockedPeriod {
            id: EntryId::generate(),
            resource_id: resource_id.to_string(),
            span,
            reason: Some("maintenance".into()),
        })
    }

    #[test]
    fn test_trim_cases() {
        let e = span("10:00", "11:00");
        assert_eq!(trim(e, span("09:30", "11:30")), Trim::Delete);
        assert_eq!(trim(e, span("10:00", "11:00")), Trim::Delete);
        assert_eq!(trim(e, span("10:30", "11:30")), Trim::Reshape(span("10:00", "10:30")));
        assert_eq!(trim(e, span("09:30", "10:15")), Trim::Reshape(span("10:15", "11:00")));
        assert_eq!(
            trim(e, span("10:15", "10:45")),
            Trim::Split {
                head: span("10:00", "10:15"),
                tail: span("10:45", "11:00"),
            }
        );
    }

    #[test]
    fn test_no_overlap_inserts_directly() {
        let snap = snapshot(vec![]);
        let sel = select(&snap, "1", "1", "09:00", "09:30");
        let plan = resolve(&snap, &sel, new_block);
        assert!(!plan.requires_confirmation());
        assert!(plan.deletes.is_empty() && plan.updates.is_empty());
        assert_eq!(plan.inserts.len(), 1);
        assert_eq!(plan.inserts[0].span(), span("09:00", "09:30"));

        let next = apply_plan(&snap, &plan, false).unwrap();
        assert_eq!(next.blocks.len(), 1);
    }

    #[test]
    fn test_full_containment_deletes_existing() {
        let snap = snapshot(vec![block("e", "1", "10:00", "11:00")]);
        let sel = select(&snap, "1", "1", "09:30", "11:30");
        let plan = resolve(&snap, &sel, new_block);
        assert_eq!(plan.overlap_count, 1);
        assert_eq!(plan.deletes, vec![EntryId::from("e")]);

        let next = apply_plan(&snap, &plan, true).unwrap();
        assert_eq!(next.blocks.len(), 1);
        assert_eq!(next.blocks[0].span, span("09:30", "11:30"));
        assert_ne!(next.blocks[0].id, EntryId::from("e"));
    }

    #[test]
    fn test_interior_split_keeps_both_remnants() {
        let snap = snapshot(vec![block("e", "1", "09:00", "12:00")]);
        let sel = select(&snap, "1", "1", "10:00", "10:30");
        let plan = resolve(&snap, &sel, new_block);
        let next = apply_plan(&snap, &plan, true).unwrap();

        let mut spans: Vec<TimeSpan> = next.blocks.iter().map(|b| b.span).collect();
        spans.sort_by_key(|s| s.start);
        assert_eq!(
            spans,
            vec![
                span("09:00", "10:00"),
                span("10:00", "10:30"),
                span("10:30", "12:00"),
            ]
        );
        assert!(next.blocks.iter().any(|b| b.id == EntryId::from("e")));
        assert!(find_overlaps(&next).is_empty());
    }

    #[test]
    fn test_split_booking_divides_payment() {
        let mut snap = snapshot(vec![]);
        snap.bookings.push(ConfirmedBooking {
            id: "bk".into(),
            resource_id: "1".to_string(),
            span: span("09:00", "12:00"),
            kind: BookingKind::Class,
            participants: vec![],
            title: Some("Clinic".into()),
            description: None,
            payment: PaymentDetails::from_deposit(3000, 3000, None).unwrap(),
            rental_items: vec![],
        });
        let sel = select(&snap, "1", "1", "10:00", "10:30");
        let plan = resolve(&snap, &sel, new_block);
        let next = apply_plan(&snap, &plan, true).unwrap();

        assert_eq!(next.bookings.len(), 2);
        let head = next.bookings.iter().find(|b| b.id == EntryId::from("bk")).unwrap();
        let tail = next.bookings.iter().find(|b| b.id != EntryId::from("bk")).unwrap();
        assert_eq!(head.span, span("09:00", "10:00"));
        assert_eq!(tail.span, span("10:30", "12:00"));
        assert_eq!(head.payment.total_amount(), 1200);
        assert_eq!(tail.payment.total_amount(), 1800);
        assert_eq!(head.payment.deposit() + tail.payment.deposit(), 3000);
        assert_eq!(tail.payment.payment_status(), PaymentStatus::Completed);
        assert_eq!(tail.title.as_deref(), Some("Clinic"));
    }

    #[test]
    fn test_destructive_plan_needs_confirmation() {
        let snap = snapshot(vec![block("e", "2", "10:00", "11:00")]);
        let sel = select(&snap, "1", "3", "10:30", "12:00");
        let plan = resolve(&snap, &sel, new_block);
        assert_eq!(plan.overlap_count, 1);
        assert_eq!(plan.inserts.len(), 3);
        let err = apply_plan(&snap, &plan, false).unwrap_err();
        assert!(matches!(err, GridError::ConfirmationRequired(1)));
    }

    #[test]
    fn test_overlaps_counted_across_resources() {
        let snap = snapshot(vec![
            block("a", "1", "10:00", "11:00"),
            block("b", "3", "09:00", "10:15"),
            block("c", "2", "12:00", "13:00"),
        ]);
        let sel = select(&snap, "3", "1", "10:00", "10:30");
        let plan = resolve(&snap, &sel, new_block);
        assert_eq!(plan.overlap_count, 2);
        assert_eq!(plan.updates.len(), 2);
        let next = apply_plan(&snap, &plan, true).unwrap();
        assert!(find_overlaps(&next).is_empty());
        assert_eq!(next.blocks.len(), 6);
    }

    #[test]
    fn test_broken_entry_is_skipped_not_repaired() {
        let mut broken = block("bad", "1", "09:00", "10:00");
        broken.span = TimeSpan {
            start: ClockTime::parse("11:00").unwrap(),
            end: ClockTime::parse("10:00").unwrap(),
        };
        let snap = snapshot(vec![broken.clone()]);
        let sel = select(&snap, "1", "1", "09:00", "12:00");
        let plan = resolve(&snap, &sel, new_block);
        assert_eq!(plan.skipped, vec![EntryId::from("bad")]);
        assert_eq!(plan.overlap_count, 0);
        let next = apply_plan(&snap, &plan, false).unwrap();
        assert!(next.blocks.contains(&broken));
    }

    #[test]
    fn test_unknown_ids_abort_before_mutation() {
        let snap = snapshot(vec![]);
        let plan = ResolutionPlan {
            overlap_count: 1,
            deletes: vec!["ghost".into()],
            ..Default::default()
        };
        let err = apply_plan(&snap, &plan, true).unwrap_err();
        assert!(matches!(err, GridError::UnknownEntry(_)));

        let plan = ResolutionPlan {
            inserts: vec![new_block(0, "7", span("09:00", "10:00"))],
            ..Default::default()
        };
        let err = apply_plan(&snap, &plan, true).unwrap_err();
        assert!(matches!(err, GridError::UnknownResource(ref id) if id == "7"));
    }

    #[test]
    fn test_remap_ids() {
        let mut snap = snapshot(vec![block("local", "1", "09:00", "10:00")]);
        let assigned = HashMap::from([(EntryId::from("local"), EntryId::from("srv-42"))]);
        remap_ids(&mut snap, &assigned);
        assert_eq!(snap.blocks[0].id, EntryId::from("srv-42"));
    }
}
