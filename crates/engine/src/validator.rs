use std::collections::HashSet;

use serde::Serialize;

use crate::model::{BookingKind, GridEntry, GridSnapshot};
use crate::resolver::find_overlaps;
use crate::time_grid::TimeGrid;

// ---------------------------------------------------------------------------
// Validation result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Validate implementation
// ---------------------------------------------------------------------------

/// Check a snapshot before it is rendered, returning errors (data the
/// resolver cannot trust) and warnings (advisory). Errors are listed before
/// warnings.
///
/// Payment invariants are enforced when `PaymentDetails` is built, so a
/// snapshot that deserialized cannot carry a broken payment.
pub fn validate(snapshot: &GridSnapshot, grid: Option<&TimeGrid>) -> ValidationResult {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    let entries: Vec<GridEntry> = snapshot
        .blocks
        .iter()
        .cloned()
        .map(GridEntry::Block)
        .chain(snapshot.bookings.iter().cloned().map(GridEntry::Booking))
        .collect();

    // -----------------------------------------------------------------------
    // Error: duplicate resource IDs
    // -----------------------------------------------------------------------
    {
        let mut seen = HashSet::new();
        for resource in &snapshot.resources {
            if !seen.insert(resource.id.as_str()) {
                errors.push(format!(
                    "Duplicate resource ID '{}' -- each resource must have a unique ID",
                    resource.id
                ));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Error: duplicate entry IDs
    // -----------------------------------------------------------------------
    {
        let mut seen = HashSet::new();
        for id in entries.iter().map(GridEntry::id) {
            if !seen.insert(id) {
                errors.push(format!(
                    "Duplicate entry ID '{}' -- blocks and bookings share one ID space",
                    id
                ));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Error: entries on unknown resources
    // -----------------------------------------------------------------------
    let resource_ids: HashSet<&str> = snapshot.resources.iter().map(|r| r.id.as_str()).collect();
    for entry in entries
        .iter()
        .filter(|e| !resource_ids.contains(e.resource_id()))
    {
        errors.push(format!(
            "Entry '{}' sits on resource '{}' which isn't defined",
            entry.id(),
            entry.resource_id()
        ));
    }

    // -----------------------------------------------------------------------
    // Per-entry errors
    // -----------------------------------------------------------------------
    for entry in &entries {
        let span = entry.span();
        if !span.is_valid() {
            errors.push(format!(
                "Entry '{}' has an inverted or empty span {} -- it will be skipped on resolve",
                entry.id(),
                span
            ));
        }
    }

    let mut reported = HashSet::new();
    for (a, b) in find_overlaps(snapshot) {
        if !reported.insert((a.clone(), b.clone())) {
            continue;
        }
        errors.push(format!("Entries '{}' and '{}' overlap on the same resource", a, b));
    }

    // -----------------------------------------------------------------------
    // Warnings
    // -----------------------------------------------------------------------
    if snapshot.resources.is_empty() {
        warnings.push("No resources defined -- nothing can be selected".to_string());
    }

    for booking in &snapshot.bookings {
        if booking.kind == BookingKind::Single && booking.participants.is_empty() {
            warnings.push(format!(
                "Booking '{}' is a single booking with no participants",
                booking.id
            ));
        }
    }

    if let Some(grid) = grid {
        for entry in &entries {
            if entry.span().is_valid() && !grid.contains_span(&entry.span()) {
                warnings.push(format!(
                    "Entry '{}' at {} falls outside the day ({} - {})",
                    entry.id(),
                    entry.span(),
                    grid.day_start(),
                    grid.day_end()
                ));
            }
        }
    }

    ValidationResult { errors, warnings }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
