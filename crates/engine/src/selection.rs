use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::GridError;
use crate::model::{ClockTime, Resource, TimeSpan};
use crate::time_grid::TimeGrid;

// ---------------------------------------------------------------------------
// Pointer payloads
// ---------------------------------------------------------------------------

/// Where on the time axis a pointer sits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointerPosition {
    /// Wall-clock time already resolved by the host.
    Time { time: ClockTime },
    /// Exact minutes since day start.
    Offset { offset: u32 },
    /// Horizontal position within a grid cell: `fraction` of the way across
    /// interval `slot`.
    Cell { slot: usize, fraction: f64 },
}

/// Pointer payload: which resource row and where along it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerTarget {
    pub resource_id: String,
    #[serde(flatten)]
    pub position: PointerPosition,
}

impl PointerTarget {
    pub fn at_time(resource_id: &str, time: &str) -> Result<Self, GridError> {
        Ok(PointerTarget {
            resource_id: resource_id.to_string(),
            position: PointerPosition::Time {
                time: ClockTime::parse(time)?,
            },
        })
    }

    pub fn in_cell(resource_id: &str, slot: usize, fraction: f64) -> Self {
        PointerTarget {
            resource_id: resource_id.to_string(),
            position: PointerPosition::Cell { slot, fraction },
        }
    }

    /// Exact (unsnapped) offset from day start.
    fn exact_offset(&self, grid: &TimeGrid) -> u32 {
        match self.position {
            PointerPosition::Time { time } => grid.offset_of(time),
            PointerPosition::Offset { offset } => offset.min(grid.day_length()),
            PointerPosition::Cell { slot, fraction } => grid.pointer_offset(slot, fraction),
        }
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Caller-supplied selection, e.g. when resolving outside a pointer session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRequest {
    /// Either order; normalized against the resource list.
    pub resource_range: [String; 2],
    pub start: ClockTime,
    pub end: ClockTime,
}

/// One resource's share of a selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub resource_id: String,
    #[serde(flatten)]
    pub span: TimeSpan,
}

/// A rectangular region of the grid: a contiguous run of resources that all
/// share one time range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    /// As given by the caller: `[anchor, current]`.
    resource_range: [String; 2],
    /// Normalized, in resource-list order.
    resource_ids: Vec<String>,
    #[serde(skip)]
    first_index: usize,
    #[serde(flatten)]
    span: TimeSpan,
}

impl Selection {
    /// Build a selection between two resources (either order) and validate it.
    pub fn new(
        grid: &TimeGrid,
        resources: &[Resource],
        from_resource: &str,
        to_resource: &str,
        span: TimeSpan,
    ) -> Result<Self, GridError> {
        let from = resource_position(resources, from_resource)?;
        let to = resource_position(resources, to_resource)?;
        let (first, last) = if from <= to { (from, to) } else { (to, from) };
        let selection = Selection {
            resource_range: [from_resource.to_string(), to_resource.to_string()],
            resource_ids: resources[first..=last].iter().map(|r| r.id.clone()).collect(),
            first_index: first,
            span,
        };
        selection.check(grid, resources)?;
        Ok(selection)
    }

    pub fn from_request(
        grid: &TimeGrid,
        resources: &[Resource],
        request: &SelectionRequest,
    ) -> Result<Self, GridError> {
        let span = TimeSpan::new(request.start, request.end)?;
        Selection::new(
            grid,
            resources,
            &request.resource_range[0],
            &request.resource_range[1],
            span,
        )
    }

    pub fn span(&self) -> TimeSpan {
        self.span
    }

    pub fn resource_ids(&self) -> &[String] {
        &self.resource_ids
    }

    pub fn resource_range(&self) -> &[String; 2] {
        &self.resource_range
    }

    /// Normalized index span `(first, last)` into the resource list.
    pub fn index_range(&self) -> (usize, usize) {
        (self.first_index, self.first_index + self.resource_ids.len() - 1)
    }

    /// One segment per selected resource, each with the same time range.
    pub fn segments(&self) -> Vec<Segment> {
        self.resource_ids
            .iter()
            .map(|id| Segment {
                resource_id: id.clone(),
                span: self.span,
            })
            .collect()
    }

    /// The per-transition invariant: indices valid, span non-empty and inside
    /// the operating day.
    pub fn check(&self, grid: &TimeGrid, resources: &[Resource]) -> Result<(), GridError> {
        let (first, last) = self.index_range();
        if self.resource_ids.is_empty() || last >= resources.len() {
            return Err(GridError::bounds(format!(
                "resource span {}..={} outside {} resources",
                first,
                last,
                resources.len()
            )));
        }
        let mut seen = HashSet::with_capacity(self.resource_ids.len());
        if let Some(id) = self.resource_ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(GridError::bounds(format!(
                "resource '{}' appears more than once",
                id
            )));
        }
        if !self.span.is_valid() {
            return Err(GridError::bounds(format!("empty time range {}", self.span)));
        }
        if !grid.contains_span(&self.span) {
            return Err(GridError::bounds(format!(
                "time range {} outside operating day {}-{}",
                self.span,
                grid.day_start(),
                grid.day_end()
            )));
        }
        Ok(())
    }
}

fn resource_position(resources: &[Resource], id: &str) -> Result<usize, GridError> {
    resources
        .iter()
        .position(|r| r.id == id)
        .ok_or_else(|| GridError::bounds(format!("resource '{}' is not on the grid", id)))
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionPhase {
    Idle,
    Dragging,
    Finalized,
}

#[derive(Debug, Clone)]
struct Drag {
    anchor_resource: String,
    /// Snapped start of the anchor cell, minutes since day start.
    anchor_offset: u32,
    selection: Selection,
}

#[derive(Debug, Clone, Default)]
enum State {
    #[default]
    Idle,
    Dragging(Drag),
    Finalized(Selection),
}

/// Drives the Idle → Dragging → Finalized lifecycle from pointer events.
///
/// Only one drag can be active; a pointer-down while a selection exists
/// replaces it. Pointer-move and pointer-up with no drag in progress are
/// ignored.
#[derive(Debug, Clone, Default)]
pub struct SelectionMachine {
    state: State,
}

impl SelectionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SelectionPhase {
        match self.state {
            State::Idle => SelectionPhase::Idle,
            State::Dragging(_) => SelectionPhase::Dragging,
            State::Finalized(_) => SelectionPhase::Finalized,
        }
    }

    /// Current selection, in progress or finalized.
    pub fn selection(&self) -> Option<&Selection> {
        match &self.state {
            State::Idle => None,
            State::Dragging(drag) => Some(&drag.selection),
            State::Finalized(selection) => Some(selection),
        }
    }

    /// The selection only once the drag has been released.
    pub fn finalized(&self) -> Option<&Selection> {
        match &self.state {
            State::Finalized(selection) => Some(selection),
            _ => None,
        }
    }

    /// Idle/Finalized → Dragging. Starts a one-interval selection on the
    /// clicked resource, anchored at the snapped pointer time.
    pub fn pointer_down(
        &mut self,
        grid: &TimeGrid,
        resources: &[Resource],
        target: &PointerTarget,
    ) -> Result<Selection, GridError> {
        let interval = grid.interval_minutes();
        let anchor_offset = grid
            .snap_to_interval(target.exact_offset(grid))
            .min(grid.last_boundary() - interval);
        let span = grid.span(anchor_offset, anchor_offset + interval)?;
        let selection = Selection::new(
            grid,
            resources,
            &target.resource_id,
            &target.resource_id,
            span,
        )?;
        log::debug!(
            "drag started on '{}' at {}",
            target.resource_id,
            selection.span()
        );
        self.state = State::Dragging(Drag {
            anchor_resource: target.resource_id.clone(),
            anchor_offset,
            selection: selection.clone(),
        });
        Ok(selection)
    }

    /// Dragging → Dragging. Recomputes the time span and resource range from
    /// the anchor to the pointer. A failed update leaves the previous
    /// selection in place.
    pub fn pointer_move(
        &mut self,
        grid: &TimeGrid,
        resources: &[Resource],
        target: &PointerTarget,
    ) -> Result<Option<&Selection>, GridError> {
        let State::Dragging(drag) = &mut self.state else {
            return Ok(None);
        };
        let (start, end) = drag_offsets(grid, drag.anchor_offset, target.exact_offset(grid));
        let span = grid.span(start, end)?;
        let selection = Selection::new(
            grid,
            resources,
            &drag.anchor_resource,
            &target.resource_id,
            span,
        )?;
        drag.selection = selection;
        Ok(Some(&drag.selection))
    }

    /// Dragging → Finalized.
    pub fn pointer_up(&mut self) -> Option<&Selection> {
        if !matches!(self.state, State::Dragging(_)) {
            return None;
        }
        if let State::Dragging(drag) = std::mem::take(&mut self.state) {
            log::debug!(
                "selection finalized: {:?} {}",
                drag.selection.resource_ids(),
                drag.selection.span()
            );
            self.state = State::Finalized(drag.selection);
        }
        self.finalized()
    }

    /// Outside click or explicit cancel: drop whatever is selected. Returns
    /// whether anything was discarded.
    pub fn cancel(&mut self) -> bool {
        let had_selection = !matches!(self.state, State::Idle);
        if had_selection {
            log::debug!("selection discarded");
        }
        self.state = State::Idle;
        had_selection
    }

    /// Finalized → Idle after a successful commit.
    pub fn commit(&mut self) -> Option<Selection> {
        match std::mem::take(&mut self.state) {
            State::Finalized(selection) => Some(selection),
            other => {
                self.state = other;
                None
            }
        }
    }
}

/// Time bounds of a drag from the anchor cell to `current`.
///
/// Forward drags run from the anchor; backward drags run to the end of the
/// anchor cell so it stays selected. Either way the length is rounded up to
/// whole intervals and is never less than one.
fn drag_offsets(grid: &TimeGrid, anchor: u32, current: u32) -> (u32, u32) {
    let interval = grid.interval_minutes();
    let limit = grid.last_boundary();
    if current >= anchor {
        let n = (current - anchor).div_ceil(interval).max(1);
        let end = (anchor + n * interval).min(limit);
        (anchor, end)
    } else {
        let anchor_end = anchor + interval;
        let n = (anchor_end - current).div_ceil(interval).max(1);
        (anchor_end.saturating_sub(n * interval), anchor_end)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> TimeGrid {
        TimeGrid::new(
            15,
            ClockTime::parse("06:00").unwrap(),
            ClockTime::parse("23:00").unwrap(),
        )
        .unwrap()
    }

    fn courts(n: usize) -> Vec<Resource> {
        (1..=n)
            .map(|i| Resource {
                id: i.to_string(),
                name: Some(format!("Court {}", i)),
            })
            .collect()
    }

    fn at(resource: &str, time: &str) -> PointerTarget {
        PointerTarget::at_time(resource, time).unwrap()
    }

    fn span(start: &str, end: &str) -> TimeSpan {
        TimeSpan::parse(start, end).unwrap()
    }

    #[test]
    fn test_click_selects_one_interval() {
        let (g, r) = (grid(), courts(3));
        let mut m = SelectionMachine::new();
        m.pointer_down(&g, &r, &at("2", "09:00")).unwrap();
        assert_eq!(m.phase(), SelectionPhase::Dragging);
        let sel = m.pointer_up().unwrap();
        assert_eq!(sel.span(), span("09:00", "09:15"));
        assert_eq!(sel.resource_ids(), &["2".to_string()]);
        assert_eq!(m.phase(), SelectionPhase::Finalized);
    }

    #[test]
    fn test_pointer_down_snaps_within_cell() {
        let (g, r) = (grid(), courts(1));
        let mut m = SelectionMachine::new();
        // cell 12 starts at 09:00; 60% across is 09:09, nearest boundary 09:15
        let sel = m.pointer_down(&g, &r, &PointerTarget::in_cell("1", 12, 0.6)).unwrap();
        assert_eq!(sel.span(), span("09:15", "09:30"));
        // 20% across is 09:03, snaps back to 09:00
        let sel = m.pointer_down(&g, &r, &PointerTarget::in_cell("1", 12, 0.2)).unwrap();
        assert_eq!(sel.span(), span("09:00", "09:15"));
    }

    #[test]
    fn test_pointer_down_at_day_end_keeps_one_interval() {
        let (g, r) = (grid(), courts(1));
        let mut m = SelectionMachine::new();
        let sel = m.pointer_down(&g, &r, &at("1", "23:00")).unwrap();
        assert_eq!(sel.span(), span("22:45", "23:00"));
    }

    #[test]
    fn test_forward_drag_rounds_up() {
        let (g, r) = (grid(), courts(1));
        let mut m = SelectionMachine::new();
        m.pointer_down(&g, &r, &at("1", "09:00")).unwrap();
        let sel = m.pointer_move(&g, &r, &at("1", "09:20")).unwrap().unwrap();
        assert_eq!(sel.span(), span("09:00", "09:30"));
        let sel = m.pointer_move(&g, &r, &at("1", "09:05")).unwrap().unwrap();
        assert_eq!(sel.span(), span("09:00", "09:15"));
        let sel = m.pointer_move(&g, &r, &at("1", "10:00")).unwrap().unwrap();
        assert_eq!(sel.span(), span("09:00", "10:00"));
    }

    #[test]
    fn test_backward_drag_keeps_anchor_cell() {
        let (g, r) = (grid(), courts(1));
        let mut m = SelectionMachine::new();
        m.pointer_down(&g, &r, &at("1", "09:00")).unwrap();
        let sel = m.pointer_move(&g, &r, &at("1", "08:40")).unwrap().unwrap();
        assert_eq!(sel.span(), span("08:30", "09:15"));
    }

    #[test]
    fn test_drag_clamps_at_day_end() {
        let (g, r) = (grid(), courts(1));
        let mut m = SelectionMachine::new();
        m.pointer_down(&g, &r, &at("1", "22:30")).unwrap();
        let sel = m
            .pointer_move(&g, &r, &PointerTarget {
                resource_id: "1".into(),
                position: PointerPosition::Offset { offset: 5000 },
            })
            .unwrap()
            .unwrap();
        assert_eq!(sel.span(), span("22:30", "23:00"));
    }

    #[test]
    fn test_resource_range_is_order_independent() {
        let (g, r) = (grid(), courts(5));
        let mut down = SelectionMachine::new();
        down.pointer_down(&g, &r, &at("1", "09:00")).unwrap();
        let forward = down.pointer_move(&g, &r, &at("3", "09:00")).unwrap().unwrap().clone();

        let mut up = SelectionMachine::new();
        up.pointer_down(&g, &r, &at("3", "09:00")).unwrap();
        let backward = up.pointer_move(&g, &r, &at("1", "09:00")).unwrap().unwrap().clone();

        assert_eq!(forward.resource_ids(), backward.resource_ids());
        assert_eq!(forward.index_range(), (0, 2));
        assert_eq!(backward.index_range(), (0, 2));
        assert!(backward.segments().iter().all(|s| s.span == backward.span()));
    }

    #[test]
    fn test_cancel_mid_drag() {
        let (g, r) = (grid(), courts(4));
        let mut m = SelectionMachine::new();
        m.pointer_down(&g, &r, &at("2", "09:00")).unwrap();
        let sel = m.pointer_move(&g, &r, &at("4", "10:00")).unwrap().unwrap();
        assert_eq!(sel.resource_ids(), &["2", "3", "4"]);
        assert_eq!(sel.span(), span("09:00", "10:00"));
        assert!(m.cancel());
        assert_eq!(m.phase(), SelectionPhase::Idle);
        assert!(m.selection().is_none());
    }

    #[test]
    fn test_unknown_resource_is_rejected_and_state_kept() {
        let (g, r) = (grid(), courts(2));
        let mut m = SelectionMachine::new();
        m.pointer_down(&g, &r, &at("1", "09:00")).unwrap();
        let err = m.pointer_move(&g, &r, &at("9", "09:30")).unwrap_err();
        assert!(matches!(err, GridError::InvalidSelectionBounds(_)));
        assert_eq!(m.phase(), SelectionPhase::Dragging);
        assert_eq!(m.selection().unwrap().span(), span("09:00", "09:15"));
    }

    #[test]
    fn test_duplicate_resource_ids_are_rejected() {
        let g = grid();
        let mut r = courts(3);
        r.insert(2, r[0].clone());
        // ids: 1, 2, 1, 3
        let err = Selection::new(&g, &r, "1", "3", span("09:00", "10:00")).unwrap_err();
        assert!(matches!(err, GridError::InvalidSelectionBounds(ref m) if m.contains("'1'")));
        assert!(Selection::new(&g, &r, "1", "2", span("09:00", "10:00")).is_ok());

        let mut m = SelectionMachine::new();
        m.pointer_down(&g, &r, &at("3", "09:00")).unwrap();
        let err = m.pointer_move(&g, &r, &at("1", "09:30")).unwrap_err();
        assert!(matches!(err, GridError::InvalidSelectionBounds(_)));
    }

    #[test]
    fn test_moves_and_releases_without_drag_are_ignored() {
        let (g, r) = (grid(), courts(2));
        let mut m = SelectionMachine::new();
        assert!(m.pointer_move(&g, &r, &at("1", "09:00")).unwrap().is_none());
        assert!(m.pointer_up().is_none());
        assert!(m.commit().is_none());
        assert!(!m.cancel());
    }

    #[test]
    fn test_commit_clears_finalized_selection() {
        let (g, r) = (grid(), courts(2));
        let mut m = SelectionMachine::new();
        m.pointer_down(&g, &r, &at("1", "09:00")).unwrap();
        assert!(m.commit().is_none(), "cannot commit while dragging");
        m.pointer_up();
        assert!(m.commit().is_some());
        assert_eq!(m.phase(), SelectionPhase::Idle);
    }

    #[test]
    fn test_selection_request_outside_day_fails() {
        let (g, r) = (grid(), courts(2));
        let req = SelectionRequest {
            resource_range: ["2".into(), "1".into()],
            start: ClockTime::parse("05:00").unwrap(),
            end: ClockTime::parse("07:00").unwrap(),
        };
        assert!(Selection::from_request(&g, &r, &req).is_err());
    }
}
