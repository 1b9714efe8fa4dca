use serde::Serialize;

use crate::config::GridConfig;
use crate::error::GridError;
use crate::model::{ClockTime, TimeSpan};

/// The time axis of one rendered day: fixed-width intervals covering the
/// operating window.
///
/// Offsets are minutes since the day start. Every operation clamps its result
/// to `[0, day_length]`; there is no wraparound past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeGrid {
    interval_minutes: u32,
    day_start: ClockTime,
    day_end: ClockTime,
}

impl TimeGrid {
    pub fn new(
        interval_minutes: u32,
        day_start: ClockTime,
        day_end: ClockTime,
    ) -> Result<Self, GridError> {
        if interval_minutes == 0 {
            return Err(GridError::InvalidConfig(
                "interval must be at least one minute".to_string(),
            ));
        }
        if day_start >= day_end {
            return Err(GridError::InvalidConfig(format!(
                "day start {} must be before day end {}",
                day_start, day_end
            )));
        }
        if day_end.minutes() - day_start.minutes() < interval_minutes {
            return Err(GridError::InvalidConfig(format!(
                "operating window {}-{} is shorter than one {}-minute interval",
                day_start, day_end, interval_minutes
            )));
        }
        Ok(TimeGrid {
            interval_minutes,
            day_start,
            day_end,
        })
    }

    pub fn from_config(config: &GridConfig) -> Result<Self, GridError> {
        TimeGrid::new(
            config.interval_minutes,
            ClockTime::parse(&config.day_start)?,
            ClockTime::parse(&config.day_end)?,
        )
    }

    pub fn interval_minutes(&self) -> u32 {
        self.interval_minutes
    }

    pub fn day_start(&self) -> ClockTime {
        self.day_start
    }

    pub fn day_end(&self) -> ClockTime {
        self.day_end
    }

    /// Length of the operating window in minutes.
    pub fn day_length(&self) -> u32 {
        self.day_end.minutes() - self.day_start.minutes()
    }

    /// Number of whole intervals that fit in the day.
    pub fn slot_count(&self) -> usize {
        (self.day_length() / self.interval_minutes) as usize
    }

    /// Start offsets of every interval, in order.
    pub fn slots(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.slot_count() as u32).map(move |i| i * self.interval_minutes)
    }

    /// Parse `HH:MM` and return minutes since day start, clamped to the day.
    pub fn time_to_offset(&self, time: &str) -> Result<u32, GridError> {
        Ok(self.offset_of(ClockTime::parse(time)?))
    }

    pub fn offset_of(&self, clock: ClockTime) -> u32 {
        clock
            .minutes()
            .clamp(self.day_start.minutes(), self.day_end.minutes())
            - self.day_start.minutes()
    }

    /// Wall-clock time for an offset, clamped to the day.
    pub fn clock_at(&self, offset: u32) -> ClockTime {
        let minutes = self.day_start.minutes() + offset.min(self.day_length());
        // Always within [day_start, day_end], which are valid clock times.
        ClockTime::from_minutes(minutes).unwrap_or(self.day_end)
    }

    pub fn offset_to_time(&self, offset: u32) -> String {
        self.clock_at(offset).to_string()
    }

    /// Nearest interval boundary. An exact half rounds to the later boundary.
    pub fn snap_to_interval(&self, offset: u32) -> u32 {
        let i = self.interval_minutes;
        let lower = offset / i * i;
        let rem = offset - lower;
        let snapped = if rem * 2 >= i { lower + i } else { lower };
        snapped.min(self.last_boundary())
    }

    pub fn next_interval(&self, offset: u32) -> u32 {
        offset
            .saturating_add(self.interval_minutes)
            .min(self.day_length())
    }

    /// Exact offset of a pointer at `fraction` (0.0..=1.0) across cell `slot`.
    pub fn pointer_offset(&self, slot: usize, fraction: f64) -> u32 {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        // cells past the last one sit at day end
        if slot >= self.slot_count() {
            return self.day_length();
        }
        let base = slot as u32 * self.interval_minutes;
        let within = (fraction * self.interval_minutes as f64).round() as u32;
        (base + within).min(self.day_length())
    }

    /// Span between two offsets, converted to wall-clock times.
    pub fn span(&self, start: u32, end: u32) -> Result<TimeSpan, GridError> {
        TimeSpan::new(self.clock_at(start), self.clock_at(end))
    }

    pub fn contains_span(&self, span: &TimeSpan) -> bool {
        span.start >= self.day_start && span.end <= self.day_end
    }

    /// Highest offset that is still an interval boundary inside the day.
    pub(crate) fn last_boundary(&self) -> u32 {
        self.slot_count() as u32 * self.interval_minutes
    }
}

impl Default for TimeGrid {
    fn default() -> Self {
        TimeGrid {
            interval_minutes: 15,
            day_start: ClockTime::new_unchecked(6 * 60),
            day_end: ClockTime::new_unchecked(23 * 60),
        }
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
            ClockTime::parse("08:00").unwrap(),
            ClockTime::parse("22:00").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_time_to_offset() {
        let g = grid();
        assert_eq!(g.time_to_offset("08:00").unwrap(), 0);
        assert_eq!(g.time_to_offset("09:30").unwrap(), 90);
        assert_eq!(g.time_to_offset("07:00").unwrap(), 0);
        assert_eq!(g.time_to_offset("23:00").unwrap(), g.day_length());
        assert!(matches!(
            g.time_to_offset("nine"),
            Err(GridError::InvalidTimeFormat(_))
        ));
    }

    #[test]
    fn test_offset_to_time_clamps() {
        let g = grid();
        assert_eq!(g.offset_to_time(0), "08:00");
        assert_eq!(g.offset_to_time(75), "09:15");
        assert_eq!(g.offset_to_time(10_000), "22:00");
    }

    #[test]
    fn test_snap_rounds_half_up() {
        let g = grid();
        assert_eq!(g.snap_to_interval(7), 0);
        assert_eq!(g.snap_to_interval(8), 15);
        assert_eq!(g.snap_to_interval(30), 30);
        // ties need an even interval
        let g10 = TimeGrid::new(
            10,
            ClockTime::parse("08:00").unwrap(),
            ClockTime::parse("09:00").unwrap(),
        )
        .unwrap();
        assert_eq!(g10.snap_to_interval(5), 10);
        assert_eq!(g10.snap_to_interval(4), 0);
        assert_eq!(g10.snap_to_interval(59), 60);
    }

    #[test]
    fn test_snap_clamps_to_day_end() {
        let g = grid();
        assert_eq!(g.snap_to_interval(g.day_length() + 40), g.day_length());
    }

    #[test]
    fn test_next_interval_does_not_wrap() {
        let g = grid();
        assert_eq!(g.next_interval(0), 15);
        assert_eq!(g.next_interval(g.day_length() - 5), g.day_length());
    }

    #[test]
    fn test_pointer_interpolation() {
        let g = grid();
        assert_eq!(g.pointer_offset(4, 0.0), 60);
        assert_eq!(g.pointer_offset(4, 0.5), 68);
        assert_eq!(g.pointer_offset(4, 1.0), 75);
        assert_eq!(g.pointer_offset(4, f64::NAN), 60);
    }

    #[test]
    fn test_pointer_past_last_cell_clamps_to_day_end() {
        let g = grid();
        assert_eq!(g.pointer_offset(g.slot_count(), 0.0), g.day_length());
        assert_eq!(g.pointer_offset(300_000_000, 0.0), g.day_length());
        assert_eq!(g.pointer_offset(usize::MAX, 1.0), g.day_length());
        assert_eq!(g.next_interval(u32::MAX), g.day_length());
    }

    #[test]
    fn test_slots_cover_the_day() {
        let g = grid();
        assert_eq!(g.slot_count(), 56);
        let slots: Vec<u32> = g.slots().take(3).collect();
        assert_eq!(slots, vec![0, 15, 30]);
    }

    #[test]
    fn test_rejects_bad_windows() {
        let start = ClockTime::parse("10:00").unwrap();
        let end = ClockTime::parse("10:10").unwrap();
        assert!(TimeGrid::new(0, start, end).is_err());
        assert!(TimeGrid::new(15, end, start).is_err());
        assert!(TimeGrid::new(15, start, end).is_err());
    }
}
