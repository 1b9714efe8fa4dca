use std::fmt;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::GridError;

/// Minutes in a day; `ClockTime(MINUTES_PER_DAY)` is the `24:00` end marker.
pub const MINUTES_PER_DAY: u32 = 24 * 60;

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Wall-clock time of day in minutes since midnight. Travels as `"HH:MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(u32);

impl ClockTime {
    pub fn from_minutes(minutes: u32) -> Result<Self, GridError> {
        if minutes > MINUTES_PER_DAY {
            return Err(GridError::InvalidTimeFormat(format!("{} minutes", minutes)));
        }
        Ok(ClockTime(minutes))
    }

    pub(crate) const fn new_unchecked(minutes: u32) -> Self {
        ClockTime(minutes)
    }

    pub fn minutes(self) -> u32 {
        self.0
    }

    /// Parse `HH:MM`. `24:00` is accepted so a day can close at midnight.
    pub fn parse(s: &str) -> Result<Self, GridError> {
        let s = s.trim();
        if s == "24:00" {
            return Ok(ClockTime(MINUTES_PER_DAY));
        }
        NaiveTime::parse_from_str(s, "%H:%M")
            .map(|t| ClockTime(t.hour() * 60 + t.minute()))
            .map_err(|_| GridError::InvalidTimeFormat(s.to_string()))
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ClockTime::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Half-open time range `[start, end)` on one resource.
///
/// Deserialization does not check `start < end`: stored data is taken as-is
/// so the resolver and validator can report broken entries. Use
/// [`TimeSpan::new`] for anything freshly built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: ClockTime,
    pub end: ClockTime,
}

impl TimeSpan {
    pub fn new(start: ClockTime, end: ClockTime) -> Result<Self, GridError> {
        if start >= end {
            return Err(GridError::bounds(format!(
                "start {} must be before end {}",
                start, end
            )));
        }
        Ok(TimeSpan { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, GridError> {
        TimeSpan::new(ClockTime::parse(start)?, ClockTime::parse(end)?)
    }

    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }

    pub fn duration_mins(&self) -> u32 {
        self.end.minutes().saturating_sub(self.start.minutes())
    }

    /// Standard half-open overlap test. Symmetric.
    pub fn overlaps(&self, other: &TimeSpan) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// True when `other` lies entirely inside `self` (edges may touch).
    pub fn contains(&self, other: &TimeSpan) -> bool {
        self.start <= other.start && self.end >= other.end
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// ---------------------------------------------------------------------------
// Identifiers and resources
// ---------------------------------------------------------------------------

/// Stable identifier of a block or booking. Locally created entries get a
/// UUID; the persistence side may later swap in its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub String);

impl EntryId {
    pub fn generate() -> Self {
        EntryId(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        EntryId(s.to_string())
    }
}

/// A bookable unit (e.g. a court). Position in the snapshot's resource list
/// defines adjacency for multi-resource selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

// ---------------------------------------------------------------------------
// Bookings and payments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BookingKind {
    /// One-off court reservation.
    Single,
    /// Recurring class occupying the court.
    Class,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParticipantKind {
    Member,
    Guest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Member id; guests usually have none.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub kind: ParticipantKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Completed,
}

/// Money snapshot attached to a booking. Amounts are in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawPaymentDetails")]
pub struct PaymentDetails {
    total_amount: u64,
    deposit: u64,
    payment_status: PaymentStatus,
    payment_method: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPaymentDetails {
    total_amount: u64,
    deposit: u64,
    payment_status: PaymentStatus,
    #[serde(default)]
    payment_method: Option<String>,
}

impl TryFrom<RawPaymentDetails> for PaymentDetails {
    type Error = GridError;

    fn try_from(raw: RawPaymentDetails) -> Result<Self, Self::Error> {
        PaymentDetails::new(
            raw.total_amount,
            raw.deposit,
            raw.payment_status,
            raw.payment_method,
        )
    }
}

impl PaymentDetails {
    pub fn new(
        total_amount: u64,
        deposit: u64,
        payment_status: PaymentStatus,
        payment_method: Option<String>,
    ) -> Result<Self, GridError> {
        if deposit > total_amount {
            return Err(GridError::InvalidPayment(format!(
                "deposit {} exceeds total {}",
                deposit, total_amount
            )));
        }
        if payment_status == PaymentStatus::Completed && deposit != total_amount {
            return Err(GridError::InvalidPayment(format!(
                "completed payment must cover the total ({} of {})",
                deposit, total_amount
            )));
        }
        Ok(PaymentDetails {
            total_amount,
            deposit,
            payment_status,
            payment_method,
        })
    }

    /// Nothing paid yet.
    pub fn pending(total_amount: u64) -> Self {
        PaymentDetails {
            total_amount,
            deposit: 0,
            payment_status: PaymentStatus::Pending,
            payment_method: None,
        }
    }

    /// Derive the status from how much of the total has been paid.
    pub fn from_deposit(
        total_amount: u64,
        deposit: u64,
        payment_method: Option<String>,
    ) -> Result<Self, GridError> {
        let status = match deposit {
            0 if total_amount > 0 => PaymentStatus::Pending,
            d if d >= total_amount => PaymentStatus::Completed,
            _ => PaymentStatus::Partial,
        };
        PaymentDetails::new(total_amount, deposit, status, payment_method)
    }

    pub fn total_amount(&self) -> u64 {
        self.total_amount
    }

    pub fn deposit(&self) -> u64 {
        self.deposit
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn payment_method(&self) -> Option<&str> {
        self.payment_method.as_deref()
    }

    pub fn outstanding(&self) -> u64 {
        self.total_amount - self.deposit
    }

    /// Divide the payment between two parts of a booking in proportion to
    /// their lengths. Both totals and deposits sum back to the original.
    pub fn split(&self, head_mins: u32, tail_mins: u32) -> (Self, Self) {
        let whole = u128::from(head_mins) + u128::from(tail_mins);
        let share = |amount: u64| -> u64 {
            if whole == 0 {
                return amount;
            }
            // fits: head_mins / whole <= 1
            (u128::from(amount) * u128::from(head_mins) / whole) as u64
        };
        let head_total = share(self.total_amount);
        let head_deposit = share(self.deposit);
        let part = |total: u64, deposit: u64| PaymentDetails {
            total_amount: total,
            deposit,
            payment_status: match self.payment_status {
                PaymentStatus::Partial if deposit == 0 => PaymentStatus::Pending,
                PaymentStatus::Partial if deposit == total => PaymentStatus::Completed,
                status => status,
            },
            payment_method: self.payment_method.clone(),
        };
        (
            part(head_total, head_deposit),
            part(
                self.total_amount - head_total,
                self.deposit - head_deposit,
            ),
        )
    }
}

/// A rentable add-on (rackets, balls) taken with a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RentalItem {
    pub item_id: String,
    pub quantity: u32,
}

// ---------------------------------------------------------------------------
// Grid entries
// ---------------------------------------------------------------------------

/// Administrator-created unavailability window on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedPeriod {
    pub id: EntryId,
    pub resource_id: String,
    #[serde(flatten)]
    pub span: TimeSpan,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Committed reservation (single or class) on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedBooking {
    pub id: EntryId,
    pub resource_id: String,
    #[serde(flatten)]
    pub span: TimeSpan,
    pub kind: BookingKind,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub payment: PaymentDetails,
    #[serde(default)]
    pub rental_items: Vec<RentalItem>,
}

/// Either kind of entry occupying grid time. Blocks and bookings share one
/// timeline per resource for overlap purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GridEntry {
    Block(BlockedPeriod),
    Booking(ConfirmedBooking),
}

impl GridEntry {
    pub fn id(&self) -> &EntryId {
        match self {
            GridEntry::Block(b) => &b.id,
            GridEntry::Booking(b) => &b.id,
        }
    }

    pub fn resource_id(&self) -> &str {
        match self {
            GridEntry::Block(b) => &b.resource_id,
            GridEntry::Booking(b) => &b.resource_id,
        }
    }

    pub fn span(&self) -> TimeSpan {
        match self {
            GridEntry::Block(b) => b.span,
            GridEntry::Booking(b) => b.span,
        }
    }

    pub(crate) fn set_span(&mut self, span: TimeSpan) {
        match self {
            GridEntry::Block(b) => b.span = span,
            GridEntry::Booking(b) => b.span = span,
        }
    }

    pub(crate) fn set_id(&mut self, id: EntryId) {
        match self {
            GridEntry::Block(b) => b.id = id,
            GridEntry::Booking(b) => b.id = id,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Everything the engine knows about one rendered day: the ordered resources
/// and the blocks and bookings placed on them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridSnapshot {
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub blocks: Vec<BlockedPeriod>,
    #[serde(default)]
    pub bookings: Vec<ConfirmedBooking>,
}

impl GridSnapshot {
    pub fn resource_index(&self, resource_id: &str) -> Option<usize> {
        self.resources.iter().position(|r| r.id == resource_id)
    }

    /// Blocks and bookings on one resource, blocks first, in stored order.
    pub fn entries_on(&self, resource_id: &str) -> Vec<GridEntry> {
        let blocks = self
            .blocks
            .iter()
            .filter(|b| b.resource_id == resource_id)
            .cloned()
            .map(GridEntry::Block);
        let bookings = self
            .bookings
            .iter()
            .filter(|b| b.resource_id == resource_id)
            .cloned()
            .map(GridEntry::Booking);
        blocks.chain(bookings).collect()
    }

    pub fn entry_count(&self) -> usize {
        self.blocks.len() + self.bookings.len()
    }

    pub(crate) fn push(&mut self, entry: GridEntry) {
        match entry {
            GridEntry::Block(b) => self.blocks.push(b),
            GridEntry::Booking(b) => self.bookings.push(b),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_time_round_trips_through_display() {
        let t = ClockTime::parse("09:05").unwrap();
        assert_eq!(t.minutes(), 545);
        assert_eq!(t.to_string(), "09:05");
        assert_eq!(ClockTime::parse("24:00").unwrap().minutes(), MINUTES_PER_DAY);
    }

    #[test]
    fn test_clock_time_rejects_garbage() {
        for bad in ["9", "25:00", "ab:cd", "", "10:75"] {
            assert!(
                matches!(ClockTime::parse(bad), Err(GridError::InvalidTimeFormat(_))),
                "expected failure for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_span_requires_start_before_end() {
        assert!(TimeSpan::parse("10:00", "10:00").is_err());
        assert!(TimeSpan::parse("11:00", "10:00").is_err());
        assert_eq!(TimeSpan::parse("10:00", "10:45").unwrap().duration_mins(), 45);
    }

    #[test]
    fn test_touching_spans_do_not_overlap() {
        let a = TimeSpan::parse("09:00", "10:00").unwrap();
        let b = TimeSpan::parse("10:00", "11:00").unwrap();
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn test_payment_invariants() {
        assert!(PaymentDetails::new(1000, 1200, PaymentStatus::Partial, None).is_err());
        assert!(PaymentDetails::new(1000, 500, PaymentStatus::Completed, None).is_err());
        let ok = PaymentDetails::new(1000, 1000, PaymentStatus::Completed, None).unwrap();
        assert_eq!(ok.outstanding(), 0);
    }

    #[test]
    fn test_payment_status_derived_from_deposit() {
        let p = PaymentDetails::from_deposit(1000, 0, None).unwrap();
        assert_eq!(p.payment_status(), PaymentStatus::Pending);
        let p = PaymentDetails::from_deposit(1000, 300, Some("card".into())).unwrap();
        assert_eq!(p.payment_status(), PaymentStatus::Partial);
        let p = PaymentDetails::from_deposit(1000, 1000, None).unwrap();
        assert_eq!(p.payment_status(), PaymentStatus::Completed);
    }

    #[test]
    fn test_payment_split_preserves_totals() {
        let p = PaymentDetails::from_deposit(3000, 1000, Some("card".into())).unwrap();
        let (head, tail) = p.split(60, 120);
        assert_eq!(head.total_amount(), 1000);
        assert_eq!(tail.total_amount(), 2000);
        assert_eq!(head.deposit() + tail.deposit(), 1000);
        assert!(head.deposit() <= head.total_amount());
        assert!(tail.deposit() <= tail.total_amount());
        assert_eq!(tail.payment_method(), Some("card"));

        let paid = PaymentDetails::from_deposit(1001, 1001, None).unwrap();
        let (head, tail) = paid.split(1, 2);
        assert_eq!(head.total_amount() + tail.total_amount(), 1001);
        assert_eq!(head.outstanding(), 0);
        assert_eq!(tail.outstanding(), 0);
        assert_eq!(tail.payment_status(), PaymentStatus::Completed);
    }

    #[test]
    fn test_payment_deserialization_enforces_invariant() {
        let paid_up = r#"{"totalAmount":100,"deposit":100,"paymentStatus":"partial"}"#;
        assert!(serde_json::from_str::<PaymentDetails>(paid_up).is_ok());
        let bad = r#"{"totalAmount":100,"deposit":50,"paymentStatus":"completed"}"#;
        assert!(serde_json::from_str::<PaymentDetails>(bad).is_err());
    }

    #[test]
    fn test_block_wire_format() {
        let json = r#"{"id":"b1","resourceId":"1","start":"09:00","end":"09:30"}"#;
        let block: BlockedPeriod = serde_json::from_str(json).unwrap();
        assert_eq!(block.span, TimeSpan::parse("09:00", "09:30").unwrap());
        assert_eq!(block.reason, None);
        let back = serde_json::to_value(&block).unwrap();
        assert_eq!(back["start"], "09:00");
        assert_eq!(back["resourceId"], "1");
    }
}
