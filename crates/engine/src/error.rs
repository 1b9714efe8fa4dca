// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Everything the grid engine can fail with.
///
/// `InvalidTimeFormat` and `InvalidSelectionBounds` are caller contract
/// violations and are returned immediately. `AmbiguousOverlap` describes
/// pre-existing data whose own span is broken; the resolver logs it and skips
/// the entry. `PersistenceFailure` carries the collaborator's reason untouched.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("Invalid time '{0}' -- expected HH:MM")]
    InvalidTimeFormat(String),
    #[error("Invalid selection bounds: {0}")]
    InvalidSelectionBounds(String),
    #[error("Entry '{0}' has an inverted or empty span ({1} >= {2})")]
    AmbiguousOverlap(String, String, String),
    #[error("{0} existing entries overlap the selection -- confirmation required")]
    ConfirmationRequired(usize),
    #[error("Unknown entry '{0}'")]
    UnknownEntry(String),
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
    #[error("Invalid payment: {0}")]
    InvalidPayment(String),
    #[error("Price table key '{0}' is not a duration in minutes")]
    InvalidPriceTable(String),
    #[error("Single bookings need at least one participant")]
    MissingParticipants,
    #[error("Resource '{0}' has no price table -- enter a price manually")]
    ManualPriceRequired(String),
    #[error("Unknown resource '{0}'")]
    UnknownResource(String),
    #[error("Invalid grid configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl GridError {
    pub(crate) fn bounds(msg: impl Into<String>) -> Self {
        GridError::InvalidSelectionBounds(msg.into())
    }
}
