//! Error types for Pawdium operations
//!
//! Entry/vote rejections carry a distinguishable reason so the HTTP
//! layer can render an accurate message. A missed conditional update
//! during end-of-day processing is NOT an error - it surfaces as
//! `Ok(None)` from the engine ("someone else already handled it").

/// Main error type for competition operations
#[derive(Debug, thiserror::Error)]
pub enum CompetitionError {
    #[error("Entry window is closed")]
    EntryWindowClosed,

    #[error("Voting window is closed")]
    VotingWindowClosed,

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    #[error("User already has an entry in this competition")]
    DuplicateEntry,

    #[error("User already voted for this entry")]
    DuplicateVote,

    #[error("Competition already exists for this date")]
    DuplicateCompetition,

    #[error("Competition is not open: status is {0}")]
    CompetitionNotOpen(String),

    #[error("Entry is not active")]
    EntryInactive,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CompetitionError {
    /// Stable machine-readable reason string for API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EntryWindowClosed => "entry_window_closed",
            Self::VotingWindowClosed => "voting_window_closed",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::DuplicateEntry => "duplicate_entry",
            Self::DuplicateVote => "duplicate_vote",
            Self::DuplicateCompetition => "duplicate_competition",
            Self::CompetitionNotOpen(_) => "competition_not_open",
            Self::EntryInactive => "entry_inactive",
            Self::NotFound(_) => "not_found",
            Self::Database(_) => "database_error",
            Self::Ledger(_) => "ledger_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Whether this is a caller mistake (as opposed to an operational
    /// failure). Validation errors never leave side effects behind.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EntryWindowClosed
                | Self::VotingWindowClosed
                | Self::InsufficientFunds { .. }
                | Self::DuplicateEntry
                | Self::DuplicateVote
                | Self::CompetitionNotOpen(_)
                | Self::EntryInactive
        )
    }
}

impl From<mongodb::error::Error> for CompetitionError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<bson::ser::Error> for CompetitionError {
    fn from(err: bson::ser::Error) -> Self {
        Self::Database(format!("BSON encode error: {}", err))
    }
}

impl From<bson::de::Error> for CompetitionError {
    fn from(err: bson::de::Error) -> Self {
        Self::Database(format!("BSON decode error: {}", err))
    }
}

/// Result type alias for competition operations
pub type Result<T> = std::result::Result<T, CompetitionError>;
