/// Error taxonomy shared by every service crate.
///
/// Validation failures are raised before any write; StateConflict carries
/// both sides of the rejected transition so callers can report it without
/// re-reading the record.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Authorization(String),

    #[error("invalid transition from {current} to {requested}")]
    StateConflict { current: String, requested: String },

    #[error("gateway error: {0}")]
    Gateway(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl Error {
    pub fn state_conflict(current: impl ToString, requested: impl ToString) -> Self {
        Self::StateConflict {
            current: current.to_string(),
            requested: requested.to_string(),
        }
    }

    /// Stable machine-readable kind, used in API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Authorization(_) => "AUTHORIZATION_ERROR",
            Error::StateConflict { .. } => "STATE_CONFLICT",
            Error::Gateway(_) => "GATEWAY_ERROR",
            Error::Unexpected(_) => "UNEXPECTED_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
