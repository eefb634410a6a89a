use thiserror::Error;

/// Failure kinds of a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Reservation list or activity detail could not be fetched or decoded.
    #[error("reservation API unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("invalid trip time '{value}': {reason}")]
    TimeParse { value: String, reason: String },

    /// Spreadsheet auth, open, clear or append failed.
    #[error("spreadsheet publish failed: {0}")]
    Publish(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Process exit code for this failure kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncError::Config(_) => 2,
            SyncError::UpstreamUnavailable(_) => 3,
            SyncError::TimeParse { .. } => 4,
            SyncError::Publish(_) => 5,
        }
    }
}
