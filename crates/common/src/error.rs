use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepotrackError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("conflict on {name}: {reason}")]
    Conflict { name: String, reason: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RepotrackError {
    /// Transient failures that abort the current cycle and are retried on the next tick.
    pub fn is_cycle_fatal(&self) -> bool {
        matches!(
            self,
            Self::RemoteUnavailable(_) | Self::StorageUnavailable(_)
        )
    }
}

pub type RepotrackResult<T> = Result<T, RepotrackError>;
