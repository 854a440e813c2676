//! Error types for the tracker.

/// Everything that can go wrong inside the tracker modules.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Input rejected by a workflow or form rule.
    #[error("{0}")]
    Validation(String),

    /// The current user's role does not allow the action.
    #[error("permission denied: {0}")]
    Permission(String),

    /// A referenced task or user does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Wrong username or password.
    #[error("invalid username or password")]
    Auth,

    /// The action needs a session.
    #[error("not logged in, use 'nextask login' first")]
    NotLoggedIn,

    /// Local store failure.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A stored or received value is not valid JSON for its key.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Cloud mirror failure.
    #[error("network error: {0}")]
    Network(String),
}

impl TrackerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        TrackerError::Validation(msg.into())
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        TrackerError::Permission(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
