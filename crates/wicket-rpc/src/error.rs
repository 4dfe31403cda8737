use thiserror::Error;

/// Errors produced by the wicket RPC substrate and the gateway built on it.
///
/// Variants carry plain strings so the type stays `Clone`: a single failed
/// session creation fans the same error out to every caller coalesced on it.
#[derive(Debug, Clone, Error)]
pub enum WicketError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("not authorized: {0}")]
    NotAuthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("object not registered: {0}")]
    NotRegistered(String),

    #[error("object adapter deactivated: {0}")]
    AdapterDeactivated(String),

    #[error("operation does not exist: {0}")]
    OperationNotExist(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("session destroyed")]
    SessionDestroyed,

    #[error("{0}")]
    Other(String),
}

impl WicketError {
    /// True for the teardown races that best-effort cleanup swallows.
    pub fn is_benign_teardown(&self) -> bool {
        matches!(
            self,
            WicketError::NotRegistered(_) | WicketError::AdapterDeactivated(_)
        )
    }
}

impl From<std::io::Error> for WicketError {
    fn from(e: std::io::Error) -> Self {
        WicketError::Transport(e.to_string())
    }
}

impl From<ciborium::de::Error<std::io::Error>> for WicketError {
    fn from(e: ciborium::de::Error<std::io::Error>) -> Self {
        WicketError::Codec(e.to_string())
    }
}

impl From<ciborium::ser::Error<std::io::Error>> for WicketError {
    fn from(e: ciborium::ser::Error<std::io::Error>) -> Self {
        WicketError::Codec(e.to_string())
    }
}

pub type WicketResult<T> = Result<T, WicketError>;
