use ulid::Ulid;

use crate::error::ErrorKind;

#[derive(Debug)]
pub enum EngineError {
    /// The requested days collide with an existing booking.
    Conflict(Ulid),
    Invalid(String),
    LimitExceeded(&'static str),
    WalError(String),
    /// The backing store could not be reached.
    Unavailable(String),
    /// A remote store refused the request because the session is gone.
    Unauthorized(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Conflict(_) | EngineError::Invalid(_) | EngineError::LimitExceeded(_) => {
                ErrorKind::Validation
            }
            EngineError::WalError(_) | EngineError::Unavailable(_) => ErrorKind::Store,
            EngineError::Unauthorized(_) => ErrorKind::Auth,
        }
    }

    pub fn conflict_id(&self) -> Option<Ulid> {
        match self {
            EngineError::Conflict(id) => Some(*id),
            _ => None,
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Conflict(id) => write!(f, "dates overlap existing booking: {id}"),
            EngineError::Invalid(msg) => write!(f, "invalid booking: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
            EngineError::Unavailable(e) => write!(f, "store unavailable: {e}"),
            EngineError::Unauthorized(e) => write!(f, "not authorized: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
