use serde::{Deserialize, Serialize};

/// Which family an error belongs to. Decides how the calendar surfaces it and is
/// carried on the wire so clients can make the same call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// User-correctable: overlap, missing field, limit. The form stays open.
    Validation,
    /// Persistence or transport failure. Shown once, never retried.
    Store,
    /// No live session. Sends the user back to the login prompt.
    Auth,
    /// Malformed request.
    Protocol,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Store => "store",
            ErrorKind::Auth => "auth",
            ErrorKind::Protocol => "protocol",
        };
        f.write_str(s)
    }
}
