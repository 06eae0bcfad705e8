//! Newline-delimited JSON protocol spoken between the calendar front end and the
//! booking server. One request per line, one reply per line, plus unsolicited
//! pushed lines (`snapshot`, `session_ended`) for connections that subscribed.
//!
//! A request may carry a numeric `seq`; the reply to it echoes that `seq`.
//! Pushed lines never carry one.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::codec::LinesCodecError;
use ulid::Ulid;

use crate::auth::AuthError;
use crate::engine::EngineError;
use crate::error::ErrorKind;
use crate::model::{Booking, NewBooking};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Login {
        password: String,
    },
    Resume {
        token: Ulid,
    },
    Logout,
    List,
    Subscribe,
    Unsubscribe,
    Add {
        booking: NewBooking,
    },
    Remove {
        id: Ulid,
    },
    Check {
        start: NaiveDate,
        end: NaiveDate,
        #[serde(default)]
        exclude_id: Option<Ulid>,
    },
    Ping,
}

impl Request {
    /// Everything except login, resume and ping needs a live session.
    pub fn requires_session(&self) -> bool {
        !matches!(self, Request::Login { .. } | Request::Resume { .. } | Request::Ping)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Session {
        token: Ulid,
        expires_at: DateTime<Utc>,
    },
    Ok,
    Pong,
    Bookings {
        bookings: Vec<Booking>,
    },
    /// Pushed to subscribers after every committed change.
    Snapshot {
        bookings: Vec<Booking>,
    },
    Added {
        booking: Booking,
    },
    Removed {
        removed: bool,
    },
    Overlap {
        overlaps: bool,
        #[serde(default)]
        conflict: Option<Ulid>,
    },
    Error {
        kind: ErrorKind,
        message: String,
        #[serde(default)]
        conflict: Option<Ulid>,
    },
    /// Pushed once when the session behind a subscription is gone. The
    /// subscription is closed; no more snapshots follow.
    SessionEnded {
        message: String,
    },
}

impl Reply {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Reply::Error {
            kind,
            message: message.into(),
            conflict: None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error { .. })
    }
}

impl From<&EngineError> for Reply {
    fn from(e: &EngineError) -> Self {
        Reply::Error {
            kind: e.kind(),
            message: e.to_string(),
            conflict: e.conflict_id(),
        }
    }
}

impl From<&AuthError> for Reply {
    fn from(e: &AuthError) -> Self {
        Reply::error(e.kind(), e.to_string())
    }
}

/// One line on the wire: a request or reply plus the sequence number that pairs them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Frame<T> {
    pub fn new(seq: Option<u64>, body: T) -> Self {
        Self { seq, body }
    }

    /// Unsolicited server line.
    pub fn push(body: T) -> Self {
        Self { seq: None, body }
    }
}

#[derive(Debug)]
pub enum ProtocolError {
    Parse(String),
    LineTooLong,
    Io(std::io::Error),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::Parse(e) => write!(f, "bad request: {e}"),
            ProtocolError::LineTooLong => write!(f, "request line too long"),
            ProtocolError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<LinesCodecError> for ProtocolError {
    fn from(e: LinesCodecError) -> Self {
        match e {
            LinesCodecError::MaxLineLengthExceeded => ProtocolError::LineTooLong,
            LinesCodecError::Io(e) => ProtocolError::Io(e),
        }
    }
}

impl From<std::io::Error> for ProtocolError {
    fn from(e: std::io::Error) -> Self {
        ProtocolError::Io(e)
    }
}

pub fn parse_request(line: &str) -> Result<Frame<Request>, ProtocolError> {
    serde_json::from_str(line.trim()).map_err(|e| ProtocolError::Parse(e.to_string()))
}

pub fn parse_reply(line: &str) -> Result<Frame<Reply>, ProtocolError> {
    serde_json::from_str(line.trim()).map_err(|e| ProtocolError::Parse(e.to_string()))
}

pub fn encode<T: Serialize>(frame: &Frame<T>) -> Result<String, ProtocolError> {
    serde_json::to_string(frame).map_err(|e| ProtocolError::Parse(e.to_string()))
}
