use shared::domain::SessionId;
use thiserror::Error;

/// Uniform failure of a remote call: transport error, non-2xx status or an
/// undecodable body. Callers treat every cause the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{method} {path} failed: {reason}")]
pub struct FetchFailure {
    pub method: String,
    pub path: String,
    pub reason: String,
}

impl FetchFailure {
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Locally detected bad input. Blocks the remote call from being issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} must be a whole number, got {value:?}")]
pub struct ValidationFailure {
    pub field: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error(transparent)]
    Fetch(#[from] FetchFailure),
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    #[error("no vehicle form is open")]
    FormNotOpen,
    #[error("vehicle form is waiting for its save to finish")]
    FormBusy,
    #[error("no active session")]
    NoActiveSession,
    #[error("a message is already in flight for session {0}")]
    SendInFlight(SessionId),
    #[error("unknown session {0}")]
    UnknownSession(SessionId),
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
