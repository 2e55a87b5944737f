use std::error::Error;
use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The backend could not be reached, or the connection broke.
    Unavailable,
    /// The backend replied with something we cannot understand.
    InvalidResponse,
    /// The requested resource (agent, session, tool group) doesn't exist.
    NotFound,
    /// Any other errors.
    Other,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Unavailable => write!(f, "Backend unavailable"),
            ErrorKind::InvalidResponse => write!(f, "Invalid response"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::Other => write!(f, "Other error"),
        }
    }
}

/// The error type for a backend.
pub trait BackendError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}
