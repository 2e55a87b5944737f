use insight_agent_backend::{BackendError, ErrorKind};
use thiserror::Error;

/// Errors that make an agent configuration unusable.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The backend reports no generation-capable model.
    #[error("no generation-capable model is available")]
    NoGenerationModel,

    /// The chosen model is empty or not generation-capable.
    #[error("model '{0}' is not a generation-capable model of the backend")]
    UnknownModel(String),

    /// Temperature or top-p out of range.
    #[error("invalid sampling parameters: {0}")]
    InvalidSampling(String),

    /// The same tool group appears twice in the selection.
    #[error("tool group '{0}' is selected more than once")]
    DuplicateToolGroup(String),
}

/// The error type of this crate.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// The agent cannot be created with the given configuration.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The backend failed, either the transport or the service itself.
    #[error("{kind}: {message}")]
    Backend {
        /// The kind of the failure.
        kind: ErrorKind,
        /// The description of the failure.
        message: String,
    },
}

impl Error {
    /// Flattens an error reported by a backend.
    pub fn from_backend<E: BackendError>(err: E) -> Self {
        Error::Backend {
            kind: err.kind(),
            message: format!("{err}"),
        }
    }

    /// Returns `true` if this is a configuration error.
    #[inline]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }
}
