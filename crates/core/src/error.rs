//! Error types for the runwire emitter.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Validation failures have their own type so callers that only build
//! namespaces never have to match on dispatch errors.

use thiserror::Error;

/// The top-level error type for all runwire operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Emitter errors ---
    #[error("Emitter error: {0}")]
    Emitter(#[from] EmitterError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<InvalidNameError> for Error {
    fn from(err: InvalidNameError) -> Self {
        Self::Emitter(EmitterError::InvalidName(err))
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// An event name or namespace segment that violates the name grammar.
///
/// `segment` is the position of the offending part when the name was
/// checked as part of a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "Event name or a namespace part must contain only letters, numbers or underscores: {name:?}{}",
    .segment.map(|i| format!(" (segment {i})")).unwrap_or_default()
)]
pub struct InvalidNameError {
    pub name: String,
    pub segment: Option<usize>,
}

impl InvalidNameError {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            segment: None,
        }
    }

    pub(crate) fn at_segment(mut self, index: usize) -> Self {
        self.segment = Some(index);
        self
    }
}

/// Errors reported by the dispatch core.
#[derive(Debug, Error)]
pub enum EmitterError {
    #[error(transparent)]
    InvalidName(#[from] InvalidNameError),

    #[error("Invalid selector pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Emitter at {path:?} has been destroyed")]
    Destroyed { path: String },

    #[error("Callback for {path} failed: {message}")]
    Callback { path: String, message: String },

    #[error("Cannot pipe an emitter into its own registry")]
    SelfPipe,

    #[error("Piping {from} into {to} would forward events back into {from}")]
    PipeCycle { from: String, to: String },

    #[error("Event payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Outcome of a failed [`RunContext::run`](crate::run::RunContext::run).
#[derive(Debug, Error)]
pub enum RunError<E> {
    /// The run body itself failed; lifecycle events were still emitted.
    #[error("Run {run_id} failed: {error}")]
    Failed { run_id: String, error: E },

    /// A lifecycle event could not be dispatched.
    #[error("Run {run_id} could not emit lifecycle event: {source}")]
    Emitter {
        run_id: String,
        #[source]
        source: EmitterError,
    },
}
