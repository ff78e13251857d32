//! Error types for topic synthesis.

use thiserror::Error;

/// Result type alias for topic synthesis operations.
pub type Result<T> = std::result::Result<T, TopicError>;

/// Failure surfaced by a similarity or significance oracle, or by the term
/// source that backs them.
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    /// The index lock was poisoned by a panicking writer.
    #[error("term index is unavailable: lock poisoned")]
    Poisoned,

    /// Any other backend failure.
    #[error("oracle backend error: {0}")]
    Backend(String),
}

/// Errors that end a topic run or reject a controller request.
#[derive(Debug, Error)]
pub enum TopicError {
    /// The run observed its cancellation signal. Not a failure.
    #[error("cancellation requested")]
    CancellationRequested,

    /// An oracle failed; the run is aborted without a result.
    #[error("oracle failure: {0}")]
    OracleFailure(#[from] OracleError),

    /// The request makes no sense in the current state.
    #[error("{0}")]
    InvalidRequest(String),

    /// The worker thread could not be created.
    #[error("failed to spawn topic worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// The worker thread panicked before it settled the run.
    #[error("topic worker panicked")]
    WorkerPanicked,

    /// CBOR encoding or decoding of a topic set failed.
    #[error("codec error: {0}")]
    Codec(#[from] serde_cbor::Error),
}

impl TopicError {
    /// Whether this is the expected cancellation exit rather than an error.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, TopicError::CancellationRequested)
    }
}
