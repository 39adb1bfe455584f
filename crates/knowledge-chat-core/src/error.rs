//! Error types for the ingestion and chat pipelines.

use thiserror::Error;

/// Errors surfaced by [`ChatPipeline`](crate::ChatPipeline) and
/// [`IngestionPipeline`](crate::IngestionPipeline).
///
/// A malformed relevance response from the model is never surfaced here;
/// it is downgraded to "no relevant documents" inside the pipeline.
#[derive(Error, Debug)]
pub enum ChatError {
    /// The caller passed input the pipeline cannot act on.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A capability (loader, chunker, embedder, index, generator) failed.
    ///
    /// The underlying error is carried as-is and displays unchanged.
    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}

impl ChatError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ChatError::InvalidArgument(msg.into())
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, ChatError::InvalidArgument(_))
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, ChatError>;
