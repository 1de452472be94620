use std::path::PathBuf;

/// Convenience result alias used throughout forte.
pub type ForteResult<T> = Result<T, ForteError>;

/// Error type shared by resolution, compositing, encoding and export.
#[derive(thiserror::Error, Debug)]
pub enum ForteError {
    /// Invalid input values or configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// The filter predicate matched no frame in any visible layer.
    #[error("empty selection: no frame matches {predicate}")]
    EmptySelection {
        /// Human-readable rendering of the predicate that matched nothing.
        predicate: String,
    },

    /// A frame encoder worker failed; the whole job is aborted.
    #[error("encode error: {0}")]
    Encode(String),

    /// `render` was called while the encoder job is still running.
    #[error("encoder job is already running")]
    AlreadyRunning,

    /// The job was aborted by the caller.
    #[error("aborted")]
    Aborted,

    /// Filesystem failure while importing resources or writing output.
    #[error("io error at '{}': {source}", path.display())]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// JSON configuration could not be parsed.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Any other failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ForteError {
    /// Build a [`ForteError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`ForteError::Encode`].
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Build a [`ForteError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Build a [`ForteError::EmptySelection`].
    pub fn empty_selection(predicate: impl Into<String>) -> Self {
        Self::EmptySelection {
            predicate: predicate.into(),
        }
    }

    /// Build a [`ForteError::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
