//! Error kinds surfaced to the caller.
//!
//! Per-record problems are not errors: they travel as
//! [`crate::models::Rejected`] values and are counted. Everything here
//! stops the batch (or, for sources, the source) it belongs to.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result alias for batch operations.
pub type BatchResult<T> = std::result::Result<T, BatchError>;

/// Fatal conditions of a batch run.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("source unavailable: {path}: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    #[error("cannot write output {path}: {reason}")]
    SinkUnavailable { path: PathBuf, reason: String },

    #[error("invalid pipeline: {0}")]
    InvalidPipeline(String),

    #[error("inventory error: {0}")]
    Inventory(String),
}

impl BatchError {
    pub fn source(path: &Path, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn sink(path: &Path, reason: impl ToString) -> Self {
        Self::SinkUnavailable {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// True for errors tied to a single input source.
    pub fn is_source_error(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = BatchError::source(Path::new("data/reviews"), "No such file or directory");
        assert_eq!(
            err.to_string(),
            "source unavailable: data/reviews: No such file or directory"
        );
        assert!(err.is_source_error());

        let err = BatchError::sink(Path::new("out/report.txt"), "permission denied");
        assert!(err.to_string().contains("out/report.txt"));
        assert!(!err.is_source_error());
    }
}
