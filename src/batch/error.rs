//! Fatal batch errors.
//!
//! These abort a run before any item is processed. Per-item problems are
//! never raised as errors; they are recorded in the report as
//! [`ItemFailure`](super::report::ItemFailure).

use crate::watermark::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Cannot read sources from {path}: {source}")]
    SourceListUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Output directory {path} is not writable: {source}")]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid watermark: {0}")]
    InvalidSpec(#[from] ValidationError),

    #[error("Invalid output options: {0}")]
    InvalidOptions(String),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

impl From<rayon::ThreadPoolBuildError> for BatchError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        BatchError::WorkerPool(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_spec_from_validation_error() {
        let err: BatchError = ValidationError::new("opacity", "out of range").into();
        assert_eq!(err.to_string(), "Invalid watermark: invalid opacity: out of range");
    }

    #[test]
    fn test_source_error_keeps_cause() {
        use std::error::Error as _;
        let err = BatchError::SourceListUnreadable {
            path: PathBuf::from("/missing/list.txt"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.to_string().contains("/missing/list.txt"));
        assert!(err.source().is_some());
    }
}
