//! Per-item results and the aggregate batch report.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Why a single item was not exported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ItemFailure {
    #[error("decode failed: {0}")]
    Decode(String),

    #[error("render failed: {0}")]
    Render(String),

    #[error("refusing to overwrite source file {}", .dest.display())]
    UnsafeOverwrite { dest: PathBuf },

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("cancelled before processing")]
    Cancelled,
}

impl ItemFailure {
    /// Short machine-friendly label.
    pub fn kind(&self) -> &'static str {
        match self {
            ItemFailure::Decode(_) => "decode",
            ItemFailure::Render(_) => "render",
            ItemFailure::UnsafeOverwrite { .. } => "unsafe-overwrite",
            ItemFailure::Encode(_) => "encode",
            ItemFailure::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { dest: PathBuf },
    Failure(ItemFailure),
}

/// Result of processing one source.
#[derive(Debug, Clone)]
pub struct BatchItemResult {
    /// Position of the source in the job.
    pub index: usize,
    pub path: PathBuf,
    pub outcome: Outcome,
    /// Non-fatal problems, such as falling back to the built-in font.
    pub warnings: Vec<String>,
    pub elapsed: Duration,
}

impl BatchItemResult {
    pub fn cancelled(index: usize, path: PathBuf) -> Self {
        Self {
            index,
            path,
            outcome: Outcome::Failure(ItemFailure::Cancelled),
            warnings: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }

    pub fn failure(&self) -> Option<&ItemFailure> {
        match &self.outcome {
            Outcome::Failure(failure) => Some(failure),
            Outcome::Success { .. } => None,
        }
    }

    pub fn dest(&self) -> Option<&PathBuf> {
        match &self.outcome {
            Outcome::Success { dest } => Some(dest),
            Outcome::Failure(_) => None,
        }
    }
}

/// Progress after an item completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
}

impl BatchProgress {
    /// Completed share in `[0, 1]`; an empty batch counts as done.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Outcome of a whole run, one entry per source in source order.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub job_id: String,
    pub items: Vec<BatchItemResult>,
    pub succeeded: usize,
    /// Failures other than cancellation.
    pub failed: usize,
    pub cancelled: usize,
    pub elapsed: Duration,
}

impl BatchReport {
    /// Build a report from results in any order.
    pub fn from_items(
        job_id: impl Into<String>,
        mut items: Vec<BatchItemResult>,
        elapsed: Duration,
    ) -> Self {
        items.sort_by_key(|item| item.index);

        let mut succeeded = 0;
        let mut failed = 0;
        let mut cancelled = 0;
        for item in &items {
            match &item.outcome {
                Outcome::Success { .. } => succeeded += 1,
                Outcome::Failure(ItemFailure::Cancelled) => cancelled += 1,
                Outcome::Failure(_) => failed += 1,
            }
        }

        Self {
            job_id: job_id.into(),
            items,
            succeeded,
            failed,
            cancelled,
            elapsed,
        }
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// Every item was exported.
    pub fn is_complete_success(&self) -> bool {
        self.succeeded == self.items.len()
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchItemResult> {
        self.items.iter().filter(|item| !item.is_success())
    }

    pub fn warning_count(&self) -> usize {
        self.items.iter().map(|item| item.warnings.len()).sum()
    }
}
