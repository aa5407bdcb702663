//! The `Source` trait implemented by every field parser, and the error a pass can fail with.

use thiserror::Error;

use crate::collector::traits::CommandError;
use crate::collector::zfs::ParseError;
use crate::ledger::LedgerError;
use crate::metric::MetricFamily;

/// Error type for a failed collection.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The underlying command failed or could not be started.
    #[error(transparent)]
    Command(#[from] CommandError),
    /// The command output did not have the expected shape.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The job ledger could not be read.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// A sample was added with the wrong number of label values.
    #[error("{metric}: expected {expected} label values, got {got}")]
    LabelArity {
        metric: String,
        expected: usize,
        got: usize,
    },
    /// Two samples of one metric carried identical labels.
    #[error("{metric}: duplicate sample for labels {labels:?}")]
    DuplicateSample { metric: String, labels: Vec<String> },
}

/// A single field parser together with whatever it reads from.
///
/// `collect` is called once per scrape and must not keep state between calls.
pub trait Source: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Runs the underlying command or query and returns the parsed families.
    fn collect(&self) -> Result<Vec<MetricFamily>, CollectError>;
}
