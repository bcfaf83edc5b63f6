//! Errors and non-fatal [diagnostics](Diagnostic).

use crate::table::Table;
use color_eyre::eyre::{Report, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use std::path::Path;
use thiserror::Error;

/// Fatal conditions of the delimitation core.
///
/// These travel inside a [`Report`], and can be recovered with [`Report::downcast_ref`].
///
/// ```rust
/// use cgcd::{scan::ThresholdRange, Error};
/// let report = ThresholdRange::new(10, 5).unwrap_err();
/// assert!(matches!(report.downcast_ref::<Error>(), Some(Error::DegenerateRange { min: 10, max: 5 })));
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// Every partition was rejected, or none were provided.
    #[error("No usable partitions were found ({skipped} skipped).")]
    NoUsablePartitions { skipped: usize },
    /// The threshold range is empty or inverted.
    #[error("Threshold range is empty, the minimum ({min}) is greater than the maximum ({max}).")]
    DegenerateRange { min: u32, max: u32 },
    /// Thresholds below 1 connect every strain.
    #[error("Threshold {0} is invalid, thresholds must be at least 1.")]
    InvalidThreshold(u32),
    /// A partition could not be reconciled with the strain universe.
    #[error("Partition {name:?} is incompatible with the strain universe: {reason}")]
    IncompatiblePartition { name: String, reason: String },
    /// A strain was requested that is not in the strain universe.
    #[error("Strain {0:?} is not in the strain universe.")]
    UnknownStrain(String),
}

// ----------------------------------------------------------------------------
// Diagnostic
// ----------------------------------------------------------------------------

/// A non-fatal condition, such as a skipped partition, kept alongside the normal output.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Diagnostic {
    /// Where the condition came from (ex. a partition name or file).
    pub source: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new<S, M>(source: S, message: M) -> Self
    where
        S: Into<String>,
        M: Display,
    {
        Diagnostic { source: source.into(), message: message.to_string() }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.source, self.message)
    }
}

/// Write diagnostics to a table with the columns `source` and `message`.
///
/// The table is written even when there are no diagnostics, so that an empty table
/// can be told apart from a run that never got that far.
pub fn write_diagnostics<P>(diagnostics: &[Diagnostic], path: &P) -> Result<(), Report>
where
    P: AsRef<Path> + Debug,
{
    let mut table = Table::new();
    table.headers = vec!["source".to_string(), "message".to_string()];
    for diagnostic in diagnostics {
        // keep the message on one line, and free of the delimiter
        let message = diagnostic.message.replace(['\t', '\n'], " ");
        table.add_row(vec![diagnostic.source.clone(), message])?;
    }
    table.write(path, None)
}
