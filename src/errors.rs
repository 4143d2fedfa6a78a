//! Pipeline errors

use std::path::PathBuf;

/// Every failure a pipeline invocation can abort with.
///
/// All of these are fatal: the invocation stops, nothing is written to the
/// output path, and the process exits non-zero.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The path's extension names a format with no read or write support.
    #[error("unsupported format: .{0}")]
    UnsupportedFormat(String),

    /// The input file exists but could not be parsed as its format.
    #[error("failed to import {path:?}: {detail}")]
    ImportFailure { path: PathBuf, detail: String },

    /// A polygon's UV centroid never settled inside the unit square.
    #[error("UV wrapping of polygon {polygon} did not settle within {limit} steps")]
    UnboundedNormalization { polygon: usize, limit: usize },

    /// Edge subdivision kept finding long edges past the pass bound.
    #[error("edge subdivision did not converge within {limit} passes")]
    SubdivisionDidNotConverge { limit: usize },

    /// Stripping a material's numeric suffix would destroy its collision id.
    #[error("material {0:?} cannot be resolved to a collision id")]
    AmbiguousMaterial(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
