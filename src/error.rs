use std::path::PathBuf;

/// Crate-wide error taxonomy. All pipeline failures are fatal for the run
/// that raised them; nothing is recovered inside the core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The arrangement lookup-table file could not be opened or parsed.
    #[error("lookup table {path:?} unusable: {reason}")]
    LookupTableMissing { path: PathBuf, reason: String },

    /// A primitive's plane could not be signed inside a tetrahedron (it is
    /// identically zero over it).
    #[error("degenerate plane of primitive {primitive} in tetrahedron {tet}")]
    DegeneratePlane { tet: u32, primitive: u32 },

    /// Sign propagation observed two disagreeing labels for the same
    /// (cell, primitive) pair; the surface network is inconsistent.
    #[error("inconsistent label for primitive {primitive} on arrangement cell {cell}")]
    InconsistentCellLabel { cell: u32, primitive: u32 },

    /// The blobtree post-order evaluation could not reach the root.
    #[error("blobtree evaluation failed: {0}")]
    BlobtreeEvaluationFailed(String),

    /// Rejected runtime options.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type Result<T> = std::result::Result<T, Error>;
