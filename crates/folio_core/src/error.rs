//! Error types for folio
//!
//! None of these cross the trigger dispatcher boundary. Every per-frame entry
//! point converts them into a logged no-op so a frame is never aborted.

use thiserror::Error;

use crate::projection::RenderMode;

/// Failures the trigger engine can run into
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FolioError {
    /// A required node, container or collaborator is unset
    #[error("missing reference: {0}")]
    MissingReference(&'static str),

    /// A rectangle with non-finite coordinates or negative extent
    #[error("degenerate geometry for {0}")]
    DegenerateGeometry(&'static str),

    /// A node reports a render mode other than the one resolved at setup
    #[error("projection mismatch for {node}: projector resolved {expected:?}, node reports {actual:?}")]
    ProjectionMismatch {
        node: &'static str,
        expected: RenderMode,
        actual: RenderMode,
    },

    /// `lock` called while the container is already locked
    #[error("scroll container already locked")]
    DoubleLockAttempt,

    /// A panel already has a sequence in flight
    #[error("panel {0} already has a running sequence")]
    SequenceAlreadyRunning(String),
}

/// Result type for folio operations
pub type Result<T> = std::result::Result<T, FolioError>;
