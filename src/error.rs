//! Typed error kinds raised by the interpreter core.
pub use anyhow::{anyhow, Error as AnyError, Result as AnyResult};
use thiserror::Error;

/// Error kinds an invocation can raise while executing a module.
///
/// Every variant carries the instruction index that was current when the
/// failure was detected (`None` if the failure happened before dispatch, e.g.
/// while resolving an entry point).
#[derive(Error, Debug)]
pub enum InterpError {
    #[error("shape mismatch at instruction {inst_idx:?}: {reason}")]
    ShapeMismatch {
        inst_idx: Option<usize>,
        reason: String,
    },
    #[error("out of bounds at instruction {inst_idx:?}: {reason}")]
    OutOfBounds {
        inst_idx: Option<usize>,
        reason: String,
    },
    #[error("underconsumed arguments at instruction {inst_idx:?}: {reason}")]
    Underconsumed {
        inst_idx: Option<usize>,
        reason: String,
    },
    #[error("unsupported feature at instruction {inst_idx:?}: {reason}")]
    UnsupportedFeature {
        inst_idx: Option<usize>,
        reason: String,
    },
    #[error("malformed module at instruction {inst_idx:?}: {reason}")]
    MalformedModule {
        inst_idx: Option<usize>,
        reason: String,
    },
    #[error("cancelled at instruction {inst_idx:?}")]
    Cancelled { inst_idx: Option<usize> },
}
impl InterpError {
    pub fn shape_mismatch(inst_idx: Option<usize>, reason: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            inst_idx,
            reason: reason.into(),
        }
    }
    pub fn out_of_bounds(inst_idx: Option<usize>, reason: impl Into<String>) -> Self {
        Self::OutOfBounds {
            inst_idx,
            reason: reason.into(),
        }
    }
    pub fn underconsumed(inst_idx: Option<usize>, reason: impl Into<String>) -> Self {
        Self::Underconsumed {
            inst_idx,
            reason: reason.into(),
        }
    }
    pub fn unsupported(inst_idx: Option<usize>, reason: impl Into<String>) -> Self {
        Self::UnsupportedFeature {
            inst_idx,
            reason: reason.into(),
        }
    }
    pub fn malformed(inst_idx: Option<usize>, reason: impl Into<String>) -> Self {
        Self::MalformedModule {
            inst_idx,
            reason: reason.into(),
        }
    }
    pub fn cancelled(inst_idx: Option<usize>) -> Self {
        Self::Cancelled { inst_idx }
    }

    /// The instruction index active when this error was raised, if any.
    pub fn inst_idx(&self) -> Option<usize> {
        match self {
            Self::ShapeMismatch { inst_idx, .. }
            | Self::OutOfBounds { inst_idx, .. }
            | Self::Underconsumed { inst_idx, .. }
            | Self::UnsupportedFeature { inst_idx, .. }
            | Self::MalformedModule { inst_idx, .. }
            | Self::Cancelled { inst_idx } => *inst_idx,
        }
    }
}

/// Result alias for call sites that need to match on [`InterpError`].
pub type Result<T> = std::result::Result<T, InterpError>;
