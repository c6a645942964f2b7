//! Typed failures surfaced by the plan store, state machine, and backups.
//!
//! Orchestration and the CLI wrap these in `anyhow::Error`; callers that need
//! to branch on a specific kind use `downcast_ref::<TrackerError>()`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// No plan document exists yet. Recoverable by running `tracker start`.
    #[error("plan not initialized: {} does not exist (run `tracker start`)", path.display())]
    NotInitialized { path: PathBuf },

    /// `start` was attempted while a plan document already exists.
    #[error("plan already initialized at {} (use --force to reset)", path.display())]
    AlreadyInitialized { path: PathBuf },

    /// The document exists but failed to parse or failed structural validation.
    #[error("plan document {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("unknown step '{0}'")]
    UnknownStep(String),

    #[error("unknown phase '{0}'")]
    UnknownPhase(String),

    #[error("step '{0}' is already complete")]
    AlreadyComplete(String),

    /// Steps complete strictly in declared order; `expected` is the current step.
    #[error("step '{step}' is out of order (current step is '{expected}')")]
    OutOfOrder { step: String, expected: String },

    #[error("metadata key '{0}' is reserved")]
    ReservedMetadataKey(String),

    /// JSON has no encoding for NaN or infinity.
    #[error("metadata value for '{0}' must be a finite number")]
    NonFiniteMetadata(String),

    /// A snapshot or restore needed a plan document that was never written.
    #[error("nothing to snapshot: {} does not exist", path.display())]
    SourceMissing { path: PathBuf },

    #[error("scripted step '{step}' failed: {reason}")]
    HookFailed { step: String, reason: String },

    #[error("{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TrackerError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Shorthand used by the store and core modules.
pub type TrackerResult<T> = Result<T, TrackerError>;
