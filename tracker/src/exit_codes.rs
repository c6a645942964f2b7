//! Stable exit codes for tracker CLI commands.

/// Command succeeded, or `tracker next` found a pending step.
pub const OK: i32 = 0;
/// Invalid input, config, or document, or any other failure.
pub const INVALID: i32 = 1;
/// `tracker next` found no pending work (plan complete).
pub const COMPLETE: i32 = 2;
/// No plan document exists yet; run `tracker start` first.
pub const NOT_INITIALIZED: i32 = 3;
