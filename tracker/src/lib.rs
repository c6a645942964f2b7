//! Durable plan tracker.
//!
//! A plan is an ordered set of phases, each an ordered set of steps, plus an
//! append-only history of completions. The crate keeps that document on disk
//! and moves it forward one step at a time:
//!
//! - **[`core`]**: Pure, deterministic logic (invariants, selection, state
//!   transitions). No I/O.
//! - **[`io`]**: Config, atomic document storage, snapshots, and the scripted
//!   step hook.
//!
//! Orchestration modules ([`start`], [`select`], [`step`], [`validate`])
//! combine the two to implement CLI commands.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod plan;
pub mod select;
pub mod start;
pub mod step;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;
