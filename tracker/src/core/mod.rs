//! Deterministic, pure logic shared by the tracker core.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! plans and return deterministic outputs suitable for tests; the clock is
//! passed in by the caller.

pub mod invariants;
pub mod selector;
pub mod state_update;
pub mod types;
