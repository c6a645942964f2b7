//! I/O helpers for tracker commands.

pub mod backup;
pub mod config;
pub mod hook;
pub mod plan_store;
pub mod storage;
