//! Shared deterministic types for tracker core logic.
//!
//! These types are the stable contracts between the pure core, the
//! orchestration layer, and the CLI. They carry no I/O state.

use crate::plan::{PhaseStatus, PlanStatus, StepStatus};

/// Summary of the pointer movement caused by one completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionSummary {
    /// Step that was marked `done`.
    pub step_id: String,
    /// Phase the completed step belongs to.
    pub phase_id: String,
    /// True if the completion finished its phase.
    pub phase_completed: bool,
    /// `current_phase` after the transition.
    pub current_phase: u32,
    /// `current_step` after the transition.
    pub current_step: Option<String>,
    /// True if the completion finished the whole plan.
    pub plan_done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseProgress {
    pub id: String,
    pub title: String,
    pub status: PhaseStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepProgress {
    pub id: String,
    pub title: String,
    pub status: StepStatus,
}

/// Read-only projection of where the plan stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub project: String,
    pub version: String,
    pub status: PlanStatus,
    pub phase: PhaseProgress,
    pub step: Option<StepProgress>,
    pub steps_done: usize,
    pub steps_total: usize,
}

/// Outcome of the next-pending lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPending {
    /// A step that still needs doing.
    Step(PendingStep),
    /// The plan is complete, or nothing ahead remains open.
    NoPendingWork,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingStep {
    pub phase_id: String,
    pub step_id: String,
    pub title: String,
}
