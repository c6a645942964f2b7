//! Read-only commands: `tracker progress`, `tracker next`, `tracker history`.

use anyhow::Result;

use crate::core::selector::{next_pending, progress};
use crate::core::types::{NextPending, Progress};
use crate::io::plan_store::PlanStore;
use crate::plan::HistoryEntry;

/// Load the plan and project where it stands.
pub fn progress_from_store(store: &PlanStore) -> Result<Progress> {
    let plan = store.load()?;
    Ok(progress(&plan)?)
}

/// Load the plan and find the next step that still needs doing.
pub fn next_from_store(store: &PlanStore) -> Result<NextPending> {
    let plan = store.load()?;
    Ok(next_pending(&plan))
}

/// Load the plan and return its completion log, oldest first.
pub fn history_from_store(store: &PlanStore) -> Result<Vec<HistoryEntry>> {
    let plan = store.load()?;
    Ok(plan.history)
}
