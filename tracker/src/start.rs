//! Orchestration for starting a plan from its template.
//!
//! Starting reads the template named in the config, normalizes it to a fresh
//! plan (everything pending, first phase in progress), and persists it. An
//! existing plan is only replaced when the caller asks for it explicitly.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::io::plan_store::PlanStore;

/// Outcome of `tracker start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOutcome {
    pub plan_path: PathBuf,
    pub project: String,
    pub current_phase: u32,
    pub current_step: Option<String>,
    /// Snapshot of the plan a forced start replaced.
    pub replaced_backup: Option<PathBuf>,
}

/// Initialize the plan document from `template_path`.
pub fn start_plan(store: &PlanStore, template_path: &Path, force: bool) -> Result<StartOutcome> {
    debug!(template = %template_path.display(), force, "starting plan");
    let template = store
        .load_template(template_path)
        .with_context(|| format!("load template {}", template_path.display()))?;
    let outcome = store.initialize_from_template(template, force)?;

    Ok(StartOutcome {
        plan_path: store.plan_path().to_path_buf(),
        project: outcome.plan.project,
        current_phase: outcome.plan.current_phase,
        current_step: outcome.plan.current_step,
        replaced_backup: outcome.replaced_backup,
    })
}
