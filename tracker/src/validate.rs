//! `tracker validate`: check config, template, and plan document.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::error::TrackerError;
use crate::io::config::TrackerConfig;
use crate::io::plan_store::PlanStore;

/// Plan document validation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanValidation {
    /// No plan document yet; `tracker start` has not been run.
    NotStarted,
    /// Document parsed and passed schema and invariant checks.
    Ok {
        project: String,
        steps_done: usize,
        steps_total: usize,
    },
}

/// High-level validation outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateOutcome {
    pub plan: PlanValidation,
    /// Template checked alongside the plan, when one exists.
    pub template: Option<PathBuf>,
}

/// Validate the resolved config, the template (if present), and the plan.
pub fn validate_tracker(config: &TrackerConfig) -> Result<ValidateOutcome> {
    config.validate().context("validate config")?;
    let store = PlanStore::new(config);

    let template = if config.template_path.is_file() {
        store
            .load_template(&config.template_path)
            .with_context(|| format!("validate template {}", config.template_path.display()))?;
        Some(config.template_path.clone())
    } else {
        None
    };

    let plan = match store.load() {
        Ok(plan) => plan,
        Err(TrackerError::NotInitialized { .. }) => {
            return Ok(ValidateOutcome {
                plan: PlanValidation::NotStarted,
                template,
            });
        }
        Err(err) => return Err(err.into()),
    };

    let (steps_done, steps_total) = plan.step_counts();
    Ok(ValidateOutcome {
        plan: PlanValidation::Ok {
            project: plan.project,
            steps_done,
            steps_total,
        },
        template,
    })
}
