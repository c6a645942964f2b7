//! Hook adapter for executing scripted steps.
//!
//! The tracker only records outcomes; what a scripted step actually does is
//! delegated to a [`StepHook`]. `tracker run-step` uses [`CommandHook`] when
//! `[hook] command` is configured and [`PlaceholderHook`] otherwise.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};
use wait_timeout::ChildExt;

use crate::io::config::HookConfig;

#[derive(Debug, Clone)]
pub struct HookRequest {
    pub step_id: String,
    pub step_title: String,
    pub workdir: PathBuf,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    Succeeded,
    Failed(String),
}

pub trait StepHook {
    fn run(&self, request: &HookRequest) -> Result<HookOutcome>;
}

/// Stand-in used when no hook command is configured: reports success without
/// running anything.
pub struct PlaceholderHook;

impl StepHook for PlaceholderHook {
    fn run(&self, request: &HookRequest) -> Result<HookOutcome> {
        info!(step = %request.step_id, "no hook command configured; treating scripted step as run");
        Ok(HookOutcome::Succeeded)
    }
}

/// Runs an external command with the step id appended as its last argument.
///
/// The child inherits stdout/stderr and also sees `TRACKER_STEP_ID` and
/// `TRACKER_STEP_TITLE` in its environment.
pub struct CommandHook {
    command: Vec<String>,
}

impl CommandHook {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl StepHook for CommandHook {
    fn run(&self, request: &HookRequest) -> Result<HookOutcome> {
        let Some((program, args)) = self.command.split_first() else {
            return Ok(HookOutcome::Failed("hook command is empty".to_string()));
        };
        info!(step = %request.step_id, program = %program, "running hook");

        let mut child = Command::new(program)
            .args(args)
            .arg(&request.step_id)
            .env("TRACKER_STEP_ID", &request.step_id)
            .env("TRACKER_STEP_TITLE", &request.step_title)
            .current_dir(&request.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("spawn hook {program}"))?;

        let status = match child
            .wait_timeout(request.timeout)
            .context("wait for hook")?
        {
            Some(status) => status,
            None => {
                child.kill().context("kill hook process")?;
                child.wait().context("wait hook process")?;
                warn!(step = %request.step_id, timeout_secs = request.timeout.as_secs(), "hook timed out");
                return Ok(HookOutcome::Failed(format!(
                    "timed out after {}s",
                    request.timeout.as_secs()
                )));
            }
        };

        if status.success() {
            Ok(HookOutcome::Succeeded)
        } else {
            Ok(HookOutcome::Failed(format!("hook exited with {status}")))
        }
    }
}

/// Pick the hook implementation for a config.
pub fn hook_from_config(config: &HookConfig) -> Box<dyn StepHook> {
    if config.command.is_empty() {
        Box::new(PlaceholderHook)
    } else {
        Box::new(CommandHook::new(config.command.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(workdir: PathBuf, timeout: Duration) -> HookRequest {
        HookRequest {
            step_id: "1.a".to_string(),
            step_title: "First".to_string(),
            workdir,
            timeout,
        }
    }

    #[test]
    fn placeholder_hook_succeeds() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = PlaceholderHook
            .run(&request(temp.path().to_path_buf(), Duration::from_secs(1)))
            .expect("run");
        assert_eq!(outcome, HookOutcome::Succeeded);
    }

    #[cfg(unix)]
    /// Verifies the command hook is passed the step id as its argument.
    #[test]
    fn command_hook_receives_step_id() {
        let temp = tempfile::tempdir().expect("tempdir");
        let hook = CommandHook::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            "printf '%s' \"$1\" > ran.txt".to_string(),
            "hook".to_string(),
        ]);

        let outcome = hook
            .run(&request(temp.path().to_path_buf(), Duration::from_secs(10)))
            .expect("run");
        assert_eq!(outcome, HookOutcome::Succeeded);
        let ran = std::fs::read_to_string(temp.path().join("ran.txt")).expect("read");
        assert_eq!(ran, "1.a");
    }

    #[cfg(unix)]
    /// Ensures non-zero exits and timeouts both come back as `Failed`.
    #[test]
    fn command_hook_reports_failure_and_timeout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let failing = CommandHook::new(vec!["false".to_string()]);
        let outcome = failing
            .run(&request(temp.path().to_path_buf(), Duration::from_secs(10)))
            .expect("run");
        assert!(matches!(outcome, HookOutcome::Failed(reason) if reason.contains("exited")));

        let slow = CommandHook::new(vec!["sleep".to_string(), "5".to_string()]);
        let outcome = slow
            .run(&request(temp.path().to_path_buf(), Duration::from_millis(100)))
            .expect("run");
        assert!(matches!(outcome, HookOutcome::Failed(reason) if reason.contains("timed out")));
    }

    #[test]
    fn hook_from_config_picks_placeholder_when_unset() {
        let temp = tempfile::tempdir().expect("tempdir");
        let hook = hook_from_config(&HookConfig::default());
        let outcome = hook
            .run(&request(temp.path().to_path_buf(), Duration::from_secs(1)))
            .expect("run");
        assert_eq!(outcome, HookOutcome::Succeeded);
    }
}
