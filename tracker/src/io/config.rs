//! Tracker configuration stored in `tracker.toml` at the project root.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default config file name, relative to the project root.
pub const DEFAULT_CONFIG_FILE: &str = "tracker.toml";

/// Tracker configuration (TOML).
///
/// Read once per invocation and passed explicitly to the store. Missing
/// fields default to the `.tracker/` layout. Relative paths are resolved
/// against the project root by [`TrackerConfig::resolve`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TrackerConfig {
    /// Where the live plan document is persisted.
    pub plan_path: PathBuf,

    /// Template consumed by `tracker start`.
    pub template_path: PathBuf,

    /// Directory receiving timestamped snapshots.
    pub backup_dir: PathBuf,

    /// Upper bound for a single storage read/write/copy, in seconds.
    pub io_timeout_secs: u64,

    pub hook: HookConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HookConfig {
    /// Command run for `tracker run-step` (the step id is appended as the last
    /// argument). Empty means no hook is configured.
    pub command: Vec<String>,

    /// Wall-clock budget for the hook command, in seconds.
    pub timeout_secs: u64,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: 30 * 60,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            plan_path: PathBuf::from(".tracker/plan.json"),
            template_path: PathBuf::from(".tracker/template.json"),
            backup_dir: PathBuf::from(".tracker/backups"),
            io_timeout_secs: 30,
            hook: HookConfig::default(),
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.plan_path.as_os_str().is_empty() {
            return Err(anyhow!("plan_path must not be empty"));
        }
        if self.template_path.as_os_str().is_empty() {
            return Err(anyhow!("template_path must not be empty"));
        }
        if self.backup_dir.as_os_str().is_empty() {
            return Err(anyhow!("backup_dir must not be empty"));
        }
        if self.io_timeout_secs == 0 {
            return Err(anyhow!("io_timeout_secs must be > 0"));
        }
        if self.hook.timeout_secs == 0 {
            return Err(anyhow!("hook.timeout_secs must be > 0"));
        }
        if self
            .hook
            .command
            .first()
            .is_some_and(|program| program.trim().is_empty())
        {
            return Err(anyhow!("hook.command must start with a program name"));
        }
        Ok(())
    }

    /// Anchor relative paths at `root`.
    pub fn resolve(mut self, root: &Path) -> Self {
        for path in [
            &mut self.plan_path,
            &mut self.template_path,
            &mut self.backup_dir,
        ] {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        }
        self
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }

    pub fn hook_timeout(&self) -> Duration {
        Duration::from_secs(self.hook.timeout_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `TrackerConfig::default()`.
pub fn load_config(path: &Path) -> Result<TrackerConfig> {
    if !path.exists() {
        let cfg = TrackerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: TrackerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifies a missing config file yields defaults.
    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, TrackerConfig::default());
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(
            &path,
            "plan_path = \"state/plan-memory.json\"\n\n[hook]\ncommand = [\"just\", \"step\"]\n",
        )
        .expect("write config");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.plan_path, PathBuf::from("state/plan-memory.json"));
        assert_eq!(cfg.backup_dir, PathBuf::from(".tracker/backups"));
        assert_eq!(cfg.hook.command, vec!["just".to_string(), "step".to_string()]);
        assert_eq!(cfg.hook.timeout_secs, 30 * 60);
    }

    /// Ensures zero timeouts fail validation.
    #[test]
    fn zero_timeout_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "io_timeout_secs = 0\n").expect("write config");

        let err = load_config(&path).expect_err("expected error");
        assert!(err.to_string().contains("io_timeout_secs"));
    }

    /// Verifies absolute paths are left alone when resolving against the root.
    #[test]
    fn resolve_anchors_only_relative_paths() {
        let temp = tempfile::tempdir().expect("tempdir");
        let absolute = temp.path().join("elsewhere/backups");
        let cfg = TrackerConfig {
            backup_dir: absolute.clone(),
            ..TrackerConfig::default()
        }
        .resolve(Path::new("/project"));

        assert_eq!(cfg.plan_path, PathBuf::from("/project/.tracker/plan.json"));
        assert_eq!(cfg.backup_dir, absolute);
    }
}
