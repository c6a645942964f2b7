//! Durable plan tracker CLI.
//!
//! Keeps a plan document (`.tracker/plan.json` by default) of ordered phases
//! and steps, and moves it forward one completed step at a time.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use clap::{Parser, Subcommand};

use tracker::core::types::{NextPending, Progress};
use tracker::error::TrackerError;
use tracker::exit_codes;
use tracker::io::backup::{list_snapshots, restore};
use tracker::io::config::{DEFAULT_CONFIG_FILE, TrackerConfig, load_config};
use tracker::io::hook::hook_from_config;
use tracker::io::plan_store::PlanStore;
use tracker::logging;
use tracker::plan::MetaValue;
use tracker::select::{history_from_store, next_from_store, progress_from_store};
use tracker::start::start_plan;
use tracker::step::{
    ScriptedStepConfig, StepOutcome, complete_step, confirm_step, run_scripted_step,
};
use tracker::validate::{PlanValidation, validate_tracker};

#[derive(Parser)]
#[command(name = "tracker", version, about = "Durable phase/step plan tracker")]
struct Cli {
    /// Project root; relative paths in the config resolve against it.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Config file (defaults to `tracker.toml` under the root).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the plan document from the template.
    Start {
        /// Template to start from instead of the configured one.
        #[arg(long)]
        template: Option<PathBuf>,
        /// Replace an existing plan (it is snapshotted first).
        #[arg(short, long)]
        force: bool,
    },
    /// Show the current phase, step, and overall progress.
    Progress,
    /// Show where work resumes (same report as `progress`).
    Resume,
    /// Print the next pending step.
    Next,
    /// Mark a step done.
    Complete {
        id: String,
        /// Extra history metadata.
        #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_meta)]
        meta: Vec<(String, MetaValue)>,
    },
    /// Mark a manual step done after confirmation, then snapshot the plan.
    Confirm {
        id: String,
        /// Who confirmed the step.
        #[arg(long, default_value = "user")]
        by: String,
        #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_meta)]
        meta: Vec<(String, MetaValue)>,
    },
    /// Run a scripted step through the configured hook and mark it done.
    RunStep { id: String },
    /// Copy the current plan into the backup directory.
    Snapshot,
    /// List snapshots, oldest first.
    Snapshots,
    /// Replace the current plan with a snapshot.
    Restore { path: PathBuf },
    /// Print the completion history, oldest first.
    History,
    /// Check config, template, and plan document.
    Validate,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let config = resolve_config(&cli)?;
    let store = PlanStore::new(&config);

    match cli.command {
        Command::Start { template, force } => {
            let template = template.unwrap_or_else(|| config.template_path.clone());
            let outcome = start_plan(&store, &template, force)?;
            if let Some(backup) = &outcome.replaced_backup {
                println!("previous plan saved to {}", backup.display());
            }
            println!(
                "started {} at phase {}, step {}",
                outcome.project,
                outcome.current_phase,
                outcome.current_step.as_deref().unwrap_or("-")
            );
        }
        Command::Progress | Command::Resume => print_progress(&progress_from_store(&store)?),
        Command::Next => match next_from_store(&store)? {
            NextPending::Step(step) => println!("{}\t{}", step.step_id, step.title),
            NextPending::NoPendingWork => {
                println!("no pending work");
                return Ok(exit_codes::COMPLETE);
            }
        },
        Command::Complete { id, meta } => {
            let outcome = complete_step(&store, &id, meta.into_iter().collect())?;
            print_completion(&outcome);
        }
        Command::Confirm { id, by, meta } => {
            let outcome = confirm_step(&store, &id, &by, meta.into_iter().collect())?;
            print_completion(&outcome.step);
            println!("snapshot {}", outcome.backup.display());
        }
        Command::RunStep { id } => {
            let hook = hook_from_config(&config.hook);
            let scripted = ScriptedStepConfig {
                workdir: cli.root.clone(),
                timeout: config.hook_timeout(),
            };
            let outcome = run_scripted_step(&store, hook.as_ref(), &id, &scripted)?;
            print_completion(&outcome);
        }
        Command::Snapshot => {
            let path = store.snapshot()?;
            println!("{}", path.display());
        }
        Command::Snapshots => {
            for path in list_snapshots(store.backup_dir(), store.io_timeout())? {
                println!("{}", path.display());
            }
        }
        Command::Restore { path } => {
            let outcome = restore(&store, &path)
                .with_context(|| format!("restore {}", path.display()))?;
            if let Some(backup) = &outcome.previous_backup {
                println!("previous plan saved to {}", backup.display());
            }
            println!("restored {}", outcome.restored_from.display());
        }
        Command::History => {
            for entry in history_from_store(&store)? {
                let mut line = format!(
                    "{}\t{}\t{}",
                    entry.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
                    entry.step,
                    entry.status
                );
                for (key, value) in &entry.meta {
                    line.push_str(&format!("\t{key}={value}"));
                }
                println!("{line}");
            }
        }
        Command::Validate => {
            let outcome = validate_tracker(&config)?;
            if let Some(template) = &outcome.template {
                println!("template ok: {}", template.display());
            }
            match outcome.plan {
                PlanValidation::NotStarted => println!("plan not started"),
                PlanValidation::Ok {
                    project,
                    steps_done,
                    steps_total,
                } => println!("plan ok: {project} ({steps_done}/{steps_total} steps done)"),
            }
        }
    }
    Ok(exit_codes::OK)
}

fn resolve_config(cli: &Cli) -> Result<TrackerConfig> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.root.join(DEFAULT_CONFIG_FILE));
    let config = load_config(&path).with_context(|| format!("load config {}", path.display()))?;
    Ok(config.resolve(&cli.root))
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<TrackerError>() {
        Some(TrackerError::NotInitialized { .. }) => exit_codes::NOT_INITIALIZED,
        _ => exit_codes::INVALID,
    }
}

/// Parse a `--meta KEY=VALUE` argument.
fn parse_meta(raw: &str) -> Result<(String, MetaValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty metadata key in '{raw}'"));
    }
    Ok((key.to_string(), MetaValue::parse(value)))
}

fn print_progress(progress: &Progress) {
    println!("{} {} [{}]", progress.project, progress.version, progress.status);
    println!(
        "phase {}: {} [{}]",
        progress.phase.id, progress.phase.title, progress.phase.status
    );
    match &progress.step {
        Some(step) => println!("step {}: {} [{}]", step.id, step.title, step.status),
        None => println!("step -"),
    }
    println!("{}/{} steps done", progress.steps_done, progress.steps_total);
}

fn print_completion(outcome: &StepOutcome) {
    let summary = &outcome.summary;
    println!("completed {}", summary.step_id);
    if summary.plan_done {
        println!("plan complete");
        return;
    }
    if summary.phase_completed {
        println!("phase {} complete", summary.phase_id);
    }
    if let Some(step) = &summary.current_step {
        println!("next {step}");
    }
}
