//! `motum` – run motion requests against the simulated robot.
//!
//! ```bash
//! # List the registered constraint and monitor kinds with their parameters
//! motum kinds
//!
//! # Execute one motion request and keep its tick history
//! motum run reach.json --history reach-report.json
//!
//! # Hold each tick to the sample period of wall-clock time
//! motum run reach.json --realtime
//!
//! # Write the default configuration to ~/.motum/config.toml
//! motum config init
//! ```
//!
//! **Ctrl-C** during `run` cancels the episode: the robot is stopped and the
//! report still records every tick executed so far.

mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use motum_goals::GoalCompiler;
use motum_hal::{
    DampedLeastSquares, JointStateSlot, KinematicModel, SimProbe, SimProximity, SimRobot,
    SimRobotDescription, SimWorld,
};
use motum_runtime::{CancelToken, Collaborators, ControlLoop, EpisodeContext, init_tracing};
use motum_types::{EpisodeOutcome, EpisodeReport, MotionRequest};
use tracing::warn;

#[derive(Parser, Debug)]
#[command(name = "motum")]
#[command(about = "Whole-body motion controller for the simulated robot", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.motum/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a motion request (JSON) until it succeeds, fails, or is cancelled
    Run {
        /// Motion request file
        request: PathBuf,

        /// Write the episode report (with tick history) to this file
        #[arg(long)]
        history: Option<PathBuf>,

        /// Pace ticks to the sample period of wall-clock time
        #[arg(long)]
        realtime: bool,
    },

    /// List the registered constraint and monitor kinds
    Kinds,

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Write the default configuration to the config path
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let _tracer = init_tracing("motum");
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            request,
            history,
            realtime,
        } => run(cli.config.as_deref(), &request, history.as_deref(), realtime),
        Commands::Kinds => {
            print_kinds(&GoalCompiler::new());
            Ok(true)
        }
        Commands::Config(ConfigCommand::Show) => show_config(cli.config.as_deref()),
        Commands::Config(ConfigCommand::Init { force }) => init_config(cli.config.as_deref(), force),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            ExitCode::from(2)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// run
// ─────────────────────────────────────────────────────────────────────────────

/// `Ok(false)` when the episode ran and failed; `Err` when it never started.
fn run(config_path: Option<&Path>, request_path: &Path, history: Option<&Path>, realtime: bool) -> Result<bool, String> {
    let mut cfg = config::load_or_default(config_path)?;
    cfg.controller.realtime |= realtime;
    let request = load_request(request_path)?;
    let description = load_description(cfg.robot.description.as_deref())?;

    let world = Arc::new(SimWorld::new(description).map_err(|e| format!("Invalid robot description: {}", e))?);
    let probe = SimProbe::new();
    let feed = Arc::new(JointStateSlot::new());
    let collaborators = Collaborators {
        model: world.clone() as Arc<dyn KinematicModel>,
        proximity: SimProximity::new(world.clone(), probe.clone()),
        solver: DampedLeastSquares::new(cfg.robot.damping),
        robot: SimRobot::new(world.clone(), feed.clone(), cfg.controller.sample_period, probe),
        feed,
    };

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || on_interrupt.cancel()) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the episode cannot be interrupted");
    }

    println!(
        "  {} {} ({} constraint spec(s), {} monitor(s))",
        "Running".bold().cyan(),
        request_path.display(),
        request.constraints.len(),
        request.monitors.len()
    );

    let ctx = EpisodeContext::new(collaborators, Arc::new(GoalCompiler::new()), request, cfg.controller)
        .with_cancel_token(cancel);
    let report = execute(ControlLoop::new(ctx))?;

    print_report(&report);
    if let Some(path) = history {
        write_report(&report, path)?;
        println!("  Report written to {}", path.display().to_string().bold());
    }
    Ok(report.outcome.is_success())
}

fn execute(control: ControlLoop) -> Result<EpisodeReport, String> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start runtime: {}", e))?;
    runtime
        .block_on(control.spawn())
        .map_err(|e| format!("Episode task aborted: {}", e))
}

fn load_request(path: &Path) -> Result<MotionRequest, String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read request at {}: {}", path.display(), e))?;
    serde_json::from_str(&raw).map_err(|e| format!("Failed to parse request: {}", e))
}

/// `.toml` files are read as TOML, everything else as JSON.
fn load_description(path: Option<&Path>) -> Result<SimRobotDescription, String> {
    let Some(path) = path else {
        return Ok(SimRobotDescription::planar_arm());
    };
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read robot description at {}: {}", path.display(), e))?;
    if path.extension().is_some_and(|ext| ext == "toml") {
        toml::from_str(&raw).map_err(|e| format!("Failed to parse robot description: {}", e))
    } else {
        serde_json::from_str(&raw).map_err(|e| format!("Failed to parse robot description: {}", e))
    }
}

fn write_report(report: &EpisodeReport, path: &Path) -> Result<(), String> {
    let raw = serde_json::to_string_pretty(report).map_err(|e| format!("Failed to serialize report: {}", e))?;
    std::fs::write(path, raw).map_err(|e| format!("Failed to write report at {}: {}", path.display(), e))
}

fn print_report(report: &EpisodeReport) {
    println!();
    match &report.outcome {
        EpisodeOutcome::Success => println!("  {} {}", "✓".green().bold(), "Goal reached".bold()),
        EpisodeOutcome::Failure(e) => println!("  {} {} (code {})", "✗".red().bold(), e.to_string().bold(), e.code()),
    }
    let seconds = (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0;
    println!(
        "  {} tick(s) in {:.2}s wall time, {} sensor timeout(s)",
        report.ticks_executed, seconds, report.sensor_timeouts
    );
    for task in &report.tasks {
        println!("    {:<48} {}", task.name, format!("{:?}", task.final_state).dimmed());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// kinds
// ─────────────────────────────────────────────────────────────────────────────

fn print_kinds(compiler: &GoalCompiler) {
    println!("{}", "Constraint kinds".bold().cyan());
    for (name, kind) in compiler.constraint_kinds().iter() {
        println!("  {}", name.bold());
        println!("    {}", (kind.usage)().dimmed());
    }
    println!();
    println!("{}", "Monitor kinds".bold().cyan());
    for (name, kind) in compiler.monitor_kinds().iter() {
        println!("  {}", name.bold());
        println!("    {}", (kind.usage)().dimmed());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// config
// ─────────────────────────────────────────────────────────────────────────────

fn show_config(path: Option<&Path>) -> Result<bool, String> {
    let cfg = config::load_or_default(path)?;
    let raw = toml::to_string_pretty(&cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    println!("{}", raw);
    Ok(true)
}

fn init_config(path: Option<&Path>, force: bool) -> Result<bool, String> {
    let path = path.map_or_else(config::config_path, Path::to_path_buf);
    if path.exists() && !force {
        println!(
            "  {} already exists; pass {} to replace it",
            path.display().to_string().bold(),
            "--force".bold()
        );
        return Ok(false);
    }
    config::save_to(&config::Config::default(), &path)?;
    println!(
        "  {} Config saved to {}",
        "✓".green().bold(),
        path.display().to_string().bold()
    );
    Ok(true)
}
