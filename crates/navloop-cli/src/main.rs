//! `navloop` – runs the reactive navigation loop against the simulated robot.
//!
//! 1. Initialises tracing (`RUST_LOG`, `NAVLOOP_LOG_FORMAT`, optional OTLP).
//! 2. Loads and validates `~/.navloop/config.toml` (or `$NAVLOOP_CONFIG`);
//!    any configuration error aborts before the loop starts.
//! 3. Installs a Ctrl-C handler that asks the loop to stop after the current
//!    cycle.  The robot is always sent `Stop` on the way out.
//! 4. Prints the average per-cycle latency when the loop ends and exits
//!    non-zero if the decision function failed.

mod config;

use std::fs;

use colored::Colorize;
use navloop_runtime::{
    ControlLoop, CycleObserver, CycleReport, LoopStats, ShutdownSignal, TracingObserver,
    TrajectoryRecorder, builtin_policy, init_tracing,
};
use navloop_types::NavError;
use tracing::{info, warn};

fn main() {
    let code = run();
    std::process::exit(code);
}

fn run() -> i32 {
    // Held until `run` returns so pending spans are flushed before exit.
    let _tracing = init_tracing("navloop");

    print_banner();

    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {e}", "Config error".red().bold());
            eprintln!("  (read from {})", config::config_path().display());
            return 2;
        }
    };
    info!(config = ?cfg, "configuration loaded");

    let policy = match builtin_policy(&cfg.policy, cfg.time_step) {
        Ok(policy) => policy,
        Err(e) => {
            eprintln!("{}: {e}", "Config error".red().bold());
            return 2;
        }
    };

    // ── Shutdown ──────────────────────────────────────────────────────────
    let shutdown = ShutdownSignal::new();
    let shutdown_ctrlc = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!(
            "{}",
            "⚠  Ctrl-C received – stopping after the current cycle …".yellow().bold()
        );
        shutdown_ctrlc.trigger();
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; the loop can only end on error");
    }

    // ── Wiring ────────────────────────────────────────────────────────────
    let world = cfg.sim_world();
    let mut control = ControlLoop::new(
        cfg.loop_config(),
        Box::new(world.lidar()),
        policy,
        Box::new(world.drive_base()),
    )
    .with_observer(Box::new(TracingObserver));
    let recorder = trajectory_recorder(cfg.trajectory_file.is_some());
    if let Some(recorder) = &recorder {
        control = control.with_observer(Box::new(recorder.clone()));
    }
    if let Some(limit) = cfg.max_cycles {
        control = control.with_observer(Box::new(CycleLimit {
            remaining: limit,
            shutdown: shutdown.clone(),
        }));
    }

    println!(
        "  Driving with policy {} towards ({:.2}, {:.2}). Press {} to stop.\n",
        cfg.policy.bold(),
        cfg.goal_x,
        cfg.goal_y,
        "Ctrl-C".bold()
    );

    let result = control.run(&shutdown);

    let final_pose = world.pose();
    info!(
        x = final_pose.x,
        y = final_pose.y,
        yaw = final_pose.yaw,
        "final robot pose"
    );
    if let (Some(path), Some(recorder)) = (&cfg.trajectory_file, &recorder) {
        if let Err(e) = write_trajectory(path, recorder) {
            warn!(error = %e, path = %path.display(), "failed to write trajectory");
        }
    }

    match result {
        Ok(stats) => {
            print_report(&stats);
            0
        }
        Err(e) => {
            eprintln!("{}: {e}", "Fatal".red().bold());
            eprintln!("  {}", "Robot stopped.".yellow());
            1
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cycle limit
// ─────────────────────────────────────────────────────────────────────────────

/// Requests shutdown once a fixed number of cycles have been processed.
struct CycleLimit {
    remaining: u64,
    shutdown: ShutdownSignal,
}

impl CycleObserver for CycleLimit {
    fn on_cycle(&mut self, _report: &CycleReport) {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.shutdown.trigger();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

/// A recorder exists only when a trajectory file will be written.
fn trajectory_recorder(enabled: bool) -> Option<TrajectoryRecorder> {
    enabled.then(TrajectoryRecorder::new)
}

fn write_trajectory(path: &std::path::Path, recorder: &TrajectoryRecorder) -> Result<(), NavError> {
    let json = serde_json::to_string_pretty(&recorder.samples())
        .map_err(|e| NavError::Config(format!("failed to serialise trajectory: {e}")))?;
    fs::write(path, json)
        .map_err(|e| NavError::Config(format!("failed to write {}: {e}", path.display())))?;
    println!("  Trajectory written to {}", path.display().to_string().bold());
    Ok(())
}

fn print_report(stats: &LoopStats) {
    println!();
    match stats.average_latency() {
        Some(avg) => println!(
            "  Average took {} sec per iteration, {} frames",
            format!("{:.6}", avg.as_secs_f64()).bold(),
            stats.cycles.to_string().bold()
        ),
        None => println!("  {}", "No frames were processed.".dimmed()),
    }
    if stats.dropped_polls > 0 {
        println!(
            "  {} polls returned no sensor data",
            stats.dropped_polls.to_string().yellow()
        );
    }
    println!(
        "  Run started {}",
        stats
            .started_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
}

fn print_banner() {
    println!();
    println!("  {} {}", "navloop".bold().cyan(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!("  Reactive local navigation loop");
    println!();
}
