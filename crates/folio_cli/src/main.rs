//! Folio CLI
//!
//! Validate scroll-trigger scene files and simulate them headlessly.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use folio_trigger::SceneConfig;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod simulate;

use simulate::{SimulateOptions, SimulationFile};

#[derive(Parser)]
#[command(name = "folio")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Folio scroll-trigger scene tools", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a scene file and summarize its triggers
    Check {
        /// Scene file (TOML)
        scene: PathBuf,
    },

    /// Scroll through a scene headlessly and report what fires
    Simulate {
        /// Scene file (TOML), optionally with a [layout] table
        scene: PathBuf,

        /// Number of frames to run
        #[arg(short, long, default_value = "600")]
        frames: u32,

        /// Seconds per frame
        #[arg(long, default_value = "0.016666668")]
        dt: f32,

        /// Drag speed in pixels per second
        #[arg(short, long, default_value = "400")]
        speed: f32,

        /// Close each modal as soon as it opens
        #[arg(long)]
        close_modals: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Check { scene } => cmd_check(&scene),

        Commands::Simulate {
            scene,
            frames,
            dt,
            speed,
            close_modals,
        } => cmd_simulate(
            &scene,
            SimulateOptions {
                frames,
                dt,
                speed,
                close_modals,
            },
        ),
    }
}

fn cmd_check(path: &Path) -> Result<()> {
    let scene = SceneConfig::load(path)
        .with_context(|| format!("Scene {} is invalid", path.display()))?;

    info!(
        "Scene {} is valid ({} triggers)",
        scene.name.as_deref().unwrap_or("<unnamed>"),
        scene.triggers.len()
    );

    for trigger in &scene.triggers {
        let config = &trigger.config;
        let sequence = trigger.sequence.as_ref().map(|s| s.to_sequence());
        println!("{}", trigger.name);
        println!(
            "  axis: {:?}, tolerance: {}, fire: {:?}, evaluation: {:?}",
            config.axis,
            config.tolerance().fraction(),
            config.fire_mode,
            config.evaluation
        );
        println!(
            "  lock scroll: {}, unlock: {:?}, unlock on cancel: {}",
            config.lock_scroll, config.unlock, config.unlock_on_cancel
        );
        match sequence {
            Some(sequence) => println!(
                "  sequence: {} steps, {:.2}s",
                sequence.steps().len(),
                sequence.total_duration()
            ),
            None => println!("  sequence: none"),
        }
        if let Some(modal) = &config.modal {
            println!("  modal: {modal}");
        }
        if let Some(cue) = &config.audio_cue {
            println!("  audio cue: {cue}");
        }
    }

    Ok(())
}

fn cmd_simulate(path: &Path, options: SimulateOptions) -> Result<()> {
    if !(options.dt.is_finite() && options.dt > 0.0) {
        anyhow::bail!("--dt must be a positive number of seconds");
    }

    let file = SimulationFile::load(path)?;
    info!(
        "Simulating {} frames of {:.4}s at {} px/s",
        options.frames, options.dt, options.speed
    );

    let report = simulate::run(&file, &options)?;

    println!("Fired:");
    let mut any = false;
    for (frame, trigger) in report.fired() {
        any = true;
        println!("  frame {frame:>5}  t={:>7.3}s  {trigger}", frame as f32 * options.dt);
    }
    if !any {
        println!("  (nothing)");
    }
    println!("Final offset: {:.1}px", report.final_offset);
    println!(
        "Scroll: {}",
        if report.scroll_locked { "locked" } else { "free" }
    );
    if !report.modals.is_empty() {
        let modals: Vec<String> = report.modals.iter().map(ToString::to_string).collect();
        println!("Modals shown: {}", modals.join(", "));
    }

    Ok(())
}
