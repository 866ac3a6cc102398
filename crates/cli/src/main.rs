//! `worlds`: terminal front end for the Parallel Worlds engine.

mod explore;
mod generate;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use worlds_engine::scheduler::SystemClock;
use worlds_engine::time::format_time;
use worlds_engine::timeline::stay_direction;
use worlds_engine::{DECISION_POINT, Direction, Navigator, SessionConfig, TIMELINES, adjacent};

#[derive(Parser)]
#[command(name = "worlds")]
#[command(about = "Navigate and generate the Parallel Worlds timelines")]
#[command(version)]
struct Cli {
    /// Session config file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the timelines and where each direction leads
    Timelines,

    /// Apply a sequence of moves and print the resulting memory map
    Walk {
        /// Directions: north/east/south/west, n/e/s/w, or up/right/down/left
        directions: Vec<Direction>,
    },

    /// Drive a simulated session from stdin
    Explore {
        /// Length of every simulated video in seconds
        #[arg(long, default_value = "15")]
        duration: f64,
    },

    /// Start video generations for one or all timelines
    Generate(generate::GenerateArgs),

    /// Show the state of a generation
    Status {
        /// Generation id returned by `generate`
        id: String,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Timelines => write_timelines(&mut std::io::stdout().lock())?,
        Commands::Walk { directions } => walk(load_config(cli.config.as_deref())?, &directions)?,
        Commands::Explore { duration } => {
            let config = load_config(cli.config.as_deref())?;
            let stdin = std::io::stdin();
            explore::run(config, duration, stdin.lock(), std::io::stdout())?;
        }
        Commands::Generate(args) => generate::run(args)?,
        Commands::Status { id } => generate::status(&id)?,
    }

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<SessionConfig> {
    match path {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(SessionConfig::default()),
    }
}

fn write_timelines(output: &mut impl Write) -> Result<()> {
    writeln!(
        output,
        "{} {}",
        format_time(DECISION_POINT.timestamp),
        DECISION_POINT.description
    )?;
    for timeline in &TIMELINES {
        writeln!(
            output,
            "{:<8} {:<14} {:<6} {} {}",
            timeline.id,
            timeline.name,
            timeline.position,
            format_time(timeline.duration),
            timeline.description
        )?;
        let moves: Vec<String> = Direction::ALL
            .into_iter()
            .map(|direction| format!("{direction} -> {}", adjacent(timeline.id, direction)))
            .collect();
        writeln!(
            output,
            "         {} (stays on {})",
            moves.join(", "),
            stay_direction(timeline.id)
        )?;
    }
    Ok(())
}

fn walk(config: SessionConfig, directions: &[Direction]) -> Result<()> {
    let mut navigator = Navigator::new(config.initial_timeline, Rc::new(SystemClock));
    println!("start at {}", navigator.active());

    for direction in directions {
        match navigator.navigate_direction(*direction) {
            Some(event) => println!("{direction}: {} -> {}", event.from, event.to),
            None => println!("{direction}: stay on {}", navigator.active()),
        }
    }

    let memory_map = serde_json::to_string_pretty(navigator.memory_map())
        .context("Failed to encode memory map")?;
    println!("{memory_map}");
    Ok(())
}
