//! `handoff-sim` replays a scripted sequence of SDK callbacks, user commands
//! and app lifecycle events against the cast coordinator, backed by the
//! in-memory transport and player, and prints every published event as one
//! JSON line.

mod script;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use handoff_core::config::{CoordinatorConfig, ResolvedConfig};
use tracing_subscriber::EnvFilter;

use crate::script::{ScriptRunner, parse_script};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "handoff-sim", version = VERSION)]
struct Args {
    /// Coordinator config file (TOML); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Script to replay (JSON array of steps)
    #[arg(long)]
    script: PathBuf,

    /// Override the position poll interval in milliseconds
    #[arg(long)]
    poll_ms: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let cfg = match args.config.as_ref() {
        Some(path) => CoordinatorConfig::load(path)?,
        None => CoordinatorConfig::default(),
    };
    let mut resolved = ResolvedConfig::from_config(&cfg)?;
    if let Some(ms) = args.poll_ms {
        if ms == 0 {
            return Err(anyhow::anyhow!("--poll-ms must be greater than 0"));
        }
        resolved.poll_interval = Duration::from_millis(ms);
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&resolved.log_filter)),
        )
        .init();

    let raw = std::fs::read_to_string(&args.script)
        .with_context(|| format!("read script {:?}", args.script))?;
    let steps = parse_script(&raw).with_context(|| format!("script {:?}", args.script))?;
    tracing::info!(steps = steps.len(), "sim: replaying script");

    let mut runner = ScriptRunner::new(resolved)?;
    for (index, step) in steps.into_iter().enumerate() {
        runner
            .apply(step)
            .with_context(|| format!("step {}", index + 1))?;
        for event in runner.drain_events() {
            println!("{}", serde_json::to_string(&event)?);
        }
    }
    Ok(())
}
