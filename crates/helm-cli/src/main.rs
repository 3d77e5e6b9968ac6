mod scenario;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use helm_bind::BindingConfig;
use scenario::{Replay, Scenario};

#[derive(Debug, Parser)]
#[command(name = "helm", version, about = "helm - scripted fly-by-wire binding replay")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the config and scenario.
    Doctor,
    /// Replay the scenario against the simulated host, printing each control frame.
    Run,
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    #[serde(default)]
    binding: BindingConfig,
    scenario: Scenario,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read config {}", path))?;
    toml::from_str(&s).context("parse config toml")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Run => run(&cfg).await?,
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");
    helm_bind::doctor::check_config(&cfg.binding)?;
    cfg.scenario.check()?;
    info!(
        "doctor: OK ({} vessels, {} steps)",
        cfg.scenario.vessels.len(),
        cfg.scenario.steps.len()
    );
    Ok(())
}

async fn run(cfg: &Config) -> Result<()> {
    doctor(cfg).context("config check")?;
    info!("run: starting");

    let mut replay = Replay::new(cfg.binding.clone(), &cfg.scenario);
    replay.attach();

    let mut pace = cfg
        .scenario
        .rate_hz
        .map(|hz| tokio::time::interval(std::time::Duration::from_secs_f32(1.0 / hz)));

    for (i, step) in cfg.scenario.steps.iter().enumerate() {
        if let Some(iv) = pace.as_mut() {
            iv.tick().await;
        }
        if let Err(e) = replay.apply(step) {
            warn!("run: step {} ({:?}) failed: {}", i, step, e);
            println!("step {}: error: {}", i, e);
        }
    }

    replay.finish();
    info!("run: done");
    Ok(())
}
