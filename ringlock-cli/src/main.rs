// ABOUTME: Command-line driver that runs a ring configuration and reports the outcome.
// ABOUTME: Logs the agent event stream and can verify run properties from the trace.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info};

use ringlock::prelude::*;

/// Run agents over a ring of shared resources behind a bounded admission gate.
#[derive(Parser, Debug)]
#[command(name = "ringlock")]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON config file supplying base values (flags override it)
    #[arg(short, long, env = "RINGLOCK_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of agents, and of resources in the ring (N)
    #[arg(short = 'n', long, env = "RINGLOCK_AGENTS")]
    agents: Option<usize>,

    /// Maximum agents admitted at once (K, must be below N)
    #[arg(short = 'k', long, env = "RINGLOCK_CAPACITY")]
    capacity: Option<usize>,

    /// Work cycles per agent (M)
    #[arg(short = 'm', long, env = "RINGLOCK_QUOTA")]
    quota: Option<usize>,

    /// Arbiter backend
    #[arg(long, env = "RINGLOCK_ARBITER", value_enum)]
    arbiter: Option<ArbiterArg>,

    /// Order in which each agent takes its two resources
    #[arg(long, env = "RINGLOCK_ACQUIRE_ORDER", value_enum)]
    acquire_order: Option<OrderArg>,

    /// Repeat the same configuration this many times
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    runs: u32,

    /// Print each run report as JSON
    #[arg(long)]
    json: bool,

    /// Record every event and fail if a run property is violated
    #[arg(long)]
    verify: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RINGLOCK_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ArbiterArg {
    Gate,
    Host,
}

impl From<ArbiterArg> for ArbiterKind {
    fn from(arg: ArbiterArg) -> Self {
        match arg {
            ArbiterArg::Gate => ArbiterKind::Gate,
            ArbiterArg::Host => ArbiterKind::Host,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OrderArg {
    LeftFirst,
    RightFirst,
}

impl From<OrderArg> for AcquireOrder {
    fn from(arg: OrderArg) -> Self {
        match arg {
            OrderArg::LeftFirst => AcquireOrder::LeftFirst,
            OrderArg::RightFirst => AcquireOrder::RightFirst,
        }
    }
}

/// Merge the config file (if any) with explicit flags and validate the result.
fn resolve_config(cli: &Cli) -> Result<RingConfig> {
    let mut config = match &cli.config {
        Some(path) => RingConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RingConfig::default(),
    };

    if let Some(agents) = cli.agents {
        config.ring_size = agents;
    }
    if let Some(capacity) = cli.capacity {
        config.capacity = capacity;
    }
    if let Some(quota) = cli.quota {
        config.quota = quota;
    }
    if let Some(arbiter) = cli.arbiter {
        config.arbiter = arbiter.into();
    }
    if let Some(order) = cli.acquire_order {
        config.acquire_order = order.into();
    }

    config.validate().context("Invalid ring configuration")?;
    Ok(config)
}

fn print_report(run: u32, report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "run {}: {} cycles across {} agents, peak admitted {}/{}, {:.2?}",
        run,
        report.total_cycles,
        report.agents.len(),
        report.peak_admitted,
        report.config.capacity,
        report.elapsed
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let config = resolve_config(&cli)?;
    let recorder = EventRecorder::new();
    let mut hooks = HookRegistry::new();
    hooks.register(TracingHook);
    if cli.verify {
        hooks.register(recorder.clone());
    }
    let coordinator = Coordinator::new(config.clone())?.with_hooks(hooks);

    let mut violations = 0usize;
    for run in 1..=cli.runs {
        recorder.clear();
        let report = coordinator
            .run()
            .await
            .with_context(|| format!("Run {} failed", run))?;
        print_report(run, &report, cli.json)?;

        if cli.verify {
            let found = recorder.trace().violations(&config);
            for violation in &found {
                error!(run, %violation, "property violated");
            }
            violations += found.len();
        }
    }

    if violations > 0 {
        anyhow::bail!("{} property violations across {} runs", violations, cli.runs);
    }
    if cli.verify {
        info!(runs = cli.runs, "all run properties held");
    }

    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}
