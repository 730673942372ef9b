mod report;

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use linkpulse_client::quark::DEFAULT_QUARK_API_BASE;
use linkpulse_client::{ProbeConfig, default_registry};
use linkpulse_core::circuit_breaker::BreakerConfig;
use linkpulse_core::models::SourceSpec;
use linkpulse_core::pacer::FixedDelayPacer;
use linkpulse_core::scheduler::SchedulerConfig;
use linkpulse_core::{RunConfig, RunOrchestrator, TracingRunReporter};
use linkpulse_db::{Store, StoreConfig};

#[derive(Parser)]
#[command(name = "linkpulse", version, about = "Cloud-drive share link liveness checker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the stalest links of the configured sources and write back verdicts
    Run(RunArgs),

    /// Probe a single share URL and print the verdict
    Check {
        /// Share URL to probe
        url: String,

        #[command(flatten)]
        probe: ProbeArgs,
    },
}

#[derive(Args)]
struct ProbeArgs {
    /// Timeout for every provider request, in seconds
    #[arg(long, env = "LINKPULSE_PROBE_TIMEOUT_SECS", default_value_t = 10)]
    probe_timeout_secs: u64,

    /// Quark share API base URL
    #[arg(long, env = "LINKPULSE_QUARK_API_BASE", default_value = DEFAULT_QUARK_API_BASE, hide = true)]
    quark_api_base: String,
}

impl ProbeArgs {
    fn config(&self) -> ProbeConfig {
        ProbeConfig {
            timeout: Duration::from_secs(self.probe_timeout_secs),
            quark_api_base: self.quark_api_base.clone(),
        }
    }
}

#[derive(Args)]
struct RunArgs {
    /// Record source: `table` or `table:url_col,status_col,checked_col` (repeatable)
    #[arg(
        long = "source",
        env = "LINKPULSE_SOURCES",
        value_delimiter = ';',
        default_value = "links"
    )]
    sources: Vec<SourceSpec>,

    /// Maximum number of links checked per run
    #[arg(long, env = "LINKPULSE_RUN_CAP", default_value_t = 500)]
    run_cap: usize,

    /// Links probed concurrently in one wave
    #[arg(long, env = "LINKPULSE_WAVE_SIZE", default_value_t = 20)]
    wave_size: usize,

    /// Pause between waves, in milliseconds
    #[arg(long, env = "LINKPULSE_WAVE_DELAY_MS", default_value_t = 500)]
    wave_delay_ms: u64,

    /// Random extra pause between waves, up to this many milliseconds
    #[arg(long, env = "LINKPULSE_WAVE_JITTER_MS", default_value_t = 0)]
    wave_jitter_ms: u64,

    /// Consecutive inconclusive results that suspend a provider for the run
    #[arg(long, env = "LINKPULSE_TRIP_THRESHOLD", default_value_t = 10)]
    trip_threshold: u32,

    /// Records requested per page from a source
    #[arg(long, env = "LINKPULSE_PAGE_SIZE", default_value_t = 1000)]
    page_size: usize,

    /// Do not count "provider not supported" results toward a provider trip
    #[arg(long, default_value_t = false)]
    skip_unsupported_in_breaker: bool,

    /// Write a per-link CSV report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Probe links without writing results back
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    #[command(flatten)]
    probe: ProbeArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("linkpulse=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Check { url, probe } => cmd_check(&url, &probe).await,
    }
}

async fn cmd_run(args: RunArgs) -> Result<()> {
    if args.run_cap == 0 || args.wave_size == 0 || args.page_size == 0 {
        bail!("--run-cap, --wave-size and --page-size must be at least 1");
    }
    if args.trip_threshold == 0 {
        bail!("--trip-threshold must be at least 1");
    }
    ensure_unique_sources(&args.sources)?;

    // Configuration is validated completely before anything touches the network.
    let store_config = StoreConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let store = Store::connect(&store_config).map_err(|e| anyhow::anyhow!(e))?;
    let sources = store
        .sources(&args.sources)
        .map_err(|e| anyhow::anyhow!(e))?;
    let registry = default_registry(&args.probe.config()).map_err(|e| anyhow::anyhow!(e))?;
    tracing::info!(
        store = ?store.kind(),
        sources = sources.len(),
        providers = ?registry.provider_names().collect::<Vec<_>>(),
        "Configuration loaded"
    );

    let pacer = FixedDelayPacer::new(Duration::from_millis(args.wave_delay_ms))
        .with_jitter(Duration::from_millis(args.wave_jitter_ms));

    let config = RunConfig::default()
        .with_scheduler(SchedulerConfig {
            run_cap: args.run_cap,
            page_size: args.page_size,
            wave_size: args.wave_size,
        })
        .with_breaker(BreakerConfig {
            trip_threshold: args.trip_threshold,
            count_unsupported: !args.skip_unsupported_in_breaker,
        })
        .with_dry_run(args.dry_run);

    if args.dry_run {
        tracing::info!("Dry run: results will not be written back");
    }

    let orchestrator = RunOrchestrator::new(sources, registry, pacer, config);
    let summary = match orchestrator.run(&TracingRunReporter).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!(error = %e, "Run aborted");
            return Err(anyhow::anyhow!(e));
        }
    };

    print!("{}", report::render_summary(&summary));

    if let Some(path) = &args.report {
        report::write_csv(&summary, path)?;
    }

    Ok(())
}

/// Write-backs are routed by table name, so each table may be listed once.
fn ensure_unique_sources(specs: &[SourceSpec]) -> Result<()> {
    let mut seen = HashSet::new();
    for spec in specs {
        if !seen.insert(spec.name.as_str()) {
            bail!("--source '{}' is given more than once", spec.name);
        }
    }
    Ok(())
}

async fn cmd_check(url: &str, probe: &ProbeArgs) -> Result<()> {
    let registry = default_registry(&probe.config())
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to build provider table")?;

    let (provider, result) = registry.check(url).await;

    println!("url:      {url}");
    println!("provider: {}", provider.as_deref().unwrap_or("-"));
    println!("verdict:  {}", result.verdict);
    println!("reason:   {}", result.reason);

    Ok(())
}
