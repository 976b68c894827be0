//! qol-history - LLM-sampled historical quality of life
//!
//! A CLI tool that asks a language model to score quality-of-life
//! categories for every century of a region's history, repeats the
//! question many times, and aggregates the replies into mean and
//! percentile statistics.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (configuration, connection, region with no usable samples)
//!   2 - Completed, but some regions were skipped (--skip-failed-regions)

mod analysis;
mod cli;
mod config;
mod error;
mod llm;
mod models;
mod regions;
mod report;
mod sampling;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use cli::{Args, ReportFormat};
use config::{Config, CONFIG_FILE};
use models::{RunMetadata, RunReport};
use regions::Region;
use sampling::RunContext;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so `[general] verbose` applies
    let (mut config, source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(config.log_level(args.quiet));

    info!("qol-history v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    source.log();

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .qolhistory.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set the model, repeat count and regions.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the sampling and aggregation pipeline. Returns exit code (0 or 2).
async fn run(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    let regions = resolve_regions(&args, &config)?;
    let mut ctx = RunContext::from_config(&config, regions);
    ctx.debug_prompt = args.debug_prompt;
    ctx.show_progress = !args.quiet;

    if args.dry_run {
        return handle_dry_run(&ctx);
    }

    println!("🤖 Sampling {} region(s)", ctx.regions.len());
    println!("   Model: {} ({:?})", config.model.name, config.model.provider);
    println!("   Endpoint: {}", config.model.effective_base_url());
    println!("   Samples per region: {}", ctx.repeats);
    println!("   Temperature: {}", config.model.temperature);

    let client = llm::ChatClient::new(config.model.client_config())?;
    let batch = sampling::run_batch(&client, &ctx).await;
    let complete = batch.ensure_complete(ctx.skip_failed_regions);

    let metadata = RunMetadata {
        generated_at: Utc::now(),
        model_used: config.model.name.clone(),
        repeats: ctx.repeats,
        regions: batch.regions.len(),
        records: batch.records.len(),
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };

    // Raw replies and the report are written even when the run fails, so
    // rejected samples can be inspected.
    if let Some(ref dir) = args.raw_dir {
        let written = report::write_raw_replies(&batch.regions, dir)?;
        info!("{} raw replies saved under {}", written, dir.display());
    }

    let summaries: Vec<_> = batch.regions.iter().map(|r| r.summary.clone()).collect();
    let run_report = RunReport {
        highlights: report::build_highlights(&batch.records, &summaries),
        metadata,
        regions: summaries,
    };

    if let Some(ref path) = args.report {
        let content = match args.format {
            ReportFormat::Json => report::generate_json_report(&run_report)?,
            ReportFormat::Markdown => report::generate_markdown_report(&run_report),
        };
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    complete?;

    let output = Path::new(&config.general.output);
    report::write_csv(&batch.records, output)?;

    if let Some(ref path) = args.summaries {
        report::write_summaries(&batch.regions, &run_report.metadata, path)?;
        info!("Summaries written to {}", path.display());
    }

    let (usable, requested) = run_report.totals();
    println!("\n📊 Run Summary:");
    println!("   Regions: {}", batch.regions.len());
    println!("   Usable samples: {}/{}", usable, requested);
    println!("   Records: {}", batch.records.len());
    println!("   Duration: {:.1}s", run_report.metadata.duration_seconds);
    println!("\n✅ Done! Statistics saved to: {}", output.display());

    let failed = batch.failed_regions();
    if !failed.is_empty() {
        eprintln!(
            "\n⛔ {} region(s) had no usable samples and were skipped: {} (exit code 2).",
            failed.len(),
            failed.join(", ")
        );
        return Ok(2);
    }

    Ok(0)
}

/// Handle --dry-run: print the prompts, make no calls.
fn handle_dry_run(ctx: &RunContext) -> Result<i32> {
    println!("\n🔍 Dry run: {} region(s), no model calls\n", ctx.regions.len());

    for region in &ctx.regions {
        println!("── {} ──", region.region);
        println!("{}", llm::build_prompt(&region.region, &region.context));
    }

    println!(
        "✅ Dry run complete. A real run would make {} calls.",
        ctx.regions.len() * ctx.repeats
    );
    Ok(0)
}

/// Where the configuration came from, logged once logging is set up.
enum ConfigSource {
    Explicit(PathBuf),
    DefaultFile,
    Builtin,
    Unreadable(anyhow::Error),
}

impl ConfigSource {
    fn log(&self) {
        match self {
            ConfigSource::Explicit(path) => info!("Loaded config from: {}", path.display()),
            ConfigSource::DefaultFile => info!("Loaded default config from {}", CONFIG_FILE),
            ConfigSource::Builtin => debug!("No config file found, using defaults"),
            ConfigSource::Unreadable(e) => warn!("Failed to load config: {}", e),
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigSource::Explicit(config_path.clone())));
    }

    // Try default location
    Ok(match Config::load_default() {
        Ok(Some(config)) => (config, ConfigSource::DefaultFile),
        Ok(None) => (Config::default(), ConfigSource::Builtin),
        Err(e) => (Config::default(), ConfigSource::Unreadable(e)),
    })
}

/// Pick the region list: --region flags, then the registry file, then the
/// config file's `[[regions]]`.
fn resolve_regions(args: &Args, config: &Config) -> Result<Vec<Region>> {
    let regions = if !args.regions.is_empty() {
        args.regions.iter().map(|r| Region::named(r.trim())).collect()
    } else if let Some(ref path) = config.general.regions_file {
        info!("Loading regions from: {}", path);
        regions::load_registry(Path::new(path))?
    } else {
        config.regions.clone()
    };

    if regions.is_empty() {
        bail!("No regions configured: use --region, --regions-file or [[regions]] in {}", CONFIG_FILE);
    }

    regions::check_regions(&regions)?;
    Ok(regions)
}
