//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Options left unset fall back to the
//! configuration file, then to built-in defaults.

use crate::llm::Provider;
use clap::Parser;
use std::path::PathBuf;

/// qol-history - LLM-sampled historical quality of life, per region and century
///
/// Asks a language model to score six quality-of-life categories for every
/// century from 1000 BCE to today, repeats the question many times per
/// region, and writes mean/percentile statistics to a CSV file.
///
/// Examples:
///   qol-history --regions-file regions.json --output data/stats.csv
///   qol-history --region Egypt --region "Ancient Greece" --repeats 5
///   qol-history --provider ollama --model llama3.2:latest --region Egypt
///   qol-history --regions-file regions.json --dry-run
///   qol-history --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Region to estimate (repeatable)
    ///
    /// Overrides the registry file and config file region lists.
    #[arg(short, long = "region", value_name = "NAME")]
    pub regions: Vec<String>,

    /// JSON region registry: a list of {"region", "countries", "context"?}
    #[arg(long, value_name = "FILE")]
    pub regions_file: Option<PathBuf>,

    /// Independent replies requested per region
    #[arg(short = 'n', long, value_name = "COUNT")]
    pub repeats: Option<usize>,

    /// Model identifier
    ///
    /// Can also be set via QOL_MODEL env var or .qolhistory.toml config.
    #[arg(short, long, env = "QOL_MODEL")]
    pub model: Option<String>,

    /// Text-generation provider
    #[arg(long, value_name = "PROVIDER")]
    pub provider: Option<Provider>,

    /// Service base URL
    #[arg(long, value_name = "URL", env = "QOL_BASE_URL")]
    pub base_url: Option<String>,

    /// Temperature for LLM responses (0.0 - 2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Retries per sample on network or service failure
    ///
    /// Malformed replies are never retried; they are dropped.
    #[arg(long, value_name = "COUNT")]
    pub retries: Option<usize>,

    /// Number of regions sampled concurrently
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Aggregated CSV output path
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Write per-period model summaries as JSON
    #[arg(long, value_name = "FILE")]
    pub summaries: Option<PathBuf>,

    /// Save every raw reply under this directory
    #[arg(long, value_name = "DIR")]
    pub raw_dir: Option<PathBuf>,

    /// Write a run report (sample accounting, rejections)
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Run report format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: ReportFormat,

    /// Continue past regions with no usable samples (exit code 2)
    #[arg(long)]
    pub skip_failed_regions: bool,

    /// Print each rendered prompt before it is sent
    #[arg(long)]
    pub debug_prompt: bool,

    /// Print the prompts that would be sent, without calling the model
    #[arg(long)]
    pub dry_run: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .qolhistory.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .qolhistory.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref base_url) = self.base_url {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err("Base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 2.0".to_string());
            }
        }

        if self.repeats == Some(0) {
            return Err("Repeats must be at least 1".to_string());
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.regions.iter().any(|r| r.trim().is_empty()) {
            return Err("Region names must not be empty".to_string());
        }

        if let Some(ref path) = self.regions_file {
            if !path.is_file() {
                return Err(format!(
                    "Region registry does not exist: {}",
                    path.display()
                ));
            }
        }

        Ok(())
    }
}
