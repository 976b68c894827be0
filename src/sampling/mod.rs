//! Repeated sampling and the batch driver.
//!
//! Each region is queried `repeats` times. Every call yields a
//! [`SampleOutcome`], whether or not the reply decoded, so the sample set
//! always has one entry per call, in call order. Validation and aggregation
//! then run per region, with no state shared across regions.

use crate::analysis::{
    aggregate_region, collect_summaries, parse_reply, validate_samples, RawTable, RegionSummaries,
};
use crate::config::Config;
use crate::error::{AggregateError, QueryError};
use crate::llm::{build_prompt, CompletionBackend};
use crate::models::{AggregatedRecord, SampleSummary};
use crate::regions::Region;
use futures::stream::{self, StreamExt};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Everything a sampling run needs, passed explicitly instead of globals.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub regions: Vec<Region>,
    pub repeats: usize,
    pub model_name: String,
    /// Retries per sample on transient transport failures.
    pub retries: usize,
    pub retry_backoff: Duration,
    /// Regions sampled at once.
    pub concurrency: usize,
    /// Print each prompt before sending it.
    pub debug_prompt: bool,
    pub show_progress: bool,
    pub skip_failed_regions: bool,
}

impl RunContext {
    pub fn from_config(config: &Config, regions: Vec<Region>) -> Self {
        Self {
            regions,
            repeats: config.sampling.repeats,
            model_name: config.model.name.clone(),
            retries: config.model.retries,
            retry_backoff: Duration::from_millis(config.model.retry_backoff_ms),
            concurrency: config.general.concurrency.max(1),
            debug_prompt: false,
            show_progress: true,
            skip_failed_regions: config.general.skip_failed_regions,
        }
    }
}

/// One call's result: the decoded table, if any, and the raw reply.
#[derive(Debug, Clone)]
pub struct SampleOutcome {
    /// Position in call order.
    pub index: usize,
    pub table: Option<RawTable>,
    /// Raw reply text; empty when the call itself failed.
    pub reply: String,
    /// Why there is no table.
    pub failure: Option<String>,
}

/// Everything produced for one region.
#[derive(Debug, Clone)]
pub struct RegionResult {
    pub region: Region,
    pub samples: Vec<SampleOutcome>,
    pub summary: SampleSummary,
    pub records: Vec<AggregatedRecord>,
    pub summaries: Option<RegionSummaries>,
}

impl RegionResult {
    pub fn succeeded(&self) -> bool {
        self.summary.error.is_none()
    }
}

/// Output of a full batch.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// Aggregated records of every successful region, in registry order.
    pub records: Vec<AggregatedRecord>,
    pub regions: Vec<RegionResult>,
}

impl BatchResult {
    /// Names of regions that produced no aggregate.
    pub fn failed_regions(&self) -> Vec<&str> {
        self.regions
            .iter()
            .filter(|r| !r.succeeded())
            .map(|r| r.region.region.as_str())
            .collect()
    }

    /// Error out if any region produced no aggregate, unless those regions
    /// may be skipped.
    pub fn ensure_complete(&self, skip_failed_regions: bool) -> Result<(), AggregateError> {
        let failed = self.failed_regions();
        match failed.as_slice() {
            [] => Ok(()),
            _ if skip_failed_regions => {
                warn!(
                    "Skipping {} region(s) with no usable samples: {}",
                    failed.len(),
                    failed.join(", ")
                );
                Ok(())
            }
            [name] => Err(AggregateError::NoUsableSamples(name.to_string())),
            names => Err(AggregateError::NoUsableSamplesIn(
                names.iter().map(|n| n.to_string()).collect(),
            )),
        }
    }
}

/// Call the backend, retrying transient failures with exponential backoff.
pub async fn complete_with_retry<B: CompletionBackend>(
    backend: &B,
    prompt: &str,
    retries: usize,
    backoff: Duration,
) -> Result<String, QueryError> {
    let mut attempt = 0usize;

    loop {
        match backend.complete(prompt).await {
            Ok(reply) => return Ok(reply),
            Err(e) if attempt < retries && e.is_transient() => {
                let delay = backoff.saturating_mul(1u32 << attempt.min(16));
                warn!(
                    "Request failed ({}), retrying in {:?} ({}/{})",
                    e,
                    delay,
                    attempt + 1,
                    retries
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Echo a prompt the way `--debug-prompt` shows it.
pub fn write_prompt<W: Write>(
    out: &mut W,
    region: &Region,
    index: usize,
    prompt: &str,
) -> io::Result<()> {
    writeln!(out, "── {} sample {} ──", region.region, index)?;
    writeln!(out, "{}", prompt)
}

/// Query once and decode the reply. Never fails: problems become a
/// `SampleOutcome` without a table.
pub async fn query_region<B: CompletionBackend>(
    backend: &B,
    ctx: &RunContext,
    region: &Region,
    index: usize,
) -> SampleOutcome {
    let prompt = build_prompt(&region.region, &region.context);

    if ctx.debug_prompt {
        if let Err(e) = write_prompt(&mut io::stdout().lock(), region, index, &prompt) {
            warn!("Failed to echo prompt: {}", e);
        }
    }

    let reply = match complete_with_retry(backend, &prompt, ctx.retries, ctx.retry_backoff).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!("{} sample {}: query failed: {}", region.region, index, e);
            return SampleOutcome {
                index,
                table: None,
                reply: String::new(),
                failure: Some(format!("query failed: {}", e)),
            };
        }
    };

    match parse_reply(&reply) {
        Ok(table) => SampleOutcome {
            index,
            table: Some(table),
            reply,
            failure: None,
        },
        Err(e) => {
            warn!("{} sample {}: failed to parse reply: {}", region.region, index, e);
            debug!("Raw reply:\n{}", reply);
            SampleOutcome {
                index,
                table: None,
                reply,
                failure: Some(format!("parse failure: {}", e)),
            }
        }
    }
}

/// Query a region `ctx.repeats` times, sequentially, in call order.
pub async fn query_region_n_times<B: CompletionBackend>(
    backend: &B,
    ctx: &RunContext,
    region: &Region,
    progress: &ProgressBar,
) -> Vec<SampleOutcome> {
    info!(
        "Querying for region: {} ({} samples from {})",
        region.region, ctx.repeats, ctx.model_name
    );

    let mut outcomes = Vec::with_capacity(ctx.repeats);
    for index in 0..ctx.repeats {
        debug!("{}: sample {}/{}", region.region, index + 1, ctx.repeats);
        outcomes.push(query_region(backend, ctx, region, index).await);
        progress.inc(1);
    }

    outcomes
}

/// Validate and aggregate a region's sample set.
pub fn process_region(region: &Region, samples: Vec<SampleOutcome>) -> RegionResult {
    let mut summary = SampleSummary::new(&region.region, samples.len());

    for sample in &samples {
        if let Some(ref failure) = sample.failure {
            summary
                .rejections
                .push(format!("sample {}: {}", sample.index, failure));
        }
    }

    let parsed: Vec<(usize, RawTable)> = samples
        .iter()
        .filter_map(|s| s.table.clone().map(|t| (s.index, t)))
        .collect();
    summary.parsed = parsed.len();

    let outcome = validate_samples(&parsed);
    summary.usable = outcome.usable.len();
    for rejection in &outcome.rejected {
        if let Some(sample) = samples.iter().find(|s| s.index == rejection.index) {
            debug!("{} sample {} raw reply:\n{}", region.region, sample.index, sample.reply);
        }
        summary.rejections.push(rejection.describe());
    }

    info!(
        "{}: {}/{} samples usable ({} parsed)",
        region.region, summary.usable, summary.requested, summary.parsed
    );

    let aggregated = aggregate_region(&region.region, &outcome.usable).and_then(|records| {
        collect_summaries(&region.region, &outcome.usable).map(|s| (records, s))
    });

    match aggregated {
        Ok((records, summaries)) => RegionResult {
            region: region.clone(),
            samples,
            summary,
            records,
            summaries: Some(summaries),
        },
        Err(e) => {
            error!("{}", e);
            summary.error = Some(e.to_string());
            RegionResult {
                region: region.clone(),
                samples,
                summary,
                records: Vec::new(),
                summaries: None,
            }
        }
    }
}

/// Sample, validate and aggregate one region.
pub async fn run_region<B: CompletionBackend>(
    backend: &B,
    ctx: &RunContext,
    region: &Region,
    progress: ProgressBar,
) -> RegionResult {
    progress.set_message(region.region.clone());
    let samples = query_region_n_times(backend, ctx, region, &progress).await;
    progress.finish_and_clear();

    process_region(region, samples)
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

/// Run every region and concatenate the aggregates in registry order.
///
/// Regions without usable samples are kept in the result with their raw
/// replies; [`BatchResult::ensure_complete`] decides whether the run fails.
pub async fn run_batch<B: CompletionBackend>(backend: &B, ctx: &RunContext) -> BatchResult {
    let multi = if ctx.show_progress {
        MultiProgress::new()
    } else {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    };

    let regions: Vec<RegionResult> = stream::iter(ctx.regions.iter())
        .map(|region| {
            let progress = multi.add(ProgressBar::new(ctx.repeats as u64));
            progress.set_style(progress_style());
            run_region(backend, ctx, region, progress)
        })
        .buffered(ctx.concurrency.max(1))
        .collect()
        .await;

    let records = regions
        .iter()
        .flat_map(|r| r.records.iter().cloned())
        .collect();

    BatchResult { records, regions }
}
