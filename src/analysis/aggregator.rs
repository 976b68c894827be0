//! Cross-sample aggregation and statistics.
//!
//! This module collapses a region's usable samples into one statistical
//! record per (metric, period). Periods are aligned by position: the
//! validator guarantees every usable sample has the same row count and
//! ascending start years.

use crate::analysis::stats;
use crate::error::AggregateError;
use crate::models::{AggregatedRecord, Metric, SampleTable};
use serde::Serialize;

/// Lower percentile of the asymmetric band.
pub const LOWER_PERCENTILE: f64 = 16.0;

/// Upper percentile of the asymmetric band.
pub const UPPER_PERCENTILE: f64 = 84.0;

/// Spread of one metric at one period across samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spread {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
    pub std_dev: f64,
}

impl Spread {
    /// Returns `None` for an empty set.
    pub fn of(values: &[f64]) -> Option<Self> {
        Some(Self {
            mean: stats::mean(values)?,
            lower: stats::percentile(values, LOWER_PERCENTILE)?,
            upper: stats::percentile(values, UPPER_PERCENTILE)?,
            std_dev: stats::std_dev(values)?,
        })
    }
}

/// Model summaries for one period, gathered from every usable sample.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodSummaries {
    pub dates_start: f64,
    pub dates_end: f64,
    pub summaries: Vec<String>,
}

/// Model summaries for one region.
#[derive(Debug, Clone, Serialize)]
pub struct RegionSummaries {
    pub region: String,
    pub periods: Vec<PeriodSummaries>,
}

/// Shared period count of the samples, or an error if they disagree.
fn period_count(region: &str, samples: &[SampleTable]) -> Result<usize, AggregateError> {
    let first = samples
        .first()
        .ok_or_else(|| AggregateError::NoUsableSamples(region.to_string()))?;

    if samples.iter().any(|s| s.len() != first.len()) {
        return Err(AggregateError::Misaligned {
            region: region.to_string(),
            counts: samples.iter().map(SampleTable::len).collect(),
        });
    }

    Ok(first.len())
}

/// Median start and end year of period `i` across samples.
fn period_dates(samples: &[SampleTable], i: usize) -> (f64, f64) {
    let starts: Vec<f64> = samples.iter().map(|s| s.rows[i].start_year as f64).collect();
    let ends: Vec<f64> = samples.iter().map(|s| s.rows[i].end_year as f64).collect();
    (
        stats::median(&starts).unwrap_or_default(),
        stats::median(&ends).unwrap_or_default(),
    )
}

/// Aggregate a region's usable samples into long-format records, ordered by
/// metric then period.
pub fn aggregate_region(
    region: &str,
    samples: &[SampleTable],
) -> Result<Vec<AggregatedRecord>, AggregateError> {
    let periods = period_count(region, samples)?;
    let dates: Vec<(f64, f64)> = (0..periods).map(|i| period_dates(samples, i)).collect();

    let mut records = Vec::with_capacity(Metric::all().len() * periods);

    for metric in Metric::all() {
        for (i, (dates_start, dates_end)) in dates.iter().copied().enumerate() {
            let values: Vec<f64> = samples.iter().map(|s| metric.value(&s.rows[i])).collect();
            let spread = Spread::of(&values)
                .ok_or_else(|| AggregateError::NoUsableSamples(region.to_string()))?;

            records.push(AggregatedRecord {
                dates_start,
                dates_end,
                mean: spread.mean,
                err_pos: spread.upper,
                err_neg: spread.lower,
                sd_pos: spread.mean + spread.std_dev,
                sd_neg: spread.mean - spread.std_dev,
                region: region.to_string(),
                metric: metric.name().to_string(),
            });
        }
    }

    Ok(records)
}

/// Gather the per-period summaries of a region's usable samples.
pub fn collect_summaries(
    region: &str,
    samples: &[SampleTable],
) -> Result<RegionSummaries, AggregateError> {
    let periods = period_count(region, samples)?;

    let periods = (0..periods)
        .map(|i| {
            let (dates_start, dates_end) = period_dates(samples, i);
            PeriodSummaries {
                dates_start,
                dates_end,
                summaries: samples
                    .iter()
                    .map(|s| s.rows[i].summary.clone())
                    .filter(|s| !s.is_empty())
                    .collect(),
            }
        })
        .collect();

    Ok(RegionSummaries {
        region: region.to_string(),
        periods,
    })
}

/// Periods with the highest and lowest mean for a metric, as
/// `(best, worst)`.
pub fn extremes<'a>(
    records: &'a [AggregatedRecord],
    region: &str,
    metric: &str,
) -> Option<(&'a AggregatedRecord, &'a AggregatedRecord)> {
    let mut matching = records
        .iter()
        .filter(|r| r.region == region && r.metric == metric);

    let first = matching.next()?;
    let (best, worst) = matching.fold((first, first), |(best, worst), r| {
        (
            if r.mean > best.mean { r } else { best },
            if r.mean < worst.mean { r } else { worst },
        )
    });

    Some((best, worst))
}
