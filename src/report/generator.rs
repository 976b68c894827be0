//! Output generation.
//!
//! Writes the aggregated CSV artifact, plus the optional summaries JSON,
//! raw reply dump and Markdown/JSON run report.

use crate::analysis::aggregator::extremes;
use crate::analysis::RegionSummaries;
use crate::models::{
    AggregatedRecord, Metric, Period, RegionHighlight, RunMetadata, RunReport, SampleSummary,
};
use crate::sampling::RegionResult;
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

/// Create the parent directory of `path` if it has one.
fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

/// Render records as CSV with the artifact's header.
pub fn generate_csv(records: &[AggregatedRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(record)?;
    }
    // An empty record set still gets a header row.
    if records.is_empty() {
        writer.write_record([
            "dates_start",
            "dates_end",
            "mean",
            "err_pos",
            "err_neg",
            "sd_pos",
            "sd_neg",
            "region",
            "metric",
        ])?;
    }

    let bytes = writer.into_inner().context("Failed to flush CSV output")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Write the aggregated artifact.
pub fn write_csv(records: &[AggregatedRecord], path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let content = generate_csv(records)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write output to {}", path.display()))
}

#[derive(Serialize)]
struct SummariesDocument<'a> {
    metadata: &'a RunMetadata,
    regions: Vec<&'a RegionSummaries>,
}

/// Write per-period model summaries for every successful region.
pub fn write_summaries(results: &[RegionResult], metadata: &RunMetadata, path: &Path) -> Result<()> {
    let document = SummariesDocument {
        metadata,
        regions: results.iter().filter_map(|r| r.summaries.as_ref()).collect(),
    };

    ensure_parent(path)?;
    let content = serde_json::to_string_pretty(&document)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write summaries to {}", path.display()))
}

/// Save every raw reply as `<dir>/<region-dir>/sample_NN.txt`.
///
/// Returns the number of files written.
pub fn write_raw_replies(results: &[RegionResult], dir: &Path) -> Result<usize> {
    let mut written = 0;
    let mut used = HashSet::new();

    for (index, result) in results.iter().enumerate() {
        let name = result.region.dir_name(index);
        if !used.insert(name.clone()) {
            bail!(
                "Raw replies for region '{}' would overwrite another region's directory '{}'",
                result.region.region,
                name
            );
        }

        let region_dir = dir.join(name);
        std::fs::create_dir_all(&region_dir)
            .with_context(|| format!("Failed to create directory {}", region_dir.display()))?;

        for sample in &result.samples {
            let path = region_dir.join(format!("sample_{:02}.txt", sample.index));
            let content = match sample.failure {
                Some(ref failure) if sample.reply.is_empty() => format!("# {}\n", failure),
                _ => sample.reply.clone(),
            };
            std::fs::write(&path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            written += 1;
        }
    }

    Ok(written)
}

/// Best and worst Overall periods for each region present in `records`.
pub fn build_highlights(records: &[AggregatedRecord], regions: &[SampleSummary]) -> Vec<RegionHighlight> {
    let overall = Metric::Overall.name();

    regions
        .iter()
        .filter_map(|summary| {
            let (best, worst) = extremes(records, &summary.region, overall)?;
            Some(RegionHighlight {
                region: summary.region.clone(),
                best_period: Period::new(best.dates_start as i64, best.dates_end as i64),
                best_mean: best.mean,
                worst_period: Period::new(worst.dates_start as i64, worst.dates_end as i64),
                worst_mean: worst.mean,
            })
        })
        .collect()
}

/// Generate a complete Markdown run report.
pub fn generate_markdown_report(report: &RunReport) -> String {
    let mut output = String::new();

    output.push_str("# Historical Quality of Life Run\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_samples_section(&report.regions));
    output.push_str(&generate_highlights_section(&report.highlights));
    output.push_str(&generate_rejections_section(&report.regions));

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &RunMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Model Used:** `{}`\n", metadata.model_used));
    section.push_str(&format!("- **Samples per Region:** {}\n", metadata.repeats));
    section.push_str(&format!("- **Regions:** {}\n", metadata.regions));
    section.push_str(&format!("- **Records Written:** {}\n", metadata.records));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the per-region sample accounting table.
fn generate_samples_section(regions: &[SampleSummary]) -> String {
    let mut section = String::new();

    section.push_str("## Samples\n\n");
    section.push_str("| Region | Requested | Parsed | Usable | Yield | Status |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|:---|\n");

    for summary in regions {
        let status = match summary.error {
            Some(ref e) => format!("failed: {}", e),
            None => "ok".to_string(),
        };
        section.push_str(&format!(
            "| {} | {} | {} | {} | {:.0}% | {} |\n",
            summary.region,
            summary.requested,
            summary.parsed,
            summary.usable,
            summary.yield_ratio() * 100.0,
            status
        ));
    }
    section.push('\n');

    section
}

fn generate_highlights_section(highlights: &[RegionHighlight]) -> String {
    if highlights.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Overall Highlights\n\n");
    section.push_str("| Region | Best Period | Mean | Worst Period | Mean |\n");
    section.push_str("|:---|:---|:---:|:---|:---:|\n");

    for h in highlights {
        section.push_str(&format!(
            "| {} | {} | {:.2} | {} | {:.2} |\n",
            h.region, h.best_period, h.best_mean, h.worst_period, h.worst_mean
        ));
    }
    section.push('\n');

    section
}

fn generate_rejections_section(regions: &[SampleSummary]) -> String {
    let rejected: Vec<_> = regions.iter().filter(|r| !r.rejections.is_empty()).collect();
    if rejected.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Rejected Samples\n\n");

    for summary in rejected {
        section.push_str(&format!("### {}\n\n", summary.region));
        for reason in &summary.rejections {
            section.push_str(&format!("- {}\n", reason));
        }
        section.push('\n');
    }

    section
}

/// Generate a JSON run report.
pub fn generate_json_report(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(region: &str, metric: &str, start: f64, mean: f64) -> AggregatedRecord {
        AggregatedRecord {
            dates_start: start,
            dates_end: start + 100.0,
            mean,
            err_pos: mean + 0.5,
            err_neg: mean - 0.5,
            sd_pos: mean + 0.4,
            sd_neg: mean - 0.4,
            region: region.to_string(),
            metric: metric.to_string(),
        }
    }

    fn create_test_report() -> RunReport {
        let mut egypt = SampleSummary::new("Egypt", 20);
        egypt.parsed = 19;
        egypt.usable = 17;
        egypt.rejections = vec!["sample 4: Wrong number of rows: expected 31, got 30".to_string()];

        let mut atlantis = SampleSummary::new("Atlantis", 20);
        atlantis.error = Some("No usable samples for region 'Atlantis'".to_string());

        let records = vec![
            record("Egypt", "Overall", -1000.0, 3.5),
            record("Egypt", "Overall", 1900.0, 6.25),
        ];
        let regions = vec![egypt, atlantis];
        let highlights = build_highlights(&records, &regions);

        RunReport {
            metadata: RunMetadata {
                generated_at: Utc::now(),
                model_used: "gpt-4.1-mini".to_string(),
                repeats: 20,
                regions: 2,
                records: records.len(),
                duration_seconds: 42.0,
            },
            regions,
            highlights,
        }
    }

    #[test]
    fn test_generate_csv_header_and_rows() {
        let records = vec![record("Test Region", "Freedom", 0.0, 6.0)];
        let csv = generate_csv(&records).unwrap();
        let mut lines = csv.lines();

        assert_eq!(
            lines.next(),
            Some("dates_start,dates_end,mean,err_pos,err_neg,sd_pos,sd_neg,region,metric")
        );
        assert_eq!(
            lines.next(),
            Some("0.0,100.0,6.0,6.5,5.5,6.4,5.6,Test Region,Freedom")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_generate_csv_quotes_metric_names() {
        let records = vec![record("Levant", "Health & Wellbeing", -1000.0, 3.0)];
        let csv = generate_csv(&records).unwrap();
        assert!(csv.contains("-1000.0,-900.0,3.0"));
        assert!(csv.contains("Levant,Health & Wellbeing"));
    }

    #[test]
    fn test_empty_csv_has_header() {
        let csv = generate_csv(&[]).unwrap();
        assert!(csv.starts_with("dates_start,dates_end,mean"));
    }

    #[test]
    fn test_write_csv_creates_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("stats.csv");

        write_csv(&[record("Egypt", "Peace", 0.0, 4.0)], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Egypt,Peace"));
    }

    fn region_result(name: &str, reply: &str) -> RegionResult {
        RegionResult {
            region: crate::regions::Region::named(name),
            samples: vec![crate::sampling::SampleOutcome {
                index: 0,
                table: None,
                reply: reply.to_string(),
                failure: None,
            }],
            summary: SampleSummary::new(name, 1),
            records: Vec::new(),
            summaries: None,
        }
    }

    #[test]
    fn test_raw_replies_use_one_directory_per_region() {
        let dir = TempDir::new().unwrap();
        let results = vec![
            region_result("Egypt", "EGYPT REPLY"),
            region_result("中国", "CHINA REPLY"),
        ];

        assert_eq!(write_raw_replies(&results, dir.path()).unwrap(), 2);

        let egypt = std::fs::read_to_string(dir.path().join("egypt").join("sample_00.txt")).unwrap();
        let china =
            std::fs::read_to_string(dir.path().join("region-1").join("sample_00.txt")).unwrap();
        assert_eq!(egypt, "EGYPT REPLY");
        assert_eq!(china, "CHINA REPLY");
        assert!(!dir.path().join("sample_00.txt").exists());
    }

    #[test]
    fn test_raw_replies_refuse_shared_directory() {
        let dir = TempDir::new().unwrap();
        let results = vec![
            region_result("Rome (East)", "FIRST REPLY"),
            region_result("Rome East", "OTHER REPLY"),
        ];

        let err = write_raw_replies(&results, dir.path()).unwrap_err();
        assert!(err.to_string().contains("rome-east"));

        let first =
            std::fs::read_to_string(dir.path().join("rome-east").join("sample_00.txt")).unwrap();
        assert_eq!(first, "FIRST REPLY");
    }

    #[test]
    fn test_highlights() {
        let report = create_test_report();
        assert_eq!(report.highlights.len(), 1);

        let h = &report.highlights[0];
        assert_eq!(h.region, "Egypt");
        assert_eq!(h.best_period, Period::new(1900, 2000));
        assert_eq!(h.worst_period, Period::new(-1000, -900));
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("# Historical Quality of Life Run"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("`gpt-4.1-mini`"));
        assert!(markdown.contains("| Egypt | 20 | 19 | 17 | 85% | ok |"));
        assert!(markdown.contains("failed: No usable samples"));
        assert!(markdown.contains("1900 - 2000 CE"));
        assert!(markdown.contains("## Rejected Samples"));
        assert!(markdown.contains("sample 4: Wrong number of rows"));
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"metadata\""));
        assert!(json.contains("\"regions\""));
        assert!(json.contains("\"highlights\""));
        assert_eq!(report.totals(), (17, 40));
    }
}
