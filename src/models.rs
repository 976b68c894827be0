//! Data models for historical quality-of-life estimation.
//!
//! This module contains the core data structures shared by the sampling,
//! validation, aggregation and report stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// First year covered by the period grid.
pub const GRID_START: i64 = -1000;

/// Last year covered by the period grid.
pub const GRID_END: i64 = 2025;

/// Width of a regular period in years.
pub const PERIOD_WIDTH: i64 = 100;

/// A (start_year, end_year) interval on the century grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    pub start: i64,
    pub end: i64,
}

impl Period {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// All periods from -1000 to 2025: 100-year steps, with the final
    /// period clipped to 2000-2025.
    pub fn grid() -> Vec<Period> {
        let mut periods = Vec::new();
        let mut start = GRID_START;

        while start < GRID_END {
            let end = (start + PERIOD_WIDTH).min(GRID_END);
            periods.push(Period::new(start, end));
            start += PERIOD_WIDTH;
        }

        periods
    }

    /// Human-readable label, e.g. "1000 - 900 BCE" or "2000 - 2025 CE".
    pub fn label(&self) -> String {
        let era = if self.start < 0 { "BCE" } else { "CE" };
        format!("{} - {} {}", self.start.abs(), self.end.abs(), era)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One of the six scored quality-of-life categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Freedom,
    HealthWellbeing,
    EconomicOpportunity,
    Equality,
    CultureLeisure,
    Peace,
}

impl Category {
    /// All categories, in column and output order.
    pub const ALL: [Category; 6] = [
        Category::Freedom,
        Category::HealthWellbeing,
        Category::EconomicOpportunity,
        Category::Equality,
        Category::CultureLeisure,
        Category::Peace,
    ];

    /// Column header used in the prompt and the output `metric` column.
    pub fn header(&self) -> &'static str {
        match self {
            Category::Freedom => "Freedom",
            Category::HealthWellbeing => "Health & Wellbeing",
            Category::EconomicOpportunity => "Economic Opportunity",
            Category::Equality => "Equality",
            Category::CultureLeisure => "Culture & Leisure",
            Category::Peace => "Peace",
        }
    }

    /// Other header spellings accepted when reading replies.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Category::CultureLeisure => &["Culture & Lesure"],
            _ => &[],
        }
    }

    /// Guidance shown to the model for what the score covers.
    pub fn guidance(&self) -> &'static str {
        match self {
            Category::Freedom => "e.g. freedom of speech, movement, ideas, democracy, slavery etc.",
            Category::HealthWellbeing => "e.g. mortality, disease, access to food, cleanliness",
            Category::EconomicOpportunity => {
                "e.g. availability of jobs, education, economic prosperity, social mobility"
            }
            Category::Equality => "e.g. disparity between rich and poor",
            Category::CultureLeisure => {
                "e.g. access to games, hobbies, cuisine, free time, and cultural expression"
            }
            Category::Peace => {
                "e.g. wars, invasions, unrest, or infighting - where 10 is most peaceful"
            }
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header())
    }
}

/// A metric in the aggregated output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Category(Category),
    Overall,
    Population,
}

impl Metric {
    /// Every metric, in output order: categories, then Overall, then Population.
    pub fn all() -> Vec<Metric> {
        Category::ALL
            .iter()
            .copied()
            .map(Metric::Category)
            .chain([Metric::Overall, Metric::Population])
            .collect()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Category(category) => category.header(),
            Metric::Overall => "Overall",
            Metric::Population => "Population",
        }
    }

    /// Value of this metric in a validated sample row.
    pub fn value(&self, row: &SampleRow) -> f64 {
        match self {
            Metric::Category(category) => row.score(*category),
            Metric::Overall => row.overall,
            Metric::Population => row.population as f64,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One period's worth of values from a single validated reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRow {
    pub start_year: i64,
    pub end_year: i64,
    pub population: i64,
    pub summary: String,
    /// Scores in `Category::ALL` order.
    pub scores: [f64; 6],
    /// Arithmetic mean of the six category scores.
    pub overall: f64,
}

impl SampleRow {
    pub fn new(
        start_year: i64,
        end_year: i64,
        population: i64,
        summary: String,
        scores: [f64; 6],
    ) -> Self {
        let overall = scores.iter().sum::<f64>() / scores.len() as f64;
        Self {
            start_year,
            end_year,
            population,
            summary,
            scores,
            overall,
        }
    }

    pub fn score(&self, category: Category) -> f64 {
        let index = Category::ALL
            .iter()
            .position(|c| *c == category)
            .unwrap_or_default();
        self.scores[index]
    }
}

/// A validated sample: every period from one model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleTable {
    /// Position of the reply in the region's sample set.
    pub index: usize,
    pub rows: Vec<SampleRow>,
}

impl SampleTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[allow(dead_code)] // Pairs with len()
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Statistical summary for one (region, metric, period) triple.
///
/// Field order is the column order of the output artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRecord {
    pub dates_start: f64,
    pub dates_end: f64,
    pub mean: f64,
    /// 84th percentile.
    pub err_pos: f64,
    /// 16th percentile.
    pub err_neg: f64,
    /// Mean plus one standard deviation.
    pub sd_pos: f64,
    /// Mean minus one standard deviation.
    pub sd_neg: f64,
    pub region: String,
    pub metric: String,
}

/// Per-region accounting of how many samples survived each stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleSummary {
    pub region: String,
    pub requested: usize,
    pub parsed: usize,
    pub usable: usize,
    /// Human-readable reasons, one per rejected sample.
    pub rejections: Vec<String>,
    /// Set when the region produced no aggregate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SampleSummary {
    pub fn new(region: &str, requested: usize) -> Self {
        Self {
            region: region.to_string(),
            requested,
            ..Self::default()
        }
    }

    /// Fraction of requested samples that made it into the aggregate.
    pub fn yield_ratio(&self) -> f64 {
        if self.requested == 0 {
            0.0
        } else {
            self.usable as f64 / self.requested as f64
        }
    }
}

/// Metadata about a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Date and time the run finished.
    pub generated_at: DateTime<Utc>,
    /// Model identifier used for every sample.
    pub model_used: String,
    /// Samples requested per region.
    pub repeats: usize,
    /// Regions attempted.
    pub regions: usize,
    /// Aggregated records written.
    pub records: usize,
    /// Wall-clock duration in seconds.
    pub duration_seconds: f64,
}

/// Best and worst periods of a region for the Overall metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionHighlight {
    pub region: String,
    pub best_period: Period,
    pub best_mean: f64,
    pub worst_period: Period,
    pub worst_mean: f64,
}

/// The run report: sample accounting for every region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub regions: Vec<SampleSummary>,
    pub highlights: Vec<RegionHighlight>,
}

impl RunReport {
    /// Total (usable, requested) samples across regions.
    pub fn totals(&self) -> (usize, usize) {
        self.regions
            .iter()
            .fold((0, 0), |(u, r), s| (u + s.usable, r + s.requested))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_grid() {
        let grid = Period::grid();
        assert_eq!(grid.len(), 31);
        assert_eq!(grid[0], Period::new(-1000, -900));
        assert_eq!(grid[10], Period::new(0, 100));
        assert_eq!(grid[29], Period::new(1900, 2000));
        assert_eq!(grid[30], Period::new(2000, 2025));
    }

    #[test]
    fn test_period_label() {
        assert_eq!(Period::new(-1000, -900).label(), "1000 - 900 BCE");
        assert_eq!(Period::new(0, 100).label(), "0 - 100 CE");
        assert_eq!(Period::new(2000, 2025).to_string(), "2000 - 2025 CE");
    }

    #[test]
    fn test_metric_order() {
        let names: Vec<&str> = Metric::all().iter().map(|m| m.name()).collect();
        assert_eq!(names.len(), 8);
        assert_eq!(names[0], "Freedom");
        assert_eq!(names[4], "Culture & Leisure");
        assert_eq!(names[6], "Overall");
        assert_eq!(names[7], "Population");
    }

    #[test]
    fn test_sample_row_overall() {
        let row = SampleRow::new(0, 100, 1000, String::new(), [1.0, 2.0, 3.0, 4.0, 5.0, 9.0]);
        assert_eq!(row.overall, 4.0);
        assert_eq!(row.score(Category::Peace), 9.0);
        assert_eq!(Metric::Population.value(&row), 1000.0);
        assert_eq!(Metric::Overall.value(&row), 4.0);
    }

    #[test]
    fn test_yield_ratio() {
        let mut summary = SampleSummary::new("Test Region", 4);
        summary.usable = 3;
        assert_eq!(summary.yield_ratio(), 0.75);
        assert_eq!(SampleSummary::new("Empty", 0).yield_ratio(), 0.0);
    }
}
