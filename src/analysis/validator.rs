//! Cross-sample validation.
//!
//! A sample is usable only if it passes every check; there is no row-level
//! salvage. All checks run so the log shows everything wrong with a reply.

use crate::analysis::parser::RawTable;
use crate::analysis::stats;
use crate::error::ValidationError;
use crate::models::{Category, SampleRow, SampleTable};
use tracing::warn;

const START_YEAR: &[&str] = &["Start Year"];
const END_YEAR: &[&str] = &["End Year"];
const POPULATION: &[&str] = &["Population"];
const SUMMARY: &[&str] = &["Summary"];

/// A sample that failed validation, with every check it failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub index: usize,
    pub errors: Vec<ValidationError>,
}

impl Rejection {
    pub fn describe(&self) -> String {
        let reasons: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        format!("sample {}: {}", self.index, reasons.join("; "))
    }
}

/// Result of validating a region's sample set.
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub usable: Vec<SampleTable>,
    pub rejected: Vec<Rejection>,
}

/// Median row count across the parsed tables, truncated to an integer.
pub fn expected_row_count(tables: &[(usize, RawTable)]) -> Option<usize> {
    let lengths: Vec<f64> = tables.iter().map(|(_, t)| t.len() as f64).collect();
    stats::median(&lengths).map(|m| m as usize)
}

/// Validate every parsed table of one region.
///
/// Each entry pairs the sample's position in the sample set with its table.
pub fn validate_samples(tables: &[(usize, RawTable)]) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();

    let Some(expected_rows) = expected_row_count(tables) else {
        return outcome;
    };

    for (index, table) in tables {
        match validate_sample(*index, table, expected_rows) {
            Ok(sample) => outcome.usable.push(sample),
            Err(errors) => {
                for error in &errors {
                    warn!("{}: {}", index, error);
                }
                warn!("Ignoring sample {} due to above errors", index);
                outcome.rejected.push(Rejection {
                    index: *index,
                    errors,
                });
            }
        }
    }

    outcome
}

/// Run all checks against one table and build typed rows from it.
pub fn validate_sample(
    index: usize,
    table: &RawTable,
    expected_rows: usize,
) -> Result<SampleTable, Vec<ValidationError>> {
    let mut errors = Vec::new();

    if table.len() != expected_rows {
        errors.push(ValidationError::RowCount {
            expected: expected_rows,
            actual: table.len(),
        });
    }

    let scores = extract_scores(table).map_err(|e| errors.push(e)).ok();
    let years = extract_years(table).map_err(|e| errors.push(e)).ok();
    let population = extract_population(table).map_err(|e| errors.push(e)).ok();

    if let Some((starts, _)) = &years {
        if let Err(e) = check_ascending(starts) {
            errors.push(e);
        }
    }

    match (scores, years, population) {
        (Some(scores), Some((starts, ends)), Some(population)) if errors.is_empty() => {
            let summaries = extract_summaries(table);
            let rows = (0..table.len())
                .map(|i| {
                    SampleRow::new(
                        starts[i],
                        ends[i],
                        population[i],
                        summaries[i].clone(),
                        scores[i],
                    )
                })
                .collect();
            Ok(SampleTable { index, rows })
        }
        _ => Err(errors),
    }
}

/// Parse a year cell. Integral floats ("100.0") are accepted; anything with
/// a fractional part is not.
pub fn parse_year(cell: &str) -> Option<i64> {
    let cell = cell.trim();
    if let Ok(year) = cell.parse::<i64>() {
        return Some(year);
    }
    let value = cell.parse::<f64>().ok()?;
    if value.is_finite() && value.fract() == 0.0 {
        Some(value as i64)
    } else {
        None
    }
}

/// Parse a population cell, dropping thousands separators and a leading "~".
pub fn parse_population(cell: &str) -> Option<i64> {
    let cell = cell.trim();
    let cell = cell.strip_prefix('~').unwrap_or(cell).trim();
    let digits: String = cell.chars().filter(|c| *c != ',').collect();
    digits.parse::<i64>().ok()
}

fn extract_scores(table: &RawTable) -> Result<Vec<[f64; 6]>, ValidationError> {
    let mut columns = [0usize; 6];
    for (slot, category) in columns.iter_mut().zip(Category::ALL) {
        let names: Vec<&str> = std::iter::once(category.header())
            .chain(category.aliases().iter().copied())
            .collect();
        *slot = table.column(&names).ok_or_else(|| {
            ValidationError::Overall(format!("missing column '{}'", category.header()))
        })?;
    }

    table
        .rows
        .iter()
        .enumerate()
        .map(|(r, row)| {
            let mut scores = [0.0; 6];
            for ((score, col), category) in scores.iter_mut().zip(columns).zip(Category::ALL) {
                *score = row[col]
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| {
                        ValidationError::Overall(format!(
                            "row {} {} is not numeric: '{}'",
                            r + 1,
                            category.header(),
                            row[col]
                        ))
                    })?;
            }
            Ok(scores)
        })
        .collect()
}

fn extract_years(table: &RawTable) -> Result<(Vec<i64>, Vec<i64>), ValidationError> {
    let start = table
        .column(START_YEAR)
        .ok_or_else(|| ValidationError::Dates("missing column 'Start Year'".to_string()))?;
    let end = table
        .column(END_YEAR)
        .ok_or_else(|| ValidationError::Dates("missing column 'End Year'".to_string()))?;

    let parse_column = |col: usize| -> Result<Vec<i64>, ValidationError> {
        table
            .column_values(col)
            .map(|cell| {
                parse_year(cell)
                    .ok_or_else(|| ValidationError::Dates(format!("'{}' is not a year", cell)))
            })
            .collect()
    };

    Ok((parse_column(start)?, parse_column(end)?))
}

fn extract_population(table: &RawTable) -> Result<Vec<i64>, ValidationError> {
    let col = table
        .column(POPULATION)
        .ok_or_else(|| ValidationError::Population("missing column 'Population'".to_string()))?;

    table
        .column_values(col)
        .map(|cell| {
            parse_population(cell).ok_or_else(|| {
                ValidationError::Population(format!("'{}' is not an integer", cell))
            })
        })
        .collect()
}

fn extract_summaries(table: &RawTable) -> Vec<String> {
    match table.column(SUMMARY) {
        Some(col) => table.column_values(col).map(str::to_string).collect(),
        None => vec![String::new(); table.len()],
    }
}

fn check_ascending(starts: &[i64]) -> Result<(), ValidationError> {
    match starts.windows(2).find(|w| w[1] <= w[0]) {
        Some(w) => Err(ValidationError::Ordering(format!(
            "start year {} follows {}",
            w[1], w[0]
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::parser::parse_reply;

    fn reply(rows: &[(i64, i64, &str, [&str; 6])]) -> String {
        let mut out = String::from("Start Year,End Year,Population,Summary,Freedom,Health & Wellbeing,Economic Opportunity,Equality,Culture & Leisure,Peace\n");
        for (start, end, pop, scores) in rows {
            out.push_str(&format!(
                "\"{}\",\"{}\",\"{}\",\"Things happen\",\"{}\"\n",
                start,
                end,
                pop,
                scores.join("\",\"")
            ));
        }
        out
    }

    fn good_table(rows: usize) -> RawTable {
        let rows: Vec<_> = (0..rows as i64)
            .map(|i| (i * 100, i * 100 + 100, "1,000", ["5", "5", "5", "5", "5", "5"]))
            .collect();
        parse_reply(&reply(&rows)).unwrap()
    }

    #[test]
    fn test_parse_population_variants() {
        assert_eq!(parse_population("2,300,000"), Some(2_300_000));
        assert_eq!(parse_population("~2300000"), Some(2_300_000));
        assert_eq!(parse_population("2300000"), Some(2_300_000));
        assert_eq!(parse_population(" ~ 2,300,000 "), Some(2_300_000));
        assert_eq!(parse_population("unknown"), None);
        assert_eq!(parse_population("2.3 million"), None);
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("-1000"), Some(-1000));
        assert_eq!(parse_year("100.0"), Some(100));
        assert_eq!(parse_year("100.5"), None);
        assert_eq!(parse_year("c. 100 BCE"), None);
    }

    #[test]
    fn test_valid_sample_gets_overall() {
        let table = parse_reply(&reply(&[(
            0,
            100,
            "~50,000",
            ["1", "2", "3", "4", "5", "9"],
        )]))
        .unwrap();

        let sample = validate_sample(3, &table, 1).unwrap();
        assert_eq!(sample.index, 3);
        assert_eq!(sample.rows[0].overall, 4.0);
        assert_eq!(sample.rows[0].population, 50_000);
        assert_eq!(sample.rows[0].summary, "Things happen");
    }

    #[test]
    fn test_legacy_category_header_accepted() {
        let text = "Start Year,End Year,Population,Summary,Freedom,Health & Wellbeing,Economic Opportunity,Equality,Culture & Lesure,Peace\n0,100,10,x,1,1,1,1,7,1\n";
        let table = parse_reply(text).unwrap();
        let sample = validate_sample(0, &table, 1).unwrap();
        assert_eq!(sample.rows[0].score(Category::CultureLeisure), 7.0);
    }

    #[test]
    fn test_all_failures_reported() {
        let table = parse_reply(&reply(&[
            (0, 100, "unknown", ["5", "five", "5", "5", "5", "5"]),
            (100, 200, "1000", ["5", "5", "5", "5", "5", "5"]),
        ]))
        .unwrap();

        let errors = validate_sample(0, &table, 3).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(matches!(errors[0], ValidationError::RowCount { expected: 3, actual: 2 }));
        assert!(matches!(errors[1], ValidationError::Overall(_)));
        assert!(matches!(errors[2], ValidationError::Population(_)));
    }

    #[test]
    fn test_missing_column_rejected() {
        let table = parse_reply("Start Year,End Year,Population\n0,100,5\n").unwrap();
        let errors = validate_sample(0, &table, 1).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ValidationError::Overall(_)));
    }

    #[test]
    fn test_out_of_order_periods_rejected() {
        let table = parse_reply(&reply(&[
            (100, 200, "10", ["5", "5", "5", "5", "5", "5"]),
            (0, 100, "10", ["5", "5", "5", "5", "5", "5"]),
        ]))
        .unwrap();
        let errors = validate_sample(0, &table, 2).unwrap_err();
        assert!(matches!(errors[0], ValidationError::Ordering(_)));
    }

    #[test]
    fn test_extra_row_sample_is_dropped() {
        let tables: Vec<(usize, RawTable)> = vec![
            (0, good_table(4)),
            (1, good_table(4)),
            (2, good_table(5)),
            (3, good_table(4)),
            (4, good_table(4)),
        ];

        assert_eq!(expected_row_count(&tables), Some(4));

        let outcome = validate_samples(&tables);
        assert_eq!(outcome.usable.len(), 4);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].index, 2);
        assert!(outcome.rejected[0].describe().starts_with("sample 2:"));
    }

    #[test]
    fn test_even_median_truncates() {
        let tables = vec![(0, good_table(3)), (1, good_table(4))];
        assert_eq!(expected_row_count(&tables), Some(3));
        assert_eq!(expected_row_count(&[]), None);
    }
}
