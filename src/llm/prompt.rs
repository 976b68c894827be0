//! Prompt construction.
//!
//! The rendered prompt is deterministic for a given region and context: it
//! fixes the column schema, the period boundaries and the output format so
//! replies can be decoded mechanically.

use crate::models::{Category, Period, GRID_END, GRID_START, PERIOD_WIDTH};

/// Columns every reply must contain, in order.
pub fn column_headers() -> Vec<&'static str> {
    ["Start Year", "End Year", "Population", "Summary"]
        .into_iter()
        .chain(Category::ALL.iter().map(|c| c.header()))
        .collect()
}

/// Describe the period grid, e.g. "-1000 to -900, -900 to -800, ..., 2000 to 2025".
fn period_outline() -> String {
    let grid = Period::grid();
    let span = |p: &Period| format!("{} to {}", p.start, p.end);

    match grid.as_slice() {
        [first, second, .., last] => {
            format!("{}, {}, ..., {}", span(first), span(second), span(last))
        }
        periods => periods.iter().map(span).collect::<Vec<_>>().join(", "),
    }
}

/// Render the request for one region.
///
/// `context` is appended directly after the region name, so it should start
/// with its own separator (e.g. ", the Nile valley").
pub fn build_prompt(region: &str, context: &str) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "You are a historical data analyst who is an expert on {}{}.\n\n",
        region, context
    ));
    prompt.push_str("For this region, you will be estimating how several different quality of life factors vary across time.\n\n");
    prompt.push_str(&format!(
        "Years you will provide data for: {} to {} in intervals of {} years ({})\n\n",
        GRID_START,
        GRID_END,
        PERIOD_WIDTH,
        period_outline()
    ));

    prompt.push_str("For each period, please provide:\n");
    prompt.push_str(&format!(
        "- A short one-sentence summary of what is happening in {}\n",
        region
    ));
    prompt.push_str(
        "- The rough population of the region in this period (as a number, e.g. 2,300,000)\n",
    );
    prompt.push_str(&format!(
        "- A numeric score from 0 to 10 for each category based on the life of the average person in {} over this period (0 being worst, 10 being best)\n\n",
        region
    ));

    prompt.push_str(
        "Return the data as a **CSV table** with the following columns (headers must be included):\n\n",
    );
    prompt.push_str(&column_headers().join(","));
    prompt.push_str("\n\n");

    prompt.push_str("Some additional context on what each category represents:\n");
    for category in Category::ALL {
        prompt.push_str(&format!("- {} ({})\n", category.header(), category.guidance()));
    }
    prompt.push('\n');

    prompt.push_str(&format!(
        "Only return the CSV table, no markdown, no JSON, no intro or outro text. Please encode / surround ALL values with quotation marks \" and remember this is just for {}\n",
        region
    ));

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_is_deterministic() {
        assert_eq!(build_prompt("Egypt", ""), build_prompt("Egypt", ""));
        assert_ne!(build_prompt("Egypt", ""), build_prompt("China", ""));
    }

    #[test]
    fn test_prompt_fixes_schema_and_periods() {
        let prompt = build_prompt("Mesopotamia", " (modern Iraq)");

        assert!(prompt.contains("an expert on Mesopotamia (modern Iraq)."));
        assert!(prompt.contains("-1000 to -900, -900 to -800, ..., 2000 to 2025"));
        assert!(prompt.contains(
            "Start Year,End Year,Population,Summary,Freedom,Health & Wellbeing,Economic Opportunity,Equality,Culture & Leisure,Peace"
        ));
        assert!(prompt.contains("Only return the CSV table"));
        assert!(prompt.contains("just for Mesopotamia"));
    }

    #[test]
    fn test_column_headers() {
        let headers = column_headers();
        assert_eq!(headers.len(), 10);
        assert_eq!(headers[0], "Start Year");
        assert_eq!(headers[9], "Peace");
    }
}
