//! Typed errors for querying, parsing, validating and aggregating samples.
//!
//! Per-sample errors (`QueryError`, `ParseError`, `ValidationError`) are
//! recorded and logged but never abort a region. `AggregateError` is the
//! only one that ends a region's run.

use thiserror::Error;

/// Failure talking to the text-generation service.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("API key not set: export {0}")]
    MissingApiKey(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Cannot connect to {0}")]
    Connect(String),

    #[error("Failed to send request: {0}")]
    Transport(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Model returned an empty completion")]
    EmptyCompletion,
}

impl QueryError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            QueryError::MissingApiKey(_) => false,
            QueryError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => true,
        }
    }
}

/// Reply text that does not decode into a table.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Reply is empty")]
    EmptyReply,

    #[error("Reply has a header but no data rows")]
    NoRows,

    #[error("Row {row} has {fields} fields, header has {expected}")]
    RowTooWide {
        row: usize,
        fields: usize,
        expected: usize,
    },

    #[error("Malformed CSV: {0}")]
    Csv(String),
}

/// A decoded table that fails one of the structural or type checks.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Wrong number of rows: expected {expected}, got {actual}")]
    RowCount { expected: usize, actual: usize },

    #[error("Failed to average category scores into Overall: {0}")]
    Overall(String),

    #[error("Failed to extract dates: {0}")]
    Dates(String),

    #[error("Failed to extract population: {0}")]
    Population(String),

    #[error("Periods out of order: {0}")]
    Ordering(String),
}

/// A region whose samples cannot be combined.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregateError {
    #[error("No usable samples for region '{0}'")]
    NoUsableSamples(String),

    #[error("No usable samples for {} regions: {}", .0.len(), .0.join(", "))]
    NoUsableSamplesIn(Vec<String>),

    #[error("Samples for region '{region}' disagree on period count: {counts:?}")]
    Misaligned { region: String, counts: Vec<usize> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(QueryError::Timeout(30).is_transient());
        assert!(QueryError::EmptyCompletion.is_transient());
        assert!(QueryError::Api {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(!QueryError::Api {
            status: 401,
            body: String::new()
        }
        .is_transient());
        assert!(!QueryError::MissingApiKey("OPENAI_API_KEY".to_string()).is_transient());
    }

    #[test]
    fn test_validation_messages_name_the_check() {
        let err = ValidationError::RowCount {
            expected: 31,
            actual: 32,
        };
        assert_eq!(err.to_string(), "Wrong number of rows: expected 31, got 32");
        assert!(ValidationError::Population("unknown".into())
            .to_string()
            .contains("population"));
    }

    #[test]
    fn test_failed_regions_message_lists_each_name() {
        let single = AggregateError::NoUsableSamples("Egypt".to_string());
        assert_eq!(single.to_string(), "No usable samples for region 'Egypt'");

        let several = AggregateError::NoUsableSamplesIn(vec!["Egypt".into(), "Nubia".into()]);
        assert_eq!(
            several.to_string(),
            "No usable samples for 2 regions: Egypt, Nubia"
        );
    }
}
