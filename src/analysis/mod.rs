//! Analysis modules.
//!
//! Reply decoding, cross-sample validation and statistical aggregation.

pub mod aggregator;
pub mod parser;
pub mod stats;
pub mod validator;

pub use aggregator::{aggregate_region, collect_summaries, RegionSummaries};
pub use parser::{parse_reply, RawTable};
pub use validator::validate_samples;
