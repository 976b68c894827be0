//! Output artifact and run report generation.

pub mod generator;

pub use generator::*;
