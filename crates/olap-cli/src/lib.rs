//! Command-line surface of the analytics engine: run the canonical analyses over a directory of
//! Parquet tables, print table sizes, or generate a synthetic star schema to analyze.

pub mod cli;
pub mod generate;
