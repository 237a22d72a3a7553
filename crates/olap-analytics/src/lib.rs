//! Star-schema analytics over [`olap_columnar`] datasets.
//!
//! The pieces, leaf first:
//! - [`DimensionIndex`]: surrogate key to attribute tuple lookup built from a dimension table.
//! - [`aggregate`]: single-pass group-by over the fact table, resolving group values through
//!   dimension indexes with inner-join semantics.
//! - [`format()`] / [`crosstab`]: sorting, truncation and rendering of aggregated results.
//! - [`Orchestrator`]: runs the canonical sales analyses over a [`StarSchema`].

#![forbid(unsafe_code)]

mod aggregate;
mod analysis;
mod config;
mod dimension;
mod error;
mod format;
mod schema;
mod value;

pub use crate::aggregate::{
    aggregate, AggregateQuery, AggregatedResult, AggregatedRow, DerivedMeasure, GroupRule,
    MeasureColumn, MeasureKind, MeasureSpec, Relabel, RowFilter, ScanStats,
};
pub use crate::analysis::{
    weekend_label, AnalysisFailure, Dimension, DimensionCatalog, Orchestrator, RunReport, Section,
};
pub use crate::config::{AnalysisConfig, AnalysisKind};
pub use crate::dimension::{DimensionIndex, DimensionStats, DuplicateKeyPolicy};
pub use crate::error::{AnalysisError, AnalysisResult};
pub use crate::format::{
    crosstab, format, Cell, MeasureFormat, ResultTable, SortKey, SortTarget, MIN_COLUMN_WIDTH,
    NO_DATA,
};
pub use crate::schema::{
    StarSchema, DIM_CUSTOMER, DIM_GEOGRAPHY, DIM_PRODUCT, DIM_TIME, FACT_SALES,
};
pub use crate::value::Value;
