//! Immutable in-memory columnar datasets for star-schema analytics.
//!
//! This crate focuses on:
//! - Typed columns (`Int64`, `Float64`, dictionary-encoded `Utf8`, `Boolean`) with an explicit
//!   per-row validity bitmap.
//! - Row-wise building with a [`DatasetBuilder`]; datasets are immutable afterwards and meant to
//!   be shared as `Arc<Dataset>` between analyses.
//! - Single-column compute kernels ([`compute`]) for statistics that do not need grouping.
//! - Parquet loading/writing behind the `arrow` feature.

#![forbid(unsafe_code)]

mod bitmap;
mod column;
pub mod compute;
mod error;
mod table;
mod types;

#[cfg(feature = "arrow")]
pub mod arrow;
#[cfg(feature = "arrow")]
pub mod parquet;

pub use crate::bitmap::BitVec;
pub use crate::column::{Column, ColumnData};
pub use crate::error::{ColumnarError, LoadError};
pub use crate::table::{ColumnSchema, Dataset, DatasetBuilder};
pub use crate::types::{ColumnType, Value};
