use olap_columnar::{ColumnType, LoadError};

pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("failed to load {table}: {source}")]
    Load {
        table: String,
        #[source]
        source: LoadError,
    },

    #[error("unknown column {table}.{column}")]
    UnknownColumn { table: String, column: String },

    #[error("key column {table}.{column} must be int64, found {actual}")]
    KeyColumnNotInteger {
        table: String,
        column: String,
        actual: ColumnType,
    },

    #[error("measure {measure} needs a numeric column, {table}.{column} is {actual}")]
    NonNumericMeasure {
        measure: String,
        table: String,
        column: String,
        actual: ColumnType,
    },

    #[error("duplicate key {key} in dimension {table}.{column}")]
    DuplicateDimensionKey {
        table: String,
        column: String,
        key: i64,
    },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("dimension {dimension} is unavailable: {reason}")]
    DimensionUnavailable { dimension: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}
