use crate::types::ColumnType;
use std::path::PathBuf;

/// Errors raised while constructing a [`crate::Dataset`].
#[derive(Debug, thiserror::Error)]
pub enum ColumnarError {
    #[error("duplicate column {column} in {table}")]
    DuplicateColumn { table: String, column: String },

    #[error("row arity mismatch for {table}: expected {expected} values, got {actual}")]
    RowArity {
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("column length mismatch for {table}.{column}: expected {expected} rows, got {actual}")]
    ColumnLength {
        table: String,
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("type mismatch for {table}.{column}: column is {expected}, got {actual}")]
    TypeMismatch {
        table: String,
        column: String,
        expected: ColumnType,
        actual: String,
    },

    #[error("string dictionary for {table}.{column} exceeds u32 capacity")]
    DictionaryOverflow { table: String, column: String },
}

/// Errors raised by the table loader. A load failure aborts the whole run.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("data file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "arrow")]
    #[error("parquet error: {0}")]
    Parquet(#[from] ::parquet::errors::ParquetError),

    #[cfg(feature = "arrow")]
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("malformed column {column}: {reason}")]
    Malformed { column: String, reason: String },

    #[error(transparent)]
    Columnar(#[from] ColumnarError),
}
