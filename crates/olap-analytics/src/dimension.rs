use crate::error::{AnalysisError, AnalysisResult};
use crate::value::Value;
use olap_columnar::{ColumnType, Dataset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What to do when a dimension table repeats a key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeyPolicy {
    /// Last row wins; the number of duplicates is logged once.
    #[default]
    Overwrite,
    /// Fail the build with [`AnalysisError::DuplicateDimensionKey`].
    Reject,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DimensionStats {
    pub rows_indexed: usize,
    pub null_keys: usize,
    pub duplicate_keys: usize,
}

/// Maps a dimension's surrogate key to a fixed-shape tuple of attribute values.
///
/// Null attributes are stored as [`Value::Blank`].
#[derive(Clone, Debug)]
pub struct DimensionIndex {
    table: String,
    attributes: Vec<String>,
    entries: HashMap<i64, Box<[Value]>>,
    stats: DimensionStats,
}

impl DimensionIndex {
    pub fn build(dataset: &Dataset, key_column: &str, value_columns: &[&str]) -> AnalysisResult<Self> {
        Self::build_with_policy(dataset, key_column, value_columns, DuplicateKeyPolicy::default())
    }

    pub fn build_with_policy(
        dataset: &Dataset,
        key_column: &str,
        value_columns: &[&str],
        policy: DuplicateKeyPolicy,
    ) -> AnalysisResult<Self> {
        let unknown = |column: &str| AnalysisError::UnknownColumn {
            table: dataset.name().to_string(),
            column: column.to_string(),
        };

        let key = dataset.column(key_column).ok_or_else(|| unknown(key_column))?;
        if key.column_type() != ColumnType::Int64 {
            return Err(AnalysisError::KeyColumnNotInteger {
                table: dataset.name().to_string(),
                column: key_column.to_string(),
                actual: key.column_type(),
            });
        }
        let values = value_columns
            .iter()
            .map(|name| dataset.column(name).ok_or_else(|| unknown(*name)))
            .collect::<AnalysisResult<Vec<_>>>()?;

        let mut entries = HashMap::with_capacity(dataset.row_count());
        let mut stats = DimensionStats::default();
        for row in 0..dataset.row_count() {
            let Some(k) = key.i64_at(row) else {
                stats.null_keys += 1;
                continue;
            };
            let tuple: Box<[Value]> = values.iter().map(|c| Value::from(c.value(row))).collect();
            if entries.insert(k, tuple).is_some() {
                if policy == DuplicateKeyPolicy::Reject {
                    return Err(AnalysisError::DuplicateDimensionKey {
                        table: dataset.name().to_string(),
                        column: key_column.to_string(),
                        key: k,
                    });
                }
                stats.duplicate_keys += 1;
            }
            stats.rows_indexed += 1;
        }

        if stats.duplicate_keys > 0 {
            log::warn!(
                "{}.{} has {} duplicate keys; later rows replaced earlier ones",
                dataset.name(),
                key_column,
                stats.duplicate_keys
            );
        }
        log::debug!(
            "indexed {}.{}: {} keys, {} null keys skipped",
            dataset.name(),
            key_column,
            entries.len(),
            stats.null_keys
        );

        Ok(Self {
            table: dataset.name().to_string(),
            attributes: value_columns.iter().map(|c| c.to_string()).collect(),
            entries,
            stats,
        })
    }

    /// Attribute tuple for `key`, or `None` for a dangling foreign key.
    #[inline]
    pub fn resolve(&self, key: i64) -> Option<&[Value]> {
        self.entries.get(&key).map(|v| &**v)
    }

    pub fn attribute_position(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a == name)
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> DimensionStats {
        self.stats
    }
}
