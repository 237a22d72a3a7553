#![forbid(unsafe_code)]

use crate::bitmap::BitVec;
use crate::column::{Column, ColumnData};
use crate::error::ColumnarError;
use crate::types::{ColumnType, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// An immutable, named set of equally long columns.
///
/// Datasets are never mutated after construction; share them between analyses as
/// `Arc<Dataset>`.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    name: String,
    schema: Vec<ColumnSchema>,
    columns: Vec<Column>,
    column_index: HashMap<String, usize>,
    rows: usize,
}

impl Dataset {
    /// Build a dataset from already-assembled columns.
    pub fn from_columns(name: impl Into<String>, columns: Vec<Column>) -> Result<Self, ColumnarError> {
        let name = name.into();
        let rows = columns.first().map(Column::len).unwrap_or(0);

        let mut column_index = HashMap::with_capacity(columns.len());
        for (idx, column) in columns.iter().enumerate() {
            if column.len() != rows {
                return Err(ColumnarError::ColumnLength {
                    table: name.clone(),
                    column: column.name().to_string(),
                    expected: rows,
                    actual: column.len(),
                });
            }
            if column_index.insert(column.name().to_string(), idx).is_some() {
                return Err(ColumnarError::DuplicateColumn {
                    table: name.clone(),
                    column: column.name().to_string(),
                });
            }
        }

        let schema = columns
            .iter()
            .map(|c| ColumnSchema::new(c.name(), c.column_type()))
            .collect();

        Ok(Self {
            name,
            schema,
            columns,
            column_index,
            rows,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &[ColumnSchema] {
        &self.schema
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_idx(&self, name: &str) -> Option<usize> {
        self.column_index.get(name).copied()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(self.column_idx(name)?)
    }

    pub fn column_by_idx(&self, idx: usize) -> Option<&Column> {
        self.columns.get(idx)
    }

    pub fn get_cell(&self, row: usize, col: usize) -> Value {
        match self.columns.get(col) {
            Some(column) if row < self.rows => column.value(row),
            _ => Value::Null,
        }
    }

    pub fn into_shared(self) -> Arc<Dataset> {
        Arc::new(self)
    }
}

/// Row-wise builder for a [`Dataset`].
pub struct DatasetBuilder {
    name: String,
    schema: Vec<ColumnSchema>,
    builders: Vec<ColumnBuilder>,
    rows: usize,
}

enum ColumnBuilder {
    Int(IntBuilder),
    Float(FloatBuilder),
    Bool(BoolBuilder),
    Dict(DictBuilder),
}

struct IntBuilder {
    values: Vec<i64>,
    validity: BitVec,
}

struct FloatBuilder {
    values: Vec<f64>,
    validity: BitVec,
}

struct BoolBuilder {
    values: BitVec,
    validity: BitVec,
}

struct DictBuilder {
    dictionary: Vec<Arc<str>>,
    dict_map: HashMap<Arc<str>, u32>,
    indices: Vec<u32>,
    validity: BitVec,
}

impl DatasetBuilder {
    /// Start a builder for `schema`. Column names must be unique.
    pub fn new(name: impl Into<String>, schema: Vec<ColumnSchema>) -> Result<Self, ColumnarError> {
        let name = name.into();
        let mut seen = HashSet::with_capacity(schema.len());
        for col in &schema {
            if !seen.insert(col.name.as_str()) {
                return Err(ColumnarError::DuplicateColumn {
                    table: name,
                    column: col.name.clone(),
                });
            }
        }

        let builders = schema
            .iter()
            .map(|col| match col.column_type {
                ColumnType::Int64 => ColumnBuilder::Int(IntBuilder {
                    values: Vec::new(),
                    validity: BitVec::new(),
                }),
                ColumnType::Float64 => ColumnBuilder::Float(FloatBuilder {
                    values: Vec::new(),
                    validity: BitVec::new(),
                }),
                ColumnType::Boolean => ColumnBuilder::Bool(BoolBuilder {
                    values: BitVec::new(),
                    validity: BitVec::new(),
                }),
                ColumnType::Utf8 => ColumnBuilder::Dict(DictBuilder {
                    dictionary: Vec::new(),
                    dict_map: HashMap::new(),
                    indices: Vec::new(),
                    validity: BitVec::new(),
                }),
            })
            .collect();

        Ok(Self {
            name,
            schema,
            builders,
            rows: 0,
        })
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Append one row. The row is validated before anything is written, so a rejected row
    /// leaves the builder untouched.
    pub fn append_row(&mut self, row: &[Value]) -> Result<(), ColumnarError> {
        if row.len() != self.builders.len() {
            return Err(ColumnarError::RowArity {
                table: self.name.clone(),
                expected: self.builders.len(),
                actual: row.len(),
            });
        }

        for ((builder, value), schema) in self.builders.iter().zip(row).zip(&self.schema) {
            if !builder.accepts(value) {
                return Err(ColumnarError::TypeMismatch {
                    table: self.name.clone(),
                    column: schema.name.clone(),
                    expected: schema.column_type,
                    actual: format!("{value:?}"),
                });
            }
        }

        for ((builder, value), schema) in self.builders.iter_mut().zip(row).zip(&self.schema) {
            builder.push(value).map_err(|()| ColumnarError::DictionaryOverflow {
                table: self.name.clone(),
                column: schema.name.clone(),
            })?;
        }

        self.rows += 1;
        Ok(())
    }

    pub fn finalize(self) -> Dataset {
        let columns: Vec<Column> = self
            .builders
            .into_iter()
            .zip(&self.schema)
            .map(|(builder, schema)| builder.finish(&schema.name))
            .collect();

        let column_index = self
            .schema
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.name.clone(), idx))
            .collect();

        Dataset {
            name: self.name,
            schema: self.schema,
            columns,
            column_index,
            rows: self.rows,
        }
    }
}

impl ColumnBuilder {
    fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (ColumnBuilder::Int(_), Value::Int(_))
                | (ColumnBuilder::Float(_), Value::Number(_) | Value::Int(_))
                | (ColumnBuilder::Bool(_), Value::Boolean(_))
                | (ColumnBuilder::Dict(_), Value::String(_))
        )
    }

    /// Push a value already checked by [`ColumnBuilder::accepts`]. Fails only when a string
    /// dictionary would overflow its `u32` index space.
    fn push(&mut self, value: &Value) -> Result<(), ()> {
        match (self, value) {
            (ColumnBuilder::Int(b), Value::Int(v)) => {
                b.values.push(*v);
                b.validity.push(true);
            }
            (ColumnBuilder::Int(b), _) => {
                b.values.push(0);
                b.validity.push(false);
            }
            (ColumnBuilder::Float(b), Value::Number(v)) => {
                b.values.push(*v);
                b.validity.push(true);
            }
            (ColumnBuilder::Float(b), Value::Int(v)) => {
                b.values.push(*v as f64);
                b.validity.push(true);
            }
            (ColumnBuilder::Float(b), _) => {
                b.values.push(0.0);
                b.validity.push(false);
            }
            (ColumnBuilder::Bool(b), Value::Boolean(v)) => {
                b.values.push(*v);
                b.validity.push(true);
            }
            (ColumnBuilder::Bool(b), _) => {
                b.values.push(false);
                b.validity.push(false);
            }
            (ColumnBuilder::Dict(b), Value::String(s)) => {
                let idx = b.intern(s).ok_or(())?;
                b.indices.push(idx);
                b.validity.push(true);
            }
            (ColumnBuilder::Dict(b), _) => {
                b.indices.push(0);
                b.validity.push(false);
            }
        }
        Ok(())
    }

    fn finish(self, name: &str) -> Column {
        let (data, validity) = match self {
            ColumnBuilder::Int(b) => (ColumnData::Int64(b.values), b.validity),
            ColumnBuilder::Float(b) => (ColumnData::Float64(b.values), b.validity),
            ColumnBuilder::Bool(b) => (ColumnData::Boolean(b.values), b.validity),
            ColumnBuilder::Dict(b) => (
                ColumnData::Utf8 {
                    dictionary: Arc::new(b.dictionary),
                    indices: b.indices,
                },
                b.validity,
            ),
        };
        Column::from_parts(name, data, validity)
    }
}

impl DictBuilder {
    fn intern(&mut self, s: &Arc<str>) -> Option<u32> {
        if let Some(idx) = self.dict_map.get(s.as_ref()) {
            return Some(*idx);
        }

        let idx = u32::try_from(self.dictionary.len()).ok()?;
        self.dictionary.push(s.clone());
        self.dict_map.insert(s.clone(), idx);
        Some(idx)
    }
}
