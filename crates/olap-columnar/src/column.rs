#![forbid(unsafe_code)]

use crate::bitmap::BitVec;
use crate::types::{ColumnType, Value};
use std::sync::Arc;

/// Typed storage for one column. Null slots hold a placeholder value; the
/// column's validity bitmap is authoritative.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnData {
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Utf8 {
        dictionary: Arc<Vec<Arc<str>>>,
        indices: Vec<u32>,
    },
    Boolean(BitVec),
}

impl ColumnData {
    fn len(&self) -> usize {
        match self {
            ColumnData::Int64(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::Utf8 { indices, .. } => indices.len(),
            ColumnData::Boolean(v) => v.len(),
        }
    }

    fn column_type(&self) -> ColumnType {
        match self {
            ColumnData::Int64(_) => ColumnType::Int64,
            ColumnData::Float64(_) => ColumnType::Float64,
            ColumnData::Utf8 { .. } => ColumnType::Utf8,
            ColumnData::Boolean(_) => ColumnType::Boolean,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    name: String,
    data: ColumnData,
    validity: BitVec,
}

impl Column {
    /// Assemble a column from typed storage and a validity bitmap of the same length.
    ///
    /// Returns `None` when the lengths disagree.
    pub fn new(name: impl Into<String>, data: ColumnData, validity: BitVec) -> Option<Self> {
        if data.len() != validity.len() {
            return None;
        }
        Some(Self {
            name: name.into(),
            data,
            validity,
        })
    }

    /// For builders that keep `data` and `validity` in lockstep themselves.
    pub(crate) fn from_parts(name: &str, data: ColumnData, validity: BitVec) -> Self {
        debug_assert_eq!(data.len(), validity.len());
        Self {
            name: name.to_string(),
            data,
            validity,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.data.column_type()
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn validity(&self) -> &BitVec {
        &self.validity
    }

    pub fn len(&self) -> usize {
        self.validity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validity.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.validity.count_zeros()
    }

    #[inline]
    pub fn is_valid(&self, row: usize) -> bool {
        self.validity.get(row)
    }

    /// Integer value at `row`; `None` for nulls, out-of-range rows and non-integer columns.
    #[inline]
    pub fn i64_at(&self, row: usize) -> Option<i64> {
        if !self.is_valid(row) {
            return None;
        }
        match &self.data {
            ColumnData::Int64(values) => values.get(row).copied(),
            _ => None,
        }
    }

    /// Numeric value at `row` widened to `f64`; `None` for nulls and non-numeric columns.
    #[inline]
    pub fn f64_at(&self, row: usize) -> Option<f64> {
        if !self.is_valid(row) {
            return None;
        }
        match &self.data {
            ColumnData::Float64(values) => values.get(row).copied(),
            ColumnData::Int64(values) => values.get(row).map(|v| *v as f64),
            _ => None,
        }
    }

    /// String value at `row`, sharing the dictionary entry.
    #[inline]
    pub fn str_at(&self, row: usize) -> Option<&Arc<str>> {
        if !self.is_valid(row) {
            return None;
        }
        match &self.data {
            ColumnData::Utf8 {
                dictionary,
                indices,
            } => indices.get(row).and_then(|idx| dictionary.get(*idx as usize)),
            _ => None,
        }
    }

    #[inline]
    pub fn bool_at(&self, row: usize) -> Option<bool> {
        if !self.is_valid(row) {
            return None;
        }
        match &self.data {
            ColumnData::Boolean(bits) => Some(bits.get(row)),
            _ => None,
        }
    }

    /// The dictionary backing a string column.
    pub fn dictionary(&self) -> Option<&Arc<Vec<Arc<str>>>> {
        match &self.data {
            ColumnData::Utf8 { dictionary, .. } => Some(dictionary),
            _ => None,
        }
    }

    pub fn value(&self, row: usize) -> Value {
        if !self.is_valid(row) {
            return Value::Null;
        }
        match &self.data {
            ColumnData::Int64(values) => values.get(row).map(|v| Value::Int(*v)),
            ColumnData::Float64(values) => values.get(row).map(|v| Value::Number(*v)),
            ColumnData::Boolean(bits) => Some(Value::Boolean(bits.get(row))),
            ColumnData::Utf8 { .. } => self.str_at(row).cloned().map(Value::String),
        }
        .unwrap_or(Value::Null)
    }
}
