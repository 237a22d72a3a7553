//! Conversion between Arrow record batches and [`Dataset`]s.
//!
//! Arrow types are mapped onto the four physical column types:
//! - all integer widths, dates and timestamps become `Int64`
//! - `Float16`/`Float32`/`Float64` become `Float64`
//! - `Utf8`/`LargeUtf8`/`Utf8View` become dictionary-encoded `Utf8`
//! - `Boolean` stays `Boolean`
//!
//! Columns of any other type are skipped with a warning.

use crate::bitmap::BitVec;
use crate::column::{Column, ColumnData};
use crate::error::LoadError;
use crate::table::Dataset;
use crate::types::ColumnType;
use arrow_array::cast::AsArray;
use arrow_array::types::{
    ArrowPrimitiveType, Date32Type, Date64Type, Float16Type, Float32Type, Float64Type, Int16Type,
    Int32Type, Int64Type, Int8Type, TimestampMicrosecondType, TimestampMillisecondType,
    TimestampNanosecondType, TimestampSecondType, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow_array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray,
};
use arrow_schema::{ArrowError, DataType, Field, Schema, TimeUnit};
use std::collections::HashMap;
use std::sync::Arc;

/// The column type an Arrow field is loaded as, or `None` when it is unsupported.
pub fn column_type_for(data_type: &DataType) -> Option<ColumnType> {
    match data_type {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64
        | DataType::Date32
        | DataType::Date64
        | DataType::Timestamp(_, _) => Some(ColumnType::Int64),
        DataType::Float16 | DataType::Float32 | DataType::Float64 => Some(ColumnType::Float64),
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => Some(ColumnType::Utf8),
        DataType::Boolean => Some(ColumnType::Boolean),
        _ => None,
    }
}

/// Concatenate a stream of record batches sharing `schema` into one dataset.
pub fn record_batches_to_dataset<I>(
    name: &str,
    schema: &Schema,
    batches: I,
) -> Result<Dataset, LoadError>
where
    I: IntoIterator<Item = Result<RecordBatch, ArrowError>>,
{
    let mut accumulators = Vec::new();
    for (idx, field) in schema.fields().iter().enumerate() {
        match column_type_for(field.data_type()) {
            Some(ty) => accumulators.push((idx, ColumnAccumulator::new(field.name(), ty))),
            None => log::warn!(
                "skipping column {}.{}: unsupported type {}",
                name,
                field.name(),
                field.data_type()
            ),
        }
    }

    for batch in batches {
        let batch = batch?;
        for (idx, acc) in &mut accumulators {
            acc.append(batch.column(*idx))?;
        }
    }

    let columns = accumulators
        .into_iter()
        .map(|(_, acc)| acc.finish())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Dataset::from_columns(name, columns)?)
}

/// Convert a dataset into a single record batch. All fields are nullable.
pub fn dataset_to_record_batch(dataset: &Dataset) -> Result<RecordBatch, ArrowError> {
    let mut fields = Vec::with_capacity(dataset.column_count());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(dataset.column_count());

    for column in dataset.columns() {
        let rows = 0..column.len();
        let (data_type, array): (DataType, ArrayRef) = match column.column_type() {
            ColumnType::Int64 => (
                DataType::Int64,
                Arc::new(rows.map(|r| column.i64_at(r)).collect::<Int64Array>()),
            ),
            ColumnType::Float64 => (
                DataType::Float64,
                Arc::new(rows.map(|r| column.f64_at(r)).collect::<Float64Array>()),
            ),
            ColumnType::Boolean => (
                DataType::Boolean,
                Arc::new(rows.map(|r| column.bool_at(r)).collect::<BooleanArray>()),
            ),
            ColumnType::Utf8 => (
                DataType::Utf8,
                Arc::new(
                    rows.map(|r| column.str_at(r).map(|s| s.as_ref()))
                        .collect::<StringArray>(),
                ),
            ),
        };
        fields.push(Field::new(column.name(), data_type, true));
        arrays.push(array);
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
}

enum ColumnAccumulator {
    Int {
        name: String,
        values: Vec<i64>,
        validity: BitVec,
    },
    Float {
        name: String,
        values: Vec<f64>,
        validity: BitVec,
    },
    Bool {
        name: String,
        values: BitVec,
        validity: BitVec,
    },
    Utf8 {
        name: String,
        dictionary: Vec<Arc<str>>,
        lookup: HashMap<Arc<str>, u32>,
        indices: Vec<u32>,
        validity: BitVec,
    },
}

impl ColumnAccumulator {
    fn new(name: &str, ty: ColumnType) -> Self {
        let name = name.to_string();
        match ty {
            ColumnType::Int64 => Self::Int {
                name,
                values: Vec::new(),
                validity: BitVec::new(),
            },
            ColumnType::Float64 => Self::Float {
                name,
                values: Vec::new(),
                validity: BitVec::new(),
            },
            ColumnType::Boolean => Self::Bool {
                name,
                values: BitVec::new(),
                validity: BitVec::new(),
            },
            ColumnType::Utf8 => Self::Utf8 {
                name,
                dictionary: Vec::new(),
                lookup: HashMap::new(),
                indices: Vec::new(),
                validity: BitVec::new(),
            },
        }
    }

    fn append(&mut self, array: &ArrayRef) -> Result<(), LoadError> {
        match self {
            Self::Int {
                name,
                values,
                validity,
            } => match array.data_type() {
                DataType::Int8 => push_ints::<Int8Type>(array, values, validity, |v| Some(v.into())),
                DataType::Int16 => push_ints::<Int16Type>(array, values, validity, |v| Some(v.into())),
                DataType::Int32 => push_ints::<Int32Type>(array, values, validity, |v| Some(v.into())),
                DataType::Int64 => push_ints::<Int64Type>(array, values, validity, Some),
                DataType::UInt8 => push_ints::<UInt8Type>(array, values, validity, |v| Some(v.into())),
                DataType::UInt16 => push_ints::<UInt16Type>(array, values, validity, |v| Some(v.into())),
                DataType::UInt32 => push_ints::<UInt32Type>(array, values, validity, |v| Some(v.into())),
                DataType::UInt64 => {
                    push_ints::<UInt64Type>(array, values, validity, |v| i64::try_from(v).ok())
                }
                DataType::Date32 => push_ints::<Date32Type>(array, values, validity, |v| Some(v.into())),
                DataType::Date64 => push_ints::<Date64Type>(array, values, validity, Some),
                DataType::Timestamp(TimeUnit::Second, _) => {
                    push_ints::<TimestampSecondType>(array, values, validity, Some)
                }
                DataType::Timestamp(TimeUnit::Millisecond, _) => {
                    push_ints::<TimestampMillisecondType>(array, values, validity, Some)
                }
                DataType::Timestamp(TimeUnit::Microsecond, _) => {
                    push_ints::<TimestampMicrosecondType>(array, values, validity, Some)
                }
                DataType::Timestamp(TimeUnit::Nanosecond, _) => {
                    push_ints::<TimestampNanosecondType>(array, values, validity, Some)
                }
                other => Err(format!("unexpected type {other} for an integer column")),
            }
            .map_err(|reason| LoadError::Malformed {
                column: name.clone(),
                reason,
            }),
            Self::Float {
                name,
                values,
                validity,
            } => {
                match array.data_type() {
                    DataType::Float16 => {
                        let arr = array.as_primitive::<Float16Type>();
                        for i in 0..arr.len() {
                            let valid = arr.is_valid(i);
                            values.push(if valid { arr.value(i).to_f64() } else { 0.0 });
                            validity.push(valid);
                        }
                    }
                    DataType::Float32 => {
                        let arr = array.as_primitive::<Float32Type>();
                        for i in 0..arr.len() {
                            let valid = arr.is_valid(i);
                            values.push(if valid { arr.value(i).into() } else { 0.0 });
                            validity.push(valid);
                        }
                    }
                    DataType::Float64 => {
                        let arr = array.as_primitive::<Float64Type>();
                        for i in 0..arr.len() {
                            let valid = arr.is_valid(i);
                            values.push(if valid { arr.value(i) } else { 0.0 });
                            validity.push(valid);
                        }
                    }
                    other => {
                        return Err(LoadError::Malformed {
                            column: name.clone(),
                            reason: format!("unexpected type {other} for a float column"),
                        })
                    }
                }
                Ok(())
            }
            Self::Bool {
                values, validity, ..
            } => {
                let arr = array.as_boolean();
                for i in 0..arr.len() {
                    let valid = arr.is_valid(i);
                    values.push(valid && arr.value(i));
                    validity.push(valid);
                }
                Ok(())
            }
            Self::Utf8 {
                name,
                dictionary,
                lookup,
                indices,
                validity,
            } => {
                let strings: Box<dyn Iterator<Item = Option<&str>> + '_> = match array.data_type() {
                    DataType::Utf8 => Box::new(array.as_string::<i32>().iter()),
                    DataType::LargeUtf8 => Box::new(array.as_string::<i64>().iter()),
                    DataType::Utf8View => Box::new(array.as_string_view().iter()),
                    other => {
                        return Err(LoadError::Malformed {
                            column: name.clone(),
                            reason: format!("unexpected type {other} for a string column"),
                        })
                    }
                };
                for s in strings {
                    match s {
                        Some(s) => {
                            let idx = match lookup.get(s) {
                                Some(idx) => *idx,
                                None => {
                                    let idx = u32::try_from(dictionary.len()).map_err(|_| {
                                        LoadError::Malformed {
                                            column: name.clone(),
                                            reason: "string dictionary exceeds u32 capacity"
                                                .to_string(),
                                        }
                                    })?;
                                    let s: Arc<str> = Arc::from(s);
                                    dictionary.push(s.clone());
                                    lookup.insert(s, idx);
                                    idx
                                }
                            };
                            indices.push(idx);
                            validity.push(true);
                        }
                        None => {
                            indices.push(0);
                            validity.push(false);
                        }
                    }
                }
                Ok(())
            }
        }
    }

    fn finish(self) -> Result<Column, LoadError> {
        let (name, data, validity) = match self {
            Self::Int {
                name,
                values,
                validity,
            } => (name, ColumnData::Int64(values), validity),
            Self::Float {
                name,
                values,
                validity,
            } => (name, ColumnData::Float64(values), validity),
            Self::Bool {
                name,
                values,
                validity,
            } => (name, ColumnData::Boolean(values), validity),
            Self::Utf8 {
                name,
                dictionary,
                indices,
                validity,
                ..
            } => (
                name,
                ColumnData::Utf8 {
                    dictionary: Arc::new(dictionary),
                    indices,
                },
                validity,
            ),
        };
        Column::new(name.clone(), data, validity).ok_or_else(|| LoadError::Malformed {
            column: name,
            reason: "value and validity lengths differ".to_string(),
        })
    }
}

fn push_ints<T: ArrowPrimitiveType>(
    array: &ArrayRef,
    values: &mut Vec<i64>,
    validity: &mut BitVec,
    convert: impl Fn(T::Native) -> Option<i64>,
) -> Result<(), String> {
    let arr = array.as_primitive::<T>();
    for i in 0..arr.len() {
        if arr.is_null(i) {
            values.push(0);
            validity.push(false);
            continue;
        }
        let v = convert(arr.value(i)).ok_or_else(|| format!("value at row {i} overflows int64"))?;
        values.push(v);
        validity.push(true);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;
    use arrow_array::{Int32Array, LargeStringArray, UInt64Array};

    #[test]
    fn batches_are_concatenated_and_types_widened() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("date_key", DataType::Int32, true),
            Field::new("country", DataType::LargeUtf8, true),
            Field::new("blob", DataType::Binary, true),
        ]));
        let batch = |keys: Vec<Option<i32>>, names: Vec<Option<&str>>| {
            let blobs: arrow_array::BinaryArray = keys.iter().map(|_| Some(&b"x"[..])).collect();
            RecordBatch::try_new(
                schema.clone(),
                vec![
                    Arc::new(Int32Array::from(keys)) as ArrayRef,
                    Arc::new(LargeStringArray::from(names)) as ArrayRef,
                    Arc::new(blobs) as ArrayRef,
                ],
            )
        };

        let ds = record_batches_to_dataset(
            "dim_geography",
            &schema,
            vec![
                batch(vec![Some(1), None], vec![Some("France"), Some("Japan")]),
                batch(vec![Some(3)], vec![Some("France")]),
            ],
        )
        .unwrap();

        assert_eq!(ds.row_count(), 3);
        assert_eq!(ds.column_count(), 2);
        assert!(ds.column("blob").is_none());
        assert_eq!(ds.column("date_key").unwrap().column_type(), ColumnType::Int64);
        assert_eq!(ds.get_cell(1, 0), Value::Null);
        assert_eq!(ds.get_cell(2, 1), Value::from("France"));
        assert_eq!(ds.column("country").unwrap().dictionary().unwrap().len(), 2);
    }

    #[test]
    fn u64_overflow_is_malformed() {
        let schema = Schema::new(vec![Field::new("k", DataType::UInt64, false)]);
        let batch = RecordBatch::try_new(
            Arc::new(schema.clone()),
            vec![Arc::new(UInt64Array::from(vec![u64::MAX])) as ArrayRef],
        );
        let err = record_batches_to_dataset("t", &schema, vec![batch]).unwrap_err();
        assert!(matches!(err, LoadError::Malformed { ref column, .. } if column == "k"));
    }
}
