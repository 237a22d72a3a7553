//! Sorting, truncation and rendering of aggregated results.

use crate::aggregate::AggregatedResult;
use crate::error::{AnalysisError, AnalysisResult};
use crate::value::Value;
use ordered_float::OrderedFloat;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Minimum width of a text table column.
pub const MIN_COLUMN_WIDTH: usize = 15;

/// Marker rendered for measure cells without data.
pub const NO_DATA: &str = "n/a";

/// Display format of a measure. Values keep full precision; the format only applies when
/// rendering text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeasureFormat {
    /// Two decimals with a `$` sign.
    Currency,
    /// One decimal followed by `%`. The value is already scaled to 0..100.
    Percent,
    Integer,
    Decimal(u8),
}

impl Default for MeasureFormat {
    fn default() -> Self {
        MeasureFormat::Decimal(2)
    }
}

impl MeasureFormat {
    pub fn render(self, value: f64) -> String {
        match self {
            MeasureFormat::Currency if value < 0.0 => format!("-${:.2}", -value),
            MeasureFormat::Currency => format!("${value:.2}"),
            MeasureFormat::Percent => format!("{value:.1}%"),
            MeasureFormat::Integer => format!("{value:.0}"),
            MeasureFormat::Decimal(places) => format!("{:.*}", places as usize, value),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Group(Value),
    Measure {
        value: Option<f64>,
        format: MeasureFormat,
    },
}

impl Cell {
    pub fn render(&self) -> String {
        match self {
            Cell::Group(value) => value.to_string(),
            Cell::Measure { value: None, .. } => NO_DATA.to_string(),
            Cell::Measure {
                value: Some(v),
                format,
            } => format.render(*v),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Group(value) => value.as_f64(),
            Cell::Measure { value, .. } => *value,
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Group(value) => value.serialize(serializer),
            Cell::Measure { value, .. } => value.serialize(serializer),
        }
    }
}

/// A rendered, ordered table: column headers plus rows of cells.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl ResultTable {
    /// Fixed-width, right-aligned text rendering.
    pub fn render_text(&self) -> String {
        let rendered: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(Cell::render).collect())
            .collect();

        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, header)| {
                rendered
                    .iter()
                    .filter_map(|row| row.get(i))
                    .map(|s| s.chars().count() + 1)
                    .chain([header.chars().count() + 1, MIN_COLUMN_WIDTH])
                    .max()
                    .unwrap_or(MIN_COLUMN_WIDTH)
            })
            .collect();

        let mut out = String::new();
        for (header, &width) in self.columns.iter().zip(&widths) {
            out.push_str(&format!("{header:>width$}"));
        }
        out.push('\n');
        out.push_str(&"-".repeat(widths.iter().sum()));
        out.push('\n');
        for row in &rendered {
            for (cell, &width) in row.iter().zip(&widths) {
                out.push_str(&format!("{cell:>width$}"));
            }
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for ResultTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_text())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortTarget {
    Group(usize),
    Measure(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub target: SortTarget,
    pub descending: bool,
}

impl SortKey {
    pub fn group(index: usize) -> Self {
        Self {
            target: SortTarget::Group(index),
            descending: false,
        }
    }

    pub fn measure(index: usize) -> Self {
        Self {
            target: SortTarget::Measure(index),
            descending: false,
        }
    }

    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }
}

fn cmp_key(a: &[Value], b: &[Value]) -> Ordering {
    for (a, b) in a.iter().zip(b.iter()) {
        let ord = a.cmp(b);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

fn cmp_measure(a: Option<f64>, b: Option<f64>) -> Ordering {
    a.map(OrderedFloat).cmp(&b.map(OrderedFloat))
}

/// Sort `result` by `sort_keys`, keep the first `row_limit` rows and pair every measure with its
/// format.
///
/// Ties left by the sort keys are broken on the full group key, ascending, so the output does
/// not depend on scan order. A sort key pointing past the result's group or measure columns
/// is an [`AnalysisError::InvalidQuery`].
pub fn format(
    result: &AggregatedResult,
    sort_keys: &[SortKey],
    row_limit: Option<usize>,
) -> AnalysisResult<ResultTable> {
    for key in sort_keys {
        let (kind, index, len) = match key.target {
            SortTarget::Group(i) => ("group", i, result.group_labels.len()),
            SortTarget::Measure(i) => ("measure", i, result.measure_columns.len()),
        };
        if index >= len {
            return Err(AnalysisError::InvalidQuery(format!(
                "sort key references {kind} {index} but the result has {len}"
            )));
        }
    }

    let mut order: Vec<usize> = (0..result.rows.len()).collect();
    order.sort_by(|&a, &b| {
        let (ra, rb) = (&result.rows[a], &result.rows[b]);
        for key in sort_keys {
            let ord = match key.target {
                SortTarget::Group(i) => ra.key[i].cmp(&rb.key[i]),
                SortTarget::Measure(i) => cmp_measure(ra.measures[i], rb.measures[i]),
            };
            let ord = if key.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        cmp_key(&ra.key, &rb.key)
    });
    if let Some(limit) = row_limit {
        order.truncate(limit);
    }

    let columns = result
        .group_labels
        .iter()
        .cloned()
        .chain(result.measure_columns.iter().map(|m| m.name.clone()))
        .collect();

    let rows = order
        .into_iter()
        .map(|idx| {
            let row = &result.rows[idx];
            row.key
                .iter()
                .cloned()
                .map(Cell::Group)
                .chain(
                    row.measures
                        .iter()
                        .zip(&result.measure_columns)
                        .map(|(value, column)| Cell::Measure {
                            value: *value,
                            format: column.format,
                        }),
                )
                .collect()
        })
        .collect();

    Ok(ResultTable { columns, rows })
}

/// Pivot one group component into columns: one row per distinct `row_group` value, one column
/// per distinct `column_group` value, both ascending. Combinations without data are filled
/// with 0; several source rows landing on one cell are summed.
pub fn crosstab(
    result: &AggregatedResult,
    row_group: usize,
    column_group: usize,
    measure: usize,
) -> AnalysisResult<ResultTable> {
    let groups = result.group_labels.len();
    if row_group >= groups || column_group >= groups || row_group == column_group {
        return Err(AnalysisError::InvalidQuery(format!(
            "crosstab needs two distinct group columns below {groups}, got {row_group} and {column_group}"
        )));
    }
    let Some(measure_column) = result.measure_columns.get(measure) else {
        return Err(AnalysisError::InvalidQuery(format!(
            "crosstab measure {measure} is out of range"
        )));
    };

    let mut row_values = BTreeSet::new();
    let mut column_values = BTreeSet::new();
    let mut cells: HashMap<(&Value, &Value), f64> = HashMap::new();
    for row in &result.rows {
        let (r, c) = (&row.key[row_group], &row.key[column_group]);
        row_values.insert(r);
        column_values.insert(c);
        if let Some(v) = row.measures[measure] {
            *cells.entry((r, c)).or_insert(0.0) += v;
        }
    }

    let columns = std::iter::once(result.group_labels[row_group].clone())
        .chain(column_values.iter().map(|v| v.to_string()))
        .collect();
    let rows = row_values
        .iter()
        .map(|r| {
            std::iter::once(Cell::Group((*r).clone()))
                .chain(column_values.iter().map(|c| Cell::Measure {
                    value: Some(cells.get(&(*r, *c)).copied().unwrap_or(0.0)),
                    format: measure_column.format,
                }))
                .collect()
        })
        .collect();

    Ok(ResultTable { columns, rows })
}
