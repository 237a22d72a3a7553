//! Single-column statistical kernels.
//!
//! These operate on one numeric [`Column`] (optionally restricted to a row selection) and do not
//! group. Nulls are ignored everywhere; non-numeric columns yield `None`.

use crate::bitmap::BitVec;
use crate::column::{Column, ColumnData};

/// Summary statistics over the non-null values of a numeric column.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NumericSummary {
    pub count: u64,
    pub sum: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    mean: f64,
    m2: f64,
}

impl NumericSummary {
    fn empty() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: None,
            max: None,
            mean: 0.0,
            m2: 0.0,
        }
    }

    fn push(&mut self, v: f64) {
        self.count += 1;
        self.sum += v;
        self.min = Some(self.min.map_or(v, |m| m.min(v)));
        self.max = Some(self.max.map_or(v, |m| m.max(v)));
        // Welford's update keeps the variance numerically stable on large columns.
        let delta = v - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (v - self.mean);
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Variance with `ddof` delta degrees of freedom (0 = population, 1 = sample).
    pub fn variance(&self, ddof: u64) -> Option<f64> {
        (self.count > ddof).then(|| self.m2 / (self.count - ddof) as f64)
    }

    pub fn stddev(&self, ddof: u64) -> Option<f64> {
        self.variance(ddof).map(f64::sqrt)
    }
}

fn for_each_f64(column: &Column, selection: Option<&BitVec>, mut f: impl FnMut(f64)) -> bool {
    if !column.column_type().is_numeric() {
        return false;
    }
    let selected = |row: usize| selection.map_or(true, |s| s.get(row));
    match column.data() {
        ColumnData::Float64(values) => {
            for (row, v) in values.iter().enumerate() {
                if column.is_valid(row) && selected(row) {
                    f(*v);
                }
            }
        }
        ColumnData::Int64(values) => {
            for (row, v) in values.iter().enumerate() {
                if column.is_valid(row) && selected(row) {
                    f(*v as f64);
                }
            }
        }
        ColumnData::Utf8 { .. } | ColumnData::Boolean(_) => return false,
    }
    true
}

/// Count, sum, min/max, mean and variance in one pass.
pub fn summarize(column: &Column, selection: Option<&BitVec>) -> Option<NumericSummary> {
    let mut summary = NumericSummary::empty();
    for_each_f64(column, selection, |v| summary.push(v)).then_some(summary)
}

/// Quantiles using linear interpolation between the closest ranks.
///
/// Returns `None` for non-numeric or empty columns and for probabilities outside `[0, 1]`.
pub fn quantiles(column: &Column, probabilities: &[f64], selection: Option<&BitVec>) -> Option<Vec<f64>> {
    if probabilities.iter().any(|q| !(0.0..=1.0).contains(q)) {
        return None;
    }

    let mut values = Vec::with_capacity(column.len());
    if !for_each_f64(column, selection, |v| {
        if !v.is_nan() {
            values.push(v)
        }
    }) {
        return None;
    }
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);

    let last = (values.len() - 1) as f64;
    Some(
        probabilities
            .iter()
            .map(|q| {
                let pos = q * last;
                let lower = pos.floor() as usize;
                let upper = pos.ceil() as usize;
                let frac = pos - lower as f64;
                let (lo, hi) = (values[lower], values[upper]);
                (lo + (hi - lo) * frac).clamp(lo, hi)
            })
            .collect(),
    )
}

/// Rows whose value is strictly greater than `threshold`. Nulls are never selected.
pub fn select_greater_than(column: &Column, threshold: f64) -> Option<BitVec> {
    if !column.column_type().is_numeric() {
        return None;
    }
    Some((0..column.len()).map(|row| column.f64_at(row).is_some_and(|v| v > threshold)).collect())
}

/// Number of non-null values of `column` inside `selection`.
pub fn count_selected(column: &Column, selection: &BitVec) -> usize {
    selection.iter_ones().filter(|row| column.is_valid(*row)).count()
}

/// Element-wise `numerator / denominator` summary, skipping rows where either side is null or
/// the denominator is zero.
pub fn summarize_ratio(numerator: &Column, denominator: &Column) -> Option<NumericSummary> {
    if !numerator.column_type().is_numeric() || !denominator.column_type().is_numeric() {
        return None;
    }
    let mut summary = NumericSummary::empty();
    for row in 0..numerator.len().min(denominator.len()) {
        if let (Some(n), Some(d)) = (numerator.f64_at(row), denominator.f64_at(row)) {
            if d != 0.0 {
                summary.push(n / d);
            }
        }
    }
    Some(summary)
}
