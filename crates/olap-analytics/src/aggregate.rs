//! Single-pass group-by over a fact dataset.
//!
//! Each fact row goes through the same steps:
//! 1. every [`RowFilter`] is evaluated; a failing row is counted in `filtered_rows`
//! 2. every [`GroupRule`] resolves one key component, optionally through a [`DimensionIndex`]
//! 3. the row folds into the accumulators of its group (groups keep first-seen order)
//!
//! Rows whose foreign key is missing from a dimension are dropped (inner-join semantics) and
//! counted in [`ScanStats::unresolved_rows`]; rows with a null group column are counted in
//! [`ScanStats::null_key_rows`].

use crate::dimension::DimensionIndex;
use crate::error::{AnalysisError, AnalysisResult};
use crate::format::MeasureFormat;
use crate::value::Value;
use olap_columnar::{Column, ColumnType, Dataset};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Maps a resolved group value onto its display label.
pub type Relabel = fn(&Value) -> Value;

/// Produces one component of the group key.
#[derive(Clone, Debug)]
pub struct GroupRule {
    pub label: String,
    pub column: String,
    pub dimension: Option<(Arc<DimensionIndex>, String)>,
    pub relabel: Option<Relabel>,
}

impl GroupRule {
    /// Group directly on a fact column.
    pub fn column(column: impl Into<String>) -> Self {
        let column = column.into();
        Self {
            label: column.clone(),
            column,
            dimension: None,
            relabel: None,
        }
    }

    /// Group on `attribute` of the dimension row that fact column `column` points at.
    pub fn through(
        column: impl Into<String>,
        index: Arc<DimensionIndex>,
        attribute: impl Into<String>,
    ) -> Self {
        let attribute = attribute.into();
        Self {
            label: attribute.clone(),
            column: column.into(),
            dimension: Some((index, attribute)),
            relabel: None,
        }
    }

    pub fn relabel(mut self, relabel: Relabel) -> Self {
        self.relabel = Some(relabel);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeasureKind {
    Sum,
    /// Non-null values of the column.
    Count,
    CountDistinct,
    Average,
    Min,
    Max,
    /// Rows in the group, regardless of nulls.
    CountRows,
}

impl MeasureKind {
    fn needs_numeric(self) -> bool {
        matches!(
            self,
            MeasureKind::Sum | MeasureKind::Average | MeasureKind::Min | MeasureKind::Max
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeasureSpec {
    pub name: String,
    pub column: String,
    pub kind: MeasureKind,
    pub format: MeasureFormat,
}

impl MeasureSpec {
    pub fn new(name: impl Into<String>, column: impl Into<String>, kind: MeasureKind) -> Self {
        let format = match kind {
            MeasureKind::Count | MeasureKind::CountDistinct | MeasureKind::CountRows => {
                MeasureFormat::Integer
            }
            _ => MeasureFormat::default(),
        };
        Self {
            name: name.into(),
            column: column.into(),
            kind,
            format,
        }
    }

    pub fn sum(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(name, column, MeasureKind::Sum)
    }

    pub fn average(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(name, column, MeasureKind::Average)
    }

    pub fn count_distinct(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(name, column, MeasureKind::CountDistinct)
    }

    pub fn count_rows(name: impl Into<String>) -> Self {
        Self::new(name, String::new(), MeasureKind::CountRows)
    }

    pub fn with_format(mut self, format: MeasureFormat) -> Self {
        self.format = format;
        self
    }
}

/// `measures[numerator] / measures[denominator] * scale`, computed after the scan.
#[derive(Clone, Debug, PartialEq)]
pub struct DerivedMeasure {
    pub name: String,
    pub numerator: usize,
    pub denominator: usize,
    pub scale: f64,
    pub format: MeasureFormat,
}

impl DerivedMeasure {
    pub fn ratio(name: impl Into<String>, numerator: usize, denominator: usize) -> Self {
        Self {
            name: name.into(),
            numerator,
            denominator,
            scale: 1.0,
            format: MeasureFormat::default(),
        }
    }

    /// Ratio scaled to a percentage.
    pub fn percent(name: impl Into<String>, numerator: usize, denominator: usize) -> Self {
        Self {
            scale: 100.0,
            format: MeasureFormat::Percent,
            ..Self::ratio(name, numerator, denominator)
        }
    }
}

/// Row predicate applied before grouping.
#[derive(Clone, Debug)]
pub enum RowFilter {
    /// Keep rows whose resolved group value equals the given value.
    Equals(GroupRule, Value),
    /// Keep rows whose numeric column is strictly greater than the threshold.
    GreaterThan { column: String, threshold: f64 },
}

#[derive(Clone, Debug, Default)]
pub struct AggregateQuery {
    pub groups: Vec<GroupRule>,
    pub measures: Vec<MeasureSpec>,
    pub derived: Vec<DerivedMeasure>,
    pub filters: Vec<RowFilter>,
}

impl AggregateQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(mut self, rule: GroupRule) -> Self {
        self.groups.push(rule);
        self
    }

    pub fn measure(mut self, spec: MeasureSpec) -> Self {
        self.measures.push(spec);
        self
    }

    pub fn derived(mut self, derived: DerivedMeasure) -> Self {
        self.derived.push(derived);
        self
    }

    pub fn filter(mut self, filter: RowFilter) -> Self {
        self.filters.push(filter);
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub rows_scanned: usize,
    /// Rows dropped because a foreign key had no dimension row.
    pub unresolved_rows: usize,
    /// Rows dropped because a group column was null.
    pub null_key_rows: usize,
    pub filtered_rows: usize,
}

impl ScanStats {
    pub fn rows_aggregated(&self) -> usize {
        self.rows_scanned - self.unresolved_rows - self.null_key_rows - self.filtered_rows
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeasureColumn {
    pub name: String,
    pub format: MeasureFormat,
}

/// One group: its key and one finalized value per measure column.
///
/// `None` is the no-data marker (average of nothing, ratio over zero, min of nothing).
#[derive(Clone, Debug, PartialEq)]
pub struct AggregatedRow {
    pub key: Vec<Value>,
    pub measures: Vec<Option<f64>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AggregatedResult {
    pub group_labels: Vec<String>,
    pub measure_columns: Vec<MeasureColumn>,
    /// Groups in first-seen order.
    pub rows: Vec<AggregatedRow>,
    pub stats: ScanStats,
}

impl AggregatedResult {
    pub fn measure_index(&self, name: &str) -> Option<usize> {
        self.measure_columns.iter().position(|m| m.name == name)
    }

    pub fn group_index(&self, label: &str) -> Option<usize> {
        self.group_labels.iter().position(|g| g == label)
    }

    /// Row whose group key equals `key`.
    pub fn find(&self, key: &[Value]) -> Option<&AggregatedRow> {
        self.rows.iter().find(|r| r.key == key)
    }

    /// Sum of a measure over all groups, skipping no-data cells.
    pub fn total(&self, measure: usize) -> f64 {
        self.rows
            .iter()
            .filter_map(|r| r.measures.get(measure).copied().flatten())
            .sum()
    }
}

enum Resolution {
    Value(Value),
    Unresolved,
    Null,
}

struct CompiledRule<'a> {
    column: &'a Column,
    dimension: Option<(&'a DimensionIndex, usize)>,
    relabel: Option<Relabel>,
}

impl<'a> CompiledRule<'a> {
    fn compile(fact: &'a Dataset, rule: &'a GroupRule) -> AnalysisResult<Self> {
        let column = fact_column(fact, &rule.column)?;
        let dimension = match &rule.dimension {
            None => None,
            Some((index, attribute)) => {
                if column.column_type() != ColumnType::Int64 {
                    return Err(AnalysisError::KeyColumnNotInteger {
                        table: fact.name().to_string(),
                        column: rule.column.clone(),
                        actual: column.column_type(),
                    });
                }
                let pos = index.attribute_position(attribute).ok_or_else(|| {
                    AnalysisError::UnknownColumn {
                        table: index.table().to_string(),
                        column: attribute.clone(),
                    }
                })?;
                Some((&**index, pos))
            }
        };
        Ok(Self {
            column,
            dimension,
            relabel: rule.relabel,
        })
    }

    #[inline]
    fn resolve(&self, row: usize) -> Resolution {
        let value = match self.dimension {
            Some((index, pos)) => {
                let Some(key) = self.column.i64_at(row) else {
                    return Resolution::Null;
                };
                match index.resolve(key) {
                    Some(attrs) => attrs[pos].clone(),
                    None => return Resolution::Unresolved,
                }
            }
            None => {
                let cell = self.column.value(row);
                if cell.is_null() {
                    return Resolution::Null;
                }
                Value::from(cell)
            }
        };
        Resolution::Value(match self.relabel {
            Some(relabel) => relabel(&value),
            None => value,
        })
    }
}

enum CompiledFilter<'a> {
    Equals(CompiledRule<'a>, &'a Value),
    GreaterThan(&'a Column, f64),
}

impl CompiledFilter<'_> {
    #[inline]
    fn keep(&self, row: usize) -> bool {
        match self {
            CompiledFilter::Equals(rule, expected) => {
                matches!(rule.resolve(row), Resolution::Value(v) if &v == *expected)
            }
            CompiledFilter::GreaterThan(column, threshold) => {
                column.f64_at(row).is_some_and(|v| v > *threshold)
            }
        }
    }
}

enum Accumulator {
    Sum(f64),
    Count(u64),
    Distinct(HashSet<Value>),
    Average { sum: f64, count: u64 },
    Min(Option<f64>),
    Max(Option<f64>),
    Rows(u64),
}

impl Accumulator {
    fn new(kind: MeasureKind) -> Self {
        match kind {
            MeasureKind::Sum => Accumulator::Sum(0.0),
            MeasureKind::Count => Accumulator::Count(0),
            MeasureKind::CountDistinct => Accumulator::Distinct(HashSet::new()),
            MeasureKind::Average => Accumulator::Average { sum: 0.0, count: 0 },
            MeasureKind::Min => Accumulator::Min(None),
            MeasureKind::Max => Accumulator::Max(None),
            MeasureKind::CountRows => Accumulator::Rows(0),
        }
    }

    #[inline]
    fn fold(&mut self, column: Option<&Column>, row: usize) {
        match (self, column) {
            (Accumulator::Rows(n), _) => *n += 1,
            (_, None) => {}
            (Accumulator::Sum(sum), Some(c)) => {
                if let Some(v) = c.f64_at(row) {
                    *sum += v;
                }
            }
            (Accumulator::Count(n), Some(c)) => {
                if c.is_valid(row) {
                    *n += 1;
                }
            }
            (Accumulator::Distinct(seen), Some(c)) => {
                let cell = c.value(row);
                if !cell.is_null() {
                    seen.insert(Value::from(cell));
                }
            }
            (Accumulator::Average { sum, count }, Some(c)) => {
                if let Some(v) = c.f64_at(row) {
                    *sum += v;
                    *count += 1;
                }
            }
            (Accumulator::Min(min), Some(c)) => {
                if let Some(v) = c.f64_at(row) {
                    *min = Some(min.map_or(v, |m| m.min(v)));
                }
            }
            (Accumulator::Max(max), Some(c)) => {
                if let Some(v) = c.f64_at(row) {
                    *max = Some(max.map_or(v, |m| m.max(v)));
                }
            }
        }
    }

    fn finish(self) -> Option<f64> {
        match self {
            Accumulator::Sum(sum) => Some(sum),
            Accumulator::Count(n) | Accumulator::Rows(n) => Some(n as f64),
            Accumulator::Distinct(seen) => Some(seen.len() as f64),
            Accumulator::Average { sum, count } => (count > 0).then(|| sum / count as f64),
            Accumulator::Min(v) | Accumulator::Max(v) => v,
        }
    }
}

fn fact_column<'a>(fact: &'a Dataset, name: &str) -> AnalysisResult<&'a Column> {
    fact.column(name).ok_or_else(|| AnalysisError::UnknownColumn {
        table: fact.name().to_string(),
        column: name.to_string(),
    })
}

fn numeric_column<'a>(fact: &'a Dataset, name: &str, measure: &str) -> AnalysisResult<&'a Column> {
    let column = fact_column(fact, name)?;
    if !column.column_type().is_numeric() {
        return Err(AnalysisError::NonNumericMeasure {
            measure: measure.to_string(),
            table: fact.name().to_string(),
            column: name.to_string(),
            actual: column.column_type(),
        });
    }
    Ok(column)
}

/// Group `fact` by `query.groups` and aggregate `query.measures` per group.
pub fn aggregate(fact: &Dataset, query: &AggregateQuery) -> AnalysisResult<AggregatedResult> {
    if query.measures.is_empty() {
        return Err(AnalysisError::InvalidQuery("query has no measures".to_string()));
    }
    for derived in &query.derived {
        let len = query.measures.len();
        if derived.numerator >= len || derived.denominator >= len {
            return Err(AnalysisError::InvalidQuery(format!(
                "derived measure {} references measure {} but the query has {len}",
                derived.name,
                derived.numerator.max(derived.denominator)
            )));
        }
    }

    let rules = query
        .groups
        .iter()
        .map(|rule| CompiledRule::compile(fact, rule))
        .collect::<AnalysisResult<Vec<_>>>()?;

    let mut filters = Vec::with_capacity(query.filters.len());
    for filter in &query.filters {
        filters.push(match filter {
            RowFilter::Equals(rule, value) => {
                CompiledFilter::Equals(CompiledRule::compile(fact, rule)?, value)
            }
            RowFilter::GreaterThan { column, threshold } => {
                CompiledFilter::GreaterThan(numeric_column(fact, column, "filter")?, *threshold)
            }
        });
    }

    let mut measure_columns = Vec::with_capacity(query.measures.len());
    for spec in &query.measures {
        measure_columns.push(match spec.kind {
            MeasureKind::CountRows => None,
            kind if kind.needs_numeric() => Some(numeric_column(fact, &spec.column, &spec.name)?),
            _ => Some(fact_column(fact, &spec.column)?),
        });
    }

    let mut stats = ScanStats::default();
    let mut slots: HashMap<Vec<Value>, usize> = HashMap::new();
    let mut groups: Vec<(Vec<Value>, Vec<Accumulator>)> = Vec::new();
    let mut key: Vec<Value> = Vec::with_capacity(rules.len());

    'rows: for row in 0..fact.row_count() {
        stats.rows_scanned += 1;

        if !filters.iter().all(|f| f.keep(row)) {
            stats.filtered_rows += 1;
            continue;
        }

        key.clear();
        for rule in &rules {
            match rule.resolve(row) {
                Resolution::Value(v) => key.push(v),
                Resolution::Unresolved => {
                    stats.unresolved_rows += 1;
                    continue 'rows;
                }
                Resolution::Null => {
                    stats.null_key_rows += 1;
                    continue 'rows;
                }
            }
        }

        let slot = match slots.get(key.as_slice()) {
            Some(slot) => *slot,
            None => {
                let slot = groups.len();
                slots.insert(key.clone(), slot);
                groups.push((
                    key.clone(),
                    query.measures.iter().map(|m| Accumulator::new(m.kind)).collect(),
                ));
                slot
            }
        };

        for (acc, column) in groups[slot].1.iter_mut().zip(&measure_columns) {
            acc.fold(*column, row);
        }
    }

    log::debug!(
        "aggregated {}: {} rows scanned, {} groups, {} unresolved, {} null keys, {} filtered",
        fact.name(),
        stats.rows_scanned,
        groups.len(),
        stats.unresolved_rows,
        stats.null_key_rows,
        stats.filtered_rows
    );

    let rows = groups
        .into_iter()
        .map(|(key, accs)| {
            let mut measures: Vec<Option<f64>> = accs.into_iter().map(Accumulator::finish).collect();
            for derived in &query.derived {
                let value = match (measures[derived.numerator], measures[derived.denominator]) {
                    (Some(n), Some(d)) if d != 0.0 => Some(n / d * derived.scale),
                    _ => None,
                };
                measures.push(value);
            }
            AggregatedRow { key, measures }
        })
        .collect();

    let measure_columns = query
        .measures
        .iter()
        .map(|m| MeasureColumn {
            name: m.name.clone(),
            format: m.format,
        })
        .chain(query.derived.iter().map(|d| MeasureColumn {
            name: d.name.clone(),
            format: d.format,
        }))
        .collect();

    Ok(AggregatedResult {
        group_labels: query.groups.iter().map(|g| g.label.clone()).collect(),
        measure_columns,
        rows,
        stats,
    })
}
