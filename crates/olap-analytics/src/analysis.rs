//! Runs the canonical analyses over a loaded [`StarSchema`].
//!
//! Dimension indexes are built once per run and shared by every analysis. An analysis that fails
//! is reported in [`RunReport::failures`] and the remaining analyses still run.

use crate::aggregate::{
    aggregate, AggregateQuery, AggregatedResult, DerivedMeasure, GroupRule, MeasureKind,
    MeasureSpec, RowFilter, ScanStats,
};
use crate::config::{AnalysisConfig, AnalysisKind};
use crate::dimension::{DimensionIndex, DuplicateKeyPolicy};
use crate::error::{AnalysisError, AnalysisResult};
use crate::format::{crosstab, format, Cell, MeasureFormat, ResultTable, SortKey};
use crate::schema::{StarSchema, DIM_CUSTOMER, DIM_GEOGRAPHY, DIM_PRODUCT, DIM_TIME};
use crate::value::Value;
use olap_columnar::compute::{self, NumericSummary};
use olap_columnar::{BitVec, Column, Dataset};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

const GROSS_SALES: &str = "gross_sales";
const PROFIT: &str = "profit";
const QUANTITY: &str = "quantity";
const CUSTOMER_KEY: &str = "customer_key";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dimension {
    Time,
    Geography,
    Product,
    Customer,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Time,
        Dimension::Geography,
        Dimension::Product,
        Dimension::Customer,
    ];

    pub fn table(self) -> &'static str {
        match self {
            Dimension::Time => DIM_TIME,
            Dimension::Geography => DIM_GEOGRAPHY,
            Dimension::Product => DIM_PRODUCT,
            Dimension::Customer => DIM_CUSTOMER,
        }
    }

    /// Surrogate key column, named the same in the dimension and the fact table.
    pub fn key_column(self) -> &'static str {
        match self {
            Dimension::Time => "date_key",
            Dimension::Geography => "geography_key",
            Dimension::Product => "product_key",
            Dimension::Customer => CUSTOMER_KEY,
        }
    }

    /// Dimensions whose indexes `kind` resolves through.
    pub fn required_by(kind: AnalysisKind) -> &'static [Dimension] {
        match kind {
            AnalysisKind::Overview => &[],
            AnalysisKind::SalesByTime => &[Dimension::Time],
            AnalysisKind::SalesByGeography => &[Dimension::Geography],
            AnalysisKind::SalesByProduct => &[Dimension::Product],
            AnalysisKind::CustomerSegments => &[Dimension::Customer],
            AnalysisKind::Multidimensional => {
                &[Dimension::Time, Dimension::Geography, Dimension::Product]
            }
        }
    }

    pub fn attributes(self) -> &'static [&'static str] {
        match self {
            Dimension::Time => &["year", "quarter", "month", "is_weekend"],
            Dimension::Geography => &["region", "country", "city"],
            Dimension::Product => &["category", "subcategory", "product_name"],
            Dimension::Customer => &["customer_type"],
        }
    }
}

/// The dimension indexes of one run. A dimension that failed to build keeps its reason.
pub struct DimensionCatalog {
    indexes: HashMap<Dimension, Result<Arc<DimensionIndex>, String>>,
}

impl DimensionCatalog {
    /// Build the indexes of `dimensions` only; other dimensions report as not built.
    pub fn build(schema: &StarSchema, policy: DuplicateKeyPolicy, dimensions: &[Dimension]) -> Self {
        let indexes = Dimension::ALL
            .into_iter()
            .filter(|dim| dimensions.contains(dim))
            .map(|dim| {
                let built = match schema.dimension(dim.table()) {
                    None => Err(format!("table {} is not loaded", dim.table())),
                    Some(dataset) => DimensionIndex::build_with_policy(
                        dataset,
                        dim.key_column(),
                        dim.attributes(),
                        policy,
                    )
                    .map(Arc::new)
                    .map_err(|e| e.to_string()),
                };
                if let Err(reason) = &built {
                    log::warn!("dimension {} unavailable: {reason}", dim.table());
                }
                (dim, built)
            })
            .collect();
        Self { indexes }
    }

    pub fn get(&self, dim: Dimension) -> AnalysisResult<Arc<DimensionIndex>> {
        match self.indexes.get(&dim) {
            Some(Ok(index)) => Ok(index.clone()),
            Some(Err(reason)) => Err(AnalysisError::DimensionUnavailable {
                dimension: dim.table().to_string(),
                reason: reason.clone(),
            }),
            None => Err(AnalysisError::DimensionUnavailable {
                dimension: dim.table().to_string(),
                reason: "not built".to_string(),
            }),
        }
    }

    /// Group rule resolving the fact's foreign key for `dim` to `attribute`.
    pub fn rule(&self, dim: Dimension, attribute: &str) -> AnalysisResult<GroupRule> {
        Ok(GroupRule::through(dim.key_column(), self.get(dim)?, attribute))
    }
}

/// One titled table of a report.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Section {
    pub analysis: AnalysisKind,
    pub title: String,
    pub table: ResultTable,
    /// Scan statistics for sections produced by a group-by.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ScanStats>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisFailure {
    pub analysis: AnalysisKind,
    #[serde(serialize_with = "serialize_error")]
    pub error: AnalysisError,
}

fn serialize_error<S: Serializer>(error: &AnalysisError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub sections: Vec<Section>,
    pub failures: Vec<AnalysisFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            let _ = writeln!(out, "\n{}", section.title);
            let _ = writeln!(out, "{}", "=".repeat(section.title.chars().count()));
            out.push_str(&section.table.render_text());
            if let Some(stats) = section.stats {
                let excluded = stats.unresolved_rows + stats.null_key_rows;
                if excluded > 0 {
                    let _ = writeln!(
                        out,
                        "({} rows excluded: {} unresolved keys, {} null keys)",
                        excluded, stats.unresolved_rows, stats.null_key_rows
                    );
                }
            }
        }
        for failure in &self.failures {
            let _ = writeln!(out, "\n{} failed: {}", failure.analysis, failure.error);
        }
        out
    }
}

pub struct Orchestrator {
    schema: Arc<StarSchema>,
    config: AnalysisConfig,
}

impl Orchestrator {
    pub fn new(schema: Arc<StarSchema>, config: AnalysisConfig) -> Self {
        Self { schema, config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Build the dimension catalog and run every configured analysis.
    pub fn run(&self) -> RunReport {
        let needed: Vec<Dimension> = Dimension::ALL
            .into_iter()
            .filter(|dim| {
                self.config
                    .analyses
                    .iter()
                    .any(|kind| Dimension::required_by(*kind).contains(dim))
            })
            .collect();
        let catalog = DimensionCatalog::build(&self.schema, self.config.duplicate_keys, &needed);
        let run_one = |kind: AnalysisKind| (kind, self.run_analysis(kind, &catalog));

        #[cfg(feature = "parallel")]
        let outcomes: Vec<_> = {
            use rayon::prelude::*;
            self.config.analyses.par_iter().map(|k| run_one(*k)).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let outcomes: Vec<_> = self.config.analyses.iter().map(|k| run_one(*k)).collect();

        let mut report = RunReport::default();
        for (analysis, outcome) in outcomes {
            match outcome {
                Ok(sections) => report.sections.extend(sections),
                Err(error) => {
                    log::warn!("analysis {analysis} failed: {error}");
                    report.failures.push(AnalysisFailure { analysis, error });
                }
            }
        }
        log::info!(
            "ran {} analyses: {} sections, {} failures",
            self.config.analyses.len(),
            report.sections.len(),
            report.failures.len()
        );
        report
    }

    /// Run one analysis. Sections are only returned when every part of it succeeded.
    pub fn run_analysis(
        &self,
        kind: AnalysisKind,
        catalog: &DimensionCatalog,
    ) -> AnalysisResult<Vec<Section>> {
        let run = AnalysisRun {
            kind,
            fact: self.schema.fact(),
            catalog,
            config: &self.config,
            sections: Vec::new(),
        };
        match kind {
            AnalysisKind::Overview => run.overview(),
            AnalysisKind::SalesByTime => run.sales_by_time(),
            AnalysisKind::SalesByGeography => run.sales_by_geography(),
            AnalysisKind::SalesByProduct => run.sales_by_product(),
            AnalysisKind::CustomerSegments => run.customer_segments(),
            AnalysisKind::Multidimensional => run.multidimensional(),
        }
    }
}

/// Labels the `is_weekend` attribute, stored either as a boolean or as 0/1.
pub fn weekend_label(value: &Value) -> Value {
    let weekend = match value {
        Value::Boolean(b) => *b,
        Value::Integer(i) => *i != 0,
        Value::Number(n) => n.0 != 0.0,
        _ => return Value::Blank,
    };
    Value::from(if weekend { "Weekend" } else { "Weekday" })
}

fn currency(name: &str, column: &str) -> MeasureSpec {
    MeasureSpec::sum(name, column).with_format(MeasureFormat::Currency)
}

fn sales_measures(query: AggregateQuery) -> AggregateQuery {
    query
        .measure(currency("gross_sales", GROSS_SALES))
        .measure(currency("profit", PROFIT))
        .measure(MeasureSpec::sum("quantity", QUANTITY).with_format(MeasureFormat::Integer))
}

struct Metric {
    label: String,
    value: Option<f64>,
    format: MeasureFormat,
}

impl Metric {
    fn new(label: impl Into<String>, value: Option<f64>, format: MeasureFormat) -> Self {
        Self {
            label: label.into(),
            value,
            format,
        }
    }
}

fn metric_table(metrics: Vec<Metric>) -> ResultTable {
    ResultTable {
        columns: vec!["metric".to_string(), "value".to_string()],
        rows: metrics
            .into_iter()
            .map(|m| {
                vec![
                    Cell::Group(Value::from(m.label)),
                    Cell::Measure {
                        value: m.value,
                        format: m.format,
                    },
                ]
            })
            .collect(),
    }
}

fn ratio(numerator: f64, denominator: f64, scale: f64) -> Option<f64> {
    (denominator != 0.0).then(|| numerator / denominator * scale)
}

fn percentile_label(q: f64) -> String {
    format!("P{}", (q * 1000.0).round() / 10.0)
}

struct AnalysisRun<'a> {
    kind: AnalysisKind,
    fact: &'a Arc<Dataset>,
    catalog: &'a DimensionCatalog,
    config: &'a AnalysisConfig,
    sections: Vec<Section>,
}

impl<'a> AnalysisRun<'a> {
    fn numeric(&self, name: &str) -> AnalysisResult<&'a Column> {
        let column = self.fact.column(name).ok_or_else(|| AnalysisError::UnknownColumn {
            table: self.fact.name().to_string(),
            column: name.to_string(),
        })?;
        if !column.column_type().is_numeric() {
            return Err(self.not_numeric(name, column));
        }
        Ok(column)
    }

    fn summarize(&self, name: &str, selection: Option<&BitVec>) -> AnalysisResult<NumericSummary> {
        let column = self.numeric(name)?;
        compute::summarize(column, selection).ok_or_else(|| self.not_numeric(name, column))
    }

    /// Summary of the per-row ratio `numerator / denominator`.
    fn summarize_ratio(&self, numerator: &str, denominator: &str) -> AnalysisResult<NumericSummary> {
        let (n, d) = (self.numeric(numerator)?, self.numeric(denominator)?);
        compute::summarize_ratio(n, d).ok_or_else(|| self.not_numeric(numerator, n))
    }

    fn not_numeric(&self, name: &str, column: &Column) -> AnalysisError {
        AnalysisError::NonNumericMeasure {
            measure: name.to_string(),
            table: self.fact.name().to_string(),
            column: name.to_string(),
            actual: column.column_type(),
        }
    }

    fn push_table(&mut self, title: impl Into<String>, table: ResultTable) {
        self.sections.push(Section {
            analysis: self.kind,
            title: title.into(),
            table,
            stats: None,
        });
    }

    fn push_result(
        &mut self,
        title: impl Into<String>,
        result: &AggregatedResult,
        sort: &[SortKey],
        limit: Option<usize>,
    ) -> AnalysisResult<()> {
        self.sections.push(Section {
            analysis: self.kind,
            title: title.into(),
            table: format(result, sort, limit)?,
            stats: Some(result.stats),
        });
        Ok(())
    }

    /// Most recent `limit` periods, shown oldest first.
    fn push_recent(
        &mut self,
        title: impl Into<String>,
        result: &AggregatedResult,
        limit: usize,
    ) -> AnalysisResult<()> {
        let mut table = format(
            result,
            &[SortKey::group(0).descending(), SortKey::group(1).descending()],
            Some(limit),
        )?;
        table.rows.reverse();
        self.sections.push(Section {
            analysis: self.kind,
            title: title.into(),
            table,
            stats: Some(result.stats),
        });
        Ok(())
    }

    fn overview(mut self) -> AnalysisResult<Vec<Section>> {
        let sales = self.summarize(GROSS_SALES, None)?;
        let profit = self.summarize(PROFIT, None)?;
        let quantity = self.summarize(QUANTITY, None)?;
        let margin = self.summarize_ratio(PROFIT, GROSS_SALES)?;

        let table = metric_table(vec![
            Metric::new("Total Records", Some(self.fact.row_count() as f64), MeasureFormat::Integer),
            Metric::new("Total Gross Sales", Some(sales.sum), MeasureFormat::Currency),
            Metric::new("Total Profit", Some(profit.sum), MeasureFormat::Currency),
            Metric::new("Total Quantity", Some(quantity.sum), MeasureFormat::Integer),
            Metric::new("Average Sale", sales.mean(), MeasureFormat::Currency),
            Metric::new("Profit Margin", ratio(profit.sum, sales.sum, 100.0), MeasureFormat::Percent),
            Metric::new("Min Sale", sales.min, MeasureFormat::Currency),
            Metric::new("Max Sale", sales.max, MeasureFormat::Currency),
            Metric::new(
                "Mean Transaction Margin",
                margin.mean().map(|m| m * 100.0),
                MeasureFormat::Percent,
            ),
        ]);
        self.push_table("Overview", table);
        Ok(self.sections)
    }

    fn sales_by_time(mut self) -> AnalysisResult<Vec<Section>> {
        let c = self.catalog;

        let by_year = aggregate(
            self.fact,
            &sales_measures(AggregateQuery::new().group(c.rule(Dimension::Time, "year")?)),
        )?;
        self.push_result("Sales by Year", &by_year, &[SortKey::group(0)], None)?;

        let by_quarter = aggregate(
            self.fact,
            &sales_measures(
                AggregateQuery::new()
                    .group(c.rule(Dimension::Time, "year")?)
                    .group(c.rule(Dimension::Time, "quarter")?),
            ),
        )?;
        let limit = self.config.recent_quarters;
        self.push_recent(format!("Sales by Quarter (last {limit})"), &by_quarter, limit)?;

        let weekend = aggregate(
            self.fact,
            &AggregateQuery::new()
                .group(
                    c.rule(Dimension::Time, "is_weekend")?
                        .relabel(weekend_label)
                        .with_label("day_type"),
                )
                .measure(currency("total_sales", GROSS_SALES))
                .measure(MeasureSpec::average("avg_sales", GROSS_SALES).with_format(MeasureFormat::Currency))
                .measure(currency("total_profit", PROFIT))
                .measure(MeasureSpec::average("avg_profit", PROFIT).with_format(MeasureFormat::Currency)),
        )?;
        self.push_result("Weekend vs Weekday", &weekend, &[SortKey::group(0)], None)?;
        Ok(self.sections)
    }

    fn sales_by_geography(mut self) -> AnalysisResult<Vec<Section>> {
        let c = self.catalog;

        let by_region = aggregate(
            self.fact,
            &sales_measures(AggregateQuery::new().group(c.rule(Dimension::Geography, "region")?)),
        )?;
        self.push_result(
            "Sales by Region",
            &by_region,
            &[SortKey::measure(0).descending()],
            None,
        )?;

        let by_country = aggregate(
            self.fact,
            &AggregateQuery::new()
                .group(c.rule(Dimension::Geography, "country")?)
                .measure(currency("gross_sales", GROSS_SALES))
                .measure(currency("profit", PROFIT)),
        )?;
        let top_n = self.config.top_n;
        self.push_result(
            format!("Top {top_n} Countries by Sales"),
            &by_country,
            &[SortKey::measure(0).descending()],
            Some(top_n),
        )?;

        let threshold = self.config.high_value_threshold;
        let gross = self.numeric(GROSS_SALES)?;
        let high = compute::select_greater_than(gross, threshold)
            .unwrap_or_else(|| BitVec::with_len_all_false(gross.len()));
        let high_count = compute::count_selected(gross, &high);
        let high_sales = self.summarize(GROSS_SALES, Some(&high))?.sum;
        let high_profit = self.summarize(PROFIT, Some(&high))?.sum;
        let table = metric_table(vec![
            Metric::new("High-Value Transactions", Some(high_count as f64), MeasureFormat::Integer),
            Metric::new(
                "Share of Transactions",
                ratio(high_count as f64, self.fact.row_count() as f64, 100.0),
                MeasureFormat::Percent,
            ),
            Metric::new("High-Value Sales", Some(high_sales), MeasureFormat::Currency),
            Metric::new("High-Value Profit", Some(high_profit), MeasureFormat::Currency),
        ]);
        self.push_table(format!("High-Value Sales (> ${threshold:.2})"), table);
        Ok(self.sections)
    }

    fn sales_by_product(mut self) -> AnalysisResult<Vec<Section>> {
        let c = self.catalog;

        let by_category = aggregate(
            self.fact,
            &sales_measures(AggregateQuery::new().group(c.rule(Dimension::Product, "category")?)),
        )?;
        self.push_result(
            "Sales by Category",
            &by_category,
            &[SortKey::measure(0).descending()],
            None,
        )?;

        let margin = aggregate(
            self.fact,
            &AggregateQuery::new()
                .group(c.rule(Dimension::Product, "category")?)
                .measure(currency("profit", PROFIT))
                .measure(currency("gross_sales", GROSS_SALES))
                .derived(DerivedMeasure::percent("profit_margin", 0, 1)),
        )?;
        self.push_result(
            "Profit Margin by Category",
            &margin,
            &[SortKey::measure(2).descending()],
            None,
        )?;

        let top_n = self.config.top_n;
        let by_product = aggregate(
            self.fact,
            &AggregateQuery::new()
                .group(c.rule(Dimension::Product, "product_name")?)
                .measure(currency("gross_sales", GROSS_SALES))
                .measure(MeasureSpec::sum("quantity", QUANTITY).with_format(MeasureFormat::Integer)),
        )?;
        self.push_result(
            format!("Top {top_n} Products by Sales"),
            &by_product,
            &[SortKey::measure(0).descending()],
            Some(top_n),
        )?;

        let gross = self.numeric(GROSS_SALES)?;
        let mut metrics = Vec::new();
        let quantiles = compute::quantiles(gross, &self.config.percentiles, None)
            .unwrap_or_else(|| vec![f64::NAN; self.config.percentiles.len()]);
        for (q, value) in self.config.percentiles.iter().zip(quantiles) {
            metrics.push(Metric::new(
                percentile_label(*q),
                (!value.is_nan()).then_some(value),
                MeasureFormat::Currency,
            ));
        }
        let summary = self.summarize(GROSS_SALES, None)?;
        metrics.push(Metric::new(
            "Standard Deviation",
            summary.stddev(0),
            MeasureFormat::Currency,
        ));
        metrics.push(Metric::new("Variance", summary.variance(0), MeasureFormat::Decimal(2)));
        let per_item = self.summarize_ratio(PROFIT, QUANTITY)?;
        metrics.push(Metric::new(
            "Average Profit per Item",
            per_item.mean(),
            MeasureFormat::Currency,
        ));
        self.push_table("Sales Distribution", metric_table(metrics));
        Ok(self.sections)
    }

    fn customer_segments(mut self) -> AnalysisResult<Vec<Section>> {
        let segments = aggregate(
            self.fact,
            &AggregateQuery::new()
                .group(self.catalog.rule(Dimension::Customer, "customer_type")?)
                .measure(currency("total_sales", GROSS_SALES))
                .measure(MeasureSpec::average("avg_sales_per_order", GROSS_SALES).with_format(MeasureFormat::Currency))
                .measure(currency("total_profit", PROFIT))
                .measure(MeasureSpec::average("avg_profit_per_order", PROFIT).with_format(MeasureFormat::Currency))
                .measure(MeasureSpec::count_distinct("unique_customers", CUSTOMER_KEY)),
        )?;
        self.push_result(
            "Customer Segments",
            &segments,
            &[SortKey::measure(0).descending()],
            None,
        )?;
        Ok(self.sections)
    }

    fn multidimensional(mut self) -> AnalysisResult<Vec<Section>> {
        let c = self.catalog;

        let region_category = aggregate(
            self.fact,
            &AggregateQuery::new()
                .group(c.rule(Dimension::Geography, "region")?)
                .group(c.rule(Dimension::Product, "category")?)
                .measure(currency("gross_sales", GROSS_SALES)),
        )?;
        self.push_result(
            "Sales by Region and Category",
            &region_category,
            &[SortKey::group(0), SortKey::measure(0).descending()],
            None,
        )?;
        self.push_table("Region x Category", crosstab(&region_category, 0, 1, 0)?);

        let by_region = aggregate(
            self.fact,
            &AggregateQuery::new()
                .group(c.rule(Dimension::Geography, "region")?)
                .measure(MeasureSpec::new("gross_sales", GROSS_SALES, MeasureKind::Sum)),
        )?;
        let top = format(&by_region, &[SortKey::measure(0).descending()], Some(1))?;
        let Some(Cell::Group(top_region)) = top.rows.first().and_then(|row| row.first()).cloned()
        else {
            log::info!("no resolved regions; skipping the monthly trend");
            return Ok(self.sections);
        };

        let trend = aggregate(
            self.fact,
            &sales_measures(
                AggregateQuery::new()
                    .group(c.rule(Dimension::Time, "year")?)
                    .group(c.rule(Dimension::Time, "month")?),
            )
            .filter(RowFilter::Equals(
                c.rule(Dimension::Geography, "region")?,
                top_region.clone(),
            )),
        )?;
        let months = self.config.trend_months;
        self.push_recent(
            format!("Monthly Trend for {top_region} (last {months} months)"),
            &trend,
            months,
        )?;
        Ok(self.sections)
    }
}
