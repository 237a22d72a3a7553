mod common;

use common::{dim_customer, dim_geography, dim_product, dim_time, fact_sales, sample_schema, table};
use olap_analytics::{
    AnalysisConfig, AnalysisError, AnalysisKind, Dimension, DimensionCatalog, DuplicateKeyPolicy,
    Orchestrator, RunReport, Section, StarSchema, Value,
};
use olap_columnar::ColumnType;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn run(schema: StarSchema, config: AnalysisConfig) -> RunReport {
    Orchestrator::new(Arc::new(schema), config).run()
}

fn section<'a>(report: &'a RunReport, title: &str) -> &'a Section {
    report
        .sections
        .iter()
        .find(|s| s.title == title)
        .unwrap_or_else(|| panic!("missing section {title}"))
}

fn rendered(section: &Section) -> Vec<Vec<String>> {
    section
        .table
        .rows
        .iter()
        .map(|row| row.iter().map(|c| c.render()).collect())
        .collect()
}

fn metric(section: &Section, label: &str) -> String {
    rendered(section)
        .into_iter()
        .find(|row| row[0] == label)
        .map(|row| row[1].clone())
        .unwrap_or_else(|| panic!("missing metric {label}"))
}

#[test]
fn full_run_produces_every_section_in_order() {
    let report = run(sample_schema(), AnalysisConfig::default());

    assert!(report.is_success(), "{:?}", report.failures);
    let titles: Vec<&str> = report.sections.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "Overview",
            "Sales by Year",
            "Sales by Quarter (last 8)",
            "Weekend vs Weekday",
            "Sales by Region",
            "Top 10 Countries by Sales",
            "High-Value Sales (> $100.00)",
            "Sales by Category",
            "Profit Margin by Category",
            "Top 10 Products by Sales",
            "Sales Distribution",
            "Customer Segments",
            "Sales by Region and Category",
            "Region x Category",
            "Monthly Trend for West (last 12 months)",
        ]
    );
}

#[test]
fn overview_metrics() {
    let report = run(sample_schema(), AnalysisConfig::default());
    let overview = section(&report, "Overview");

    assert_eq!(metric(overview, "Total Records"), "4");
    assert_eq!(metric(overview, "Total Gross Sales"), "$500.00");
    assert_eq!(metric(overview, "Total Profit"), "$95.00");
    assert_eq!(metric(overview, "Total Quantity"), "10");
    assert_eq!(metric(overview, "Average Sale"), "$125.00");
    assert_eq!(metric(overview, "Profit Margin"), "19.0%");
    assert_eq!(metric(overview, "Max Sale"), "$300.00");
}

#[test]
fn time_sections() {
    let report = run(sample_schema(), AnalysisConfig::default());

    assert_eq!(
        rendered(section(&report, "Sales by Quarter (last 8)")),
        vec![
            vec!["2024", "1", "$500.00", "$100.00", "6"],
            vec!["2024", "2", "$0.00", "-$5.00", "4"],
        ]
    );

    let weekend = section(&report, "Weekend vs Weekday");
    assert_eq!(
        weekend.table.columns,
        vec!["day_type", "total_sales", "avg_sales", "total_profit", "avg_profit"]
    );
    assert_eq!(
        rendered(weekend),
        vec![
            vec!["Weekday", "$350.00", "$175.00", "$70.00", "$35.00"],
            vec!["Weekend", "$150.00", "$75.00", "$25.00", "$12.50"],
        ]
    );
}

#[test]
fn geography_and_product_sections() {
    let report = run(sample_schema(), AnalysisConfig::default());

    let regions = rendered(section(&report, "Sales by Region"));
    assert_eq!(regions[0][..2].to_vec(), vec!["West", "$300.00"]);

    let high = section(&report, "High-Value Sales (> $100.00)");
    assert_eq!(metric(high, "High-Value Transactions"), "2");
    assert_eq!(metric(high, "Share of Transactions"), "50.0%");
    assert_eq!(metric(high, "High-Value Sales"), "$450.00");
    assert_eq!(metric(high, "High-Value Profit"), "$90.00");

    assert_eq!(
        rendered(section(&report, "Profit Margin by Category")),
        vec![
            vec!["Electronics", "$70.00", "$350.00", "20.0%"],
            vec!["Clothing", "$25.00", "$150.00", "16.7%"],
        ]
    );

    let distribution = section(&report, "Sales Distribution");
    assert_eq!(metric(distribution, "P25"), "$37.50");
    assert_eq!(metric(distribution, "P50"), "$100.00");
    assert_eq!(metric(distribution, "P99"), "$295.50");
}

#[test]
fn customer_segments_count_distinct_customers() {
    let report = run(sample_schema(), AnalysisConfig::default());
    assert_eq!(
        rendered(section(&report, "Customer Segments")),
        vec![
            vec!["Retail", "$350.00", "$116.67", "$65.00", "$21.67", "2"],
            vec!["Wholesale", "$150.00", "$150.00", "$30.00", "$30.00", "1"],
        ]
    );
}

#[test]
fn multidimensional_trend_follows_the_top_region() {
    let report = run(sample_schema(), AnalysisConfig::default());

    let pivot = section(&report, "Region x Category");
    assert_eq!(pivot.table.columns, vec!["region", "Clothing", "Electronics"]);
    assert_eq!(
        rendered(pivot),
        vec![
            vec!["East", "$150.00", "$50.00"],
            vec!["West", "$0.00", "$300.00"],
        ]
    );

    let trend = section(&report, "Monthly Trend for West (last 12 months)");
    let keys: Vec<Vec<String>> = rendered(trend).into_iter().map(|r| r[..2].to_vec()).collect();
    assert_eq!(keys, vec![vec!["2024", "2"], vec!["2024", "4"]]);
}

#[test]
fn missing_dimension_fails_only_dependent_analyses() {
    let schema = StarSchema::new(fact_sales())
        .with_dimension(dim_time())
        .with_dimension(dim_geography())
        .with_dimension(dim_product());
    let report = run(schema, AnalysisConfig::default());

    assert!(!report.is_success());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].analysis, AnalysisKind::CustomerSegments);
    assert!(matches!(
        report.failures[0].error,
        AnalysisError::DimensionUnavailable { ref dimension, .. } if dimension == "dim_customer"
    ));
    assert_eq!(report.sections.len(), 14);
    assert!(report.render_text().contains("customer_segments failed"));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["failures"][0]["analysis"], "customer_segments");
    assert_eq!(json["sections"][0]["title"], "Overview");
}

#[test]
fn catalog_builds_only_the_requested_dimensions() {
    assert!(Dimension::required_by(AnalysisKind::Overview).is_empty());

    let catalog = DimensionCatalog::build(
        &sample_schema(),
        DuplicateKeyPolicy::Overwrite,
        Dimension::required_by(AnalysisKind::SalesByTime),
    );
    assert_eq!(catalog.get(Dimension::Time).unwrap().len(), 4);
    assert!(matches!(
        catalog.get(Dimension::Geography),
        Err(AnalysisError::DimensionUnavailable { ref reason, .. }) if reason == "not built"
    ));
}

#[test]
fn overview_runs_without_dimension_tables() {
    let config = AnalysisConfig {
        analyses: vec![AnalysisKind::Overview],
        ..AnalysisConfig::default()
    };
    let report = run(StarSchema::new(fact_sales()), config);
    assert!(report.is_success());
    assert_eq!(report.sections.len(), 1);
}

#[test]
fn rejected_duplicate_keys_disable_the_dimension() {
    let products = vec![
        vec![10.into(), "Electronics".into(), "Phones".into(), "Phone X".into()],
        vec![11.into(), "Clothing".into(), "Shirts".into(), "Oxford Shirt".into()],
        vec![10.into(), "Toys".into(), "Games".into(), "Chess".into()],
    ];
    let dim_product = table(
        "dim_product",
        &[
            ("product_key", ColumnType::Int64),
            ("category", ColumnType::Utf8),
            ("subcategory", ColumnType::Utf8),
            ("product_name", ColumnType::Utf8),
        ],
        products,
    );
    let schema = StarSchema::new(fact_sales())
        .with_dimension(dim_time())
        .with_dimension(dim_geography())
        .with_dimension(dim_product)
        .with_dimension(dim_customer());

    let overwrite = run(schema.clone(), AnalysisConfig::default());
    assert!(overwrite.is_success());
    let margin = rendered(section(&overwrite, "Profit Margin by Category"));
    assert_eq!(margin[0][0], "Toys");

    let config = AnalysisConfig {
        duplicate_keys: DuplicateKeyPolicy::Reject,
        ..AnalysisConfig::default()
    };
    let rejected = run(schema, config);
    let failed: Vec<AnalysisKind> = rejected.failures.iter().map(|f| f.analysis).collect();
    assert_eq!(
        failed,
        vec![AnalysisKind::SalesByProduct, AnalysisKind::Multidimensional]
    );
}

#[test]
fn config_selects_analyses_and_limits() {
    let config = AnalysisConfig::from_json_str(
        r#"{"analyses": ["sales_by_geography"], "top_n": 1, "high_value_threshold": 1000}"#,
    )
    .unwrap();
    let report = run(sample_schema(), config);

    assert_eq!(report.sections.len(), 3);
    assert_eq!(rendered(section(&report, "Top 1 Countries by Sales")).len(), 1);
    let high = section(&report, "High-Value Sales (> $1000.00)");
    assert_eq!(metric(high, "High-Value Transactions"), "0");
    assert_eq!(metric(high, "High-Value Sales"), "$0.00");
}

#[test]
fn dangling_keys_are_reported_with_the_section() {
    let fact = table(
        "fact_sales",
        &[
            ("date_key", ColumnType::Int64),
            ("geography_key", ColumnType::Int64),
            ("product_key", ColumnType::Int64),
            ("customer_key", ColumnType::Int64),
            ("quantity", ColumnType::Int64),
            ("gross_sales", ColumnType::Float64),
            ("profit", ColumnType::Float64),
        ],
        vec![
            vec![20240101.into(), 1.into(), 10.into(), 100.into(), 1.into(), 10.0.into(), 1.0.into()],
            vec![20240101.into(), 7.into(), 10.into(), 100.into(), 1.into(), 20.0.into(), 2.0.into()],
        ],
    );
    let schema = StarSchema::new(fact)
        .with_dimension(dim_time())
        .with_dimension(dim_geography())
        .with_dimension(dim_product())
        .with_dimension(dim_customer());
    let config = AnalysisConfig {
        analyses: vec![AnalysisKind::SalesByGeography],
        ..AnalysisConfig::default()
    };
    let report = run(schema, config);

    let regions = section(&report, "Sales by Region");
    assert_eq!(regions.stats.map(|s| s.unresolved_rows), Some(1));
    assert_eq!(regions.table.rows[0][0].render(), Value::from("East").to_string());
    assert!(report.render_text().contains("1 unresolved keys"));
}
