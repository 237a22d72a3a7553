mod common;

use common::table;
use olap_analytics::{
    aggregate, crosstab, format, AggregateQuery, AnalysisError, Cell, DimensionIndex, GroupRule,
    MeasureFormat, MeasureSpec, RowFilter, SortKey, Value,
};
use olap_columnar::{ColumnType, Dataset};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;

fn regions() -> Arc<DimensionIndex> {
    let dim = table(
        "dim_geography",
        &[("geography_key", ColumnType::Int64), ("region", ColumnType::Utf8)],
        vec![vec![1.into(), "East".into()], vec![2.into(), "West".into()]],
    );
    Arc::new(DimensionIndex::build(&dim, "geography_key", &["region"]).unwrap())
}

fn categories() -> Arc<DimensionIndex> {
    let dim = table(
        "dim_product",
        &[("product_key", ColumnType::Int64), ("category", ColumnType::Utf8)],
        vec![vec![10.into(), "A".into()], vec![11.into(), "B".into()]],
    );
    Arc::new(DimensionIndex::build(&dim, "product_key", &["category"]).unwrap())
}

fn sales(rows: &[(i64, i64, f64)]) -> Dataset {
    table(
        "fact_sales",
        &[
            ("geography_key", ColumnType::Int64),
            ("product_key", ColumnType::Int64),
            ("gross_sales", ColumnType::Float64),
        ],
        rows.iter()
            .map(|&(geo, product, amount)| vec![geo.into(), product.into(), amount.into()])
            .collect(),
    )
}

fn region_by_category() -> AggregateQuery {
    AggregateQuery::new()
        .group(GroupRule::through("geography_key", regions(), "region"))
        .group(GroupRule::through("product_key", categories(), "category"))
        .measure(MeasureSpec::sum("gross_sales", "gross_sales"))
}

#[test]
fn star_schema_group_by_sums_per_dimension_pair() {
    let fact = sales(&[(1, 10, 10.0), (1, 10, 5.0), (2, 11, 20.0)]);
    let result = aggregate(&fact, &region_by_category()).unwrap();

    assert_eq!(result.group_labels, vec!["region", "category"]);
    let rows: Vec<(Vec<Value>, Vec<Option<f64>>)> = result
        .rows
        .iter()
        .map(|r| (r.key.clone(), r.measures.clone()))
        .collect();
    assert_eq!(
        rows,
        vec![
            (vec![Value::from("East"), Value::from("A")], vec![Some(15.0)]),
            (vec![Value::from("West"), Value::from("B")], vec![Some(20.0)]),
        ]
    );
    assert_eq!(result.stats.rows_aggregated(), 3);
}

#[test]
fn dangling_foreign_keys_are_excluded_and_counted() {
    let fact = sales(&[(1, 10, 10.0), (2, 10, 5.0), (99, 10, 1000.0)]);
    let query = AggregateQuery::new()
        .group(GroupRule::through("geography_key", regions(), "region"))
        .measure(MeasureSpec::sum("gross_sales", "gross_sales"));
    let result = aggregate(&fact, &query).unwrap();

    assert_eq!(result.stats.rows_scanned, 3);
    assert_eq!(result.stats.unresolved_rows, 1);
    assert_eq!(result.stats.rows_aggregated(), 2);
    assert_eq!(result.total(0), 15.0);
    assert!(result.find(&[Value::Blank]).is_none());
}

#[test]
fn equality_filter_restricts_rows_before_grouping() {
    let fact = sales(&[(1, 10, 10.0), (1, 11, 5.0), (2, 10, 7.0), (99, 10, 1.0)]);
    let query = AggregateQuery::new()
        .group(GroupRule::through("product_key", categories(), "category"))
        .measure(MeasureSpec::sum("gross_sales", "gross_sales"))
        .filter(RowFilter::Equals(
            GroupRule::through("geography_key", regions(), "region"),
            "East".into(),
        ));
    let result = aggregate(&fact, &query).unwrap();

    assert_eq!(result.stats.filtered_rows, 2);
    assert_eq!(result.find(&[Value::from("A")]).unwrap().measures, vec![Some(10.0)]);
    assert_eq!(result.find(&[Value::from("B")]).unwrap().measures, vec![Some(5.0)]);
}

#[test]
fn sorted_limited_table_and_crosstab() {
    let fact = sales(&[(1, 10, 10.0), (1, 11, 5.0), (2, 10, 7.0), (2, 11, 30.0)]);
    let result = aggregate(&fact, &region_by_category()).unwrap();

    let top = format(&result, &[SortKey::measure(0).descending()], Some(2)).unwrap();
    assert_eq!(top.columns, vec!["region", "category", "gross_sales"]);
    assert_eq!(
        top.rows
            .iter()
            .map(|r| r.iter().map(Cell::render).collect::<Vec<_>>())
            .collect::<Vec<_>>(),
        vec![vec!["West", "B", "30.00"], vec!["East", "A", "10.00"]]
    );

    let pivot = crosstab(&result, 0, 1, 0).unwrap();
    assert_eq!(pivot.columns, vec!["region", "A", "B"]);
    assert_eq!(pivot.rows[1][0], Cell::Group("West".into()));
    assert_eq!(pivot.rows[1][2].as_f64(), Some(30.0));
}

#[test]
fn measure_format_flows_into_rendered_cells() {
    let fact = sales(&[(1, 10, 1234.5)]);
    let query = AggregateQuery::new()
        .group(GroupRule::through("geography_key", regions(), "region"))
        .measure(MeasureSpec::sum("gross_sales", "gross_sales").with_format(MeasureFormat::Currency));
    let table = format(&aggregate(&fact, &query).unwrap(), &[], None).unwrap();

    assert_eq!(table.rows[0][1].render(), "$1234.50");
    assert!(table.render_text().contains("$1234.50"));
}

#[test]
fn schema_mismatches_are_reported() {
    let fact = sales(&[(1, 10, 1.0)]);

    let err = aggregate(
        &fact,
        &AggregateQuery::new()
            .group(GroupRule::column("geography_key"))
            .measure(MeasureSpec::sum("x", "missing")),
    )
    .unwrap_err();
    assert!(matches!(err, AnalysisError::UnknownColumn { ref column, .. } if column == "missing"));

    let err = aggregate(&fact, &AggregateQuery::new().group(GroupRule::column("geography_key")))
        .unwrap_err();
    assert!(matches!(err, AnalysisError::InvalidQuery(_)));
}

fn synthetic_fact(rows: &[(i64, i32)]) -> Dataset {
    table(
        "fact_sales",
        &[
            ("geography_key", ColumnType::Int64),
            ("gross_sales", ColumnType::Float64),
        ],
        rows.iter()
            .map(|&(key, amount)| vec![key.into(), f64::from(amount).into()])
            .collect(),
    )
}

// Keys 0..5 resolve to three regions; keys 5..8 dangle.
fn synthetic_regions() -> Arc<DimensionIndex> {
    let dim = table(
        "dim_geography",
        &[("geography_key", ColumnType::Int64), ("region", ColumnType::Utf8)],
        (0..5i64)
            .map(|k| vec![k.into(), format!("R{}", k % 3).into()])
            .collect(),
    );
    Arc::new(DimensionIndex::build(&dim, "geography_key", &["region"]).unwrap())
}

fn synthetic_query() -> AggregateQuery {
    AggregateQuery::new()
        .group(GroupRule::through("geography_key", synthetic_regions(), "region"))
        .measure(MeasureSpec::sum("gross_sales", "gross_sales"))
}

proptest! {
    #[test]
    fn group_sums_cover_exactly_the_resolved_rows(
        rows in prop::collection::vec((0i64..8, -1000i32..1000), 0..200)
    ) {
        let fact = synthetic_fact(&rows);
        let result = aggregate(&fact, &synthetic_query()).unwrap();

        let dangling = rows.iter().filter(|(k, _)| *k >= 5).count();
        let resolved_sum: f64 = rows
            .iter()
            .filter(|(k, _)| *k < 5)
            .map(|(_, v)| f64::from(*v))
            .sum();

        prop_assert_eq!(result.stats.unresolved_rows, dangling);
        prop_assert_eq!(result.stats.rows_aggregated(), rows.len() - dangling);
        prop_assert_eq!(result.total(0), resolved_sum);
        prop_assert!(result.rows.len() <= 3);
    }

    #[test]
    fn row_limit_truncates_to_min_of_limit_and_groups(
        rows in prop::collection::vec((0i64..8, -1000i32..1000), 0..100),
        limit in 0usize..6,
    ) {
        let result = aggregate(&synthetic_fact(&rows), &synthetic_query()).unwrap();
        let table = format(&result, &[SortKey::measure(0).descending()], Some(limit)).unwrap();
        prop_assert_eq!(table.rows.len(), limit.min(result.rows.len()));
    }

    #[test]
    fn aggregation_is_deterministic(
        rows in prop::collection::vec((0i64..8, -1000i32..1000), 0..100)
    ) {
        let fact = synthetic_fact(&rows);
        let first = aggregate(&fact, &synthetic_query()).unwrap();
        let second = aggregate(&fact, &synthetic_query()).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(
            format(&first, &[SortKey::measure(0)], None).unwrap(),
            format(&second, &[SortKey::measure(0)], None).unwrap()
        );
    }
}
