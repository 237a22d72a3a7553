#![allow(dead_code)]

use olap_analytics::StarSchema;
use olap_columnar::{ColumnSchema, ColumnType, Dataset, DatasetBuilder, Value};

pub fn table(name: &str, columns: &[(&str, ColumnType)], rows: Vec<Vec<Value>>) -> Dataset {
    let schema = columns
        .iter()
        .map(|(name, ty)| ColumnSchema::new(*name, *ty))
        .collect();
    let mut builder = DatasetBuilder::new(name, schema).unwrap();
    for row in rows {
        builder.append_row(&row).unwrap();
    }
    builder.finalize()
}

pub fn dim_time() -> Dataset {
    table(
        "dim_time",
        &[
            ("date_key", ColumnType::Int64),
            ("year", ColumnType::Int64),
            ("quarter", ColumnType::Int64),
            ("month", ColumnType::Int64),
            ("is_weekend", ColumnType::Boolean),
        ],
        vec![
            vec![20240101.into(), 2024.into(), 1.into(), 1.into(), false.into()],
            vec![20240106.into(), 2024.into(), 1.into(), 1.into(), true.into()],
            vec![20240201.into(), 2024.into(), 1.into(), 2.into(), false.into()],
            vec![20240406.into(), 2024.into(), 2.into(), 4.into(), true.into()],
        ],
    )
}

pub fn dim_geography() -> Dataset {
    table(
        "dim_geography",
        &[
            ("geography_key", ColumnType::Int64),
            ("region", ColumnType::Utf8),
            ("country", ColumnType::Utf8),
            ("city", ColumnType::Utf8),
        ],
        vec![
            vec![1.into(), "East".into(), "USA".into(), "Boston".into()],
            vec![2.into(), "West".into(), "Canada".into(), "Vancouver".into()],
        ],
    )
}

pub fn dim_product() -> Dataset {
    table(
        "dim_product",
        &[
            ("product_key", ColumnType::Int64),
            ("category", ColumnType::Utf8),
            ("subcategory", ColumnType::Utf8),
            ("product_name", ColumnType::Utf8),
        ],
        vec![
            vec![10.into(), "Electronics".into(), "Phones".into(), "Phone X".into()],
            vec![11.into(), "Clothing".into(), "Shirts".into(), "Oxford Shirt".into()],
        ],
    )
}

pub fn dim_customer() -> Dataset {
    table(
        "dim_customer",
        &[
            ("customer_key", ColumnType::Int64),
            ("customer_type", ColumnType::Utf8),
        ],
        vec![
            vec![100.into(), "Retail".into()],
            vec![101.into(), "Wholesale".into()],
            vec![102.into(), "Retail".into()],
        ],
    )
}

/// Four sales: gross 500, profit 95, quantity 10.
pub fn fact_sales() -> Dataset {
    let rows: [(i64, i64, i64, i64, i64, f64, f64); 4] = [
        (20240101, 1, 10, 100, 2, 50.0, 10.0),
        (20240106, 1, 11, 101, 1, 150.0, 30.0),
        (20240201, 2, 10, 100, 3, 300.0, 60.0),
        (20240406, 2, 11, 102, 4, 0.0, -5.0),
    ];
    table(
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
        rows.iter()
            .map(|&(date, geo, product, customer, quantity, gross, profit)| {
                vec![
                    date.into(),
                    geo.into(),
                    product.into(),
                    customer.into(),
                    quantity.into(),
                    gross.into(),
                    profit.into(),
                ]
            })
            .collect(),
    )
}

pub fn sample_schema() -> StarSchema {
    StarSchema::new(fact_sales())
        .with_dimension(dim_time())
        .with_dimension(dim_geography())
        .with_dimension(dim_product())
        .with_dimension(dim_customer())
}
