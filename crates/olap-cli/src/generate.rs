//! Synthetic sales star schema: a daily time dimension for 2020 through 2024, a
//! region/country/city geography, a category/subcategory/type product catalog with several SKUs
//! per type, 1000 customers and a fact table sampled uniformly over all four dimensions.
//!
//! Output is fully determined by [`GeneratorConfig::seed`].

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Weekday};
use olap_analytics::{StarSchema, DIM_CUSTOMER, DIM_GEOGRAPHY, DIM_PRODUCT, DIM_TIME, FACT_SALES};
use olap_columnar::parquet::write_dataset_to_parquet;
use olap_columnar::{ColumnSchema, ColumnType, Dataset, DatasetBuilder, Value};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const CUSTOMER_COUNT: i64 = 1000;
pub const CUSTOMER_TYPES: [&str; 3] = ["Individual", "Small Business", "Enterprise"];

const GEOGRAPHY: &[(&str, &[(&str, &[&str])])] = &[
    (
        "North America",
        &[
            ("USA", &["New York", "Los Angeles", "Chicago", "Houston", "Phoenix"]),
            ("Canada", &["Toronto", "Vancouver", "Montreal", "Calgary"]),
            ("Mexico", &["Mexico City", "Guadalajara", "Monterrey"]),
        ],
    ),
    (
        "Europe",
        &[
            ("Germany", &["Berlin", "Munich", "Hamburg", "Frankfurt"]),
            ("France", &["Paris", "Lyon", "Marseille", "Toulouse"]),
            ("UK", &["London", "Manchester", "Birmingham", "Glasgow"]),
            ("Italy", &["Rome", "Milan", "Naples", "Turin"]),
            ("Spain", &["Madrid", "Barcelona", "Valencia", "Seville"]),
        ],
    ),
    (
        "Asia Pacific",
        &[
            ("China", &["Beijing", "Shanghai", "Guangzhou", "Shenzhen"]),
            ("Japan", &["Tokyo", "Osaka", "Nagoya", "Fukuoka"]),
            ("Australia", &["Sydney", "Melbourne", "Brisbane", "Perth"]),
            ("India", &["Mumbai", "Delhi", "Bangalore", "Chennai"]),
            ("South Korea", &["Seoul", "Busan", "Incheon"]),
        ],
    ),
    (
        "Latin America",
        &[
            ("Brazil", &["São Paulo", "Rio de Janeiro", "Brasília"]),
            ("Argentina", &["Buenos Aires", "Córdoba", "Rosario"]),
            ("Chile", &["Santiago", "Valparaíso", "Concepción"]),
            ("Colombia", &["Bogotá", "Medellín", "Cali"]),
        ],
    ),
];

const PRODUCTS: &[(&str, &[(&str, &[&str])])] = &[
    (
        "Electronics",
        &[
            ("Computers", &["Laptop", "Desktop", "Tablet", "Monitor"]),
            ("Mobile", &["Smartphone", "Feature Phone", "Accessories"]),
            ("Audio", &["Headphones", "Speakers", "Microphone"]),
        ],
    ),
    (
        "Clothing",
        &[
            ("Men", &["Shirts", "Pants", "Shoes", "Accessories"]),
            ("Women", &["Dresses", "Tops", "Shoes", "Accessories"]),
            ("Kids", &["Clothing", "Shoes", "Toys"]),
        ],
    ),
    (
        "Home & Garden",
        &[
            ("Furniture", &["Chairs", "Tables", "Sofas", "Storage"]),
            ("Kitchen", &["Appliances", "Cookware", "Utensils"]),
            ("Garden", &["Tools", "Plants", "Outdoor Furniture"]),
        ],
    ),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub rows: usize,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            rows: 50_000,
            seed: 42,
        }
    }
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn date(y: i32, m: u32, d: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d).with_context(|| format!("invalid date {y}-{m}-{d}"))
}

fn builder(name: &str, columns: &[(&str, ColumnType)]) -> Result<DatasetBuilder> {
    Ok(DatasetBuilder::new(
        name,
        columns
            .iter()
            .map(|(column, ty)| ColumnSchema::new(*column, *ty))
            .collect(),
    )?)
}

/// One row per day; `date_key` counts days from the first date, starting at 0.
fn time_dimension(start: NaiveDate, end: NaiveDate) -> Result<(Dataset, Vec<bool>)> {
    let mut table = builder(
        DIM_TIME,
        &[
            ("date_key", ColumnType::Int64),
            ("date", ColumnType::Utf8),
            ("year", ColumnType::Int64),
            ("quarter", ColumnType::Int64),
            ("month", ColumnType::Int64),
            ("month_name", ColumnType::Utf8),
            ("day", ColumnType::Int64),
            ("day_of_week", ColumnType::Int64),
            ("day_name", ColumnType::Utf8),
            ("week_of_year", ColumnType::Int64),
            ("is_weekend", ColumnType::Int64),
            ("fiscal_year", ColumnType::Int64),
        ],
    )?;
    let mut weekends = Vec::new();
    for (key, day) in start.iter_days().take_while(|d| *d <= end).enumerate() {
        let weekend = matches!(day.weekday(), Weekday::Sat | Weekday::Sun);
        // The fiscal year starts in April and is named after the year it ends in.
        let fiscal_year = if day.month() >= 4 { day.year() + 1 } else { day.year() };
        table.append_row(&[
            Value::Int(key as i64),
            Value::from(day.format("%Y-%m-%d").to_string()),
            Value::from(day.year()),
            Value::Int(i64::from((day.month() - 1) / 3 + 1)),
            Value::Int(i64::from(day.month())),
            Value::from(day.format("%B").to_string()),
            Value::Int(i64::from(day.day())),
            Value::Int(i64::from(day.weekday().number_from_monday())),
            Value::from(day.format("%A").to_string()),
            Value::Int(i64::from(day.iso_week().week())),
            Value::Int(i64::from(weekend)),
            Value::from(fiscal_year),
        ])?;
        weekends.push(weekend);
    }
    Ok((table.finalize(), weekends))
}

fn geography_dimension() -> Result<Dataset> {
    let mut table = builder(
        DIM_GEOGRAPHY,
        &[
            ("geography_key", ColumnType::Int64),
            ("city", ColumnType::Utf8),
            ("country", ColumnType::Utf8),
            ("region", ColumnType::Utf8),
        ],
    )?;
    let mut key = 1i64;
    for (region, countries) in GEOGRAPHY {
        for (country, cities) in *countries {
            for city in *cities {
                table.append_row(&[Value::Int(key), (*city).into(), (*country).into(), (*region).into()])?;
                key += 1;
            }
        }
    }
    Ok(table.finalize())
}

#[derive(Clone, Copy)]
struct Pricing {
    unit_cost: f64,
    unit_price: f64,
}

fn product_dimension(rng: &mut StdRng) -> Result<(Dataset, Vec<Pricing>)> {
    let mut table = builder(
        DIM_PRODUCT,
        &[
            ("product_key", ColumnType::Int64),
            ("sku", ColumnType::Utf8),
            ("product_name", ColumnType::Utf8),
            ("product_type", ColumnType::Utf8),
            ("subcategory", ColumnType::Utf8),
            ("category", ColumnType::Utf8),
            ("unit_cost", ColumnType::Float64),
            ("unit_price", ColumnType::Float64),
        ],
    )?;
    let mut pricing = Vec::new();
    for (category, subcategories) in PRODUCTS {
        for (subcategory, types) in *subcategories {
            for product_type in *types {
                let prefix: String = product_type.chars().take(3).collect::<String>().to_uppercase();
                for model in 0..rng.random_range(3..=8u8) {
                    let key = pricing.len() as i64 + 1;
                    let unit_cost = round_cents(rng.random_range(10.0..500.0));
                    let unit_price = round_cents(rng.random_range(15.0..750.0));
                    table.append_row(&[
                        Value::Int(key),
                        Value::from(format!("{prefix}{key:04}")),
                        Value::from(format!("{product_type} Model {}", char::from(b'A' + model))),
                        (*product_type).into(),
                        (*subcategory).into(),
                        (*category).into(),
                        Value::Number(unit_cost),
                        Value::Number(unit_price),
                    ])?;
                    pricing.push(Pricing {
                        unit_cost,
                        unit_price,
                    });
                }
            }
        }
    }
    Ok((table.finalize(), pricing))
}

fn customer_dimension(rng: &mut StdRng) -> Result<Dataset> {
    let mut table = builder(
        DIM_CUSTOMER,
        &[
            ("customer_key", ColumnType::Int64),
            ("customer_id", ColumnType::Utf8),
            ("customer_type", ColumnType::Utf8),
            ("registration_date", ColumnType::Utf8),
        ],
    )?;
    let first = date(2019, 1, 1)?;
    for key in 1..=CUSTOMER_COUNT {
        let customer_type = CUSTOMER_TYPES[rng.random_range(0..CUSTOMER_TYPES.len())];
        let registered = first + chrono::Duration::days(rng.random_range(0..=1825));
        table.append_row(&[
            Value::Int(key),
            Value::from(format!("CUST{key:06}")),
            customer_type.into(),
            Value::from(registered.format("%Y-%m-%d").to_string()),
        ])?;
    }
    Ok(table.finalize())
}

/// Build all five tables. Weekend sales get a 1.2x to 1.8x quantity boost and every sale a
/// 0.8x to 1.1x price modifier; money columns are rounded to cents.
pub fn generate(config: &GeneratorConfig) -> Result<StarSchema> {
    let mut rng = StdRng::seed_from_u64(config.seed);

    let (time, weekends) = time_dimension(date(2020, 1, 1)?, date(2024, 12, 31)?)?;
    let geography = geography_dimension()?;
    let (product, pricing) = product_dimension(&mut rng)?;
    let customer = customer_dimension(&mut rng)?;

    let mut fact = builder(
        FACT_SALES,
        &[
            ("sales_key", ColumnType::Int64),
            ("date_key", ColumnType::Int64),
            ("geography_key", ColumnType::Int64),
            ("product_key", ColumnType::Int64),
            ("customer_key", ColumnType::Int64),
            ("quantity", ColumnType::Int64),
            ("unit_price", ColumnType::Float64),
            ("unit_cost", ColumnType::Float64),
            ("gross_sales", ColumnType::Float64),
            ("total_cost", ColumnType::Float64),
            ("profit", ColumnType::Float64),
        ],
    )?;
    let geographies = geography.row_count() as i64;
    for sales_key in 1..=config.rows as i64 {
        let date_key = rng.random_range(0..weekends.len());
        let geography_key = rng.random_range(1..=geographies);
        let product_index = rng.random_range(0..pricing.len());
        let customer_key = rng.random_range(1..=CUSTOMER_COUNT);

        let base_quantity: i64 = rng.random_range(1..=10);
        let quantity = if weekends[date_key] {
            ((base_quantity as f64 * rng.random_range(1.2..1.8)) as i64).max(1)
        } else {
            base_quantity
        };
        let Pricing {
            unit_cost,
            unit_price,
        } = pricing[product_index];
        let unit_price = round_cents(unit_price * rng.random_range(0.8..1.1));
        let gross_sales = round_cents(quantity as f64 * unit_price);
        let total_cost = round_cents(quantity as f64 * unit_cost);

        fact.append_row(&[
            Value::Int(sales_key),
            Value::Int(date_key as i64),
            Value::Int(geography_key),
            Value::Int(product_index as i64 + 1),
            Value::Int(customer_key),
            Value::Int(quantity),
            Value::Number(unit_price),
            Value::Number(unit_cost),
            Value::Number(gross_sales),
            Value::Number(total_cost),
            Value::Number(round_cents(gross_sales - total_cost)),
        ])?;
    }
    log::info!(
        "generated {} fact rows over {} days, {} products",
        config.rows,
        weekends.len(),
        pricing.len()
    );

    Ok(StarSchema::new(fact.finalize())
        .with_dimension(time)
        .with_dimension(geography)
        .with_dimension(product)
        .with_dimension(customer))
}

/// Write every table of `schema` to `dir/<table>.parquet`, creating `dir` if needed.
pub fn write_parquet(schema: &StarSchema, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    for table in schema.tables() {
        let path = dir.join(format!("{}.parquet", table.name()));
        write_dataset_to_parquet(table, &path)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn small() -> StarSchema {
        generate(&GeneratorConfig { rows: 500, seed: 7 }).unwrap()
    }

    #[test]
    fn dimension_sizes() {
        let schema = small();
        let count = |name: &str| schema.dimension(name).unwrap().row_count();

        // 2020 and 2024 are leap years.
        assert_eq!(count(DIM_TIME), 366 + 365 * 3 + 366);
        assert_eq!(count(DIM_GEOGRAPHY), 63);
        assert_eq!(count(DIM_CUSTOMER), 1000);
        // 31 product types with 3 to 8 SKUs each.
        assert!((31 * 3..=31 * 8).contains(&count(DIM_PRODUCT)));
        assert_eq!(schema.fact().row_count(), 500);
    }

    #[test]
    fn time_dimension_calendar_fields() {
        let (time, weekends) = time_dimension(date(2023, 3, 31).unwrap(), date(2023, 4, 2).unwrap()).unwrap();
        assert_eq!(weekends, vec![false, true, true]);

        let column = |name: &str| time.column(name).unwrap();
        assert_eq!(column("fiscal_year").i64_at(0), Some(2023));
        assert_eq!(column("fiscal_year").i64_at(1), Some(2024));
        assert_eq!(column("quarter").i64_at(1), Some(2));
        assert_eq!(column("day_of_week").i64_at(2), Some(7));
        assert_eq!(column("day_name").str_at(2).map(|s| &**s), Some("Sunday"));
        assert_eq!(column("month_name").str_at(0).map(|s| &**s), Some("March"));
    }

    #[test]
    fn fact_rows_reference_dimensions_and_balance() {
        let schema = small();
        let fact = schema.fact();
        let profit = fact.column("profit").unwrap();
        let gross = fact.column("gross_sales").unwrap();
        let cost = fact.column("total_cost").unwrap();
        let products = schema.dimension(DIM_PRODUCT).unwrap().row_count() as i64;

        for row in 0..fact.row_count() {
            let expected = round_cents(gross.f64_at(row).unwrap() - cost.f64_at(row).unwrap());
            assert_eq!(profit.f64_at(row), Some(expected));
            assert!(fact.column("quantity").unwrap().i64_at(row).unwrap() >= 1);
            let product = fact.column("product_key").unwrap().i64_at(row).unwrap();
            assert!((1..=products).contains(&product));
        }
    }

    #[test]
    fn same_seed_same_data() {
        let a = generate(&GeneratorConfig { rows: 50, seed: 1 }).unwrap();
        let b = generate(&GeneratorConfig { rows: 50, seed: 1 }).unwrap();
        let sales = |s: &StarSchema| {
            let column = s.fact().column("gross_sales").unwrap();
            (0..column.len()).map(|r| column.f64_at(r)).collect::<Vec<_>>()
        };
        assert_eq!(sales(&a), sales(&b));
    }
}
