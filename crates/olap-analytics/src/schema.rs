use olap_columnar::Dataset;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const FACT_SALES: &str = "fact_sales";
pub const DIM_TIME: &str = "dim_time";
pub const DIM_GEOGRAPHY: &str = "dim_geography";
pub const DIM_PRODUCT: &str = "dim_product";
pub const DIM_CUSTOMER: &str = "dim_customer";

/// One fact dataset plus the dimension datasets it references, all shared read-only.
#[derive(Clone, Debug)]
pub struct StarSchema {
    fact: Arc<Dataset>,
    dimensions: BTreeMap<String, Arc<Dataset>>,
}

impl StarSchema {
    pub fn new(fact: impl Into<Arc<Dataset>>) -> Self {
        Self {
            fact: fact.into(),
            dimensions: BTreeMap::new(),
        }
    }

    /// Register a dimension under its dataset name, replacing any previous one.
    pub fn with_dimension(mut self, dimension: impl Into<Arc<Dataset>>) -> Self {
        let dimension = dimension.into();
        self.dimensions.insert(dimension.name().to_string(), dimension);
        self
    }

    pub fn fact(&self) -> &Arc<Dataset> {
        &self.fact
    }

    pub fn dimension(&self, name: &str) -> Option<&Arc<Dataset>> {
        self.dimensions.get(name)
    }

    /// The fact dataset followed by the dimensions in name order.
    pub fn tables(&self) -> impl Iterator<Item = &Arc<Dataset>> {
        std::iter::once(&self.fact).chain(self.dimensions.values())
    }

    /// Load `fact_sales.parquet` and the four `dim_*.parquet` files from `dir`.
    #[cfg(feature = "parquet")]
    pub fn load_dir(dir: &std::path::Path) -> crate::AnalysisResult<Self> {
        let load = |table: &str| -> crate::AnalysisResult<Dataset> {
            let path = dir.join(format!("{table}.parquet"));
            let dataset = olap_columnar::parquet::read_parquet_to_dataset(&path, table).map_err(
                |source| crate::AnalysisError::Load {
                    table: table.to_string(),
                    source,
                },
            )?;
            log::info!("loaded {table}: {} rows", dataset.row_count());
            Ok(dataset)
        };

        let mut schema = Self::new(load(FACT_SALES)?);
        for table in [DIM_TIME, DIM_GEOGRAPHY, DIM_PRODUCT, DIM_CUSTOMER] {
            schema = schema.with_dimension(load(table)?);
        }
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use olap_columnar::{ColumnSchema, ColumnType, DatasetBuilder};

    fn empty(name: &str) -> Dataset {
        DatasetBuilder::new(name, vec![ColumnSchema::new("k", ColumnType::Int64)])
            .unwrap()
            .finalize()
    }

    #[test]
    fn tables_list_fact_first() {
        let schema = StarSchema::new(empty(FACT_SALES))
            .with_dimension(empty(DIM_TIME))
            .with_dimension(empty(DIM_CUSTOMER));
        let names: Vec<&str> = schema.tables().map(|t| t.name()).collect();
        assert_eq!(names, vec![FACT_SALES, DIM_CUSTOMER, DIM_TIME]);
        assert!(schema.dimension(DIM_PRODUCT).is_none());
    }
}
