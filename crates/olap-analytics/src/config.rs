use crate::dimension::DuplicateKeyPolicy;
use crate::error::{AnalysisError, AnalysisResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// The canonical analyses, in their default run order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Overview,
    SalesByTime,
    SalesByGeography,
    SalesByProduct,
    CustomerSegments,
    Multidimensional,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 6] = [
        AnalysisKind::Overview,
        AnalysisKind::SalesByTime,
        AnalysisKind::SalesByGeography,
        AnalysisKind::SalesByProduct,
        AnalysisKind::CustomerSegments,
        AnalysisKind::Multidimensional,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisKind::Overview => "overview",
            AnalysisKind::SalesByTime => "sales_by_time",
            AnalysisKind::SalesByGeography => "sales_by_geography",
            AnalysisKind::SalesByProduct => "sales_by_product",
            AnalysisKind::CustomerSegments => "customer_segments",
            AnalysisKind::Multidimensional => "multidimensional",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisKind {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        AnalysisKind::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| AnalysisError::Config(format!("unknown analysis {s:?}")))
    }
}

/// Run configuration. Every field has a default, so `{}` is a valid config file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub analyses: Vec<AnalysisKind>,
    /// Row limit of the "top N" sections.
    pub top_n: usize,
    pub recent_quarters: usize,
    pub trend_months: usize,
    /// Sales above this amount count as high value.
    pub high_value_threshold: f64,
    pub percentiles: Vec<f64>,
    pub duplicate_keys: DuplicateKeyPolicy,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            analyses: AnalysisKind::ALL.to_vec(),
            top_n: 10,
            recent_quarters: 8,
            trend_months: 12,
            high_value_threshold: 100.0,
            percentiles: vec![0.25, 0.5, 0.75, 0.95, 0.99],
            duplicate_keys: DuplicateKeyPolicy::Overwrite,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_str(json: &str) -> AnalysisResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| AnalysisError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> AnalysisResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| AnalysisError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        if let Some(q) = self.percentiles.iter().find(|q| !(0.0..=1.0).contains(*q)) {
            return Err(AnalysisError::Config(format!(
                "percentile {q} is outside [0, 1]"
            )));
        }
        if !self.high_value_threshold.is_finite() {
            return Err(AnalysisError::Config(
                "high_value_threshold must be finite".to_string(),
            ));
        }
        Ok(())
    }
}
