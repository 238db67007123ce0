//! Dataset profiler: the EDA summary stored on the session
//!
//! The summary is opaque to the orchestrator; only the report step reads it.

use std::collections::BTreeMap;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::column;
use crate::error::Result;

/// Distinct-value cutoff above which a target distribution is not enumerated.
const DISTRIBUTION_CARDINALITY_LIMIT: usize = 30;

/// Descriptive statistics for one numeric column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericStats {
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Target value counts, or a marker when the target is too fine-grained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TargetDistribution {
    Counts(BTreeMap<String, usize>),
    TooManyDistinctValues { n_unique: usize },
}

/// Profiling summary of one dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub n_rows: usize,
    pub n_cols: usize,
    /// Column name -> dtype, in frame order
    pub column_types: Vec<(String, String)>,
    /// Column name -> missing-value count, in frame order
    pub missing_counts: Vec<(String, usize)>,
    pub target_distribution: TargetDistribution,
    /// Per numeric column descriptive statistics
    pub numeric_stats: BTreeMap<String, NumericStats>,
}

/// Profile a dataset against its target column.
pub fn profile_dataset(df: &DataFrame, target_column: &str) -> Result<ProfileSummary> {
    let mut column_types = Vec::new();
    let mut missing_counts = Vec::new();
    let mut numeric_stats = BTreeMap::new();

    for name in df.get_column_names() {
        let series = column(df, name.as_str())?;
        column_types.push((name.to_string(), series.dtype().to_string()));
        missing_counts.push((name.to_string(), series.null_count()));

        if crate::data::is_numeric_dtype(series.dtype()) {
            let ca = series
                .cast(&DataType::Float64)
                .ok()
                .and_then(|s| s.f64().map(|c| c.clone()).ok());
            if let Some(ca) = ca {
                numeric_stats.insert(
                    name.to_string(),
                    NumericStats {
                        mean: ca.mean(),
                        std: ca.std(1),
                        min: ca.min(),
                        max: ca.max(),
                    },
                );
            }
        }
    }

    let target = column(df, target_column)?;
    let n_unique = target.n_unique()?;
    let target_distribution = if n_unique < DISTRIBUTION_CARDINALITY_LIMIT {
        let labels = target.cast(&DataType::String)?;
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for value in labels.str()?.into_iter() {
            let key = value.map(|s| s.to_string()).unwrap_or_else(|| "null".to_string());
            *counts.entry(key).or_insert(0) += 1;
        }
        TargetDistribution::Counts(counts)
    } else {
        TargetDistribution::TooManyDistinctValues { n_unique }
    };

    Ok(ProfileSummary {
        n_rows: df.height(),
        n_cols: df.width(),
        column_types,
        missing_counts,
        target_distribution,
        numeric_stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_shape_and_types() {
        let df = df!(
            "age" => &[25i64, 30, 35],
            "city" => &["a", "b", "a"],
            "churn" => &[0i64, 1, 0]
        )
        .unwrap();

        let summary = profile_dataset(&df, "churn").unwrap();
        assert_eq!(summary.n_rows, 3);
        assert_eq!(summary.n_cols, 3);
        assert_eq!(summary.column_types.len(), 3);
        assert!(summary.numeric_stats.contains_key("age"));
        assert!(!summary.numeric_stats.contains_key("city"));
    }

    #[test]
    fn test_profile_target_counts() {
        let df = df!("x" => &[1, 2, 3, 4], "y" => &["no", "yes", "no", "no"]).unwrap();
        let summary = profile_dataset(&df, "y").unwrap();

        match summary.target_distribution {
            TargetDistribution::Counts(counts) => {
                assert_eq!(counts.get("no"), Some(&3));
                assert_eq!(counts.get("yes"), Some(&1));
            }
            other => panic!("expected counts, got {:?}", other),
        }
    }

    #[test]
    fn test_profile_high_cardinality_target() {
        let values: Vec<f64> = (0..100).map(|i| i as f64 * 0.37).collect();
        let x: Vec<i64> = (0..100).collect();
        let df = df!("x" => &x, "y" => &values).unwrap();

        let summary = profile_dataset(&df, "y").unwrap();
        assert!(matches!(
            summary.target_distribution,
            TargetDistribution::TooManyDistinctValues { n_unique: 100 }
        ));
    }

    #[test]
    fn test_profile_missing_counts() {
        let df = df!(
            "a" => &[Some(1.0), None, Some(3.0)],
            "y" => &[0i64, 1, 0]
        )
        .unwrap();

        let summary = profile_dataset(&df, "y").unwrap();
        let missing_a = summary
            .missing_counts
            .iter()
            .find(|(name, _)| name == "a")
            .map(|(_, n)| *n);
        assert_eq!(missing_a, Some(1));
    }
}
