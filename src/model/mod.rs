//! Learner: hyperparameters, evaluation metrics, and the random forest model
//!
//! The trainer step resolves a [`ParamMap`] (defaults merged with caller
//! overrides), builds a [`forest::RandomForest`] from it, and scores the
//! fitted model with [`accuracy_score`] or [`r2_score`] depending on the
//! task type.

pub mod decision_tree;
pub mod forest;

use std::collections::BTreeMap;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{CopilotError, Result};

pub use decision_tree::{Criterion, DecisionTree};
pub use forest::{MaxFeatures, RandomForest};

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Integer view, accepting whole floats
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Hyperparameter mapping; ordered so reports render deterministically
pub type ParamMap = BTreeMap<String, ParamValue>;

/// Default hyperparameters for a training run
pub fn default_params() -> ParamMap {
    let mut params = ParamMap::new();
    params.insert("n_estimators".to_string(), ParamValue::Int(100));
    params.insert("random_state".to_string(), ParamValue::Int(42));
    params
}

/// Merge caller overrides onto defaults, key by key; the caller wins on
/// collision.
pub fn resolve_params(overrides: &ParamMap) -> ParamMap {
    let mut params = default_params();
    for (key, value) in overrides {
        params.insert(key.clone(), value.clone());
    }
    params
}

/// Build a forest for the given task type from a resolved parameter map.
///
/// Unknown keys are ignored; known keys with unusable values are errors.
pub fn forest_from_params(params: &ParamMap, classification: bool) -> Result<RandomForest> {
    let n_estimators = match params.get("n_estimators") {
        Some(v) => {
            let n = v.as_int().ok_or_else(|| CopilotError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: v.to_string(),
                reason: "expected a positive integer".to_string(),
            })?;
            if n <= 0 {
                return Err(CopilotError::InvalidParameter {
                    name: "n_estimators".to_string(),
                    value: n.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
            n as usize
        }
        None => 100,
    };

    let mut forest = if classification {
        RandomForest::new_classifier(n_estimators)
    } else {
        RandomForest::new_regressor(n_estimators)
    };

    if let Some(v) = params.get("max_depth") {
        let depth = v.as_int().ok_or_else(|| CopilotError::InvalidParameter {
            name: "max_depth".to_string(),
            value: v.to_string(),
            reason: "expected a positive integer".to_string(),
        })?;
        if depth <= 0 {
            return Err(CopilotError::InvalidParameter {
                name: "max_depth".to_string(),
                value: depth.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        forest = forest.with_max_depth(depth as usize);
    }

    if let Some(v) = params.get("max_features") {
        let strategy = match v {
            ParamValue::Text(s) if s == "sqrt" => MaxFeatures::Sqrt,
            ParamValue::Text(s) if s == "all" => MaxFeatures::All,
            ParamValue::Int(n) if *n > 0 => MaxFeatures::Fixed(*n as usize),
            other => {
                return Err(CopilotError::InvalidParameter {
                    name: "max_features".to_string(),
                    value: other.to_string(),
                    reason: "expected \"sqrt\", \"all\", or a positive integer".to_string(),
                })
            }
        };
        forest = forest.with_max_features(strategy);
    }

    if let Some(v) = params.get("random_state") {
        if let Some(seed) = v.as_int() {
            forest = forest.with_random_state(seed as u64);
        }
    }

    Ok(forest)
}

/// Fraction of exactly matching predictions
pub fn accuracy_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (*t - *p).abs() < 0.5)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Coefficient of determination
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let n = y_true.len() as f64;
    let y_mean = y_true.sum() / n;
    let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        0.0
    }
}
