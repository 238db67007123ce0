//! Planner step: a fixed 3-rule heuristic over experiment history
//!
//! Not a search algorithm: no exploration/exploitation trade-off, and the
//! best score is only reported alongside the suggestions, never consulted.

use tracing::info;

use super::PipelineStep;
use crate::error::{CopilotError, Result};
use crate::model::{ParamMap, ParamValue};
use crate::session::{Experiment, SessionStore};

/// A proposed hyperparameter variant for the next training run; transient,
/// never persisted on the session.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub description: String,
    pub overrides: ParamMap,
}

/// How many suggestions the caller wants; zero yields an empty plan
#[derive(Debug, Clone, Copy)]
pub struct PlanArgs {
    pub requested_count: usize,
}

impl Default for PlanArgs {
    fn default() -> Self {
        Self { requested_count: 3 }
    }
}

#[derive(Debug, Clone)]
pub struct PlanOutput {
    pub best_score: Option<f64>,
    pub suggestions: Vec<Suggestion>,
}

/// Derive the next suggestions from experiment history.
///
/// Empty history yields exactly one baseline suggestion with no overrides.
/// Otherwise three candidates are derived from the most recent experiment
/// (not the best-scoring one), in fixed order: double the ensemble size,
/// cap the tree depth at 5, switch feature subsampling to sqrt. The list is
/// truncated to `requested_count`, never padded.
pub fn plan_suggestions(experiments: &[Experiment], requested_count: usize) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();

    match experiments.last() {
        None => {
            suggestions.push(Suggestion {
                description: "Baseline random forest with default parameters".to_string(),
                overrides: ParamMap::new(),
            });
        }
        Some(last) => {
            let last_n_estimators = last
                .hyperparameters
                .get("n_estimators")
                .and_then(|v| v.as_int())
                .unwrap_or(100);

            let mut overrides = ParamMap::new();
            overrides.insert(
                "n_estimators".to_string(),
                ParamValue::Int(last_n_estimators * 2),
            );
            suggestions.push(Suggestion {
                description: format!(
                    "Increase n_estimators from {} to {}",
                    last_n_estimators,
                    last_n_estimators * 2
                ),
                overrides,
            });

            let mut overrides = ParamMap::new();
            overrides.insert("max_depth".to_string(), ParamValue::Int(5));
            suggestions.push(Suggestion {
                description: "Limit max_depth to 5".to_string(),
                overrides,
            });

            let mut overrides = ParamMap::new();
            overrides.insert(
                "max_features".to_string(),
                ParamValue::Text("sqrt".to_string()),
            );
            suggestions.push(Suggestion {
                description: "Use max_features=\"sqrt\"".to_string(),
                overrides,
            });
        }
    }

    suggestions.truncate(requested_count);
    suggestions
}

/// Reads history, writes nothing.
#[derive(Debug, Default)]
pub struct PlannerAgent;

impl PipelineStep for PlannerAgent {
    type Args = PlanArgs;
    type Output = PlanOutput;

    fn name(&self) -> &'static str {
        "planner"
    }

    fn execute(
        &self,
        store: &mut SessionStore,
        session_id: &str,
        args: PlanArgs,
    ) -> Result<PlanOutput> {
        let session = store
            .get(session_id)
            .ok_or_else(|| CopilotError::SessionNotFound(session_id.to_string()))?;

        info!(best_score = ?session.best_score, "planning next experiments");

        let suggestions = plan_suggestions(&session.experiments, args.requested_count);
        info!(count = suggestions.len(), "generated suggestions");

        Ok(PlanOutput {
            best_score: session.best_score,
            suggestions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::TaskType;

    fn experiment(params: ParamMap, score: f64) -> Experiment {
        Experiment {
            model_name: "RandomForestClassifier".to_string(),
            task_type: TaskType::Classification,
            hyperparameters: params,
            score,
        }
    }

    #[test]
    fn test_empty_history_yields_single_baseline() {
        for requested in [1, 3, 10] {
            let suggestions = plan_suggestions(&[], requested);
            assert_eq!(suggestions.len(), 1);
            assert!(suggestions[0].overrides.is_empty());
        }
    }

    #[test]
    fn test_fixed_order_of_three_rules() {
        let mut params = ParamMap::new();
        params.insert("n_estimators".to_string(), ParamValue::Int(100));
        let history = vec![experiment(params, 0.8)];

        let suggestions = plan_suggestions(&history, 3);
        assert_eq!(suggestions.len(), 3);
        assert_eq!(
            suggestions[0].overrides.get("n_estimators"),
            Some(&ParamValue::Int(200))
        );
        assert_eq!(
            suggestions[1].overrides.get("max_depth"),
            Some(&ParamValue::Int(5))
        );
        assert_eq!(
            suggestions[2].overrides.get("max_features"),
            Some(&ParamValue::Text("sqrt".to_string()))
        );
    }

    #[test]
    fn test_derives_from_most_recent_not_best() {
        let mut best_params = ParamMap::new();
        best_params.insert("n_estimators".to_string(), ParamValue::Int(400));
        let mut last_params = ParamMap::new();
        last_params.insert("n_estimators".to_string(), ParamValue::Int(50));

        let history = vec![
            experiment(best_params, 0.95),
            experiment(last_params, 0.60),
        ];

        let suggestions = plan_suggestions(&history, 1);
        assert_eq!(
            suggestions[0].overrides.get("n_estimators"),
            Some(&ParamValue::Int(100))
        );
    }

    #[test]
    fn test_missing_ensemble_size_defaults_to_100() {
        let history = vec![experiment(ParamMap::new(), 0.5)];
        let suggestions = plan_suggestions(&history, 1);
        assert_eq!(
            suggestions[0].overrides.get("n_estimators"),
            Some(&ParamValue::Int(200))
        );
    }

    #[test]
    fn test_truncation_never_pads() {
        let history = vec![experiment(ParamMap::new(), 0.5)];
        assert_eq!(plan_suggestions(&history, 1).len(), 1);
        assert_eq!(plan_suggestions(&history, 2).len(), 2);
        assert_eq!(plan_suggestions(&history, 5).len(), 3);
        assert!(plan_suggestions(&history, 0).is_empty());
    }

    #[test]
    fn test_agent_reports_best_score() {
        let mut store = SessionStore::new();
        store.create("run1");
        store
            .append_experiment("run1", experiment(ParamMap::new(), 0.72))
            .unwrap();

        let output = PlannerAgent
            .run(&mut store, "run1", PlanArgs::default())
            .success()
            .unwrap();
        assert_eq!(output.best_score, Some(0.72));
        assert_eq!(output.suggestions.len(), 3);
    }

    #[test]
    fn test_agent_fails_on_unknown_session() {
        let mut store = SessionStore::new();
        let result = PlannerAgent.run(&mut store, "ghost", PlanArgs::default());
        assert!(!result.is_success());
    }
}
