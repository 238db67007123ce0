//! Report step: pure formatting of session state into markdown text

use std::fmt::Write as _;

use tracing::info;

use super::PipelineStep;
use crate::data::profile::TargetDistribution;
use crate::error::{CopilotError, Result};
use crate::session::{Session, SessionStore};

/// Best scores at or above this read as a strong baseline.
const STRONG_BASELINE_THRESHOLD: f64 = 0.7;

/// Render the final report for a session.
///
/// Section order is fixed: title, dataset header, EDA summary, numbered
/// experiments, best result with a qualitative recommendation.
pub fn render_report(session: &Session) -> Result<String> {
    let dataset_ref = session.dataset_ref.as_deref().ok_or_else(|| {
        CopilotError::ReportError("session has no dataset reference".to_string())
    })?;
    let target_column = session.target_column.as_deref().ok_or_else(|| {
        CopilotError::ReportError("session has no target column".to_string())
    })?;
    let task_type = session.task_type.ok_or_else(|| {
        CopilotError::ReportError("session has no task type".to_string())
    })?;

    let mut out = String::new();

    writeln!(out, "# Tabular Copilot Report").ok();
    writeln!(out).ok();
    writeln!(out, "**Dataset:** `{dataset_ref}`").ok();
    writeln!(out, "**Target Column:** `{target_column}`").ok();
    writeln!(out, "**Task Type:** `{task_type}`").ok();
    match &session.profiling_summary {
        Some(summary) => {
            writeln!(out, "**Shape:** {} rows × {} columns", summary.n_rows, summary.n_cols).ok();
        }
        None => {
            writeln!(out, "**Shape:** unknown").ok();
        }
    }

    writeln!(out, "\n## 1. EDA Summary").ok();
    match &session.profiling_summary {
        Some(summary) => {
            writeln!(out, "**Column Types:**").ok();
            for (name, dtype) in &summary.column_types {
                writeln!(out, "- `{name}`: {dtype}").ok();
            }

            writeln!(out, "\n**Missing Values per Column:**").ok();
            for (name, count) in &summary.missing_counts {
                writeln!(out, "- `{name}`: {count}").ok();
            }

            writeln!(out, "\n**Target Distribution:**").ok();
            match &summary.target_distribution {
                TargetDistribution::Counts(counts) => {
                    for (label, count) in counts {
                        writeln!(out, "- `{label}`: {count}").ok();
                    }
                }
                TargetDistribution::TooManyDistinctValues { n_unique } => {
                    writeln!(out, "Too many distinct values ({n_unique})").ok();
                }
            }
        }
        None => {
            writeln!(out, "No profiling summary available.").ok();
        }
    }

    writeln!(out, "\n## 2. Experiments Run").ok();
    if session.experiments.is_empty() {
        writeln!(out, "No experiments were run.").ok();
    } else {
        for (i, exp) in session.experiments.iter().enumerate() {
            writeln!(out, "### Experiment {}", i + 1).ok();
            writeln!(out, "- Model: `{}`", exp.model_name).ok();
            writeln!(out, "- Score: `{:.4}`", exp.score).ok();

            let key_params: Vec<String> = ["n_estimators", "max_depth", "max_features"]
                .iter()
                .map(|&key| match exp.hyperparameters.get(key) {
                    Some(value) => format!("{key}={value}"),
                    None => format!("{key}=None"),
                })
                .collect();
            writeln!(out, "- Key Params: {}", key_params.join(", ")).ok();
        }
    }

    writeln!(out, "\n## 3. Best Result").ok();
    match session.best_score {
        Some(best) => {
            writeln!(out, "**Best Score:** {best:.4}").ok();
        }
        None => {
            writeln!(out, "**Best Score:** None").ok();
        }
    }

    let strong = session
        .best_score
        .is_some_and(|s| s >= STRONG_BASELINE_THRESHOLD);
    if strong {
        writeln!(
            out,
            "\nThe model achieves a reasonably strong baseline. Next steps could \
             include more advanced tuning and cross-validation."
        )
        .ok();
    } else {
        writeln!(
            out,
            "\nOverall performance is modest. Consider more feature engineering, \
             trying different models, or tuning hyperparameters further."
        )
        .ok();
    }

    Ok(out)
}

/// Reads the full session, writes nothing.
#[derive(Debug, Default)]
pub struct ReportAgent;

impl PipelineStep for ReportAgent {
    type Args = ();
    type Output = String;

    fn name(&self) -> &'static str {
        "report"
    }

    fn execute(&self, store: &mut SessionStore, session_id: &str, _: ()) -> Result<String> {
        let session = store
            .get(session_id)
            .ok_or_else(|| CopilotError::SessionNotFound(session_id.to_string()))?;

        info!("generating final report");
        let text = render_report(session)?;
        info!(bytes = text.len(), "report generation completed");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ParamMap, ParamValue};
    use crate::session::{Experiment, TaskType};

    fn session_with_experiments(scores: &[f64]) -> SessionStore {
        let mut store = SessionStore::new();
        store.create("run1");
        store
            .set_intake("run1", "data.csv", "churn", TaskType::Classification)
            .unwrap();

        for &score in scores {
            let mut params = ParamMap::new();
            params.insert("n_estimators".to_string(), ParamValue::Int(100));
            store
                .append_experiment(
                    "run1",
                    Experiment {
                        model_name: "RandomForestClassifier".to_string(),
                        task_type: TaskType::Classification,
                        hyperparameters: params,
                        score,
                    },
                )
                .unwrap();
        }
        store
    }

    #[test]
    fn test_report_section_order() {
        let mut store = session_with_experiments(&[0.8, 0.9]);
        let text = ReportAgent.run(&mut store, "run1", ()).success().unwrap();

        let eda = text.find("## 1. EDA Summary").unwrap();
        let experiments = text.find("## 2. Experiments Run").unwrap();
        let best = text.find("## 3. Best Result").unwrap();
        assert!(eda < experiments && experiments < best);

        assert!(text.contains("### Experiment 1"));
        assert!(text.contains("### Experiment 2"));
        assert!(text.contains("n_estimators=100"));
    }

    #[test]
    fn test_strong_baseline_recommendation() {
        let mut store = session_with_experiments(&[0.85]);
        let text = ReportAgent.run(&mut store, "run1", ()).success().unwrap();
        assert!(text.contains("reasonably strong baseline"));
    }

    #[test]
    fn test_modest_recommendation_below_threshold() {
        let mut store = session_with_experiments(&[0.55]);
        let text = ReportAgent.run(&mut store, "run1", ()).success().unwrap();
        assert!(text.contains("Overall performance is modest"));
    }

    #[test]
    fn test_modest_recommendation_without_experiments() {
        let mut store = session_with_experiments(&[]);
        let text = ReportAgent.run(&mut store, "run1", ()).success().unwrap();
        assert!(text.contains("No experiments were run."));
        assert!(text.contains("**Best Score:** None"));
        assert!(text.contains("Overall performance is modest"));
    }

    #[test]
    fn test_report_fails_on_malformed_session() {
        let mut store = SessionStore::new();
        store.create("run1");
        // Intake never ran: no dataset, target, or task type.
        let result = ReportAgent.run(&mut store, "run1", ());
        assert!(!result.is_success());
    }
}
