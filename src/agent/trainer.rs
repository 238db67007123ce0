//! Trainer step: fit one model, score it, and record the experiment
//!
//! Status discipline: `training_status` is set to `Running` before the fit
//! and always left terminal (`Completed` or `Error`) before control returns.
//! On failure the ledger is untouched — no partial experiment is recorded.

use ndarray::Array1;
use tracing::info;

use super::PipelineStep;
use crate::data::{encode_features, encode_target, load_dataset, train_val_split};
use crate::error::{CopilotError, Result};
use crate::model::{
    accuracy_score, forest_from_params, r2_score, resolve_params, ParamMap,
};
use crate::session::{Experiment, SessionStore, TaskType, TrainingStatus};

/// Fraction of rows held out for validation
const VALIDATION_FRACTION: f64 = 0.2;

/// Optional hyperparameter overrides for one training run
#[derive(Debug, Clone, Default)]
pub struct TrainArgs {
    pub overrides: ParamMap,
}

#[derive(Debug, Clone)]
pub struct TrainOutput {
    pub model_name: String,
    pub task_type: TaskType,
    pub score: f64,
    /// Session best after this experiment was recorded
    pub best_score: Option<f64>,
}

/// Owns the session's training status and experiment ledger.
#[derive(Debug, Default)]
pub struct TrainerAgent;

impl TrainerAgent {
    fn fit_and_score(
        dataset_ref: &str,
        target_column: &str,
        task_type: TaskType,
        params: &ParamMap,
    ) -> Result<(String, f64)> {
        let df = load_dataset(dataset_ref)?;
        let features = encode_features(&df, target_column)?;
        let y = encode_target(&df, target_column, task_type)?;

        let seed = params
            .get("random_state")
            .and_then(|v| v.as_int())
            .unwrap_or(42) as u64;

        let split = train_val_split(&features.x, &y, VALIDATION_FRACTION, seed, task_type)?;

        let classification = task_type == TaskType::Classification;
        let mut forest = forest_from_params(params, classification)?;
        forest
            .fit(&split.x_train, &split.y_train)
            .map_err(|e| CopilotError::TrainingError(e.to_string()))?;

        let predictions: Array1<f64> = forest
            .predict(&split.x_val)
            .map_err(|e| CopilotError::TrainingError(e.to_string()))?;

        let score = if classification {
            accuracy_score(&split.y_val, &predictions)
        } else {
            r2_score(&split.y_val, &predictions)
        };

        Ok((forest.model_name().to_string(), score))
    }
}

impl PipelineStep for TrainerAgent {
    type Args = TrainArgs;
    type Output = TrainOutput;

    fn name(&self) -> &'static str {
        "trainer"
    }

    fn execute(
        &self,
        store: &mut SessionStore,
        session_id: &str,
        args: TrainArgs,
    ) -> Result<TrainOutput> {
        let session = store
            .get(session_id)
            .ok_or_else(|| CopilotError::SessionNotFound(session_id.to_string()))?;

        let dataset_ref = session.dataset_ref.clone().ok_or_else(|| {
            CopilotError::TrainingError("session has no dataset; intake has not run".to_string())
        })?;
        let target_column = session.target_column.clone().ok_or_else(|| {
            CopilotError::TrainingError("session has no target column".to_string())
        })?;
        let task_type = session.task_type.ok_or_else(|| {
            CopilotError::TrainingError("session has no task type".to_string())
        })?;

        let params = resolve_params(&args.overrides);

        info!(task_type = %task_type, "training status: RUNNING");
        store.set_training_status(session_id, TrainingStatus::Running)?;

        match Self::fit_and_score(&dataset_ref, &target_column, task_type, &params) {
            Ok((model_name, score)) => {
                store.set_training_status(session_id, TrainingStatus::Completed)?;
                info!(score, "training completed");

                let best_score = store.append_experiment(
                    session_id,
                    Experiment {
                        model_name: model_name.clone(),
                        task_type,
                        hyperparameters: params,
                        score,
                    },
                )?;

                Ok(TrainOutput {
                    model_name,
                    task_type,
                    score,
                    best_score,
                })
            }
            Err(err) => {
                // Terminal status first; the ledger stays unmodified.
                store.set_training_status(session_id, TrainingStatus::Error)?;
                Err(err)
            }
        }
    }
}
