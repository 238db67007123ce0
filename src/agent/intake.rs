//! Intake step: load the dataset, detect the task type, seed the session

use tracing::info;

use super::PipelineStep;
use crate::data::{column, detect_task_type, load_dataset};
use crate::error::Result;
use crate::session::{SessionStore, TaskType};

/// Dataset reference and target column supplied by the caller
#[derive(Debug, Clone)]
pub struct IntakeArgs {
    pub dataset_ref: String,
    pub target_column: String,
}

#[derive(Debug, Clone)]
pub struct IntakeOutput {
    pub task_type: TaskType,
    pub n_rows: usize,
    pub columns: Vec<String>,
}

/// Owns the session's dataset reference, target column, and task type.
#[derive(Debug, Default)]
pub struct IntakeAgent;

impl PipelineStep for IntakeAgent {
    type Args = IntakeArgs;
    type Output = IntakeOutput;

    fn name(&self) -> &'static str {
        "intake"
    }

    fn execute(
        &self,
        store: &mut SessionStore,
        session_id: &str,
        args: IntakeArgs,
    ) -> Result<IntakeOutput> {
        info!(dataset = %args.dataset_ref, "starting intake");

        let df = load_dataset(&args.dataset_ref)?;
        // Verifies the target exists before anything is written to the session.
        column(&df, &args.target_column)?;
        let task_type = detect_task_type(&df, &args.target_column)?;

        store.set_intake(session_id, &args.dataset_ref, &args.target_column, task_type)?;

        info!(
            target = %args.target_column,
            task_type = %task_type,
            rows = df.height(),
            "session updated"
        );

        Ok(IntakeOutput {
            task_type,
            n_rows: df.height(),
            columns: df
                .get_column_names()
                .into_iter()
                .map(|s| s.to_string())
                .collect(),
        })
    }
}
