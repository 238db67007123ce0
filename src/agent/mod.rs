//! The uniform step-invocation contract
//!
//! Every pipeline step implements [`PipelineStep`]: one `execute` method
//! with step-specific arguments and output. The provided [`PipelineStep::run`]
//! wrapper is the failure isolation boundary — any internal fault is caught
//! there, logged, and converted into [`StepResult::Failure`], so no error
//! escapes a step uncaught.
//!
//! Side-effect discipline: a step may read any session field but writes only
//! the fields it owns (intake: dataset/target/task type; profiling: the
//! summary; trainer: training status and the experiment ledger).

pub mod intake;
pub mod planner;
pub mod profiling;
pub mod report;
pub mod trainer;

use tracing::error;

use crate::error::Result;
use crate::session::SessionStore;

pub use intake::{IntakeAgent, IntakeArgs, IntakeOutput};
pub use planner::{plan_suggestions, PlannerAgent, PlanArgs, PlanOutput, Suggestion};
pub use profiling::ProfilingAgent;
pub use report::ReportAgent;
pub use trainer::{TrainerAgent, TrainArgs, TrainOutput};

/// Tagged outcome of one step invocation
#[derive(Debug, Clone, PartialEq)]
pub enum StepResult<T> {
    Success(T),
    Failure { message: String },
}

impl<T> StepResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, StepResult::Success(_))
    }

    /// The payload, discarding a failure
    pub fn success(self) -> Option<T> {
        match self {
            StepResult::Success(payload) => Some(payload),
            StepResult::Failure { .. } => None,
        }
    }

    pub fn failure_message(&self) -> Option<&str> {
        match self {
            StepResult::Success(_) => None,
            StepResult::Failure { message } => Some(message),
        }
    }
}

/// One pipeline step with a uniform invocation shape
pub trait PipelineStep {
    type Args;
    type Output;

    /// Step name used in logs and abort messages
    fn name(&self) -> &'static str;

    /// The step body; may return any internal error
    fn execute(
        &self,
        store: &mut SessionStore,
        session_id: &str,
        args: Self::Args,
    ) -> Result<Self::Output>;

    /// Invoke the step, trapping internal faults at the boundary.
    fn run(
        &self,
        store: &mut SessionStore,
        session_id: &str,
        args: Self::Args,
    ) -> StepResult<Self::Output> {
        match self.execute(store, session_id, args) {
            Ok(payload) => StepResult::Success(payload),
            Err(err) => {
                error!(step = self.name(), error = %err, "step failed");
                StepResult::Failure {
                    message: err.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CopilotError;

    struct FailingStep;

    impl PipelineStep for FailingStep {
        type Args = ();
        type Output = ();

        fn name(&self) -> &'static str {
            "failing"
        }

        fn execute(&self, _: &mut SessionStore, _: &str, _: ()) -> Result<()> {
            Err(CopilotError::TrainingError("boom".to_string()))
        }
    }

    #[test]
    fn test_run_traps_internal_errors() {
        let mut store = SessionStore::new();
        let result = FailingStep.run(&mut store, "run1", ());
        assert!(!result.is_success());
        assert_eq!(
            result.failure_message(),
            Some("Training error: boom")
        );
    }
}
