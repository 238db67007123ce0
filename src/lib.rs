//! Tabular Copilot - session-based AutoML workflow engine
//!
//! Automates one tabular modeling workflow end to end: ingest a dataset and
//! target column, profile it, train a baseline random forest, run a few
//! planner-suggested hyperparameter variants while tracking the best score,
//! and emit a markdown report.
//!
//! # Modules
//!
//! - [`session`] - session records, the experiment ledger, and the store
//! - [`agent`] - the uniform step contract and the five pipeline steps
//! - [`orchestrator`] - the control loop sequencing the steps
//! - [`data`] - dataset loading, task detection, encoding, partitioning
//! - [`model`] - hyperparameters, metrics, and the random forest learner

pub mod error;

pub mod agent;
pub mod data;
pub mod model;
pub mod orchestrator;
pub mod session;

pub use error::{CopilotError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{CopilotError, Result};

    pub use crate::session::{Experiment, Session, SessionStore, TaskType, TrainingStatus};

    pub use crate::agent::{
        plan_suggestions, IntakeAgent, IntakeArgs, PipelineStep, PlanArgs, PlannerAgent,
        ProfilingAgent, ReportAgent, StepResult, Suggestion, TrainArgs, TrainerAgent,
    };

    pub use crate::orchestrator::{Orchestrator, PipelineConfig, RunOutcome};

    pub use crate::data::profile::{ProfileSummary, TargetDistribution};
    pub use crate::data::{detect_task_type, load_dataset, train_val_split};

    pub use crate::model::{
        accuracy_score, r2_score, MaxFeatures, ParamMap, ParamValue, RandomForest,
    };
}
