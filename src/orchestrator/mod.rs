//! Orchestrator: the top-level control loop over the pipeline steps
//!
//! An explicit finite-state machine with an enumerated abort/continue policy
//! per transition:
//!
//! ```text
//! Intake -> Profiling -> BaselineTrain -> Planning -> PlannedTrain(xk)
//!        -> Reporting -> Done
//! ```
//!
//! Intake, profiling, the baseline run, and reporting abort the whole run on
//! failure (no report file is written). Planning is advisory: its failure
//! skips straight to reporting. Planned training runs are fire-and-forget —
//! per-run failures are recorded on the session as `training_status=Error`
//! and a missing ledger entry, never inspected by the loop.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::agent::{
    IntakeAgent, IntakeArgs, PipelineStep, PlanArgs, PlannerAgent, ProfilingAgent, ReportAgent,
    StepResult, Suggestion, TrainArgs, TrainerAgent,
};
use crate::error::Result;
use crate::session::SessionStore;

/// How many suggestions the planner is asked for each run.
const PLANNER_SUGGESTION_COUNT: usize = 3;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Where the rendered report is written
    pub report_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            report_path: PathBuf::from("report.md"),
        }
    }
}

/// The control-loop states; `Done` and `Aborted` are terminal.
#[derive(Debug)]
enum PipelineState {
    Intake,
    Profiling,
    BaselineTrain,
    Planning,
    PlannedTrain(Vec<Suggestion>),
    Reporting,
    Done(String),
    Aborted { step: &'static str, message: String },
}

/// Final outcome of one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed {
        report_path: PathBuf,
        best_score: Option<f64>,
    },
    Aborted {
        step: &'static str,
        message: String,
    },
}

/// Owns the session store and sequences the steps.
#[derive(Debug, Default)]
pub struct Orchestrator {
    store: SessionStore,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        Self {
            store: SessionStore::new(),
            config,
        }
    }

    /// Read access to session state, for callers inspecting a finished run.
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Run the full workflow for one dataset/target pair.
    ///
    /// `planned_run_count` bounds how many of the planner's suggestions are
    /// trained after the baseline.
    pub fn run_pipeline(
        &mut self,
        dataset_ref: &str,
        target_column: &str,
        session_id: &str,
        planned_run_count: usize,
    ) -> Result<RunOutcome> {
        info!(session_id, dataset_ref, "starting pipeline");
        self.store.create(session_id);

        let mut state = PipelineState::Intake;
        loop {
            state = match state {
                PipelineState::Intake => {
                    let args = IntakeArgs {
                        dataset_ref: dataset_ref.to_string(),
                        target_column: target_column.to_string(),
                    };
                    match IntakeAgent.run(&mut self.store, session_id, args) {
                        StepResult::Success(_) => PipelineState::Profiling,
                        StepResult::Failure { message } => PipelineState::Aborted {
                            step: "intake",
                            message,
                        },
                    }
                }

                PipelineState::Profiling => {
                    match ProfilingAgent.run(&mut self.store, session_id, ()) {
                        StepResult::Success(_) => PipelineState::BaselineTrain,
                        StepResult::Failure { message } => PipelineState::Aborted {
                            step: "profiling",
                            message,
                        },
                    }
                }

                PipelineState::BaselineTrain => {
                    match TrainerAgent.run(&mut self.store, session_id, TrainArgs::default()) {
                        StepResult::Success(output) => {
                            info!(score = output.score, "baseline training done");
                            PipelineState::Planning
                        }
                        StepResult::Failure { message } => PipelineState::Aborted {
                            step: "baseline training",
                            message,
                        },
                    }
                }

                PipelineState::Planning => {
                    let args = PlanArgs {
                        requested_count: PLANNER_SUGGESTION_COUNT,
                    };
                    match PlannerAgent.run(&mut self.store, session_id, args) {
                        StepResult::Success(output) => {
                            info!(
                                count = output.suggestions.len(),
                                "planner suggested experiments"
                            );
                            PipelineState::PlannedTrain(output.suggestions)
                        }
                        StepResult::Failure { message } => {
                            // Planning is advisory; the run continues without it.
                            warn!(%message, "planning failed, skipping planned runs");
                            PipelineState::Reporting
                        }
                    }
                }

                PipelineState::PlannedTrain(suggestions) => {
                    self.run_planned(session_id, &suggestions, planned_run_count);
                    PipelineState::Reporting
                }

                PipelineState::Reporting => {
                    match ReportAgent.run(&mut self.store, session_id, ()) {
                        StepResult::Success(text) => PipelineState::Done(text),
                        StepResult::Failure { message } => PipelineState::Aborted {
                            step: "report",
                            message,
                        },
                    }
                }

                PipelineState::Done(report_text) => {
                    return self.finish(session_id, &report_text);
                }

                PipelineState::Aborted { step, message } => {
                    error!(step, %message, "pipeline aborted");
                    return Ok(RunOutcome::Aborted { step, message });
                }
            };
        }
    }

    /// Train one run per accepted suggestion, bounded by the requested count.
    ///
    /// Results are deliberately not inspected: a failed planned run leaves
    /// `training_status=Error` on the session and appends nothing, and the
    /// loop moves on to the next suggestion.
    pub fn run_planned(&mut self, session_id: &str, suggestions: &[Suggestion], limit: usize) {
        for (i, suggestion) in suggestions.iter().take(limit).enumerate() {
            info!(
                run = i + 1,
                description = %suggestion.description,
                "running planned experiment"
            );
            let args = TrainArgs {
                overrides: suggestion.overrides.clone(),
            };
            let _ = TrainerAgent.run(&mut self.store, session_id, args);
        }
    }

    fn finish(&self, session_id: &str, report_text: &str) -> Result<RunOutcome> {
        let report_path = self.config.report_path.clone();
        if let Some(parent) = report_path.parent() {
            if parent != Path::new("") {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&report_path, report_text)?;

        let best_score = self
            .store
            .get(session_id)
            .and_then(|session| session.best_score);

        info!(path = %report_path.display(), "pipeline completed, report saved");
        println!("=== PIPELINE COMPLETED ===");
        println!("Report saved to: {}", report_path.display());

        Ok(RunOutcome::Completed {
            report_path,
            best_score,
        })
    }
}
