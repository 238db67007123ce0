//! Session state: the unit of bookkeeping for one workflow run
//!
//! A [`Session`] is created once per pipeline run and lives for the process
//! lifetime. The [`SessionStore`] is owned by the orchestrator and handed to
//! each step by mutable reference; it assumes a single writer and carries no
//! internal locking.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::profile::ProfileSummary;
use crate::error::{CopilotError, Result};
use crate::model::ParamMap;

/// Prediction task kind, detected once at intake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Classification,
    Regression,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskType::Classification => write!(f, "classification"),
            TaskType::Regression => write!(f, "regression"),
        }
    }
}

/// Trainer-owned status flag; always left terminal before a step returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrainingStatus {
    NotStarted,
    Running,
    Completed,
    Error,
}

/// Immutable record of one training attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub model_name: String,
    pub task_type: TaskType,
    pub hyperparameters: ParamMap,
    pub score: f64,
}

/// Complete mutable state of one workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub dataset_ref: Option<String>,
    pub target_column: Option<String>,
    pub task_type: Option<TaskType>,
    pub training_status: TrainingStatus,
    pub profiling_summary: Option<ProfileSummary>,
    /// Append-only; insertion order is chronological order
    pub experiments: Vec<Experiment>,
    /// Invariant: `max(score)` over `experiments`, `None` when empty
    pub best_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            dataset_ref: None,
            target_column: None,
            task_type: None,
            training_status: TrainingStatus::NotStarted,
            profiling_summary: None,
            experiments: Vec::new(),
            best_score: None,
            created_at: Utc::now(),
        }
    }
}

/// In-memory keyed store of sessions, owned by the orchestrator
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<String, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh session. An existing session under the same id is
    /// silently replaced.
    pub fn create(&mut self, id: &str) {
        self.sessions.insert(id.to_string(), Session::new(id));
    }

    /// Look up a session; absence is not an error.
    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Session> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| CopilotError::SessionNotFound(id.to_string()))
    }

    /// Record the intake-owned fields in one write.
    pub fn set_intake(
        &mut self,
        id: &str,
        dataset_ref: &str,
        target_column: &str,
        task_type: TaskType,
    ) -> Result<()> {
        let session = self.get_mut(id)?;
        session.dataset_ref = Some(dataset_ref.to_string());
        session.target_column = Some(target_column.to_string());
        session.task_type = Some(task_type);
        Ok(())
    }

    pub fn set_profile(&mut self, id: &str, summary: ProfileSummary) -> Result<()> {
        self.get_mut(id)?.profiling_summary = Some(summary);
        Ok(())
    }

    pub fn set_training_status(&mut self, id: &str, status: TrainingStatus) -> Result<()> {
        self.get_mut(id)?.training_status = status;
        Ok(())
    }

    /// Append an experiment and update the best score in the same call.
    ///
    /// The best score is replaced only when unset or strictly beaten, so the
    /// first experiment to reach a score wins ties. Returns the new best.
    pub fn append_experiment(&mut self, id: &str, experiment: Experiment) -> Result<Option<f64>> {
        let session = self.get_mut(id)?;
        let score = experiment.score;
        session.experiments.push(experiment);

        match session.best_score {
            None => session.best_score = Some(score),
            Some(best) if score > best => session.best_score = Some(score),
            Some(_) => {}
        }

        Ok(session.best_score)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParamMap;

    fn experiment(score: f64) -> Experiment {
        Experiment {
            model_name: "RandomForestClassifier".to_string(),
            task_type: TaskType::Classification,
            hyperparameters: ParamMap::new(),
            score,
        }
    }

    #[test]
    fn test_create_initializes_defaults() {
        let mut store = SessionStore::new();
        store.create("run1");

        let session = store.get("run1").unwrap();
        assert!(session.dataset_ref.is_none());
        assert!(session.task_type.is_none());
        assert_eq!(session.training_status, TrainingStatus::NotStarted);
        assert!(session.experiments.is_empty());
        assert!(session.best_score.is_none());
    }

    #[test]
    fn test_create_replaces_existing() {
        let mut store = SessionStore::new();
        store.create("run1");
        store.append_experiment("run1", experiment(0.9)).unwrap();

        store.create("run1");
        assert!(store.get("run1").unwrap().experiments.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_is_idempotent() {
        let mut store = SessionStore::new();
        store.create("run1");

        let first = store.get("run1").unwrap().clone();
        let second = store.get("run1").unwrap().clone();
        assert_eq!(first.id, second.id);
        assert_eq!(first.experiments.len(), second.experiments.len());
        assert_eq!(first.best_score, second.best_score);
    }

    #[test]
    fn test_get_missing_returns_none() {
        let store = SessionStore::new();
        assert!(store.get("nope").is_none());
    }

    #[test]
    fn test_mutators_error_on_unknown_session() {
        let mut store = SessionStore::new();
        let err = store.set_training_status("ghost", TrainingStatus::Running);
        assert!(matches!(err, Err(CopilotError::SessionNotFound(_))));

        let err = store.append_experiment("ghost", experiment(0.5));
        assert!(matches!(err, Err(CopilotError::SessionNotFound(_))));
    }

    #[test]
    fn test_best_score_invariant_after_each_append() {
        let mut store = SessionStore::new();
        store.create("run1");

        for &score in &[0.5, 0.8, 0.3, 0.9, 0.7] {
            store.append_experiment("run1", experiment(score)).unwrap();

            let session = store.get("run1").unwrap();
            let expected = session
                .experiments
                .iter()
                .map(|e| e.score)
                .fold(f64::NEG_INFINITY, f64::max);
            assert_eq!(session.best_score, Some(expected));
        }
    }

    #[test]
    fn test_best_score_is_monotonic() {
        let mut store = SessionStore::new();
        store.create("run1");

        let mut previous = f64::NEG_INFINITY;
        for &score in &[0.4, 0.9, 0.1, 0.9, 0.95] {
            let best = store
                .append_experiment("run1", experiment(score))
                .unwrap()
                .unwrap();
            assert!(best >= previous);
            previous = best;
        }
    }

    #[test]
    fn test_ties_keep_first_seen() {
        let mut store = SessionStore::new();
        store.create("run1");

        store.append_experiment("run1", experiment(0.8)).unwrap();
        let best = store.append_experiment("run1", experiment(0.8)).unwrap();

        // Same value, but the first experiment remains the record holder.
        assert_eq!(best, Some(0.8));
        assert_eq!(store.get("run1").unwrap().experiments.len(), 2);
    }
}
