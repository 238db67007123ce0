//! Profiling step: compute and store the EDA summary

use tracing::info;

use super::PipelineStep;
use crate::data::profile::{profile_dataset, ProfileSummary};
use crate::data::load_dataset;
use crate::error::{CopilotError, Result};
use crate::session::SessionStore;

/// Owns the session's profiling summary.
#[derive(Debug, Default)]
pub struct ProfilingAgent;

impl PipelineStep for ProfilingAgent {
    type Args = ();
    type Output = ProfileSummary;

    fn name(&self) -> &'static str {
        "profiling"
    }

    fn execute(&self, store: &mut SessionStore, session_id: &str, _: ()) -> Result<ProfileSummary> {
        let session = store
            .get(session_id)
            .ok_or_else(|| CopilotError::SessionNotFound(session_id.to_string()))?;

        let dataset_ref = session.dataset_ref.clone().ok_or_else(|| {
            CopilotError::LoadError("session has no dataset; intake has not run".to_string())
        })?;
        let target_column = session.target_column.clone().ok_or_else(|| {
            CopilotError::LoadError("session has no target column; intake has not run".to_string())
        })?;

        info!("profiling dataset");
        let df = load_dataset(&dataset_ref)?;
        let summary = profile_dataset(&df, &target_column)?;

        info!(rows = summary.n_rows, cols = summary.n_cols, "profiling completed");

        store.set_profile(session_id, summary.clone())?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{IntakeAgent, IntakeArgs};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_profiling_stores_summary() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "a,b,label\n1,x,0\n2,y,1\n3,x,0\n").unwrap();
        file.flush().unwrap();

        let mut store = SessionStore::new();
        store.create("run1");
        IntakeAgent
            .run(
                &mut store,
                "run1",
                IntakeArgs {
                    dataset_ref: file.path().to_str().unwrap().to_string(),
                    target_column: "label".to_string(),
                },
            )
            .success()
            .unwrap();

        let result = ProfilingAgent.run(&mut store, "run1", ());
        let summary = result.success().expect("profiling should succeed");
        assert_eq!(summary.n_rows, 3);

        let session = store.get("run1").unwrap();
        assert!(session.profiling_summary.is_some());
    }

    #[test]
    fn test_profiling_fails_without_intake() {
        let mut store = SessionStore::new();
        store.create("run1");

        let result = ProfilingAgent.run(&mut store, "run1", ());
        assert!(!result.is_success());
    }

    #[test]
    fn test_profiling_fails_on_unknown_session() {
        let mut store = SessionStore::new();
        let result = ProfilingAgent.run(&mut store, "ghost", ());
        assert!(!result.is_success());
    }
}
