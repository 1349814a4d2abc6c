//! Run lifecycle
//!
//! Runs move through `NEW → RUNNING → {COMPLETED, FAILED, ABORTED}`. Every
//! transition appends a `run_states` row and moves the run's state pointer in
//! one store call, guarded by a compare-and-set on the state that was read.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::CatalogSettings;
use crate::domain::{
    JobName, MetadataStore, NamespaceName, Run, RunExistence, RunMeta, RunRow, RunState,
    RunStateRow,
};
use crate::error::{CatalogError, Result};
use crate::mapper::{self, now, now_after};

pub struct RunLifecycle {
    store: Arc<dyn MetadataStore>,
    max_transition_retries: u32,
}

impl RunLifecycle {
    pub fn new(store: Arc<dyn MetadataStore>, settings: &CatalogSettings) -> Self {
        Self {
            store,
            max_transition_retries: settings.max_transition_retries,
        }
    }

    /// Start a run of the job's current version in state `NEW`
    pub async fn create_run(
        &self,
        namespace: &NamespaceName,
        job: &JobName,
        meta: &RunMeta,
    ) -> Result<Run> {
        let job_row = self
            .store
            .find_job(namespace, job)
            .await?
            .ok_or_else(|| CatalogError::JobNotFound(format!("{}:{}", namespace, job)))?;

        let ts = now();
        let args = mapper::to_run_args_row(&meta.args, ts)?;
        let run = RunRow {
            uuid: Uuid::new_v4(),
            created_at: ts,
            updated_at: ts,
            job_version_uuid: job_row.version.uuid,
            run_args_uuid: args.uuid,
            nominal_start_time: meta.nominal_start_time.map(mapper::truncate_millis),
            nominal_end_time: meta.nominal_end_time.map(mapper::truncate_millis),
            current_run_state: RunState::New,
        };
        let initial = RunStateRow {
            uuid: Uuid::new_v4(),
            transitioned_at: ts,
            run_uuid: run.uuid,
            state: RunState::New,
        };

        let stored = self.store.insert_run(&run, &args, &initial).await?;
        info!(
            "Created run {} for job {}:{} (version {})",
            run.uuid, namespace, job, stored.job_version
        );
        mapper::to_run(stored)
    }

    pub async fn get(&self, run_id: Uuid) -> Result<Option<Run>> {
        self.store
            .find_run(run_id)
            .await?
            .map(mapper::to_run)
            .transpose()
    }

    /// Runs of every version of a job, oldest first
    pub async fn list(
        &self,
        namespace: &NamespaceName,
        job: &JobName,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Run>> {
        let job_row = self
            .store
            .find_job(namespace, job)
            .await?
            .ok_or_else(|| CatalogError::JobNotFound(format!("{}:{}", namespace, job)))?;
        self.store
            .list_runs(job_row.job.uuid, limit, offset)
            .await?
            .into_iter()
            .map(mapper::to_run)
            .collect()
    }

    pub async fn run_exists(&self, run_id: Uuid) -> Result<bool> {
        self.store.run_exists(run_id).await
    }

    /// Current state, read from the run's pointer
    pub async fn get_current_state(&self, run_id: Uuid) -> Result<RunState> {
        self.store
            .find_run(run_id)
            .await?
            .map(|row| row.run.current_run_state)
            .ok_or(CatalogError::RunNotFound(run_id))
    }

    /// State history, oldest first
    pub async fn history(&self, run_id: Uuid) -> Result<Vec<RunStateRow>> {
        let states = self.store.list_run_states(run_id).await?;
        if states.is_empty() {
            return Err(CatalogError::RunNotFound(run_id));
        }
        Ok(states)
    }

    /// Move `run_id` to `target`.
    ///
    /// # Errors
    ///
    /// - `RunNotFound` if the run does not exist
    /// - `InvalidStateTransition` if `target` is not reachable from the
    ///   current state; nothing is written
    pub async fn transition(&self, run_id: Uuid, target: RunState) -> Result<RunStateRow> {
        let mut retries = 0;
        loop {
            let current = self
                .store
                .find_run(run_id)
                .await?
                .ok_or(CatalogError::RunNotFound(run_id))?;
            let from = current.run.current_run_state;
            if !from.can_transition_to(target) {
                return Err(CatalogError::invalid_transition(from, target));
            }

            let row = RunStateRow {
                uuid: Uuid::new_v4(),
                transitioned_at: now_after(current.run.updated_at),
                run_uuid: run_id,
                state: target,
            };
            match self.store.insert_run_state(&row, from).await {
                Ok(()) => {
                    info!("Run {} transitioned {} -> {}", run_id, from, target);
                    return Ok(row);
                }
                Err(CatalogError::StaleRunState { .. }) if retries < self.max_transition_retries => {
                    retries += 1;
                    debug!(%run_id, retries, "Run state moved underneath us, re-reading");
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub async fn mark_running(&self, run_id: Uuid) -> Result<RunStateRow> {
        self.transition(run_id, RunState::Running).await
    }

    pub async fn mark_completed(&self, run_id: Uuid) -> Result<RunStateRow> {
        self.transition(run_id, RunState::Completed).await
    }

    pub async fn mark_failed(&self, run_id: Uuid) -> Result<RunStateRow> {
        self.transition(run_id, RunState::Failed).await
    }

    pub async fn mark_aborted(&self, run_id: Uuid) -> Result<RunStateRow> {
        self.transition(run_id, RunState::Aborted).await
    }
}

#[async_trait]
impl RunExistence for RunLifecycle {
    async fn run_exists(&self, run_id: Uuid) -> Result<bool> {
        RunLifecycle::run_exists(self, run_id).await
    }
}
