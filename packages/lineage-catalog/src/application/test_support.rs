//! Test doubles shared by the application unit tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use uuid::Uuid;

use crate::domain::{
    DatasetName, DatasetRow, DatasetVersionRow, ExtendedDatasetRow, ExtendedDatasetVersionRow,
    ExtendedJobRow, ExtendedJobVersionRow, ExtendedRunRow, JobName, JobRow, JobType,
    JobVersionRow, MetadataStore, NamespaceName, NamespaceRow, RunArgsRow, RunRow, RunState,
    RunStateRow, SourceName, SourceRow, VersionId,
};
use crate::error::{CatalogError, Result};
use crate::infrastructure::InMemoryMetadataStore;

/// Delegates to an in-memory store and injects concurrent writers at
/// chosen points.
///
/// - the first `stale_run_states` calls to `insert_run_state` report a stale
///   pointer
/// - a queued competing dataset or job version is committed right before the
///   next description refresh of that entity
pub(crate) struct FlakyStore {
    inner: InMemoryMetadataStore,
    stale_run_states: AtomicU32,
    competing_dataset: Mutex<Option<DatasetVersionRow>>,
    competing_job: Mutex<Option<JobVersionRow>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryMetadataStore::new(),
            stale_run_states: AtomicU32::new(0),
            competing_dataset: Mutex::new(None),
            competing_job: Mutex::new(None),
        }
    }

    pub fn with_stale_run_states(self, n: u32) -> Self {
        self.stale_run_states.store(n, Ordering::SeqCst);
        self
    }

    pub fn commit_before_next_refresh(&self, version: DatasetVersionRow) {
        *self.competing_dataset.lock() = Some(version);
    }

    pub fn commit_job_before_next_refresh(&self, version: JobVersionRow) {
        *self.competing_job.lock() = Some(version);
    }
}

#[async_trait]
impl MetadataStore for FlakyStore {
    async fn upsert_namespace(&self, row: &NamespaceRow) -> Result<NamespaceRow> {
        self.inner.upsert_namespace(row).await
    }
    async fn find_namespace(&self, name: &NamespaceName) -> Result<Option<NamespaceRow>> {
        self.inner.find_namespace(name).await
    }
    async fn upsert_source(&self, row: &SourceRow) -> Result<SourceRow> {
        self.inner.upsert_source(row).await
    }
    async fn find_or_insert_source(&self, row: &SourceRow) -> Result<SourceRow> {
        self.inner.find_or_insert_source(row).await
    }
    async fn find_source(&self, name: &SourceName) -> Result<Option<SourceRow>> {
        self.inner.find_source(name).await
    }
    async fn find_dataset(
        &self,
        namespace: &NamespaceName,
        name: &DatasetName,
    ) -> Result<Option<ExtendedDatasetRow>> {
        self.inner.find_dataset(namespace, name).await
    }
    async fn list_datasets(
        &self,
        namespace: &NamespaceName,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ExtendedDatasetRow>> {
        self.inner.list_datasets(namespace, limit, offset).await
    }
    async fn insert_dataset(&self, d: &DatasetRow, v: &DatasetVersionRow) -> Result<()> {
        self.inner.insert_dataset(d, v).await
    }
    async fn insert_dataset_version(
        &self,
        v: &DatasetVersionRow,
        description: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.inner.insert_dataset_version(v, description, updated_at).await
    }
    async fn update_dataset_description(
        &self,
        uuid: Uuid,
        expected: VersionId,
        description: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let competing = self.competing_dataset.lock().take();
        if let Some(version) = competing {
            self.inner
                .insert_dataset_version(&version, Some("competing"), updated_at)
                .await?;
        }
        self.inner
            .update_dataset_description(uuid, expected, description, updated_at)
            .await
    }
    async fn find_dataset_version(
        &self,
        version: VersionId,
    ) -> Result<Option<ExtendedDatasetVersionRow>> {
        self.inner.find_dataset_version(version).await
    }
    async fn list_dataset_versions(
        &self,
        namespace: &NamespaceName,
        name: &DatasetName,
    ) -> Result<Vec<ExtendedDatasetVersionRow>> {
        self.inner.list_dataset_versions(namespace, name).await
    }
    async fn find_job(
        &self,
        namespace: &NamespaceName,
        name: &JobName,
    ) -> Result<Option<ExtendedJobRow>> {
        self.inner.find_job(namespace, name).await
    }
    async fn list_jobs(
        &self,
        namespace: &NamespaceName,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ExtendedJobRow>> {
        self.inner.list_jobs(namespace, limit, offset).await
    }
    async fn insert_job(&self, j: &JobRow, v: &JobVersionRow) -> Result<()> {
        self.inner.insert_job(j, v).await
    }
    async fn insert_job_version(
        &self,
        v: &JobVersionRow,
        job_type: JobType,
        description: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.inner
            .insert_job_version(v, job_type, description, updated_at)
            .await
    }
    async fn update_job_description(
        &self,
        uuid: Uuid,
        expected: VersionId,
        description: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let competing = self.competing_job.lock().take();
        if let Some(version) = competing {
            self.inner
                .insert_job_version(&version, JobType::Batch, Some("competing"), updated_at)
                .await?;
        }
        self.inner
            .update_job_description(uuid, expected, description, updated_at)
            .await
    }
    async fn find_job_version(
        &self,
        version: VersionId,
    ) -> Result<Option<ExtendedJobVersionRow>> {
        self.inner.find_job_version(version).await
    }
    async fn list_job_versions(
        &self,
        namespace: &NamespaceName,
        name: &JobName,
    ) -> Result<Vec<ExtendedJobVersionRow>> {
        self.inner.list_job_versions(namespace, name).await
    }
    async fn insert_run(
        &self,
        run: &RunRow,
        args: &RunArgsRow,
        initial: &RunStateRow,
    ) -> Result<ExtendedRunRow> {
        self.inner.insert_run(run, args, initial).await
    }
    async fn find_run(&self, uuid: Uuid) -> Result<Option<ExtendedRunRow>> {
        self.inner.find_run(uuid).await
    }
    async fn run_exists(&self, uuid: Uuid) -> Result<bool> {
        self.inner.run_exists(uuid).await
    }
    async fn list_runs(
        &self,
        job_uuid: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ExtendedRunRow>> {
        self.inner.list_runs(job_uuid, limit, offset).await
    }
    async fn insert_run_state(&self, row: &RunStateRow, expected: RunState) -> Result<()> {
        let left = self.stale_run_states.load(Ordering::SeqCst);
        if left > 0 {
            self.stale_run_states.store(left - 1, Ordering::SeqCst);
            return Err(CatalogError::StaleRunState {
                run_id: row.run_uuid,
                expected: expected.to_string(),
            });
        }
        self.inner.insert_run_state(row, expected).await
    }
    async fn find_latest_run_state(&self, uuid: Uuid) -> Result<Option<RunStateRow>> {
        self.inner.find_latest_run_state(uuid).await
    }
    async fn list_run_states(&self, uuid: Uuid) -> Result<Vec<RunStateRow>> {
        self.inner.list_run_states(uuid).await
    }
}
