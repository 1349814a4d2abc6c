//! Store Port (Trait Interface)
//!
//! Port/Adapter pattern for backend flexibility:
//! - Durable: SQLite (file or in-memory)
//! - Testing: InMemory (fast unit tests)
//!
//! Every method is one atomic unit: it either applies all of its row writes
//! or none of them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::models::{JobType, RunState, VersionId};
use super::names::{DatasetName, JobName, NamespaceName, SourceName};
use super::rows::{
    DatasetRow, DatasetVersionRow, ExtendedDatasetRow, ExtendedDatasetVersionRow, ExtendedJobRow,
    ExtendedJobVersionRow, ExtendedRunRow, JobRow, JobVersionRow, NamespaceRow, RunArgsRow,
    RunRow, RunStateRow, SourceRow,
};
use crate::error::Result;

/// Metadata Store Port (Primary Interface)
///
/// All storage backends must implement this trait
#[async_trait]
pub trait MetadataStore: Send + Sync {
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Namespaces & Sources
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Insert a namespace or update owner/description of an existing one.
    ///
    /// Returns the stored row (the original `uuid` and `created_at` survive).
    async fn upsert_namespace(&self, row: &NamespaceRow) -> Result<NamespaceRow>;

    async fn find_namespace(&self, name: &NamespaceName) -> Result<Option<NamespaceRow>>;

    /// Register a source explicitly, overwriting type/url/description.
    async fn upsert_source(&self, row: &SourceRow) -> Result<SourceRow>;

    /// Return the source named `row.name`, inserting `row` if there is none.
    ///
    /// Existing sources are never modified.
    async fn find_or_insert_source(&self, row: &SourceRow) -> Result<SourceRow>;

    async fn find_source(&self, name: &SourceName) -> Result<Option<SourceRow>>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Datasets
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn find_dataset(
        &self,
        namespace: &NamespaceName,
        name: &DatasetName,
    ) -> Result<Option<ExtendedDatasetRow>>;

    /// Datasets of a namespace, oldest first
    async fn list_datasets(
        &self,
        namespace: &NamespaceName,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ExtendedDatasetRow>>;

    /// Insert anchor + first version + pointer.
    ///
    /// Fails with `IdentityConflict` when `(namespace, name)` already exists.
    async fn insert_dataset(&self, dataset: &DatasetRow, version: &DatasetVersionRow) -> Result<()>;

    /// Append `version` (no-op if that version id already exists for the
    /// dataset) and move the anchor's pointer to it.
    ///
    /// The anchor's `updated_at` never moves backwards, even when a writer
    /// that read earlier commits later.
    ///
    /// Returns `true` if a new history row was written.
    async fn insert_dataset_version(
        &self,
        version: &DatasetVersionRow,
        description: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Refresh non-identity attributes without touching history,
    /// compare-and-set against the `expected` current version.
    ///
    /// Fails with `StaleVersion` if the pointer has moved. Nothing is
    /// written then.
    async fn update_dataset_description(
        &self,
        dataset_uuid: Uuid,
        expected: VersionId,
        description: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn find_dataset_version(
        &self,
        version: VersionId,
    ) -> Result<Option<ExtendedDatasetVersionRow>>;

    /// History of one dataset, oldest first
    async fn list_dataset_versions(
        &self,
        namespace: &NamespaceName,
        name: &DatasetName,
    ) -> Result<Vec<ExtendedDatasetVersionRow>>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Jobs
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn find_job(
        &self,
        namespace: &NamespaceName,
        name: &JobName,
    ) -> Result<Option<ExtendedJobRow>>;

    /// Jobs of a namespace, oldest first
    async fn list_jobs(
        &self,
        namespace: &NamespaceName,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ExtendedJobRow>>;

    /// Fails with `IdentityConflict` when `(namespace, name)` already exists.
    async fn insert_job(&self, job: &JobRow, version: &JobVersionRow) -> Result<()>;

    /// Same contract as [`MetadataStore::insert_dataset_version`]; the job
    /// type follows `job_type`.
    async fn insert_job_version(
        &self,
        version: &JobVersionRow,
        job_type: JobType,
        description: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Same contract as [`MetadataStore::update_dataset_description`]
    async fn update_job_description(
        &self,
        job_uuid: Uuid,
        expected: VersionId,
        description: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn find_job_version(&self, version: VersionId) -> Result<Option<ExtendedJobVersionRow>>;

    async fn list_job_versions(
        &self,
        namespace: &NamespaceName,
        name: &JobName,
    ) -> Result<Vec<ExtendedJobVersionRow>>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Runs
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Insert run + initial state row, dedupe `args` on checksum and point
    /// the job version's `latest_run_uuid` at the new run.
    ///
    /// `run.run_args_uuid` is replaced by the uuid of the stored args row.
    async fn insert_run(
        &self,
        run: &RunRow,
        args: &RunArgsRow,
        initial_state: &RunStateRow,
    ) -> Result<ExtendedRunRow>;

    async fn find_run(&self, run_uuid: Uuid) -> Result<Option<ExtendedRunRow>>;

    async fn run_exists(&self, run_uuid: Uuid) -> Result<bool>;

    /// Runs of every version of a job, oldest first
    async fn list_runs(&self, job_uuid: Uuid, limit: usize, offset: usize)
        -> Result<Vec<ExtendedRunRow>>;

    /// Append `row` and move the run's pointer, compare-and-set against
    /// `expected`.
    ///
    /// Fails with `StaleRunState` if the pointer is no longer `expected`, and
    /// with `RunNotFound` if the run does not exist. Nothing is written then.
    async fn insert_run_state(&self, row: &RunStateRow, expected: RunState) -> Result<()>;

    async fn find_latest_run_state(&self, run_uuid: Uuid) -> Result<Option<RunStateRow>>;

    /// State history, oldest first
    async fn list_run_states(&self, run_uuid: Uuid) -> Result<Vec<RunStateRow>>;
}

/// Namespace existence check consumed by the catalogs
#[async_trait]
pub trait NamespaceExistence: Send + Sync {
    async fn exists(&self, namespace: &NamespaceName) -> Result<bool>;
}

/// Run existence check consumed by the dataset catalog
#[async_trait]
pub trait RunExistence: Send + Sync {
    async fn run_exists(&self, run_id: Uuid) -> Result<bool>;
}
