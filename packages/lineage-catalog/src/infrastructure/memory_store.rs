//! In-Memory Metadata Store (for testing)
//!
//! One lock over every table: each port call is a single critical section,
//! which gives it the same all-or-nothing behavior as a store transaction.
//! NOT for production use.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    DatasetName, DatasetRow, DatasetVersionRow, ExtendedDatasetRow, ExtendedDatasetVersionRow,
    ExtendedJobRow, ExtendedJobVersionRow, ExtendedRunRow, JobName, JobRow, JobType,
    JobVersionRow, MetadataStore, NamespaceName, NamespaceRow, RunArgsRow, RunRow, RunState,
    RunStateRow, SourceName, SourceRow, VersionId,
};
use crate::error::{CatalogError, Result};

#[derive(Default)]
struct Tables {
    namespaces: Vec<NamespaceRow>,
    sources: HashMap<SourceName, SourceRow>,
    datasets: Vec<DatasetRow>,
    dataset_versions: Vec<DatasetVersionRow>,
    jobs: Vec<JobRow>,
    job_versions: Vec<JobVersionRow>,
    runs: Vec<RunRow>,
    run_args: Vec<RunArgsRow>,
    run_states: Vec<RunStateRow>,
}

fn dangling(what: &str, uuid: impl std::fmt::Display) -> CatalogError {
    CatalogError::Database(format!("dangling {} reference: {}", what, uuid))
}

fn stale(entity: &'static str, uuid: Uuid, expected: VersionId) -> CatalogError {
    CatalogError::StaleVersion {
        entity,
        key: uuid.to_string(),
        expected: expected.to_string(),
    }
}

impl Tables {
    fn namespace(&self, name: &NamespaceName) -> Option<&NamespaceRow> {
        self.namespaces.iter().find(|n| &n.name == name)
    }

    fn namespace_name(&self, uuid: Uuid) -> Result<NamespaceName> {
        self.namespaces
            .iter()
            .find(|n| n.uuid == uuid)
            .map(|n| n.name.clone())
            .ok_or_else(|| dangling("namespace", uuid))
    }

    // ── datasets ──

    fn dataset(&self, namespace: &NamespaceName, name: &DatasetName) -> Option<&DatasetRow> {
        let ns = self.namespace(namespace)?;
        self.datasets
            .iter()
            .find(|d| d.namespace_uuid == ns.uuid && &d.name == name)
    }

    fn extend_dataset(&self, dataset: &DatasetRow) -> Result<ExtendedDatasetRow> {
        let version = self
            .dataset_versions
            .iter()
            .find(|v| v.dataset_uuid == dataset.uuid && v.version == dataset.current_version)
            .ok_or_else(|| dangling("dataset version", dataset.current_version))?;
        Ok(ExtendedDatasetRow {
            namespace: self.namespace_name(dataset.namespace_uuid)?,
            dataset: dataset.clone(),
            version: version.clone(),
        })
    }

    fn extend_dataset_version(&self, version: &DatasetVersionRow) -> Result<ExtendedDatasetVersionRow> {
        let dataset = self
            .datasets
            .iter()
            .find(|d| d.uuid == version.dataset_uuid)
            .ok_or_else(|| dangling("dataset", version.dataset_uuid))?;
        Ok(ExtendedDatasetVersionRow {
            namespace: self.namespace_name(dataset.namespace_uuid)?,
            dataset_name: dataset.name.clone(),
            version: version.clone(),
        })
    }

    // ── jobs ──

    fn job(&self, namespace: &NamespaceName, name: &JobName) -> Option<&JobRow> {
        let ns = self.namespace(namespace)?;
        self.jobs
            .iter()
            .find(|j| j.namespace_uuid == ns.uuid && &j.name == name)
    }

    fn extend_job(&self, job: &JobRow) -> Result<ExtendedJobRow> {
        let version = self
            .job_versions
            .iter()
            .find(|v| v.job_uuid == job.uuid && v.version == job.current_version)
            .ok_or_else(|| dangling("job version", job.current_version))?;
        Ok(ExtendedJobRow {
            namespace: self.namespace_name(job.namespace_uuid)?,
            job: job.clone(),
            version: version.clone(),
        })
    }

    fn extend_job_version(&self, version: &JobVersionRow) -> Result<ExtendedJobVersionRow> {
        let job = self
            .jobs
            .iter()
            .find(|j| j.uuid == version.job_uuid)
            .ok_or_else(|| dangling("job", version.job_uuid))?;
        Ok(ExtendedJobVersionRow {
            namespace: self.namespace_name(job.namespace_uuid)?,
            job_name: job.name.clone(),
            version: version.clone(),
        })
    }

    // ── runs ──

    fn extend_run(&self, run: &RunRow) -> Result<ExtendedRunRow> {
        let args = self
            .run_args
            .iter()
            .find(|a| a.uuid == run.run_args_uuid)
            .ok_or_else(|| dangling("run args", run.run_args_uuid))?;
        let job_version = self
            .job_versions
            .iter()
            .find(|v| v.uuid == run.job_version_uuid)
            .ok_or_else(|| dangling("job version", run.job_version_uuid))?;
        Ok(ExtendedRunRow {
            run: run.clone(),
            args: args.clone(),
            job_version: job_version.version,
        })
    }
}

fn page<T>(rows: Vec<T>, limit: usize, offset: usize) -> Vec<T> {
    rows.into_iter().skip(offset).take(limit).collect()
}

/// HashMap/Vec-backed MetadataStore
#[derive(Clone, Default)]
pub struct InMemoryMetadataStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn upsert_namespace(&self, row: &NamespaceRow) -> Result<NamespaceRow> {
        let mut tables = self.tables.write();
        if let Some(existing) = tables.namespaces.iter_mut().find(|n| n.name == row.name) {
            existing.updated_at = row.updated_at;
            existing.description = row.description.clone();
            existing.current_owner_name = row.current_owner_name.clone();
            return Ok(existing.clone());
        }
        tables.namespaces.push(row.clone());
        Ok(row.clone())
    }

    async fn find_namespace(&self, name: &NamespaceName) -> Result<Option<NamespaceRow>> {
        Ok(self.tables.read().namespace(name).cloned())
    }

    async fn upsert_source(&self, row: &SourceRow) -> Result<SourceRow> {
        let mut tables = self.tables.write();
        let stored = tables
            .sources
            .entry(row.name.clone())
            .and_modify(|existing| {
                existing.source_type = row.source_type;
                existing.updated_at = row.updated_at;
                existing.connection_url = row.connection_url.clone();
                existing.description = row.description.clone();
            })
            .or_insert_with(|| row.clone());
        Ok(stored.clone())
    }

    async fn find_or_insert_source(&self, row: &SourceRow) -> Result<SourceRow> {
        let mut tables = self.tables.write();
        Ok(tables
            .sources
            .entry(row.name.clone())
            .or_insert_with(|| row.clone())
            .clone())
    }

    async fn find_source(&self, name: &SourceName) -> Result<Option<SourceRow>> {
        Ok(self.tables.read().sources.get(name).cloned())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Datasets
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn find_dataset(
        &self,
        namespace: &NamespaceName,
        name: &DatasetName,
    ) -> Result<Option<ExtendedDatasetRow>> {
        let tables = self.tables.read();
        tables
            .dataset(namespace, name)
            .map(|d| tables.extend_dataset(d))
            .transpose()
    }

    async fn list_datasets(
        &self,
        namespace: &NamespaceName,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ExtendedDatasetRow>> {
        let tables = self.tables.read();
        let Some(ns) = tables.namespace(namespace) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<&DatasetRow> = tables
            .datasets
            .iter()
            .filter(|d| d.namespace_uuid == ns.uuid)
            .collect();
        rows.sort_by_key(|d| d.created_at);
        page(rows, limit, offset)
            .into_iter()
            .map(|d| tables.extend_dataset(d))
            .collect()
    }

    async fn insert_dataset(&self, dataset: &DatasetRow, version: &DatasetVersionRow) -> Result<()> {
        let mut tables = self.tables.write();
        let duplicate = tables
            .datasets
            .iter()
            .any(|d| d.namespace_uuid == dataset.namespace_uuid && d.name == dataset.name);
        if duplicate {
            return Err(CatalogError::IdentityConflict {
                entity: "dataset",
                key: dataset.name.to_string(),
            });
        }
        tables.datasets.push(dataset.clone());
        tables.dataset_versions.push(version.clone());
        Ok(())
    }

    async fn insert_dataset_version(
        &self,
        version: &DatasetVersionRow,
        description: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.tables.write();
        let exists = tables
            .dataset_versions
            .iter()
            .any(|v| v.dataset_uuid == version.dataset_uuid && v.version == version.version);

        let dataset = tables
            .datasets
            .iter_mut()
            .find(|d| d.uuid == version.dataset_uuid)
            .ok_or_else(|| dangling("dataset", version.dataset_uuid))?;
        dataset.current_version = version.version;
        dataset.dataset_type = version.kind.dataset_type();
        dataset.description = description.map(str::to_string);
        dataset.updated_at = dataset.updated_at.max(updated_at);

        if !exists {
            tables.dataset_versions.push(version.clone());
        }
        Ok(!exists)
    }

    async fn update_dataset_description(
        &self,
        dataset_uuid: Uuid,
        expected: VersionId,
        description: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.tables.write();
        let dataset = tables
            .datasets
            .iter_mut()
            .find(|d| d.uuid == dataset_uuid)
            .ok_or_else(|| dangling("dataset", dataset_uuid))?;
        if dataset.current_version != expected {
            return Err(stale("dataset", dataset_uuid, expected));
        }
        dataset.description = description.map(str::to_string);
        dataset.updated_at = dataset.updated_at.max(updated_at);
        Ok(())
    }

    async fn find_dataset_version(
        &self,
        version: VersionId,
    ) -> Result<Option<ExtendedDatasetVersionRow>> {
        let tables = self.tables.read();
        tables
            .dataset_versions
            .iter()
            .find(|v| v.version == version)
            .map(|v| tables.extend_dataset_version(v))
            .transpose()
    }

    async fn list_dataset_versions(
        &self,
        namespace: &NamespaceName,
        name: &DatasetName,
    ) -> Result<Vec<ExtendedDatasetVersionRow>> {
        let tables = self.tables.read();
        let Some(dataset) = tables.dataset(namespace, name) else {
            return Ok(Vec::new());
        };
        let mut versions: Vec<&DatasetVersionRow> = tables
            .dataset_versions
            .iter()
            .filter(|v| v.dataset_uuid == dataset.uuid)
            .collect();
        versions.sort_by_key(|v| v.created_at);
        versions
            .into_iter()
            .map(|v| tables.extend_dataset_version(v))
            .collect()
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Jobs
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn find_job(
        &self,
        namespace: &NamespaceName,
        name: &JobName,
    ) -> Result<Option<ExtendedJobRow>> {
        let tables = self.tables.read();
        tables
            .job(namespace, name)
            .map(|j| tables.extend_job(j))
            .transpose()
    }

    async fn list_jobs(
        &self,
        namespace: &NamespaceName,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ExtendedJobRow>> {
        let tables = self.tables.read();
        let Some(ns) = tables.namespace(namespace) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<&JobRow> = tables
            .jobs
            .iter()
            .filter(|j| j.namespace_uuid == ns.uuid)
            .collect();
        rows.sort_by_key(|j| j.created_at);
        page(rows, limit, offset)
            .into_iter()
            .map(|j| tables.extend_job(j))
            .collect()
    }

    async fn insert_job(&self, job: &JobRow, version: &JobVersionRow) -> Result<()> {
        let mut tables = self.tables.write();
        let duplicate = tables
            .jobs
            .iter()
            .any(|j| j.namespace_uuid == job.namespace_uuid && j.name == job.name);
        if duplicate {
            return Err(CatalogError::IdentityConflict {
                entity: "job",
                key: job.name.to_string(),
            });
        }
        tables.jobs.push(job.clone());
        tables.job_versions.push(version.clone());
        Ok(())
    }

    async fn insert_job_version(
        &self,
        version: &JobVersionRow,
        job_type: JobType,
        description: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.tables.write();
        let exists = tables
            .job_versions
            .iter()
            .any(|v| v.job_uuid == version.job_uuid && v.version == version.version);

        let job = tables
            .jobs
            .iter_mut()
            .find(|j| j.uuid == version.job_uuid)
            .ok_or_else(|| dangling("job", version.job_uuid))?;
        job.current_version = version.version;
        job.job_type = job_type;
        job.description = description.map(str::to_string);
        job.updated_at = job.updated_at.max(updated_at);

        if !exists {
            tables.job_versions.push(version.clone());
        }
        Ok(!exists)
    }

    async fn update_job_description(
        &self,
        job_uuid: Uuid,
        expected: VersionId,
        description: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.tables.write();
        let job = tables
            .jobs
            .iter_mut()
            .find(|j| j.uuid == job_uuid)
            .ok_or_else(|| dangling("job", job_uuid))?;
        if job.current_version != expected {
            return Err(stale("job", job_uuid, expected));
        }
        job.description = description.map(str::to_string);
        job.updated_at = job.updated_at.max(updated_at);
        Ok(())
    }

    async fn find_job_version(&self, version: VersionId) -> Result<Option<ExtendedJobVersionRow>> {
        let tables = self.tables.read();
        tables
            .job_versions
            .iter()
            .find(|v| v.version == version)
            .map(|v| tables.extend_job_version(v))
            .transpose()
    }

    async fn list_job_versions(
        &self,
        namespace: &NamespaceName,
        name: &JobName,
    ) -> Result<Vec<ExtendedJobVersionRow>> {
        let tables = self.tables.read();
        let Some(job) = tables.job(namespace, name) else {
            return Ok(Vec::new());
        };
        let mut versions: Vec<&JobVersionRow> = tables
            .job_versions
            .iter()
            .filter(|v| v.job_uuid == job.uuid)
            .collect();
        versions.sort_by_key(|v| v.created_at);
        versions
            .into_iter()
            .map(|v| tables.extend_job_version(v))
            .collect()
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Runs
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn insert_run(
        &self,
        run: &RunRow,
        args: &RunArgsRow,
        initial_state: &RunStateRow,
    ) -> Result<ExtendedRunRow> {
        let mut tables = self.tables.write();

        let version = tables
            .job_versions
            .iter_mut()
            .find(|v| v.uuid == run.job_version_uuid)
            .ok_or_else(|| dangling("job version", run.job_version_uuid))?;
        version.latest_run_uuid = Some(run.uuid);
        version.updated_at = run.created_at;
        let job_version = version.version;

        let existing = tables
            .run_args
            .iter()
            .find(|a| a.checksum == args.checksum)
            .cloned();
        let stored_args = match existing {
            Some(existing) => existing,
            None => {
                tables.run_args.push(args.clone());
                args.clone()
            }
        };

        let mut run = run.clone();
        run.run_args_uuid = stored_args.uuid;
        tables.runs.push(run.clone());
        tables.run_states.push(initial_state.clone());

        Ok(ExtendedRunRow {
            run,
            args: stored_args,
            job_version,
        })
    }

    async fn find_run(&self, run_uuid: Uuid) -> Result<Option<ExtendedRunRow>> {
        let tables = self.tables.read();
        tables
            .runs
            .iter()
            .find(|r| r.uuid == run_uuid)
            .map(|r| tables.extend_run(r))
            .transpose()
    }

    async fn run_exists(&self, run_uuid: Uuid) -> Result<bool> {
        Ok(self.tables.read().runs.iter().any(|r| r.uuid == run_uuid))
    }

    async fn list_runs(
        &self,
        job_uuid: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ExtendedRunRow>> {
        let tables = self.tables.read();
        let mut runs: Vec<&RunRow> = tables
            .runs
            .iter()
            .filter(|r| {
                tables
                    .job_versions
                    .iter()
                    .any(|v| v.uuid == r.job_version_uuid && v.job_uuid == job_uuid)
            })
            .collect();
        runs.sort_by_key(|r| r.created_at);
        page(runs, limit, offset)
            .into_iter()
            .map(|r| tables.extend_run(r))
            .collect()
    }

    async fn insert_run_state(&self, row: &RunStateRow, expected: RunState) -> Result<()> {
        let mut tables = self.tables.write();
        let run = tables
            .runs
            .iter_mut()
            .find(|r| r.uuid == row.run_uuid)
            .ok_or(CatalogError::RunNotFound(row.run_uuid))?;
        if run.current_run_state != expected {
            return Err(CatalogError::StaleRunState {
                run_id: row.run_uuid,
                expected: expected.to_string(),
            });
        }
        run.current_run_state = row.state;
        run.updated_at = row.transitioned_at;
        tables.run_states.push(row.clone());
        Ok(())
    }

    async fn find_latest_run_state(&self, run_uuid: Uuid) -> Result<Option<RunStateRow>> {
        // max_by_key keeps the last maximum, so ties go to the newest row
        Ok(self
            .tables
            .read()
            .run_states
            .iter()
            .filter(|s| s.run_uuid == run_uuid)
            .max_by_key(|s| s.transitioned_at)
            .cloned())
    }

    async fn list_run_states(&self, run_uuid: Uuid) -> Result<Vec<RunStateRow>> {
        let tables = self.tables.read();
        let mut states: Vec<RunStateRow> = tables
            .run_states
            .iter()
            .filter(|s| s.run_uuid == run_uuid)
            .cloned()
            .collect();
        states.sort_by_key(|s| s.transitioned_at);
        Ok(states)
    }
}
