//! Job lifecycle
//!
//! Same version-or-refresh logic as datasets. A job version additionally
//! pins the current version of every input and output dataset at the moment
//! it is created.

use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::{retry_on_conflict, StoreExistence};
use crate::config::CatalogSettings;
use crate::domain::{
    DatasetId, DatasetVersionRef, ExtendedJobRow, Job, JobMeta, JobName, JobRow, JobVersion,
    JobVersionRow, MetadataStore, NamespaceExistence, NamespaceName, VersionId,
};
use crate::error::{CatalogError, Result};
use crate::mapper::{self, now, now_after};
use crate::version::{canonical_dataset_set, JobIdentity, VersionResolver};

pub struct JobCatalog {
    store: Arc<dyn MetadataStore>,
    namespaces: Arc<dyn NamespaceExistence>,
    max_conflict_retries: u32,
}

impl JobCatalog {
    pub fn new(store: Arc<dyn MetadataStore>, settings: &CatalogSettings) -> Self {
        let existence = Arc::new(StoreExistence::new(store.clone()));
        Self::with_collaborators(store, existence, settings)
    }

    pub fn with_collaborators(
        store: Arc<dyn MetadataStore>,
        namespaces: Arc<dyn NamespaceExistence>,
        settings: &CatalogSettings,
    ) -> Self {
        Self {
            store,
            namespaces,
            max_conflict_retries: settings.max_conflict_retries,
        }
    }

    /// Register `meta` as the current state of `namespace:name`.
    ///
    /// # Errors
    ///
    /// - `NamespaceNotFound` if the namespace does not exist
    /// - `DatasetNotFound` if any declared input or output is unknown
    pub async fn create_or_update(
        &self,
        namespace: &NamespaceName,
        name: &JobName,
        meta: &JobMeta,
    ) -> Result<Job> {
        if !self.namespaces.exists(namespace).await? {
            return Err(CatalogError::NamespaceNotFound(namespace.to_string()));
        }

        let inputs = self.pin_versions(&meta.inputs).await?;
        let outputs = self.pin_versions(&meta.outputs).await?;
        let version = VersionResolver::job(JobIdentity {
            namespace,
            name,
            inputs: &meta.inputs,
            outputs: &meta.outputs,
            location: &meta.location,
        });

        let (inputs, outputs) = (&inputs, &outputs);
        retry_on_conflict("job.create_or_update", self.max_conflict_retries, move || {
            self.upsert(namespace, name, meta, inputs, outputs, version)
        })
        .await
    }

    /// Resolve each dataset to its current version
    async fn pin_versions(&self, ids: &[DatasetId]) -> Result<Vec<DatasetVersionRef>> {
        let mut refs = Vec::with_capacity(ids.len());
        for id in canonical_dataset_set(ids) {
            let dataset = self
                .store
                .find_dataset(&id.namespace, &id.name)
                .await?
                .ok_or_else(|| CatalogError::DatasetNotFound(id.to_string()))?;
            refs.push(DatasetVersionRef {
                namespace: id.namespace,
                name: id.name,
                version: dataset.dataset.current_version,
            });
        }
        Ok(refs)
    }

    async fn upsert(
        &self,
        namespace: &NamespaceName,
        name: &JobName,
        meta: &JobMeta,
        inputs: &[DatasetVersionRef],
        outputs: &[DatasetVersionRef],
        version: VersionId,
    ) -> Result<Job> {
        let Some(existing) = self.store.find_job(namespace, name).await? else {
            return self
                .create(namespace, name, meta, inputs, outputs, version)
                .await;
        };

        let ts = now_after(existing.job.updated_at);
        if existing.job.current_version == version {
            self.store
                .update_job_description(
                    existing.job.uuid,
                    version,
                    meta.description.as_deref(),
                    ts,
                )
                .await?;
            debug!("Refreshed job {}:{} at version {}", namespace, name, version);

            let mut refreshed = existing;
            refreshed.job.description = meta.description.clone();
            refreshed.job.updated_at = ts;
            return Ok(mapper::to_job(refreshed));
        }

        let row = version_row(existing.job.uuid, meta, inputs, outputs, version, ts);
        let inserted = self
            .store
            .insert_job_version(&row, meta.job_type, meta.description.as_deref(), ts)
            .await?;
        info!(
            "Job {}:{} moved {} -> {} (new history row: {})",
            namespace, name, existing.job.current_version, version, inserted
        );

        self.get(namespace, name)
            .await?
            .ok_or_else(|| CatalogError::JobNotFound(format!("{}:{}", namespace, name)))
    }

    async fn create(
        &self,
        namespace: &NamespaceName,
        name: &JobName,
        meta: &JobMeta,
        inputs: &[DatasetVersionRef],
        outputs: &[DatasetVersionRef],
        version: VersionId,
    ) -> Result<Job> {
        let ns = self
            .store
            .find_namespace(namespace)
            .await?
            .ok_or_else(|| CatalogError::NamespaceNotFound(namespace.to_string()))?;

        let ts = now();
        let job = JobRow {
            uuid: Uuid::new_v4(),
            job_type: meta.job_type,
            created_at: ts,
            updated_at: ts,
            namespace_uuid: ns.uuid,
            name: name.clone(),
            description: meta.description.clone(),
            current_version: version,
        };
        let row = version_row(job.uuid, meta, inputs, outputs, version, ts);
        self.store.insert_job(&job, &row).await?;
        info!(
            "Created job {}:{} at version {} ({} inputs, {} outputs)",
            namespace,
            name,
            version,
            inputs.len(),
            outputs.len()
        );

        Ok(mapper::to_job(ExtendedJobRow {
            namespace: namespace.clone(),
            job,
            version: row,
        }))
    }

    pub async fn get(&self, namespace: &NamespaceName, name: &JobName) -> Result<Option<Job>> {
        Ok(self.store.find_job(namespace, name).await?.map(mapper::to_job))
    }

    pub async fn exists(&self, namespace: &NamespaceName, name: &JobName) -> Result<bool> {
        Ok(self.store.find_job(namespace, name).await?.is_some())
    }

    /// Jobs of `namespace`, oldest first
    pub async fn get_all(
        &self,
        namespace: &NamespaceName,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Job>> {
        if !self.namespaces.exists(namespace).await? {
            return Err(CatalogError::NamespaceNotFound(namespace.to_string()));
        }
        let rows = self.store.list_jobs(namespace, limit, offset).await?;
        Ok(rows.into_iter().map(mapper::to_job).collect())
    }

    pub async fn get_version(&self, version: VersionId) -> Result<Option<JobVersion>> {
        Ok(self
            .store
            .find_job_version(version)
            .await?
            .map(mapper::to_job_version))
    }

    /// History of `namespace:name`, oldest first
    pub async fn list_versions(
        &self,
        namespace: &NamespaceName,
        name: &JobName,
    ) -> Result<Vec<JobVersion>> {
        let rows = self.store.list_job_versions(namespace, name).await?;
        if rows.is_empty() {
            return Err(CatalogError::JobNotFound(format!("{}:{}", namespace, name)));
        }
        Ok(rows.into_iter().map(mapper::to_job_version).collect())
    }
}

fn version_row(
    job_uuid: Uuid,
    meta: &JobMeta,
    inputs: &[DatasetVersionRef],
    outputs: &[DatasetVersionRef],
    version: VersionId,
    created_at: chrono::DateTime<chrono::Utc>,
) -> JobVersionRow {
    JobVersionRow {
        uuid: Uuid::new_v4(),
        created_at,
        updated_at: created_at,
        job_uuid,
        version,
        location: meta.location.clone(),
        inputs: inputs.to_vec(),
        outputs: outputs.to_vec(),
        latest_run_uuid: None,
    }
}
