//! Dataset lifecycle
//!
//! `create_or_update` decides between three outcomes:
//!
//! | anchor  | resolved version      | effect                                  |
//! |---------|-----------------------|-----------------------------------------|
//! | missing | -                     | anchor + first version + pointer        |
//! | present | equals current        | description refresh, no history row     |
//! | present | differs from current  | version row (if new) + pointer advance  |

use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::{retry_on_conflict, StoreExistence};
use crate::config::CatalogSettings;
use crate::domain::{
    Dataset, DatasetMeta, DatasetName, DatasetRow, DatasetVersion, DatasetVersionRow,
    ExtendedDatasetRow, MetadataStore, NamespaceExistence, NamespaceName, RunExistence,
    SourceMeta, SourceRow, VersionId,
};
use crate::error::{CatalogError, Result};
use crate::mapper::{self, now, now_after};
use crate::version::{DatasetIdentity, VersionResolver};

pub struct DatasetCatalog {
    store: Arc<dyn MetadataStore>,
    namespaces: Arc<dyn NamespaceExistence>,
    runs: Arc<dyn RunExistence>,
    max_conflict_retries: u32,
}

impl DatasetCatalog {
    /// Catalog whose existence checks go straight to `store`
    pub fn new(store: Arc<dyn MetadataStore>, settings: &CatalogSettings) -> Self {
        let existence = Arc::new(StoreExistence::new(store.clone()));
        Self::with_collaborators(store, existence.clone(), existence, settings)
    }

    pub fn with_collaborators(
        store: Arc<dyn MetadataStore>,
        namespaces: Arc<dyn NamespaceExistence>,
        runs: Arc<dyn RunExistence>,
        settings: &CatalogSettings,
    ) -> Self {
        Self {
            store,
            namespaces,
            runs,
            max_conflict_retries: settings.max_conflict_retries,
        }
    }

    /// Register `meta` as the current state of `namespace:name`.
    ///
    /// # Errors
    ///
    /// - `NamespaceNotFound` if the namespace does not exist
    /// - `RunNotFound` if `meta.run_id` names an unknown run
    /// - `IdentityConflict` or `StaleVersion` only once the retry budget is spent
    pub async fn create_or_update(
        &self,
        namespace: &NamespaceName,
        name: &DatasetName,
        meta: &DatasetMeta,
    ) -> Result<Dataset> {
        if !self.namespaces.exists(namespace).await? {
            return Err(CatalogError::NamespaceNotFound(namespace.to_string()));
        }
        if let Some(run_id) = meta.run_id {
            if !self.runs.run_exists(run_id).await? {
                return Err(CatalogError::RunNotFound(run_id));
            }
        }

        let source = self.source_for(meta).await?;
        let version = VersionResolver::dataset(DatasetIdentity {
            namespace,
            name,
            physical_name: &meta.physical_name,
            source_name: &meta.source_name,
            kind: &meta.kind,
        });

        let source = &source;
        retry_on_conflict("dataset.create_or_update", self.max_conflict_retries, move || {
            self.upsert(namespace, name, meta, source, version)
        })
        .await
    }

    async fn source_for(&self, meta: &DatasetMeta) -> Result<SourceRow> {
        let ts = now();
        let implicit = SourceMeta::implicit();
        self.store
            .find_or_insert_source(&SourceRow {
                uuid: Uuid::new_v4(),
                source_type: implicit.source_type,
                created_at: ts,
                updated_at: ts,
                name: meta.source_name.clone(),
                connection_url: implicit.connection_url,
                description: implicit.description,
            })
            .await
    }

    async fn upsert(
        &self,
        namespace: &NamespaceName,
        name: &DatasetName,
        meta: &DatasetMeta,
        source: &SourceRow,
        version: VersionId,
    ) -> Result<Dataset> {
        let Some(existing) = self.store.find_dataset(namespace, name).await? else {
            return self.create(namespace, name, meta, source, version).await;
        };

        let ts = now_after(existing.dataset.updated_at);
        if existing.dataset.current_version == version {
            self.store
                .update_dataset_description(
                    existing.dataset.uuid,
                    version,
                    meta.description.as_deref(),
                    ts,
                )
                .await?;
            debug!("Refreshed dataset {}:{} at version {}", namespace, name, version);

            let mut refreshed = existing;
            refreshed.dataset.description = meta.description.clone();
            refreshed.dataset.updated_at = ts;
            return Ok(mapper::to_dataset(refreshed));
        }

        let row = version_row(existing.dataset.uuid, meta, source, version, ts);
        let inserted = self
            .store
            .insert_dataset_version(&row, meta.description.as_deref(), ts)
            .await?;
        info!(
            "Dataset {}:{} moved {} -> {} (new history row: {})",
            namespace, name, existing.dataset.current_version, version, inserted
        );

        self.get(namespace, name)
            .await?
            .ok_or_else(|| CatalogError::DatasetNotFound(format!("{}:{}", namespace, name)))
    }

    async fn create(
        &self,
        namespace: &NamespaceName,
        name: &DatasetName,
        meta: &DatasetMeta,
        source: &SourceRow,
        version: VersionId,
    ) -> Result<Dataset> {
        let ns = self
            .store
            .find_namespace(namespace)
            .await?
            .ok_or_else(|| CatalogError::NamespaceNotFound(namespace.to_string()))?;

        let ts = now();
        let dataset = DatasetRow {
            uuid: Uuid::new_v4(),
            dataset_type: meta.kind.dataset_type(),
            created_at: ts,
            updated_at: ts,
            namespace_uuid: ns.uuid,
            name: name.clone(),
            description: meta.description.clone(),
            current_version: version,
        };
        let row = version_row(dataset.uuid, meta, source, version, ts);
        self.store.insert_dataset(&dataset, &row).await?;
        info!("Created dataset {}:{} at version {}", namespace, name, version);

        Ok(mapper::to_dataset(ExtendedDatasetRow {
            namespace: namespace.clone(),
            dataset,
            version: row,
        }))
    }

    pub async fn get(&self, namespace: &NamespaceName, name: &DatasetName) -> Result<Option<Dataset>> {
        Ok(self
            .store
            .find_dataset(namespace, name)
            .await?
            .map(mapper::to_dataset))
    }

    pub async fn exists(&self, namespace: &NamespaceName, name: &DatasetName) -> Result<bool> {
        Ok(self.store.find_dataset(namespace, name).await?.is_some())
    }

    /// Datasets of `namespace`, oldest first
    pub async fn get_all(
        &self,
        namespace: &NamespaceName,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Dataset>> {
        if !self.namespaces.exists(namespace).await? {
            return Err(CatalogError::NamespaceNotFound(namespace.to_string()));
        }
        let rows = self.store.list_datasets(namespace, limit, offset).await?;
        Ok(rows.into_iter().map(mapper::to_dataset).collect())
    }

    pub async fn get_version(&self, version: VersionId) -> Result<Option<DatasetVersion>> {
        Ok(self
            .store
            .find_dataset_version(version)
            .await?
            .map(mapper::to_dataset_version))
    }

    /// History of `namespace:name`, oldest first
    pub async fn list_versions(
        &self,
        namespace: &NamespaceName,
        name: &DatasetName,
    ) -> Result<Vec<DatasetVersion>> {
        let rows = self.store.list_dataset_versions(namespace, name).await?;
        // every dataset has at least its first version
        if rows.is_empty() {
            return Err(CatalogError::DatasetNotFound(format!("{}:{}", namespace, name)));
        }
        Ok(rows.into_iter().map(mapper::to_dataset_version).collect())
    }
}

fn version_row(
    dataset_uuid: Uuid,
    meta: &DatasetMeta,
    source: &SourceRow,
    version: VersionId,
    created_at: chrono::DateTime<chrono::Utc>,
) -> DatasetVersionRow {
    DatasetVersionRow {
        uuid: Uuid::new_v4(),
        created_at,
        dataset_uuid,
        version,
        physical_name: meta.physical_name.clone(),
        source_uuid: source.uuid,
        source_name: source.name.clone(),
        run_uuid: meta.run_id,
        kind: meta.kind.clone(),
    }
}
