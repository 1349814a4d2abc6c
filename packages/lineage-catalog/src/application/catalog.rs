//! Catalog facade
//!
//! Wires the dataset, job and run services over one shared store. Dataset
//! writes that reference a run ask the run lifecycle whether it exists.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{DatasetCatalog, JobCatalog, RunLifecycle, StoreExistence};
use crate::config::CatalogSettings;
use crate::domain::{
    MetadataStore, Namespace, NamespaceName, NamespaceRow, OwnerName, Source, SourceMeta,
    SourceName, SourceRow,
};
use crate::error::Result;
use crate::infrastructure::InMemoryMetadataStore;
use crate::mapper::{self, now};

#[cfg(feature = "sqlite")]
use crate::{config::CatalogConfig, infrastructure::SqliteMetadataStore};

pub struct MetadataCatalog {
    store: Arc<dyn MetadataStore>,
    datasets: DatasetCatalog,
    jobs: JobCatalog,
    runs: Arc<RunLifecycle>,
}

impl MetadataCatalog {
    /// Open the SQLite store named by `config.database`
    #[cfg(feature = "sqlite")]
    pub fn open(config: &CatalogConfig) -> Result<Self> {
        let store = SqliteMetadataStore::from_config(&config.database)?;
        info!(
            "Opened catalog store at {}",
            config
                .database
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| ":memory:".to_string())
        );
        Ok(Self::with_store(Arc::new(store), &config.catalog))
    }

    /// Catalog over a fresh in-memory store
    pub fn in_memory() -> Self {
        Self::with_store(
            Arc::new(InMemoryMetadataStore::new()),
            &CatalogSettings::default(),
        )
    }

    pub fn with_store(store: Arc<dyn MetadataStore>, settings: &CatalogSettings) -> Self {
        let existence = Arc::new(StoreExistence::new(store.clone()));
        let runs = Arc::new(RunLifecycle::new(store.clone(), settings));
        let datasets =
            DatasetCatalog::with_collaborators(store.clone(), existence.clone(), runs.clone(), settings);
        let jobs = JobCatalog::with_collaborators(store.clone(), existence, settings);
        Self {
            store,
            datasets,
            jobs,
            runs,
        }
    }

    pub fn datasets(&self) -> &DatasetCatalog {
        &self.datasets
    }

    pub fn jobs(&self) -> &JobCatalog {
        &self.jobs
    }

    pub fn runs(&self) -> &RunLifecycle {
        &self.runs
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    /// Create `name`, or update owner and description of an existing namespace
    pub async fn upsert_namespace(
        &self,
        name: &NamespaceName,
        owner: &OwnerName,
        description: Option<&str>,
    ) -> Result<Namespace> {
        let ts = now();
        let row = self
            .store
            .upsert_namespace(&NamespaceRow {
                uuid: Uuid::new_v4(),
                created_at: ts,
                updated_at: ts,
                name: name.clone(),
                description: description.map(str::to_string),
                current_owner_name: owner.clone(),
            })
            .await?;
        info!("Upserted namespace {} (owner {})", name, owner);
        Ok(mapper::to_namespace(row))
    }

    pub async fn get_namespace(&self, name: &NamespaceName) -> Result<Option<Namespace>> {
        Ok(self
            .store
            .find_namespace(name)
            .await?
            .map(mapper::to_namespace))
    }

    /// Register a source, overwriting type, url and description
    pub async fn upsert_source(&self, name: &SourceName, meta: &SourceMeta) -> Result<Source> {
        let ts = now();
        let row = self
            .store
            .upsert_source(&SourceRow {
                uuid: Uuid::new_v4(),
                source_type: meta.source_type,
                created_at: ts,
                updated_at: ts,
                name: name.clone(),
                connection_url: meta.connection_url.clone(),
                description: meta.description.clone(),
            })
            .await?;
        info!("Upserted source {} ({})", name, meta.source_type);
        Ok(mapper::to_source(row))
    }

    pub async fn get_source(&self, name: &SourceName) -> Result<Option<Source>> {
        Ok(self.store.find_source(name).await?.map(mapper::to_source))
    }
}
