//! Shared fixtures for the lineage-catalog integration tests

#![allow(dead_code)]

use std::sync::Arc;

use lineage_catalog::{
    CatalogSettings, DatasetId, DatasetMeta, DatasetName, InMemoryMetadataStore, JobName,
    MetadataCatalog, MetadataStore, NamespaceName, OwnerName, SourceName, SqliteMetadataStore,
};

pub const NAMESPACE: &str = "warehouse";

/// One catalog per store adapter, labelled for assertion messages
pub fn backends() -> Vec<(&'static str, MetadataCatalog)> {
    let memory: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
    let sqlite: Arc<dyn MetadataStore> =
        Arc::new(SqliteMetadataStore::in_memory().expect("open sqlite"));
    let settings = CatalogSettings::default();
    vec![
        ("memory", MetadataCatalog::with_store(memory, &settings)),
        ("sqlite", MetadataCatalog::with_store(sqlite, &settings)),
    ]
}

/// `backends()` with the `warehouse` namespace already registered
pub async fn seeded_backends() -> Vec<(&'static str, MetadataCatalog)> {
    let backends = backends();
    for (_, catalog) in &backends {
        seed_namespace(catalog).await;
    }
    backends
}

pub async fn seed_namespace(catalog: &MetadataCatalog) {
    catalog
        .upsert_namespace(&ns(), &OwnerName::new("data-eng").unwrap(), None)
        .await
        .expect("seed namespace");
}

pub fn ns() -> NamespaceName {
    NamespaceName::new(NAMESPACE).unwrap()
}

pub fn dataset(name: &str) -> DatasetName {
    DatasetName::new(name).unwrap()
}

pub fn job(name: &str) -> JobName {
    JobName::new(name).unwrap()
}

pub fn dataset_id(name: &str) -> DatasetId {
    DatasetId::new(ns(), dataset(name))
}

/// Table `physical` on source `warehouse`
pub fn table(physical: &str) -> DatasetMeta {
    DatasetMeta::db_table(dataset(physical), SourceName::new("warehouse").unwrap())
}

pub fn stream(physical: &str, schema_location: &str) -> DatasetMeta {
    DatasetMeta::stream(
        dataset(physical),
        SourceName::new("kafka").unwrap(),
        schema_location,
    )
}
