//! Lineage Catalog - versioned metadata for datasets, jobs and runs
//!
//! > "A version is what the metadata says, not when it was said."
//!
//! ## Core Principles
//!
//! 1. **Content-derived versions**: `version = hash(identity fields)`, so
//!    resubmitting identical metadata never creates history
//! 2. **Append-only history**: dataset/job versions and run states are only
//!    ever inserted; anchors carry a pointer to the current one
//! 3. **One transaction per mutation**: history row + pointer move commit
//!    together, or not at all
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lineage_catalog::{DatasetMeta, DatasetName, MetadataCatalog, NamespaceName, OwnerName, SourceName};
//!
//! let catalog = MetadataCatalog::in_memory();
//! let ns = NamespaceName::new("warehouse")?;
//! catalog.upsert_namespace(&ns, &OwnerName::new("data-eng")?, None).await?;
//!
//! let events = DatasetName::new("events")?;
//! let meta = DatasetMeta::db_table(DatasetName::new("public.events")?, SourceName::new("pg")?);
//! let dataset = catalog.datasets().create_or_update(&ns, &events, &meta).await?;
//!
//! // Same metadata again: same version, no new history row
//! let again = catalog.datasets().create_or_update(&ns, &events, &meta).await?;
//! assert_eq!(dataset.current_version, again.current_version);
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod mapper;
pub mod telemetry;
pub mod version;

pub use error::{CatalogError, ErrorCategory, Result};

pub use application::{DatasetCatalog, JobCatalog, MetadataCatalog, RunLifecycle, DEFAULT_LIMIT};
pub use config::{CatalogConfig, CatalogSettings, DatabaseConfig, LoggingConfig};
pub use telemetry::init_tracing;
pub use version::VersionResolver;

pub use domain::{
    Dataset, DatasetId, DatasetKind, DatasetMeta, DatasetName, DatasetType, DatasetVersion,
    DatasetVersionRef, Job, JobId, JobMeta, JobName, JobType, JobVersion, MetadataStore,
    Namespace, NamespaceName, OwnerName, Run, RunMeta, RunState, RunStateRow, Source, SourceMeta,
    SourceName, SourceType, VersionId,
};

pub use infrastructure::InMemoryMetadataStore;
#[cfg(feature = "sqlite")]
pub use infrastructure::SqliteMetadataStore;
