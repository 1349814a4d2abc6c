//! Domain layer for the lineage catalog
//!
//! # Core Principles
//!
//! 1. **Content-derived versions**: a version id is a hash of identity fields only
//! 2. **Append-only history**: version and run-state rows are never updated
//! 3. **Current pointers**: anchors point at their latest version/state and
//!    move in the same store transaction that appends history
//!
//! # Domain Models
//!
//! - `Dataset` / `DatasetVersion`: table or stream metadata and its history
//! - `Job` / `JobVersion`: job metadata with input/output dataset versions
//! - `Run` / `RunState`: one execution of a job version and its lifecycle
//!
//! # Port Traits
//!
//! - `MetadataStore`: transactional row storage
//! - `NamespaceExistence`, `RunExistence`: collaborator checks

pub mod models;
pub mod names;
pub mod ports;
pub mod rows;

pub use models::{
    Dataset, DatasetId, DatasetKind, DatasetMeta, DatasetType, DatasetVersion,
    DatasetVersionRef, Job, JobId, JobMeta, JobType, JobVersion, Namespace, Run, RunMeta,
    RunState, Source, SourceMeta, SourceType, VersionId,
};
pub use names::{DatasetName, JobName, NamespaceName, OwnerName, SourceName};
pub use ports::{MetadataStore, NamespaceExistence, RunExistence};
pub use rows::{
    DatasetRow, DatasetVersionRow, ExtendedDatasetRow, ExtendedDatasetVersionRow, ExtendedJobRow,
    ExtendedJobVersionRow, ExtendedRunRow, JobRow, JobVersionRow, NamespaceRow, RunArgsRow,
    RunRow, RunStateRow, SourceRow,
};
