//! Store rows
//!
//! One struct per table, plus the joined `Extended*` shapes the read paths
//! return. Rows carry surrogate `uuid` keys; models never expose them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::models::{
    DatasetKind, DatasetType, DatasetVersionRef, JobType, RunState, SourceType, VersionId,
};
use super::names::{DatasetName, JobName, NamespaceName, OwnerName, SourceName};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceRow {
    pub uuid: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: NamespaceName,
    pub description: Option<String>,
    pub current_owner_name: OwnerName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRow {
    pub uuid: Uuid,
    pub source_type: SourceType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: SourceName,
    pub connection_url: Option<String>,
    pub description: Option<String>,
}

/// Dataset anchor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRow {
    pub uuid: Uuid,
    /// Mirrors the type of the current version
    pub dataset_type: DatasetType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub namespace_uuid: Uuid,
    pub name: DatasetName,
    pub description: Option<String>,
    pub current_version: VersionId,
}

/// Append-only dataset history entry
///
/// `(dataset_uuid, version)` is unique. Stream versions persist their schema
/// location in a `stream_versions` extension row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetVersionRow {
    pub uuid: Uuid,
    pub created_at: DateTime<Utc>,
    pub dataset_uuid: Uuid,
    pub version: VersionId,
    pub physical_name: DatasetName,
    pub source_uuid: Uuid,
    pub source_name: SourceName,
    pub run_uuid: Option<Uuid>,
    pub kind: DatasetKind,
}

/// Dataset anchor joined with its namespace and current version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedDatasetRow {
    pub namespace: NamespaceName,
    pub dataset: DatasetRow,
    pub version: DatasetVersionRow,
}

/// Dataset version joined with the owning identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedDatasetVersionRow {
    pub namespace: NamespaceName,
    pub dataset_name: DatasetName,
    pub version: DatasetVersionRow,
}

/// Job anchor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRow {
    pub uuid: Uuid,
    pub job_type: JobType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub namespace_uuid: Uuid,
    pub name: JobName,
    pub description: Option<String>,
    pub current_version: VersionId,
}

/// Append-only job history entry; only `latest_run_uuid` moves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobVersionRow {
    pub uuid: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub job_uuid: Uuid,
    pub version: VersionId,
    pub location: String,
    pub inputs: Vec<DatasetVersionRef>,
    pub outputs: Vec<DatasetVersionRef>,
    pub latest_run_uuid: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedJobRow {
    pub namespace: NamespaceName,
    pub job: JobRow,
    pub version: JobVersionRow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedJobVersionRow {
    pub namespace: NamespaceName,
    pub job_name: JobName,
    pub version: JobVersionRow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRow {
    pub uuid: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub job_version_uuid: Uuid,
    pub run_args_uuid: Uuid,
    pub nominal_start_time: Option<DateTime<Utc>>,
    pub nominal_end_time: Option<DateTime<Utc>>,
    /// Equals the state of the newest `run_states` row for this run
    pub current_run_state: RunState,
}

/// Content-addressed run arguments, unique on `checksum`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunArgsRow {
    pub uuid: Uuid,
    pub created_at: DateTime<Utc>,
    /// Canonical JSON of the sorted argument map
    pub args: String,
    pub checksum: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedRunRow {
    pub run: RunRow,
    pub args: RunArgsRow,
    pub job_version: VersionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStateRow {
    pub uuid: Uuid,
    pub transitioned_at: DateTime<Utc>,
    pub run_uuid: Uuid,
    pub state: RunState,
}
