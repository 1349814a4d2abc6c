//! Catalog Domain Models
//!
//! Dataset and job metadata as callers submit it (`*Meta`) and as the catalog
//! returns it (merged anchor + current version), plus the run state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use super::names::{DatasetName, JobName, NamespaceName, OwnerName, SourceName};
use crate::error::{CatalogError, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Identities
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Content-derived version identifier (128-bit)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(Uuid);

impl VersionId {
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dataset identity: `(namespace, name)`, immutable once created
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DatasetId {
    pub namespace: NamespaceName,
    pub name: DatasetName,
}

impl DatasetId {
    pub fn new(namespace: NamespaceName, name: DatasetName) -> Self {
        Self { namespace, name }
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

/// Job identity: `(namespace, name)`, immutable once created
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId {
    pub namespace: NamespaceName,
    pub name: JobName,
}

impl JobId {
    pub fn new(namespace: NamespaceName, name: JobName) -> Self {
        Self { namespace, name }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

/// Exact dataset state a job version consumed or produced
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetVersionRef {
    pub namespace: NamespaceName,
    pub name: DatasetName,
    pub version: VersionId,
}

impl DatasetVersionRef {
    pub fn dataset_id(&self) -> DatasetId {
        DatasetId::new(self.namespace.clone(), self.name.clone())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Namespaces & Sources
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub name: NamespaceName,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub owner: OwnerName,
    pub description: Option<String>,
}

/// Source type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    Postgresql,
    Mysql,
    Redshift,
    Snowflake,
    Kafka,
    /// Registered implicitly by a dataset reference
    Unknown,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Postgresql => "POSTGRESQL",
            SourceType::Mysql => "MYSQL",
            SourceType::Redshift => "REDSHIFT",
            SourceType::Snowflake => "SNOWFLAKE",
            SourceType::Kafka => "KAFKA",
            SourceType::Unknown => "UNKNOWN",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "POSTGRESQL" => Ok(SourceType::Postgresql),
            "MYSQL" => Ok(SourceType::Mysql),
            "REDSHIFT" => Ok(SourceType::Redshift),
            "SNOWFLAKE" => Ok(SourceType::Snowflake),
            "KAFKA" => Ok(SourceType::Kafka),
            "UNKNOWN" => Ok(SourceType::Unknown),
            _ => Err(CatalogError::parse(format!("Invalid source type: {}", s))),
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Explicit source registration payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMeta {
    pub source_type: SourceType,
    pub connection_url: Option<String>,
    pub description: Option<String>,
}

impl SourceMeta {
    /// Placeholder used when a dataset names a source nobody registered
    pub fn implicit() -> Self {
        Self {
            source_type: SourceType::Unknown,
            connection_url: None,
            description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub name: SourceName,
    pub source_type: SourceType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub connection_url: Option<String>,
    pub description: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Datasets
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Dataset type discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatasetType {
    DbTable,
    Stream,
}

impl DatasetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetType::DbTable => "DB_TABLE",
            DatasetType::Stream => "STREAM",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "DB_TABLE" => Ok(DatasetType::DbTable),
            "STREAM" => Ok(DatasetType::Stream),
            _ => Err(CatalogError::parse(format!("Invalid dataset type: {}", s))),
        }
    }
}

impl fmt::Display for DatasetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Type-specific payload of a dataset version
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatasetKind {
    DbTable,
    Stream { schema_location: String },
}

impl DatasetKind {
    pub fn dataset_type(&self) -> DatasetType {
        match self {
            DatasetKind::DbTable => DatasetType::DbTable,
            DatasetKind::Stream { .. } => DatasetType::Stream,
        }
    }

    pub fn schema_location(&self) -> Option<&str> {
        match self {
            DatasetKind::DbTable => None,
            DatasetKind::Stream { schema_location } => Some(schema_location),
        }
    }

    /// Rebuild from the stored discriminant and optional stream extension
    pub fn from_parts(dataset_type: DatasetType, schema_location: Option<String>) -> Result<Self> {
        match (dataset_type, schema_location) {
            (DatasetType::DbTable, _) => Ok(DatasetKind::DbTable),
            (DatasetType::Stream, Some(schema_location)) => {
                Ok(DatasetKind::Stream { schema_location })
            }
            (DatasetType::Stream, None) => Err(CatalogError::parse(
                "stream version without schema location",
            )),
        }
    }
}

/// Dataset metadata as submitted by a writer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMeta {
    pub physical_name: DatasetName,
    pub source_name: SourceName,
    pub description: Option<String>,
    /// Run that produced this version, if any
    pub run_id: Option<Uuid>,
    pub kind: DatasetKind,
}

impl DatasetMeta {
    pub fn db_table(physical_name: DatasetName, source_name: SourceName) -> Self {
        Self {
            physical_name,
            source_name,
            description: None,
            run_id: None,
            kind: DatasetKind::DbTable,
        }
    }

    pub fn stream(
        physical_name: DatasetName,
        source_name: SourceName,
        schema_location: impl Into<String>,
    ) -> Self {
        Self {
            physical_name,
            source_name,
            description: None,
            run_id: None,
            kind: DatasetKind::Stream {
                schema_location: schema_location.into(),
            },
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }
}

/// Dataset anchor merged with its current version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub physical_name: DatasetName,
    pub source_name: SourceName,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub description: Option<String>,
    pub current_version: VersionId,
    pub kind: DatasetKind,
}

impl Dataset {
    pub fn dataset_type(&self) -> DatasetType {
        self.kind.dataset_type()
    }
}

/// One immutable entry of a dataset's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetVersion {
    pub version: VersionId,
    pub dataset: DatasetId,
    pub created_at: DateTime<Utc>,
    pub physical_name: DatasetName,
    pub source_name: SourceName,
    pub run_id: Option<Uuid>,
    pub kind: DatasetKind,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Jobs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    Batch,
    Streaming,
    Service,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Batch => "BATCH",
            JobType::Streaming => "STREAMING",
            JobType::Service => "SERVICE",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "BATCH" => Ok(JobType::Batch),
            "STREAMING" => Ok(JobType::Streaming),
            "SERVICE" => Ok(JobType::Service),
            _ => Err(CatalogError::parse(format!("Invalid job type: {}", s))),
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Job metadata as submitted by a writer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMeta {
    pub job_type: JobType,
    pub inputs: Vec<DatasetId>,
    pub outputs: Vec<DatasetId>,
    /// Where the job's code lives (repository URL, artifact path, ...)
    pub location: String,
    pub description: Option<String>,
}

impl JobMeta {
    pub fn new(
        job_type: JobType,
        inputs: Vec<DatasetId>,
        outputs: Vec<DatasetId>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            job_type,
            inputs,
            outputs,
            location: location.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Job anchor merged with its current version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub job_type: JobType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub inputs: Vec<DatasetId>,
    pub outputs: Vec<DatasetId>,
    pub location: String,
    pub description: Option<String>,
    pub current_version: VersionId,
    pub latest_run: Option<Uuid>,
}

/// One immutable entry of a job's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobVersion {
    pub version: VersionId,
    pub job: JobId,
    pub created_at: DateTime<Utc>,
    pub location: String,
    pub inputs: Vec<DatasetVersionRef>,
    pub outputs: Vec<DatasetVersionRef>,
    pub latest_run: Option<Uuid>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Runs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run lifecycle state
///
/// ```text
/// NEW ──► RUNNING ──► COMPLETED
///                 ├─► FAILED
///                 └─► ABORTED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    New,
    Running,
    Completed,
    Failed,
    Aborted,
}

impl RunState {
    pub const ALL: [RunState; 5] = [
        RunState::New,
        RunState::Running,
        RunState::Completed,
        RunState::Failed,
        RunState::Aborted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::New => "NEW",
            RunState::Running => "RUNNING",
            RunState::Completed => "COMPLETED",
            RunState::Failed => "FAILED",
            RunState::Aborted => "ABORTED",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "NEW" => Ok(RunState::New),
            "RUNNING" => Ok(RunState::Running),
            "COMPLETED" => Ok(RunState::Completed),
            "FAILED" => Ok(RunState::Failed),
            "ABORTED" => Ok(RunState::Aborted),
            _ => Err(CatalogError::parse(format!("Invalid run state: {}", s))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Failed | RunState::Aborted
        )
    }

    /// Whether `self → target` is an edge of the lifecycle graph
    pub fn can_transition_to(&self, target: RunState) -> bool {
        matches!(
            (self, target),
            (RunState::New, RunState::Running)
                | (
                    RunState::Running,
                    RunState::Completed | RunState::Failed | RunState::Aborted
                )
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Run creation payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMeta {
    pub nominal_start_time: Option<DateTime<Utc>>,
    pub nominal_end_time: Option<DateTime<Utc>>,
    pub args: BTreeMap<String, String>,
}

impl RunMeta {
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    pub fn with_nominal_window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.nominal_start_time = Some(start);
        self.nominal_end_time = Some(end);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub job_version: VersionId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub nominal_start_time: Option<DateTime<Utc>>,
    pub nominal_end_time: Option<DateTime<Utc>>,
    pub state: RunState,
    pub args: BTreeMap<String, String>,
}
