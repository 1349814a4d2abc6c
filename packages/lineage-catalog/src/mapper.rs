//! Row ↔ model helpers
//!
//! Stateless free functions shared by the catalogs and the store adapters.

use chrono::{DateTime, TimeZone, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::{
    Dataset, DatasetId, DatasetVersion, ExtendedDatasetRow, ExtendedDatasetVersionRow,
    ExtendedJobRow, ExtendedJobVersionRow, ExtendedRunRow, Job, JobId, JobVersion, Namespace,
    NamespaceRow, Run, RunArgsRow, Source, SourceRow,
};
use crate::error::Result;

/// Current time at the store's millisecond resolution
pub fn now() -> DateTime<Utc> {
    truncate_millis(Utc::now())
}

pub fn truncate_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    from_millis(ts.timestamp_millis()).unwrap_or(ts)
}

pub fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// `now()`, but never earlier than `floor`
pub fn now_after(floor: DateTime<Utc>) -> DateTime<Utc> {
    now().max(floor)
}

/// Canonical JSON of an argument map (keys sorted by `BTreeMap`)
pub fn canonical_args(args: &BTreeMap<String, String>) -> Result<String> {
    Ok(serde_json::to_string(args)?)
}

/// SHA-256 hex checksum of canonical run arguments
pub fn args_checksum(canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn to_run_args_row(args: &BTreeMap<String, String>, created_at: DateTime<Utc>) -> Result<RunArgsRow> {
    let canonical = canonical_args(args)?;
    Ok(RunArgsRow {
        uuid: Uuid::new_v4(),
        created_at,
        checksum: args_checksum(&canonical),
        args: canonical,
    })
}

pub fn to_namespace(row: NamespaceRow) -> Namespace {
    Namespace {
        name: row.name,
        created_at: row.created_at,
        updated_at: row.updated_at,
        owner: row.current_owner_name,
        description: row.description,
    }
}

pub fn to_source(row: SourceRow) -> Source {
    Source {
        name: row.name,
        source_type: row.source_type,
        created_at: row.created_at,
        updated_at: row.updated_at,
        connection_url: row.connection_url,
        description: row.description,
    }
}

pub fn to_dataset(row: ExtendedDatasetRow) -> Dataset {
    let ExtendedDatasetRow {
        namespace,
        dataset,
        version,
    } = row;
    Dataset {
        id: DatasetId::new(namespace, dataset.name),
        physical_name: version.physical_name,
        source_name: version.source_name,
        created_at: dataset.created_at,
        updated_at: dataset.updated_at,
        description: dataset.description,
        current_version: dataset.current_version,
        kind: version.kind,
    }
}

pub fn to_dataset_version(row: ExtendedDatasetVersionRow) -> DatasetVersion {
    let ExtendedDatasetVersionRow {
        namespace,
        dataset_name,
        version,
    } = row;
    DatasetVersion {
        version: version.version,
        dataset: DatasetId::new(namespace, dataset_name),
        created_at: version.created_at,
        physical_name: version.physical_name,
        source_name: version.source_name,
        run_id: version.run_uuid,
        kind: version.kind,
    }
}

pub fn to_job(row: ExtendedJobRow) -> Job {
    let ExtendedJobRow {
        namespace,
        job,
        version,
    } = row;
    Job {
        id: JobId::new(namespace, job.name),
        job_type: job.job_type,
        created_at: job.created_at,
        updated_at: job.updated_at,
        inputs: version.inputs.iter().map(|r| r.dataset_id()).collect(),
        outputs: version.outputs.iter().map(|r| r.dataset_id()).collect(),
        location: version.location,
        description: job.description,
        current_version: job.current_version,
        latest_run: version.latest_run_uuid,
    }
}

pub fn to_job_version(row: ExtendedJobVersionRow) -> JobVersion {
    let ExtendedJobVersionRow {
        namespace,
        job_name,
        version,
    } = row;
    JobVersion {
        version: version.version,
        job: JobId::new(namespace, job_name),
        created_at: version.created_at,
        location: version.location,
        inputs: version.inputs,
        outputs: version.outputs,
        latest_run: version.latest_run_uuid,
    }
}

pub fn to_run(row: ExtendedRunRow) -> Result<Run> {
    let args: BTreeMap<String, String> = serde_json::from_str(&row.args.args)?;
    Ok(Run {
        id: row.run.uuid,
        job_version: row.job_version,
        created_at: row.run.created_at,
        updated_at: row.run.updated_at,
        nominal_start_time: row.run.nominal_start_time,
        nominal_end_time: row.run.nominal_end_time,
        state: row.run.current_run_state,
        args,
    })
}
