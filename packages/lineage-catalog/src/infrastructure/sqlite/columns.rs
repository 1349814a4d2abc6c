//! Column lists and row readers
//!
//! Every `*_COLUMNS` list has a matching reader that consumes the same number
//! of columns starting at a base index, so joined selects can be stitched
//! together from the pieces.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use uuid::Uuid;

use crate::domain::{
    DatasetKind, DatasetName, DatasetRow, DatasetType, DatasetVersionRow, ExtendedDatasetRow,
    ExtendedDatasetVersionRow, ExtendedJobRow, ExtendedJobVersionRow, ExtendedRunRow, JobName,
    JobRow, JobType, JobVersionRow, NamespaceName, NamespaceRow, OwnerName, RunArgsRow, RunRow,
    RunState, RunStateRow, SourceName, SourceRow, SourceType, VersionId,
};
use crate::error::{CatalogError, Result};
use crate::mapper::from_millis;

pub(super) const NAMESPACE_COLUMNS: &str =
    "uuid, created_at, updated_at, name, description, current_owner_name";

pub(super) const SOURCE_COLUMNS: &str =
    "uuid, type, created_at, updated_at, name, connection_url, description";

pub(super) const DATASET_COLUMNS: &str = "d.uuid, d.type, d.created_at, d.updated_at, \
     d.namespace_uuid, d.name, d.description, d.current_version";
const DATASET_WIDTH: usize = 8;

pub(super) const DATASET_VERSION_COLUMNS: &str = "v.uuid, v.created_at, v.dataset_uuid, \
     v.version, v.type, v.physical_name, v.source_uuid, v.source_name, v.run_uuid, \
     s.schema_location";

pub(super) const JOB_COLUMNS: &str = "j.uuid, j.type, j.created_at, j.updated_at, \
     j.namespace_uuid, j.name, j.description, j.current_version";
const JOB_WIDTH: usize = 8;

pub(super) const JOB_VERSION_COLUMNS: &str = "jv.uuid, jv.created_at, jv.updated_at, \
     jv.job_uuid, jv.version, jv.location, jv.inputs, jv.outputs, jv.latest_run_uuid";

pub(super) const RUN_COLUMNS: &str = "r.uuid, r.created_at, r.updated_at, \
     r.job_version_uuid, r.run_args_uuid, r.nominal_start_time, r.nominal_end_time, \
     r.current_run_state";
const RUN_WIDTH: usize = 8;

pub(super) const RUN_ARGS_COLUMNS: &str = "ra.uuid, ra.created_at, ra.args, ra.checksum";
const RUN_ARGS_WIDTH: usize = 4;

pub(super) const RUN_STATE_COLUMNS: &str = "uuid, transitioned_at, run_uuid, state";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scalar readers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn conversion_error(idx: usize, err: CatalogError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Read a TEXT column and run it through a domain parser
pub(super) fn parsed<T>(
    row: &Row<'_>,
    idx: usize,
    parse: impl FnOnce(String) -> Result<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(raw).map_err(|e| conversion_error(idx, e))
}

fn opt_parsed<T>(
    row: &Row<'_>,
    idx: usize,
    parse: impl FnOnce(String) -> Result<T>,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(parse)
        .transpose()
        .map_err(|e| conversion_error(idx, e))
}

fn parse_uuid(raw: String) -> Result<Uuid> {
    Uuid::parse_str(&raw).map_err(CatalogError::parse)
}

pub(super) fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    parsed(row, idx, parse_uuid)
}

fn opt_uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    opt_parsed(row, idx, parse_uuid)
}

pub(super) fn version_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<VersionId> {
    uuid_at(row, idx).map(VersionId::from_uuid)
}

fn ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    from_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

fn opt_ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let ms: Option<i64> = row.get(idx)?;
    ms.map(|ms| from_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms)))
        .transpose()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Row readers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub(super) fn namespace_row(row: &Row<'_>) -> rusqlite::Result<NamespaceRow> {
    Ok(NamespaceRow {
        uuid: uuid_at(row, 0)?,
        created_at: ts_at(row, 1)?,
        updated_at: ts_at(row, 2)?,
        name: parsed(row, 3, NamespaceName::new)?,
        description: row.get(4)?,
        current_owner_name: parsed(row, 5, OwnerName::new)?,
    })
}

pub(super) fn source_row(row: &Row<'_>) -> rusqlite::Result<SourceRow> {
    Ok(SourceRow {
        uuid: uuid_at(row, 0)?,
        source_type: parsed(row, 1, |s| SourceType::from_str(&s))?,
        created_at: ts_at(row, 2)?,
        updated_at: ts_at(row, 3)?,
        name: parsed(row, 4, SourceName::new)?,
        connection_url: row.get(5)?,
        description: row.get(6)?,
    })
}

pub(super) fn dataset_row(row: &Row<'_>, base: usize) -> rusqlite::Result<DatasetRow> {
    Ok(DatasetRow {
        uuid: uuid_at(row, base)?,
        dataset_type: parsed(row, base + 1, |s| DatasetType::from_str(&s))?,
        created_at: ts_at(row, base + 2)?,
        updated_at: ts_at(row, base + 3)?,
        namespace_uuid: uuid_at(row, base + 4)?,
        name: parsed(row, base + 5, DatasetName::new)?,
        description: row.get(base + 6)?,
        current_version: version_at(row, base + 7)?,
    })
}

pub(super) fn dataset_version_row(row: &Row<'_>, base: usize) -> rusqlite::Result<DatasetVersionRow> {
    let dataset_type = parsed(row, base + 4, |s| DatasetType::from_str(&s))?;
    let schema_location: Option<String> = row.get(base + 9)?;
    let kind = DatasetKind::from_parts(dataset_type, schema_location)
        .map_err(|e| conversion_error(base + 9, e))?;

    Ok(DatasetVersionRow {
        uuid: uuid_at(row, base)?,
        created_at: ts_at(row, base + 1)?,
        dataset_uuid: uuid_at(row, base + 2)?,
        version: version_at(row, base + 3)?,
        physical_name: parsed(row, base + 5, DatasetName::new)?,
        source_uuid: uuid_at(row, base + 6)?,
        source_name: parsed(row, base + 7, SourceName::new)?,
        run_uuid: opt_uuid_at(row, base + 8)?,
        kind,
    })
}

/// `n.name, DATASET_COLUMNS, DATASET_VERSION_COLUMNS`
pub(super) fn extended_dataset_row(
    row: &Row<'_>,
) -> rusqlite::Result<ExtendedDatasetRow> {
    Ok(ExtendedDatasetRow {
        namespace: parsed(row, 0, NamespaceName::new)?,
        dataset: dataset_row(row, 1)?,
        version: dataset_version_row(row, 1 + DATASET_WIDTH)?,
    })
}

/// `n.name, d.name, DATASET_VERSION_COLUMNS`
pub(super) fn extended_dataset_version_row(
    row: &Row<'_>,
) -> rusqlite::Result<ExtendedDatasetVersionRow> {
    Ok(ExtendedDatasetVersionRow {
        namespace: parsed(row, 0, NamespaceName::new)?,
        dataset_name: parsed(row, 1, DatasetName::new)?,
        version: dataset_version_row(row, 2)?,
    })
}

pub(super) fn job_row(row: &Row<'_>, base: usize) -> rusqlite::Result<JobRow> {
    Ok(JobRow {
        uuid: uuid_at(row, base)?,
        job_type: parsed(row, base + 1, |s| JobType::from_str(&s))?,
        created_at: ts_at(row, base + 2)?,
        updated_at: ts_at(row, base + 3)?,
        namespace_uuid: uuid_at(row, base + 4)?,
        name: parsed(row, base + 5, JobName::new)?,
        description: row.get(base + 6)?,
        current_version: version_at(row, base + 7)?,
    })
}

pub(super) fn job_version_row(row: &Row<'_>, base: usize) -> rusqlite::Result<JobVersionRow> {
    Ok(JobVersionRow {
        uuid: uuid_at(row, base)?,
        created_at: ts_at(row, base + 1)?,
        updated_at: ts_at(row, base + 2)?,
        job_uuid: uuid_at(row, base + 3)?,
        version: version_at(row, base + 4)?,
        location: row.get(base + 5)?,
        inputs: parsed(row, base + 6, |s| Ok(serde_json::from_str(&s)?))?,
        outputs: parsed(row, base + 7, |s| Ok(serde_json::from_str(&s)?))?,
        latest_run_uuid: opt_uuid_at(row, base + 8)?,
    })
}

/// `n.name, JOB_COLUMNS, JOB_VERSION_COLUMNS`
pub(super) fn extended_job_row(row: &Row<'_>) -> rusqlite::Result<ExtendedJobRow> {
    Ok(ExtendedJobRow {
        namespace: parsed(row, 0, NamespaceName::new)?,
        job: job_row(row, 1)?,
        version: job_version_row(row, 1 + JOB_WIDTH)?,
    })
}

/// `n.name, j.name, JOB_VERSION_COLUMNS`
pub(super) fn extended_job_version_row(
    row: &Row<'_>,
) -> rusqlite::Result<ExtendedJobVersionRow> {
    Ok(ExtendedJobVersionRow {
        namespace: parsed(row, 0, NamespaceName::new)?,
        job_name: parsed(row, 1, JobName::new)?,
        version: job_version_row(row, 2)?,
    })
}

pub(super) fn run_row(row: &Row<'_>, base: usize) -> rusqlite::Result<RunRow> {
    Ok(RunRow {
        uuid: uuid_at(row, base)?,
        created_at: ts_at(row, base + 1)?,
        updated_at: ts_at(row, base + 2)?,
        job_version_uuid: uuid_at(row, base + 3)?,
        run_args_uuid: uuid_at(row, base + 4)?,
        nominal_start_time: opt_ts_at(row, base + 5)?,
        nominal_end_time: opt_ts_at(row, base + 6)?,
        current_run_state: parsed(row, base + 7, |s| RunState::from_str(&s))?,
    })
}

pub(super) fn run_args_row(row: &Row<'_>, base: usize) -> rusqlite::Result<RunArgsRow> {
    Ok(RunArgsRow {
        uuid: uuid_at(row, base)?,
        created_at: ts_at(row, base + 1)?,
        args: row.get(base + 2)?,
        checksum: row.get(base + 3)?,
    })
}

/// `RUN_COLUMNS, RUN_ARGS_COLUMNS, jv.version`
pub(super) fn extended_run_row(row: &Row<'_>) -> rusqlite::Result<ExtendedRunRow> {
    Ok(ExtendedRunRow {
        run: run_row(row, 0)?,
        args: run_args_row(row, RUN_WIDTH)?,
        job_version: version_at(row, RUN_WIDTH + RUN_ARGS_WIDTH)?,
    })
}

pub(super) fn run_state_row(row: &Row<'_>) -> rusqlite::Result<RunStateRow> {
    Ok(RunStateRow {
        uuid: uuid_at(row, 0)?,
        transitioned_at: ts_at(row, 1)?,
        run_uuid: uuid_at(row, 2)?,
        state: parsed(row, 3, |s| RunState::from_str(&s))?,
    })
}
