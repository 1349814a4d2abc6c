//! SQLite schema
//!
//! Timestamps are INTEGER epoch milliseconds, ids are TEXT uuids.
//! Current-version pointers have no foreign key; the store moves them in the
//! same transaction that inserts the version row they reference.

use rusqlite::Connection;

use crate::error::Result;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS namespaces (
        uuid TEXT PRIMARY KEY,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        name TEXT NOT NULL UNIQUE,
        description TEXT,
        current_owner_name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS sources (
        uuid TEXT PRIMARY KEY,
        type TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        name TEXT NOT NULL UNIQUE,
        connection_url TEXT,
        description TEXT
    )",
    "CREATE TABLE IF NOT EXISTS datasets (
        uuid TEXT PRIMARY KEY,
        type TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        namespace_uuid TEXT NOT NULL REFERENCES namespaces(uuid),
        name TEXT NOT NULL,
        description TEXT,
        current_version TEXT NOT NULL,
        UNIQUE (namespace_uuid, name)
    )",
    "CREATE TABLE IF NOT EXISTS runs (
        uuid TEXT PRIMARY KEY,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        job_version_uuid TEXT NOT NULL REFERENCES job_versions(uuid),
        run_args_uuid TEXT NOT NULL REFERENCES run_args(uuid),
        nominal_start_time INTEGER,
        nominal_end_time INTEGER,
        current_run_state TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS dataset_versions (
        uuid TEXT PRIMARY KEY,
        created_at INTEGER NOT NULL,
        dataset_uuid TEXT NOT NULL REFERENCES datasets(uuid),
        version TEXT NOT NULL,
        type TEXT NOT NULL,
        physical_name TEXT NOT NULL,
        source_uuid TEXT NOT NULL REFERENCES sources(uuid),
        source_name TEXT NOT NULL,
        run_uuid TEXT REFERENCES runs(uuid),
        UNIQUE (dataset_uuid, version)
    )",
    "CREATE INDEX IF NOT EXISTS idx_dataset_versions_version
     ON dataset_versions(version)",
    "CREATE TABLE IF NOT EXISTS stream_versions (
        dataset_version_uuid TEXT PRIMARY KEY REFERENCES dataset_versions(uuid),
        schema_location TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS jobs (
        uuid TEXT PRIMARY KEY,
        type TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        namespace_uuid TEXT NOT NULL REFERENCES namespaces(uuid),
        name TEXT NOT NULL,
        description TEXT,
        current_version TEXT NOT NULL,
        UNIQUE (namespace_uuid, name)
    )",
    "CREATE TABLE IF NOT EXISTS job_versions (
        uuid TEXT PRIMARY KEY,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        job_uuid TEXT NOT NULL REFERENCES jobs(uuid),
        version TEXT NOT NULL,
        location TEXT NOT NULL,
        inputs TEXT NOT NULL,
        outputs TEXT NOT NULL,
        latest_run_uuid TEXT,
        UNIQUE (job_uuid, version)
    )",
    "CREATE INDEX IF NOT EXISTS idx_job_versions_version
     ON job_versions(version)",
    "CREATE TABLE IF NOT EXISTS run_args (
        uuid TEXT PRIMARY KEY,
        created_at INTEGER NOT NULL,
        args TEXT NOT NULL,
        checksum TEXT NOT NULL UNIQUE
    )",
    "CREATE INDEX IF NOT EXISTS idx_runs_job_version
     ON runs(job_version_uuid, created_at)",
    "CREATE TABLE IF NOT EXISTS run_states (
        uuid TEXT PRIMARY KEY,
        transitioned_at INTEGER NOT NULL,
        run_uuid TEXT NOT NULL REFERENCES runs(uuid),
        state TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_run_states_run
     ON run_states(run_uuid, transitioned_at)",
];

/// Create every table and index that does not exist yet
pub(super) fn init_schema(conn: &Connection) -> Result<()> {
    for ddl in SCHEMA {
        conn.execute(ddl, [])?;
    }
    Ok(())
}
