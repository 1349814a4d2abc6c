//! SQLite Metadata Store
//!
//! File-based or in-memory persistent storage using SQLite.
//!
//! Every write runs in a `BEGIN IMMEDIATE` transaction so concurrent writers
//! on the same file queue on the busy timeout instead of failing mid-way.
//! Identity races surface as unique-constraint violations and are reported as
//! `IdentityConflict`.

mod columns;
mod schema;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::domain::{
    DatasetKind, DatasetName, DatasetRow, DatasetVersionRow, ExtendedDatasetRow,
    ExtendedDatasetVersionRow, ExtendedJobRow, ExtendedJobVersionRow, ExtendedRunRow, JobName,
    JobRow, JobType, JobVersionRow, MetadataStore, NamespaceName, NamespaceRow, RunArgsRow, RunRow,
    RunState, RunStateRow, SourceName, SourceRow, VersionId,
};
use crate::error::{CatalogError, Result};

use columns::*;

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}

fn identity_error(err: rusqlite::Error, entity: &'static str, key: String) -> CatalogError {
    if is_unique_violation(&err) {
        CatalogError::IdentityConflict { entity, key }
    } else {
        err.into()
    }
}

fn sql_limit(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn dataset_select(filter: &str) -> String {
    format!(
        "SELECT n.name, {}, {}
         FROM datasets d
         JOIN namespaces n ON n.uuid = d.namespace_uuid
         JOIN dataset_versions v ON v.dataset_uuid = d.uuid AND v.version = d.current_version
         LEFT JOIN stream_versions s ON s.dataset_version_uuid = v.uuid
         {}",
        DATASET_COLUMNS, DATASET_VERSION_COLUMNS, filter
    )
}

fn dataset_version_select(filter: &str) -> String {
    format!(
        "SELECT n.name, d.name, {}
         FROM dataset_versions v
         JOIN datasets d ON d.uuid = v.dataset_uuid
         JOIN namespaces n ON n.uuid = d.namespace_uuid
         LEFT JOIN stream_versions s ON s.dataset_version_uuid = v.uuid
         {}",
        DATASET_VERSION_COLUMNS, filter
    )
}

fn job_select(filter: &str) -> String {
    format!(
        "SELECT n.name, {}, {}
         FROM jobs j
         JOIN namespaces n ON n.uuid = j.namespace_uuid
         JOIN job_versions jv ON jv.job_uuid = j.uuid AND jv.version = j.current_version
         {}",
        JOB_COLUMNS, JOB_VERSION_COLUMNS, filter
    )
}

fn job_version_select(filter: &str) -> String {
    format!(
        "SELECT n.name, j.name, {}
         FROM job_versions jv
         JOIN jobs j ON j.uuid = jv.job_uuid
         JOIN namespaces n ON n.uuid = j.namespace_uuid
         {}",
        JOB_VERSION_COLUMNS, filter
    )
}

fn run_select(filter: &str) -> String {
    format!(
        "SELECT {}, {}, jv.version
         FROM runs r
         JOIN run_args ra ON ra.uuid = r.run_args_uuid
         JOIN job_versions jv ON jv.uuid = r.job_version_uuid
         {}",
        RUN_COLUMNS, RUN_ARGS_COLUMNS, filter
    )
}

/// SQLite-based MetadataStore implementation
#[derive(Clone)]
pub struct SqliteMetadataStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMetadataStore {
    /// Open (or create) a database file at the given path
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        Self::from_config(&DatabaseConfig::file(db_path))
    }

    /// Create a private in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        Self::from_config(&DatabaseConfig::in_memory())
    }

    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        let conn = match &config.path {
            Some(path) => {
                let conn = Connection::open(path)?;
                let mode: String =
                    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
                debug!(path = %path.display(), journal_mode = %mode, "Opened SQLite catalog");
                conn
            }
            None => Connection::open_in_memory()?,
        };
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        conn.pragma_update(None, "foreign_keys", true)?;
        schema::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Namespaces & Sources
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn upsert_namespace(&self, row: &NamespaceRow) -> Result<NamespaceRow> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO namespaces (uuid, created_at, updated_at, name, description, current_owner_name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(name) DO UPDATE SET
                updated_at = excluded.updated_at,
                description = excluded.description,
                current_owner_name = excluded.current_owner_name",
            params![
                row.uuid.to_string(),
                row.created_at.timestamp_millis(),
                row.updated_at.timestamp_millis(),
                row.name.as_str(),
                row.description,
                row.current_owner_name.as_str(),
            ],
        )?;
        let stored = tx.query_row(
            &format!("SELECT {} FROM namespaces WHERE name = ?1", NAMESPACE_COLUMNS),
            params![row.name.as_str()],
            namespace_row,
        )?;
        tx.commit()?;
        Ok(stored)
    }

    async fn find_namespace(&self, name: &NamespaceName) -> Result<Option<NamespaceRow>> {
        let conn = self.conn.lock();
        let result = conn
            .query_row(
                &format!("SELECT {} FROM namespaces WHERE name = ?1", NAMESPACE_COLUMNS),
                params![name.as_str()],
                namespace_row,
            )
            .optional()?;
        Ok(result)
    }

    async fn upsert_source(&self, row: &SourceRow) -> Result<SourceRow> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO sources (uuid, type, created_at, updated_at, name, connection_url, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(name) DO UPDATE SET
                type = excluded.type,
                updated_at = excluded.updated_at,
                connection_url = excluded.connection_url,
                description = excluded.description",
            params![
                row.uuid.to_string(),
                row.source_type.as_str(),
                row.created_at.timestamp_millis(),
                row.updated_at.timestamp_millis(),
                row.name.as_str(),
                row.connection_url,
                row.description,
            ],
        )?;
        let stored = tx.query_row(
            &format!("SELECT {} FROM sources WHERE name = ?1", SOURCE_COLUMNS),
            params![row.name.as_str()],
            source_row,
        )?;
        tx.commit()?;
        Ok(stored)
    }

    async fn find_or_insert_source(&self, row: &SourceRow) -> Result<SourceRow> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO sources (uuid, type, created_at, updated_at, name, connection_url, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(name) DO NOTHING",
            params![
                row.uuid.to_string(),
                row.source_type.as_str(),
                row.created_at.timestamp_millis(),
                row.updated_at.timestamp_millis(),
                row.name.as_str(),
                row.connection_url,
                row.description,
            ],
        )?;
        let stored = tx.query_row(
            &format!("SELECT {} FROM sources WHERE name = ?1", SOURCE_COLUMNS),
            params![row.name.as_str()],
            source_row,
        )?;
        tx.commit()?;
        Ok(stored)
    }

    async fn find_source(&self, name: &SourceName) -> Result<Option<SourceRow>> {
        let conn = self.conn.lock();
        let result = conn
            .query_row(
                &format!("SELECT {} FROM sources WHERE name = ?1", SOURCE_COLUMNS),
                params![name.as_str()],
                source_row,
            )
            .optional()?;
        Ok(result)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Datasets
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn find_dataset(
        &self,
        namespace: &NamespaceName,
        name: &DatasetName,
    ) -> Result<Option<ExtendedDatasetRow>> {
        let conn = self.conn.lock();
        let result = conn
            .query_row(
                &dataset_select("WHERE n.name = ?1 AND d.name = ?2"),
                params![namespace.as_str(), name.as_str()],
                extended_dataset_row,
            )
            .optional()?;
        Ok(result)
    }

    async fn list_datasets(
        &self,
        namespace: &NamespaceName,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ExtendedDatasetRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&dataset_select(
            "WHERE n.name = ?1 ORDER BY d.created_at ASC, d.rowid ASC LIMIT ?2 OFFSET ?3",
        ))?;
        let rows = stmt
            .query_map(
                params![namespace.as_str(), sql_limit(limit), sql_limit(offset)],
                extended_dataset_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn insert_dataset(&self, dataset: &DatasetRow, version: &DatasetVersionRow) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO datasets (uuid, type, created_at, updated_at, namespace_uuid, name, description, current_version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                dataset.uuid.to_string(),
                dataset.dataset_type.as_str(),
                dataset.created_at.timestamp_millis(),
                dataset.updated_at.timestamp_millis(),
                dataset.namespace_uuid.to_string(),
                dataset.name.as_str(),
                dataset.description,
                dataset.current_version.to_string(),
            ],
        )
        .map_err(|e| identity_error(e, "dataset", dataset.name.to_string()))?;
        insert_dataset_version_row(&tx, version)?;
        tx.commit()?;
        Ok(())
    }

    async fn insert_dataset_version(
        &self,
        version: &DatasetVersionRow,
        description: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let inserted = insert_dataset_version_row(&tx, version)?;
        let moved = tx.execute(
            "UPDATE datasets
             SET current_version = ?1, type = ?2, description = ?3, updated_at = MAX(updated_at, ?4)
             WHERE uuid = ?5",
            params![
                version.version.to_string(),
                version.kind.dataset_type().as_str(),
                description,
                updated_at.timestamp_millis(),
                version.dataset_uuid.to_string(),
            ],
        )?;
        if moved == 0 {
            return Err(CatalogError::Database(format!(
                "dataset {} vanished while adding a version",
                version.dataset_uuid
            )));
        }
        tx.commit()?;
        Ok(inserted)
    }

    async fn update_dataset_description(
        &self,
        dataset_uuid: Uuid,
        expected: VersionId,
        description: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE datasets SET description = ?1, updated_at = MAX(updated_at, ?2) \
             WHERE uuid = ?3 AND current_version = ?4",
            params![
                description,
                updated_at.timestamp_millis(),
                dataset_uuid.to_string(),
                expected.to_string(),
            ],
        )?;
        if updated == 0 {
            return Err(CatalogError::StaleVersion {
                entity: "dataset",
                key: dataset_uuid.to_string(),
                expected: expected.to_string(),
            });
        }
        Ok(())
    }

    async fn find_dataset_version(
        &self,
        version: VersionId,
    ) -> Result<Option<ExtendedDatasetVersionRow>> {
        let conn = self.conn.lock();
        let result = conn
            .query_row(
                &dataset_version_select("WHERE v.version = ?1 LIMIT 1"),
                params![version.to_string()],
                extended_dataset_version_row,
            )
            .optional()?;
        Ok(result)
    }

    async fn list_dataset_versions(
        &self,
        namespace: &NamespaceName,
        name: &DatasetName,
    ) -> Result<Vec<ExtendedDatasetVersionRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&dataset_version_select(
            "WHERE n.name = ?1 AND d.name = ?2 ORDER BY v.created_at ASC, v.rowid ASC",
        ))?;
        let rows = stmt
            .query_map(
                params![namespace.as_str(), name.as_str()],
                extended_dataset_version_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Jobs
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn find_job(
        &self,
        namespace: &NamespaceName,
        name: &JobName,
    ) -> Result<Option<ExtendedJobRow>> {
        let conn = self.conn.lock();
        let result = conn
            .query_row(
                &job_select("WHERE n.name = ?1 AND j.name = ?2"),
                params![namespace.as_str(), name.as_str()],
                extended_job_row,
            )
            .optional()?;
        Ok(result)
    }

    async fn list_jobs(
        &self,
        namespace: &NamespaceName,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ExtendedJobRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&job_select(
            "WHERE n.name = ?1 ORDER BY j.created_at ASC, j.rowid ASC LIMIT ?2 OFFSET ?3",
        ))?;
        let rows = stmt
            .query_map(
                params![namespace.as_str(), sql_limit(limit), sql_limit(offset)],
                extended_job_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn insert_job(&self, job: &JobRow, version: &JobVersionRow) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO jobs (uuid, type, created_at, updated_at, namespace_uuid, name, description, current_version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                job.uuid.to_string(),
                job.job_type.as_str(),
                job.created_at.timestamp_millis(),
                job.updated_at.timestamp_millis(),
                job.namespace_uuid.to_string(),
                job.name.as_str(),
                job.description,
                job.current_version.to_string(),
            ],
        )
        .map_err(|e| identity_error(e, "job", job.name.to_string()))?;
        insert_job_version_row(&tx, version)?;
        tx.commit()?;
        Ok(())
    }

    async fn insert_job_version(
        &self,
        version: &JobVersionRow,
        job_type: JobType,
        description: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let inserted = insert_job_version_row(&tx, version)?;
        let moved = tx.execute(
            "UPDATE jobs
             SET current_version = ?1, type = ?2, description = ?3, updated_at = MAX(updated_at, ?4)
             WHERE uuid = ?5",
            params![
                version.version.to_string(),
                job_type.as_str(),
                description,
                updated_at.timestamp_millis(),
                version.job_uuid.to_string(),
            ],
        )?;
        if moved == 0 {
            return Err(CatalogError::Database(format!(
                "job {} vanished while adding a version",
                version.job_uuid
            )));
        }
        tx.commit()?;
        Ok(inserted)
    }

    async fn update_job_description(
        &self,
        job_uuid: Uuid,
        expected: VersionId,
        description: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE jobs SET description = ?1, updated_at = MAX(updated_at, ?2) \
             WHERE uuid = ?3 AND current_version = ?4",
            params![
                description,
                updated_at.timestamp_millis(),
                job_uuid.to_string(),
                expected.to_string(),
            ],
        )?;
        if updated == 0 {
            return Err(CatalogError::StaleVersion {
                entity: "job",
                key: job_uuid.to_string(),
                expected: expected.to_string(),
            });
        }
        Ok(())
    }

    async fn find_job_version(&self, version: VersionId) -> Result<Option<ExtendedJobVersionRow>> {
        let conn = self.conn.lock();
        let result = conn
            .query_row(
                &job_version_select("WHERE jv.version = ?1 LIMIT 1"),
                params![version.to_string()],
                extended_job_version_row,
            )
            .optional()?;
        Ok(result)
    }

    async fn list_job_versions(
        &self,
        namespace: &NamespaceName,
        name: &JobName,
    ) -> Result<Vec<ExtendedJobVersionRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&job_version_select(
            "WHERE n.name = ?1 AND j.name = ?2 ORDER BY jv.created_at ASC, jv.rowid ASC",
        ))?;
        let rows = stmt
            .query_map(
                params![namespace.as_str(), name.as_str()],
                extended_job_version_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Runs
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn insert_run(
        &self,
        run: &RunRow,
        args: &RunArgsRow,
        initial_state: &RunStateRow,
    ) -> Result<ExtendedRunRow> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO run_args (uuid, created_at, args, checksum)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(checksum) DO NOTHING",
            params![
                args.uuid.to_string(),
                args.created_at.timestamp_millis(),
                args.args,
                args.checksum,
            ],
        )?;
        let stored_args = tx.query_row(
            &format!("SELECT {} FROM run_args ra WHERE ra.checksum = ?1", RUN_ARGS_COLUMNS),
            params![args.checksum],
            |row| run_args_row(row, 0),
        )?;

        let mut run = run.clone();
        run.run_args_uuid = stored_args.uuid;
        tx.execute(
            "INSERT INTO runs (uuid, created_at, updated_at, job_version_uuid, run_args_uuid,
                               nominal_start_time, nominal_end_time, current_run_state)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                run.uuid.to_string(),
                run.created_at.timestamp_millis(),
                run.updated_at.timestamp_millis(),
                run.job_version_uuid.to_string(),
                run.run_args_uuid.to_string(),
                run.nominal_start_time.map(|t| t.timestamp_millis()),
                run.nominal_end_time.map(|t| t.timestamp_millis()),
                run.current_run_state.as_str(),
            ],
        )?;
        insert_run_state_row(&tx, initial_state)?;

        tx.execute(
            "UPDATE job_versions SET latest_run_uuid = ?1, updated_at = ?2 WHERE uuid = ?3",
            params![
                run.uuid.to_string(),
                run.created_at.timestamp_millis(),
                run.job_version_uuid.to_string(),
            ],
        )?;
        let job_version = tx.query_row(
            "SELECT version FROM job_versions WHERE uuid = ?1",
            params![run.job_version_uuid.to_string()],
            |row| version_at(row, 0),
        )?;

        tx.commit()?;
        Ok(ExtendedRunRow {
            run,
            args: stored_args,
            job_version,
        })
    }

    async fn find_run(&self, run_uuid: Uuid) -> Result<Option<ExtendedRunRow>> {
        let conn = self.conn.lock();
        let result = conn
            .query_row(
                &run_select("WHERE r.uuid = ?1"),
                params![run_uuid.to_string()],
                extended_run_row,
            )
            .optional()?;
        Ok(result)
    }

    async fn run_exists(&self, run_uuid: Uuid) -> Result<bool> {
        let conn = self.conn.lock();
        let exists = conn
            .query_row(
                "SELECT 1 FROM runs WHERE uuid = ?1",
                params![run_uuid.to_string()],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        Ok(exists)
    }

    async fn list_runs(
        &self,
        job_uuid: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ExtendedRunRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&run_select(
            "WHERE jv.job_uuid = ?1 ORDER BY r.created_at ASC, r.rowid ASC LIMIT ?2 OFFSET ?3",
        ))?;
        let rows = stmt
            .query_map(
                params![job_uuid.to_string(), sql_limit(limit), sql_limit(offset)],
                extended_run_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn insert_run_state(&self, row: &RunStateRow, expected: RunState) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let moved = tx.execute(
            "UPDATE runs SET current_run_state = ?1, updated_at = ?2
             WHERE uuid = ?3 AND current_run_state = ?4",
            params![
                row.state.as_str(),
                row.transitioned_at.timestamp_millis(),
                row.run_uuid.to_string(),
                expected.as_str(),
            ],
        )?;
        if moved == 0 {
            let exists = tx
                .query_row(
                    "SELECT 1 FROM runs WHERE uuid = ?1",
                    params![row.run_uuid.to_string()],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            return Err(if exists {
                CatalogError::StaleRunState {
                    run_id: row.run_uuid,
                    expected: expected.to_string(),
                }
            } else {
                CatalogError::RunNotFound(row.run_uuid)
            });
        }

        insert_run_state_row(&tx, row)?;
        tx.commit()?;
        Ok(())
    }

    async fn find_latest_run_state(&self, run_uuid: Uuid) -> Result<Option<RunStateRow>> {
        let conn = self.conn.lock();
        let result = conn
            .query_row(
                &format!(
                    "SELECT {} FROM run_states WHERE run_uuid = ?1
                     ORDER BY transitioned_at DESC, rowid DESC LIMIT 1",
                    RUN_STATE_COLUMNS
                ),
                params![run_uuid.to_string()],
                run_state_row,
            )
            .optional()?;
        Ok(result)
    }

    async fn list_run_states(&self, run_uuid: Uuid) -> Result<Vec<RunStateRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM run_states WHERE run_uuid = ?1
             ORDER BY transitioned_at ASC, rowid ASC",
            RUN_STATE_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![run_uuid.to_string()], run_state_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Shared row writers (run inside a caller's transaction)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Returns `false` if `(dataset_uuid, version)` was already recorded.
fn insert_dataset_version_row(conn: &Connection, version: &DatasetVersionRow) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO dataset_versions (uuid, created_at, dataset_uuid, version, type,
                                       physical_name, source_uuid, source_name, run_uuid)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(dataset_uuid, version) DO NOTHING",
        params![
            version.uuid.to_string(),
            version.created_at.timestamp_millis(),
            version.dataset_uuid.to_string(),
            version.version.to_string(),
            version.kind.dataset_type().as_str(),
            version.physical_name.as_str(),
            version.source_uuid.to_string(),
            version.source_name.as_str(),
            version.run_uuid.map(|u| u.to_string()),
        ],
    )? == 1;

    if inserted {
        if let DatasetKind::Stream { schema_location } = &version.kind {
            conn.execute(
                "INSERT INTO stream_versions (dataset_version_uuid, schema_location) VALUES (?1, ?2)",
                params![version.uuid.to_string(), schema_location],
            )?;
        }
    }
    Ok(inserted)
}

fn insert_job_version_row(conn: &Connection, version: &JobVersionRow) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO job_versions (uuid, created_at, updated_at, job_uuid, version, location,
                                   inputs, outputs, latest_run_uuid)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(job_uuid, version) DO NOTHING",
        params![
            version.uuid.to_string(),
            version.created_at.timestamp_millis(),
            version.updated_at.timestamp_millis(),
            version.job_uuid.to_string(),
            version.version.to_string(),
            version.location,
            serde_json::to_string(&version.inputs)?,
            serde_json::to_string(&version.outputs)?,
            version.latest_run_uuid.map(|u| u.to_string()),
        ],
    )? == 1;
    Ok(inserted)
}

fn insert_run_state_row(conn: &Connection, row: &RunStateRow) -> Result<()> {
    conn.execute(
        "INSERT INTO run_states (uuid, transitioned_at, run_uuid, state) VALUES (?1, ?2, ?3, ?4)",
        params![
            row.uuid.to_string(),
            row.transitioned_at.timestamp_millis(),
            row.run_uuid.to_string(),
            row.state.as_str(),
        ],
    )?;
    Ok(())
}
