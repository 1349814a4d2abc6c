//! Error types for lineage-catalog

use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::config::ConfigError;

/// Catalog error type
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Namespace not found: {0}")]
    NamespaceNotFound(String),

    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(Uuid),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    /// A concurrent writer created the same identity first.
    #[error("Identity conflict on {entity}: {key}")]
    IdentityConflict { entity: &'static str, key: String },

    /// The run's state pointer moved between read and write.
    #[error("Stale run state for {run_id}: expected {expected}")]
    StaleRunState { run_id: Uuid, expected: String },

    /// The anchor's current-version pointer moved between read and write.
    #[error("Stale {entity} version for {key}: expected {expected}")]
    StaleVersion {
        entity: &'static str,
        key: String,
        expected: String,
    },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CatalogError {
    pub fn parse<E: fmt::Display>(e: E) -> Self {
        Self::Parse(e.to_string())
    }

    pub fn invalid_transition(from: impl fmt::Display, to: impl fmt::Display) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Propagation class of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::IdentityConflict { .. }
            | Self::StaleRunState { .. }
            | Self::StaleVersion { .. } => ErrorCategory::Conflict,
            Self::StoreUnavailable(_) | Self::Database(_) | Self::Serialization(_) => {
                ErrorCategory::Infrastructure
            }
            Self::Config(_) => ErrorCategory::Infrastructure,
            Self::NamespaceNotFound(_)
            | Self::DatasetNotFound(_)
            | Self::JobNotFound(_)
            | Self::RunNotFound(_)
            | Self::InvalidStateTransition { .. }
            | Self::InvalidName(_)
            | Self::Parse(_) => ErrorCategory::Domain,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NamespaceNotFound(_)
                | Self::DatasetNotFound(_)
                | Self::JobNotFound(_)
                | Self::RunNotFound(_)
        )
    }
}

/// How an error is expected to travel.
///
/// - `Domain`: expected outcome, translated by the API layer into a client response
/// - `Conflict`: lost a race inside the store, retried locally
/// - `Infrastructure`: the store failed, never retried locally
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorCategory {
    Domain,
    Conflict,
    Infrastructure,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Domain => "domain",
            ErrorCategory::Conflict => "conflict",
            ErrorCategory::Infrastructure => "infrastructure",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// SQLite error conversions
#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy)
            | Some(ErrorCode::DatabaseLocked)
            | Some(ErrorCode::CannotOpen)
            | Some(ErrorCode::SystemIoFailure) => {
                CatalogError::StoreUnavailable(format!("SQLite error: {}", err))
            }
            _ => CatalogError::Database(format!("SQLite error: {}", err)),
        }
    }
}

// JSON error conversions
impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Serialization(format!("JSON error: {}", err))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CatalogError>;
