//! Catalog configuration
//!
//! Versioned YAML file with three sections, every one optional:
//!
//! ```yaml
//! version: 1
//! database:
//!   path: /var/lib/lineage/catalog.db   # omit for an in-memory database
//!   busy_timeout_ms: 5000
//! catalog:
//!   max_conflict_retries: 5
//!   max_transition_retries: 3
//! logging:
//!   filter: "lineage_catalog=debug,info"
//! ```

pub mod error;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use validation::Validatable;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use validation::check_range;

/// Supported schema versions
pub const SUPPORTED_VERSIONS: &[u32] = &[1];

/// Store connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQLite file; `None` opens a private in-memory database
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// How long a writer waits on a locked database before giving up
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5_000,
        }
    }
}

impl DatabaseConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            ..Self::default()
        }
    }
}

impl Validatable for DatabaseConfig {
    fn validate(&self) -> ConfigResult<()> {
        check_range(
            "database.busy_timeout_ms",
            self.busy_timeout_ms,
            1,
            600_000,
            "Use a timeout between 1ms and 10 minutes.",
        )
    }
}

/// Retry budgets for races lost inside the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogSettings {
    /// Re-reads after losing a create race on a (namespace, name) identity
    pub max_conflict_retries: u32,

    /// Re-reads after losing a compare-and-set on a run state pointer
    pub max_transition_retries: u32,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            max_conflict_retries: 5,
            max_transition_retries: 3,
        }
    }
}

impl Validatable for CatalogSettings {
    fn validate(&self) -> ConfigResult<()> {
        check_range(
            "catalog.max_conflict_retries",
            self.max_conflict_retries,
            1,
            100,
            "At least one retry is needed to recover from a lost create race.",
        )?;
        check_range(
            "catalog.max_transition_retries",
            self.max_transition_retries,
            1,
            100,
            "At least one retry is needed to re-validate a stale run state.",
        )
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `"lineage_catalog=debug,info"`
    pub filter: String,

    /// Emit ANSI colors
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            ansi: false,
        }
    }
}

impl Validatable for LoggingConfig {
    fn validate(&self) -> ConfigResult<()> {
        tracing_subscriber::EnvFilter::try_new(&self.filter)
            .map(|_| ())
            .map_err(|e| ConfigError::InvalidFilter {
                filter: self.filter.clone(),
                reason: e.to_string(),
            })
    }
}

/// Complete catalog configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogConfig {
    pub database: DatabaseConfig,
    pub catalog: CatalogSettings,
    pub logging: LoggingConfig,
}

/// YAML Schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFileV1 {
    version: Option<u32>,

    #[serde(default)]
    database: DatabaseConfig,

    #[serde(default)]
    catalog: CatalogSettings,

    #[serde(default)]
    logging: LoggingConfig,
}

impl CatalogConfig {
    /// Load and validate a YAML configuration file
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate YAML configuration text
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let file: ConfigFileV1 = serde_yaml::from_str(content)?;

        let version = file.version.ok_or(ConfigError::MissingVersion)?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(ConfigError::UnsupportedVersion {
                found: version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        let config = Self {
            database: file.database,
            catalog: file.catalog,
            logging: file.logging,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        let file = ConfigFileV1 {
            version: Some(1),
            database: self.database.clone(),
            catalog: self.catalog.clone(),
            logging: self.logging.clone(),
        };
        serde_yaml::to_string(&file).map_err(ConfigError::Yaml)
    }
}

impl Validatable for CatalogConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.database.validate()?;
        self.catalog.validate()?;
        self.logging.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = CatalogConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.database.path, None);
        assert_eq!(config.catalog.max_conflict_retries, 5);
    }

    #[test]
    fn test_yaml_loading() {
        let yaml_content = r#"
version: 1
database:
  path: /tmp/catalog.db
  busy_timeout_ms: 250
catalog:
  max_conflict_retries: 2
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = CatalogConfig::from_yaml(temp_file.path()).unwrap();
        assert_eq!(config.database.path, Some(PathBuf::from("/tmp/catalog.db")));
        assert_eq!(config.database.busy_timeout_ms, 250);
        assert_eq!(config.catalog.max_conflict_retries, 2);
        // untouched sections keep their defaults
        assert_eq!(config.catalog.max_transition_retries, 3);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = CatalogConfig::default();
        config.logging.filter = "lineage_catalog=debug".to_string();

        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("version: 1"));

        let parsed = CatalogConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_yaml_missing_version() {
        let result = CatalogConfig::from_yaml_str("catalog:\n  max_conflict_retries: 2\n");
        assert!(matches!(result, Err(ConfigError::MissingVersion)));
    }

    #[test]
    fn test_yaml_unsupported_version() {
        let result = CatalogConfig::from_yaml_str("version: 2\n");
        assert!(matches!(
            result,
            Err(ConfigError::UnsupportedVersion { found: 2, .. })
        ));
    }

    #[test]
    fn test_yaml_unknown_field_rejected() {
        let result = CatalogConfig::from_yaml_str("version: 1\ncatalog:\n  max_retries: 2\n");
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_range_validation() {
        let result = CatalogConfig::from_yaml_str("version: 1\ncatalog:\n  max_conflict_retries: 0\n");
        assert!(matches!(result, Err(ConfigError::Range { .. })));
    }

    #[test]
    fn test_validation_error_names_the_section() {
        let config = CatalogConfig {
            database: DatabaseConfig {
                busy_timeout_ms: 0,
                ..DatabaseConfig::default()
            },
            ..CatalogConfig::default()
        };
        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("'database.busy_timeout_ms'"), "{}", message);
    }

    #[test]
    fn test_invalid_log_filter() {
        let logging = LoggingConfig {
            filter: "lineage_catalog=notalevel".to_string(),
            ansi: false,
        };
        assert!(matches!(
            logging.validate(),
            Err(ConfigError::InvalidFilter { .. })
        ));
    }
}
