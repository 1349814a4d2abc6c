//! Validated name newtypes
//!
//! Names are checked once on construction so every layer below the API can
//! treat them as well-formed.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CatalogError, Result};

/// Upper bound on every catalog name
pub const MAX_NAME_LEN: usize = 1024;

fn validate_any(kind: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CatalogError::InvalidName(format!("{} must not be blank", kind)));
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(CatalogError::InvalidName(format!(
            "{} longer than {} characters",
            kind, MAX_NAME_LEN
        )));
    }
    Ok(())
}

// Namespaces appear in URLs, so the alphabet is restricted.
fn validate_namespace(kind: &str, value: &str) -> Result<()> {
    validate_any(kind, value)?;
    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(CatalogError::InvalidName(format!(
            "{} '{}' contains invalid character {:?}",
            kind, value, c
        )));
    }
    Ok(())
}

macro_rules! name_type {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $validate:path) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Result<Self> {
                let value = value.into();
                $validate($kind, &value)?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = CatalogError;

            fn try_from(value: String) -> Result<Self> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = CatalogError;

            fn try_from(value: &str) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(name: $name) -> String {
                name.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

name_type!(
    /// Namespace name, `[A-Za-z0-9_.-]{1,1024}`
    NamespaceName,
    "namespace name",
    validate_namespace
);
name_type!(
    /// Dataset name (logical or physical)
    DatasetName,
    "dataset name",
    validate_any
);
name_type!(JobName, "job name", validate_any);
name_type!(SourceName, "source name", validate_any);
name_type!(OwnerName, "owner name", validate_any);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert_eq!(NamespaceName::new("warehouse").unwrap().as_str(), "warehouse");
        assert!(NamespaceName::new("team-a.prod_1").is_ok());
        assert!(DatasetName::new("public.events").is_ok());
        assert!(JobName::new("daily etl / load").is_ok());
    }

    #[test]
    fn test_blank_names_rejected() {
        assert!(matches!(
            DatasetName::new("   "),
            Err(CatalogError::InvalidName(_))
        ));
        assert!(JobName::new("").is_err());
        assert!(SourceName::new("\t").is_err());
    }

    #[test]
    fn test_namespace_alphabet() {
        assert!(NamespaceName::new("has space").is_err());
        assert!(NamespaceName::new("slash/ns").is_err());
    }

    #[test]
    fn test_length_limit() {
        let long = "a".repeat(MAX_NAME_LEN + 1);
        assert!(DatasetName::new(long).is_err());
        let max = "a".repeat(MAX_NAME_LEN);
        assert!(NamespaceName::new(max).is_ok());
    }

    #[test]
    fn test_serde_validates() {
        let name: DatasetName = serde_json::from_str("\"events\"").unwrap();
        assert_eq!(name.to_string(), "events");
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"events\"");

        assert!(serde_json::from_str::<NamespaceName>("\"bad ns\"").is_err());
    }
}
