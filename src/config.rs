//! Runtime configuration for the review service and the CLI.
use crate::error::{Result, StorageError, ValidationError};
use crate::models::DiscoveryDue;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DB_PATH_ENV: &str = "VOCAB_SRS_DB";
pub const IMPLICIT_DISCOVERY_ENV: &str = "VOCAB_SRS_IMPLICIT_DISCOVERY";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SchedulerConfig {
    pub database_path: PathBuf,
    /// Discover unknown terms on review instead of failing with `NotFound`.
    pub implicit_discovery: bool,
    pub discovery_due: DiscoveryDue,
    /// Extra read-compute-write cycles after a CAS conflict.
    pub max_conflict_retries: u32,
    pub default_due_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("srs.sqlite3"),
            implicit_discovery: false,
            discovery_due: DiscoveryDue::Immediate,
            max_conflict_retries: 3,
            default_due_limit: 20,
        }
    }
}

impl SchedulerConfig {
    /// Reads a JSON config file; missing fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(StorageError::from)?;
        let config: Self = serde_json::from_str(&contents).map_err(StorageError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Optional file, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.with_overrides(
            std::env::var(DB_PATH_ENV).ok(),
            std::env::var(IMPLICIT_DISCOVERY_ENV).ok(),
        );
        config.validate()?;
        Ok(config)
    }

    fn with_overrides(mut self, db_path: Option<String>, implicit: Option<String>) -> Self {
        if let Some(db_path) = db_path.filter(|p| !p.is_empty()) {
            self.database_path = PathBuf::from(db_path);
        }
        if let Some(flag) = implicit {
            match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.implicit_discovery = true,
                "0" | "false" | "no" => self.implicit_discovery = false,
                other => tracing::warn!(value = other, "ignoring unrecognized {IMPLICIT_DISCOVERY_ENV}"),
            }
        }
        self
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.default_due_limit == 0 {
            return Err(ValidationError::ZeroLimit);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"implicit_discovery": true, "discovery_due": "after_first_review"}}"#
        )
        .unwrap();

        let config = SchedulerConfig::from_file(file.path()).unwrap();
        assert!(config.implicit_discovery);
        assert_eq!(config.discovery_due, DiscoveryDue::AfterFirstReview);
        assert_eq!(config.max_conflict_retries, 3);
        assert_eq!(config.database_path, PathBuf::from("srs.sqlite3"));
    }

    #[test]
    fn test_zero_limit_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"default_due_limit": 0}}"#).unwrap();
        assert!(SchedulerConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = SchedulerConfig::default()
            .with_overrides(Some("/tmp/other.db".to_string()), Some("TRUE".to_string()));
        assert_eq!(config.database_path, PathBuf::from("/tmp/other.db"));
        assert!(config.implicit_discovery);

        let untouched =
            SchedulerConfig::default().with_overrides(Some(String::new()), Some("maybe".into()));
        assert_eq!(untouched, SchedulerConfig::default());
    }
}
