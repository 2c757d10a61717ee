//! Pipeline configuration from environment variables

use super::error::ConfigError;
use super::identity::IdStrategy;
use std::env;
use std::time::Duration;

/// Configuration for one medallion run
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Path to the source CSV file
    pub source_path: String,

    /// Path to SQLite database file
    pub db_path: String,

    /// Directory holding the `*.sql` migrations
    pub schema_dir: String,

    /// Rows per bulk INSERT statement
    pub batch_size: usize,

    /// How ids are generated for bronze/silver rows
    pub id_strategy: IdStrategy,

    /// Optional timeout applied to each write stage, in seconds
    pub stage_timeout_secs: Option<u64>,

    /// Print gold tables after a successful run
    pub report: bool,
}

impl PipelineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `MEDALLION_SOURCE_PATH` (default: sales_100.csv)
    /// - `MEDALLION_DB_PATH` (default: data/medallion.db)
    /// - `MEDALLION_SCHEMA_DIR` (default: sql)
    /// - `MEDALLION_BATCH_SIZE` (default: 100)
    /// - `MEDALLION_ID_STRATEGY` (default: random; `content` for derived ids)
    /// - `MEDALLION_STAGE_TIMEOUT_SECS` (default: unset)
    /// - `MEDALLION_REPORT` (default: true)
    pub fn from_env() -> Result<Self, ConfigError> {
        let id_strategy = match env::var("MEDALLION_ID_STRATEGY") {
            Ok(value) => IdStrategy::parse(&value).ok_or_else(|| {
                ConfigError::InvalidValue(format!(
                    "MEDALLION_ID_STRATEGY must be 'random' or 'content', got '{}'",
                    value
                ))
            })?,
            Err(_) => IdStrategy::default(),
        };

        let config = Self {
            source_path: env::var("MEDALLION_SOURCE_PATH")
                .unwrap_or_else(|_| "sales_100.csv".to_string()),

            db_path: env::var("MEDALLION_DB_PATH")
                .unwrap_or_else(|_| "data/medallion.db".to_string()),

            schema_dir: env::var("MEDALLION_SCHEMA_DIR").unwrap_or_else(|_| "sql".to_string()),

            batch_size: env::var("MEDALLION_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),

            id_strategy,

            stage_timeout_secs: env::var("MEDALLION_STAGE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),

            report: env::var("MEDALLION_REPORT")
                .ok()
                .and_then(|s| s.to_lowercase().parse().ok())
                .unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue(
                "MEDALLION_BATCH_SIZE must be at least 1".to_string(),
            ));
        }

        if self.stage_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "MEDALLION_STAGE_TIMEOUT_SECS must be positive when set".to_string(),
            ));
        }

        Ok(())
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_secs.map(Duration::from_secs)
    }
}
