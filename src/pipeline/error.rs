//! Error taxonomy for the medallion pipeline
//!
//! Every error aborts the run. `StageError` tags the failure with the stage
//! that produced it so the runtime can report where the run stopped.

use std::path::PathBuf;

#[derive(Debug)]
pub enum PipelineError {
    /// Input file does not exist
    NotFound(PathBuf),
    /// Malformed date, non-numeric amount, missing or empty column
    Parse { line: u64, message: String },
    /// Row passed parsing but cannot be aggregated
    Validation(String),
    /// Datastore unreachable, not provisioned, or handle unusable
    Connection(String),
    /// Bulk insert failed
    Write {
        table: &'static str,
        batch: usize,
        message: String,
    },
    /// Write stage exceeded its configured timeout
    Timeout { stage: Stage, secs: u64 },
    Io(std::io::Error),
}

impl PipelineError {
    pub fn parse(line: u64, message: impl Into<String>) -> Self {
        PipelineError::Parse {
            line,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err)
    }
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        match err.into_kind() {
            csv::ErrorKind::Io(e) => PipelineError::Io(e),
            kind => PipelineError::parse(line, format!("{:?}", kind)),
        }
    }
}

impl From<rusqlite::Error> for PipelineError {
    fn from(err: rusqlite::Error) -> Self {
        PipelineError::Connection(err.to_string())
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::NotFound(path) => {
                write!(f, "Input file not found: {}", path.display())
            }
            PipelineError::Parse { line, message } => {
                write!(f, "Parse error at line {}: {}", line, message)
            }
            PipelineError::Validation(msg) => write!(f, "Validation error: {}", msg),
            PipelineError::Connection(msg) => write!(f, "Connection error: {}", msg),
            PipelineError::Write {
                table,
                batch,
                message,
            } => write!(
                f,
                "Write error on {} (batch {}): {}",
                table, batch, message
            ),
            PipelineError::Timeout { stage, secs } => {
                write!(f, "Stage {} timed out after {}s", stage, secs)
            }
            PipelineError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Load,
    Bronze,
    Transform,
    Silver,
    Aggregate,
    Gold,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Load => "LOAD",
            Stage::Bronze => "BRONZE",
            Stage::Transform => "TRANSFORM",
            Stage::Silver => "SILVER",
            Stage::Aggregate => "AGGREGATE",
            Stage::Gold => "GOLD",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `PipelineError` tagged with the stage that failed
#[derive(Debug)]
pub struct StageError {
    pub stage: Stage,
    pub source: PipelineError,
}

impl StageError {
    pub fn new(stage: Stage, source: PipelineError) -> Self {
        Self { stage, source }
    }
}

impl std::fmt::Display for StageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stage {} failed: {}", self.stage, self.source)
    }
}

impl std::error::Error for StageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_names_stage() {
        let err = StageError::new(
            Stage::Bronze,
            PipelineError::Write {
                table: "bronze_sales",
                batch: 2,
                message: "disk I/O error".to_string(),
            },
        );

        let msg = err.to_string();
        assert!(msg.contains("BRONZE"));
        assert!(msg.contains("bronze_sales"));
        assert!(msg.contains("batch 2"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: PipelineError = io.into();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
