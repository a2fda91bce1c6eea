use shared::catalog::CatalogError;
use std::fmt;
use thiserror::Error;

/// Pipeline stage, carried by fatal errors so a failed run says where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Read,
    Reshape,
    Rates,
    Pivot,
    Assemble,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Config => "config",
            Stage::Read => "read",
            Stage::Reshape => "reshape",
            Stage::Rates => "rates",
            Stage::Pivot => "pivot",
            Stage::Assemble => "assemble",
            Stage::Write => "write",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Metric catalog error: {source}")]
    CatalogError {
        #[from]
        source: CatalogError,
    },

    #[error("CSV parsing system error: {source}")]
    CsvSystemError {
        #[from]
        source: csv::Error,
    },

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("JSON error: {source}")]
    JsonError {
        #[from]
        source: serde_json::Error,
    },

    #[error("Source error: {0}")]
    SourceError(String),

    #[error("Malformed table ({stage} stage): {reason}")]
    MalformedTable { stage: Stage, reason: String },

    #[error("No row matching configured exchange-rate label '{0}' (rates stage)")]
    MissingRateRow(String),

    #[error("Failed to write '{path}': {reason}")]
    WriteError { path: String, reason: String },
}

impl PipelineError {
    pub fn malformed(stage: Stage, reason: impl Into<String>) -> Self {
        PipelineError::MalformedTable { stage, reason: reason.into() }
    }

    /// Stage the error belongs to, for run reports and logs.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::ConfigError(_) | PipelineError::CatalogError { .. } => Stage::Config,
            PipelineError::CsvSystemError { .. }
            | PipelineError::IoError { .. }
            | PipelineError::JsonError { .. }
            | PipelineError::SourceError(_) => Stage::Read,
            PipelineError::MalformedTable { stage, .. } => *stage,
            PipelineError::MissingRateRow(_) => Stage::Rates,
            PipelineError::WriteError { .. } => Stage::Write,
        }
    }
}

impl From<PipelineError> for tonic::Status {
    fn from(err: PipelineError) -> Self {
        tracing::error!(stage = %err.stage(), "Mapping PipelineError to tonic::Status: {:?}", err);
        match err {
            PipelineError::ConfigError(_) | PipelineError::CatalogError { .. } => {
                tonic::Status::failed_precondition(err.to_string())
            }
            PipelineError::IoError { ref source } if source.kind() == std::io::ErrorKind::NotFound => {
                tonic::Status::not_found(err.to_string())
            }
            PipelineError::CsvSystemError { .. }
            | PipelineError::JsonError { .. }
            | PipelineError::SourceError(_)
            | PipelineError::MalformedTable { .. }
            | PipelineError::MissingRateRow(_) => tonic::Status::invalid_argument(err.to_string()),
            PipelineError::IoError { .. } | PipelineError::WriteError { .. } => {
                tonic::Status::internal(err.to_string())
            }
        }
    }
}
