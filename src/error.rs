use thiserror::Error;

use crate::types::SourceTag;

#[derive(Error, Debug)]
pub enum EltError {
    #[error("could not decode {kind} payload in any supported encoding (UTF-8, UTF-16, Latin-1): {reason}")]
    Decode { kind: SourceTag, reason: String },

    #[error("schema error in {context}: {message}")]
    Schema { context: String, message: String },

    /// A single cell failed numeric coercion. Always absorbed by the caller.
    #[error("cannot parse '{value}' as {target}")]
    Parse { value: String, target: &'static str },

    #[error("sink error writing {target}: {message}")]
    Sink { target: String, message: String },

    #[error("artifact error: {0}")]
    Artifact(String),

    #[error("invalid task graph: {0}")]
    Graph(String),

    #[error("task '{task}' failed: {source}")]
    Task {
        task: String,
        #[source]
        source: Box<EltError>,
    },

    /// A unit's task ended without returning, e.g. it panicked.
    #[error("unit aborted: {0}")]
    Aborted(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl EltError {
    pub fn missing_column(context: impl Into<String>, column: &str) -> Self {
        EltError::Schema {
            context: context.into(),
            message: format!("expected column '{column}' is absent"),
        }
    }

    pub fn sink(target: impl Into<String>, message: impl ToString) -> Self {
        EltError::Sink {
            target: target.into(),
            message: message.to_string(),
        }
    }

    /// Name of the unit that originated a task failure, if this is one.
    pub fn failed_task(&self) -> Option<&str> {
        match self {
            EltError::Task { task, .. } => Some(task),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EltError>;
