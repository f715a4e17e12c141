// ⚠️ Error taxonomy for a conversion run
// Parsing-stage errors are fatal: a run produces a complete table or nothing.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    /// A date or name string does not have its expected shape
    #[error("Format error: {0}")]
    Format(String),

    /// A column every export of this source must carry is missing
    #[error("Missing required column '{column}' in {source_name}")]
    MissingColumn { source_name: String, column: String },

    #[error("Identity document error: {0}")]
    Document(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReconcileError {
    pub fn format(message: impl Into<String>) -> Self {
        ReconcileError::Format(message.into())
    }

    pub fn missing_column(source_name: &str, column: &str) -> Self {
        ReconcileError::MissingColumn {
            source_name: source_name.to_string(),
            column: column.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
