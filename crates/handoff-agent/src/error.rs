//! Error types for the handoff agent
//!
//! One variant family per failure category: configuration, extraction,
//! collection, upload and trigger. Configuration problems are gathered
//! into [`ValidationErrors`], one line per key; every other message is a
//! single line.

use std::fmt;
use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// A single configuration problem attached to the key that caused it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub key: String,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

/// Every configuration problem found in one resolution pass, in the order
/// the keys were examined
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            key: key.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|e| e.key == key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.message.as_str())
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Comprehensive error type for a handoff run
#[derive(Error, Debug)]
pub enum AgentError {
    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------
    #[error("{0}")]
    InvalidConfiguration(ValidationErrors),

    #[error("Cannot read configuration file '{path}': {reason}")]
    ConfigFile { path: String, reason: String },

    // ------------------------------------------------------------------
    // Extraction
    // ------------------------------------------------------------------
    #[error("No files matching '{pattern}' found under '{dir}'")]
    NoMatchingFiles { pattern: String, dir: String },

    #[error("Invalid file pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Unknown database driver '{driver}' (known drivers: {known})")]
    UnknownDriver { driver: String, known: String },

    #[error("Invalid connection settings for driver '{driver}': {reason}")]
    InvalidConnection { driver: String, reason: String },

    #[error("Cannot read the driver file '{path}': {reason}")]
    DriverPath { path: String, reason: String },

    #[error("Error extracting dataset '{dataset}' from database: {source}")]
    Query {
        dataset: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cannot write extract: {0}")]
    Csv(#[from] csv::Error),

    // ------------------------------------------------------------------
    // Collection
    // ------------------------------------------------------------------
    #[error("Cannot build the archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    // ------------------------------------------------------------------
    // Upload
    // ------------------------------------------------------------------
    #[error("Upload of '{file}' failed: {status_text} (status code = {status}); temporary target was {temp_url}")]
    UploadRejected {
        file: String,
        temp_url: String,
        status: u16,
        status_text: String,
    },

    #[error("Upload of '{file}' to {temp_url} failed: {source}")]
    UploadTransport {
        file: String,
        temp_url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Move failed: {status_text} (status code = {status}); file '{file}' uploaded to {temp_url} but not published as {target_url}")]
    MoveRejected {
        file: String,
        temp_url: String,
        target_url: String,
        status: u16,
        status_text: String,
    },

    #[error("Remote store protocol error: {0}")]
    Protocol(String),

    #[error("Move of {temp_url} to {target_url} failed: {source}; file is left at {temp_url}")]
    MoveTransport {
        temp_url: String,
        target_url: String,
        #[source]
        source: reqwest::Error,
    },

    // ------------------------------------------------------------------
    // Trigger
    // ------------------------------------------------------------------
    #[error("ETL trigger failed: {0}")]
    Trigger(String),

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------
    #[error("Network request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] handoff_common::CommonError),
}

impl AgentError {
    pub fn config_file(path: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::ConfigFile {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn no_matching_files(pattern: impl Into<String>, dir: impl Into<String>) -> Self {
        Self::NoMatchingFiles {
            pattern: pattern.into(),
            dir: dir.into(),
        }
    }

    pub fn trigger(msg: impl Into<String>) -> Self {
        Self::Trigger(msg.into())
    }

    /// Short label used in structured log records
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration(_) | Self::ConfigFile { .. } => "configuration",
            Self::NoMatchingFiles { .. }
            | Self::InvalidPattern { .. }
            | Self::UnknownDriver { .. }
            | Self::InvalidConnection { .. }
            | Self::DriverPath { .. }
            | Self::Query { .. }
            | Self::Database(_)
            | Self::Csv(_) => "extraction",
            Self::Archive(_) => "collection",
            Self::UploadRejected { .. }
            | Self::UploadTransport { .. }
            | Self::MoveRejected { .. }
            | Self::MoveTransport { .. }
            | Self::Protocol(_) => "upload",
            Self::Trigger(_) => "trigger",
            Self::Http(_) | Self::Io(_) | Self::Common(_) => "io",
        }
    }
}

impl From<ValidationErrors> for AgentError {
    fn from(errors: ValidationErrors) -> Self {
        Self::InvalidConfiguration(errors)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_render_one_line_per_key() {
        let mut errors = ValidationErrors::new();
        errors.push("store.username", "store.username is a mandatory property");
        errors.push("store.password", "store.password is a mandatory property");

        let rendered = errors.to_string();
        assert_eq!(rendered.lines().count(), 2);
        assert!(rendered.starts_with("store.username: "));
        assert!(errors.contains_key("store.password"));
        assert!(!errors.contains_key("store.upload_url"));
    }

    #[test]
    fn test_upload_rejection_names_temp_target() {
        let err = AgentError::UploadRejected {
            file: "/tmp/data.zip".to_string(),
            temp_url: "https://dav.example.com/in/data.zip.1700000000000".to_string(),
            status: 507,
            status_text: "Insufficient Storage".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("data.zip.1700000000000"));
        assert!(msg.contains("507"));
        assert_eq!(err.category(), "upload");
    }
}
