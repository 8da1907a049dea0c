//! Error types for the record marshalling library.

use thiserror::Error;

use crate::dialect::validator::ValidationFailure;

/// Main error type for type mapping and marshalling operations.
#[derive(Error, Debug)]
pub enum RecordError {
    /// No universal type exists for a driver column type.
    ///
    /// Fatal: no useful schema can be produced without a dialect change.
    #[error("Unsupported column type for '{column}': type code {code} ({name})")]
    UnsupportedType {
        column: String,
        code: i32,
        name: String,
    },

    /// A single field of a row could not be read or written.
    #[error("Row conversion failed for field '{field}': {message}")]
    RowConversion { field: String, message: String },

    /// Driver registration or connection failure with context
    #[error("Resource acquisition failed: {message}\n  Context: {context}")]
    ResourceAcquisition { message: String, context: String },

    /// A declared schema did not match the database's column metadata.
    #[error("Schema validation failed with {} problem(s): {}", .0.len(), summarize(.0))]
    Validation(Vec<ValidationFailure>),

    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn summarize(failures: &[ValidationFailure]) -> String {
    failures
        .iter()
        .map(|f| f.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl RecordError {
    /// Create an UnsupportedType error.
    pub fn unsupported(column: impl Into<String>, code: i32, name: impl Into<String>) -> Self {
        RecordError::UnsupportedType {
            column: column.into(),
            code,
            name: name.into(),
        }
    }

    /// Create a RowConversion error for a field.
    pub fn conversion(field: impl Into<String>, message: impl Into<String>) -> Self {
        RecordError::RowConversion {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a ResourceAcquisition error with context about where it occurred
    pub fn resource(message: impl ToString, context: impl Into<String>) -> Self {
        RecordError::ResourceAcquisition {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Whether the error aborts the whole work unit.
    ///
    /// Everything except a collected validation report is fatal for the unit
    /// that raised it.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RecordError::Validation(_))
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            RecordError::Validation(_) => 2,
            RecordError::UnsupportedType { .. } => 3,
            RecordError::RowConversion { .. } => 4,
            RecordError::ResourceAcquisition { .. } => 5,
            RecordError::Config(_)
            | RecordError::Io(_)
            | RecordError::Yaml(_)
            | RecordError::Json(_) => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        if let RecordError::Validation(failures) = self {
            for failure in failures {
                output.push_str(&format!("\n  - {}", failure));
            }
        }

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for marshalling operations.
pub type Result<T> = std::result::Result<T, RecordError>;
