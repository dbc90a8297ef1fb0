//! Error types for the survey repair-and-join pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by any pipeline step.
#[derive(Debug, Error)]
pub enum PipelineError {
    // === File System Errors ===
    /// A source file is missing or unreadable, or an output path is unwritable.
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV reader or writer rejected the file.
    #[error("csv error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    // === Schema Errors ===
    /// Whitelisted columns are absent from a source table.
    #[error("table '{table}' ({path}) is missing column(s): {}", .columns.join(", "))]
    MissingColumns {
        table: String,
        path: PathBuf,
        columns: Vec<String>,
    },

    /// A derived table does not carry a column a later step needs.
    #[error("table '{table}' has no column '{column}'")]
    UnknownColumn { table: String, column: String },

    /// Joining would produce two columns with the same name.
    #[error("table '{table}' would contain column '{column}' twice")]
    DuplicateColumn { table: String, column: String },

    /// Several parent rows share one join key.
    #[error("join '{table}': parent key '{key}' matches {matches} rows")]
    JoinKey {
        table: String,
        key: String,
        matches: usize,
    },

    // === Validation Errors ===
    /// A value needed by a later step is missing or malformed.
    #[error("table '{table}' row {row}: column '{column}' value '{value}' {reason}")]
    Validation {
        table: String,
        row: usize,
        column: String,
        value: String,
        reason: String,
    },

    /// A declared date column holds text that is not a recognised date.
    #[error("table '{table}': column '{column}' has unparseable date '{value}'")]
    InvalidDate {
        table: String,
        column: String,
        value: String,
    },

    // === Configuration Errors ===
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    #[error("failed to parse configuration {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Wraps any failure with the name of the step that raised it.
    #[error("{step} failed: {source}")]
    Step {
        step: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// The innermost error, skipping any `Step` wrappers.
    pub fn root(&self) -> &PipelineError {
        match self {
            Self::Step { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Attaches the originating step name to a failure.
pub trait StepContext<T> {
    fn step(self, name: &str) -> Result<T>;
}

impl<T> StepContext<T> for Result<T> {
    fn step(self, name: &str) -> Result<T> {
        self.map_err(|err| PipelineError::Step {
            step: name.to_string(),
            source: Box::new(err),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_columns_lists_every_column() {
        let err = PipelineError::MissingColumns {
            table: "crew".to_string(),
            path: PathBuf::from("rep_crew_1.csv"),
            columns: vec!["Crew First Name".to_string(), "Creator".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "table 'crew' (rep_crew_1.csv) is missing column(s): Crew First Name, Creator"
        );
    }

    #[test]
    fn step_context_wraps_and_root_unwraps() {
        let failed: Result<()> = Err(PipelineError::config("no tables"));
        let err = failed.step("load_tables").step("join_data").unwrap_err();
        assert_eq!(
            err.to_string(),
            "join_data failed: load_tables failed: invalid configuration: no tables"
        );
        assert!(matches!(err.root(), PipelineError::Config { .. }));
    }
}
