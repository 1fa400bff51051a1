//! Error types for the data-loader crate.
//!
//! Every failure while reading or validating a snapshot directory maps to one
//! of these variants. Parse errors carry the file and line so a broken offline
//! build can be traced back to the record that caused it.

use crate::types::Namespace;
use thiserror::Error;

/// Errors that can occur while loading a similarity snapshot
#[derive(Error, Debug)]
pub enum DataLoadError {
    /// Snapshot directory or required table is missing
    #[error("Snapshot file not found: {path}")]
    FileNotFound { path: String },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Line in a snapshot file couldn't be parsed
    #[error("Parse error at line {line} in {file}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },

    /// The id <-> index mapping of a namespace is not a bijection
    #[error("Invalid {namespace} index mapping: {reason}")]
    IndexMapping { namespace: Namespace, reason: String },

    /// A data field had an invalid value
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Referenced entity doesn't exist (e.g. a neighbor index outside the namespace)
    #[error("Missing reference: {entity} with id {id}")]
    MissingReference { entity: String, id: String },
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DataLoadError>;
