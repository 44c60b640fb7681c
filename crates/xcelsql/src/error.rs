//! Error types for xcelsql

use thiserror::Error;
use xcelsql_core::ValidationError;
use xcelsql_expr::{EvalError, RegistryError};

/// Result type alias using [`enum@Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// Query or sheet policy violation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Expression failed to parse or evaluate
    #[error("Expression error: {0}")]
    Eval(#[from] EvalError),

    /// Function registration failed
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A query was prepared without any sheet in scope
    #[error("No sheet data provided")]
    NoSheets,

    /// Template mapping could not be built
    #[error("Template error: {0}")]
    Template(String),

    /// A column expression failed with fail-on-error set
    #[error("Mapping error column={column} row={row}: {source}")]
    Mapping {
        column: String,
        row: usize,
        source: EvalError,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The external query engine failed
    #[error("Query execution failed: {0}")]
    Engine(String),

    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
