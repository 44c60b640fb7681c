//! Error types for xcelsql-core

use thiserror::Error;

/// Result type alias using [`ValidationError`]
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Query and sheet policy violations.
///
/// Every variant aborts the pipeline before any placeholder or parameter
/// rewriting is applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The statement is not a `SELECT`
    #[error("Only SELECT queries are permitted")]
    NotASelect,

    /// A data-mutating or session-control keyword appeared outside string literals
    #[error("Query contains forbidden token: {0}")]
    ForbiddenToken(String),

    /// Strict mode requires at least one `{Sheet}` placeholder
    #[error("No sheet placeholders found in query under strict mode")]
    NoPlaceholders,

    /// A placeholder names a sheet that is not loaded
    #[error("Query references unknown sheet: '{name}' (available: {})", known.join(", "))]
    UnknownSheet { name: String, known: Vec<String> },

    /// Sheet name rejected by the strict naming pattern
    #[error("Sheet name '{name}' fails strict pattern {pattern}")]
    InvalidSheetName { name: String, pattern: String },

    /// Malformed `Sheet[:header]` specification
    #[error("Invalid header row spec in '{0}'. Use integer or 'auto'.")]
    InvalidSheetSpec(String),
}

/// Discriminant of a [`ValidationError`], for callers that branch on the kind only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    NotASelect,
    ForbiddenToken,
    NoPlaceholders,
    UnknownSheet,
    InvalidSheetName,
    InvalidSheetSpec,
}

impl ValidationError {
    /// Get the kind of this error
    pub fn kind(&self) -> ValidationErrorKind {
        match self {
            ValidationError::NotASelect => ValidationErrorKind::NotASelect,
            ValidationError::ForbiddenToken(_) => ValidationErrorKind::ForbiddenToken,
            ValidationError::NoPlaceholders => ValidationErrorKind::NoPlaceholders,
            ValidationError::UnknownSheet { .. } => ValidationErrorKind::UnknownSheet,
            ValidationError::InvalidSheetName { .. } => ValidationErrorKind::InvalidSheetName,
            ValidationError::InvalidSheetSpec(_) => ValidationErrorKind::InvalidSheetSpec,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_sheet_lists_known() {
        let err = ValidationError::UnknownSheet {
            name: "X".into(),
            known: vec!["Sales".into(), "Costs".into()],
        };
        assert_eq!(
            err.to_string(),
            "Query references unknown sheet: 'X' (available: Sales, Costs)"
        );
        assert_eq!(err.kind(), ValidationErrorKind::UnknownSheet);
    }
}
