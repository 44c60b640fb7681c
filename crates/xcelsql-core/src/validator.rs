//! Query policy checks
//!
//! Classifies raw query text before any rewriting happens: the statement must
//! be a `SELECT`, must not contain forbidden keywords outside string literals,
//! and every `{Sheet}` placeholder must name a known sheet.

use crate::error::{Result, ValidationError};
use crate::policy::ValidationPolicy;
use crate::scanner::mask_string_literals;
use lazy_regex::regex;

/// Inner names of every `{...}` placeholder, in order of appearance
pub fn extract_placeholders(query: &str) -> Vec<&str> {
    regex!(r"\{([^{}]+)\}")
        .captures_iter(query)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect()
}

/// Validate a query with the standard policy
///
/// See [`QueryValidator::validate`].
pub fn validate_query<S: AsRef<str>>(query: &str, known_sheets: &[S], strict: bool) -> Result<()> {
    QueryValidator::default().validate(query, known_sheets, strict)
}

/// Validate sheet names with the standard policy
///
/// See [`QueryValidator::validate_sheet_names`].
pub fn validate_sheet_names<S: AsRef<str>>(sheet_names: &[S], strict: bool) -> Result<()> {
    QueryValidator::default().validate_sheet_names(sheet_names, strict)
}

/// Read-only query classifier backed by a [`ValidationPolicy`]
#[derive(Debug, Clone, Default)]
pub struct QueryValidator {
    policy: ValidationPolicy,
}

impl QueryValidator {
    /// Create a validator with a custom policy
    pub fn new(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    /// The policy in use
    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Check `query` against the policy
    ///
    /// An empty query is accepted; the caller substitutes a default select.
    /// Checks run in order and the first failure is returned:
    /// 1. first keyword must be `SELECT`
    /// 2. no forbidden keyword outside string literals
    /// 3. in strict mode at least one placeholder
    /// 4. every placeholder names one of `known_sheets` exactly
    pub fn validate<S: AsRef<str>>(&self, query: &str, known_sheets: &[S], strict: bool) -> Result<()> {
        if query.is_empty() {
            return Ok(());
        }

        let first_keyword: String = query
            .trim_start()
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if !first_keyword.eq_ignore_ascii_case("SELECT") {
            return Err(ValidationError::NotASelect);
        }

        let masked = mask_string_literals(query);
        if let Some(token) = self.policy.find_forbidden(&masked) {
            tracing::debug!(%token, "query rejected by keyword policy");
            return Err(ValidationError::ForbiddenToken(token));
        }

        let placeholders = extract_placeholders(query);
        if strict && placeholders.is_empty() {
            return Err(ValidationError::NoPlaceholders);
        }

        for name in placeholders {
            if !known_sheets.iter().any(|known| known.as_ref() == name) {
                return Err(ValidationError::UnknownSheet {
                    name: name.to_string(),
                    known: known_sheets
                        .iter()
                        .map(|s| s.as_ref().to_string())
                        .collect(),
                });
            }
        }

        Ok(())
    }

    /// In strict mode, check every sheet name against the naming pattern
    pub fn validate_sheet_names<S: AsRef<str>>(&self, sheet_names: &[S], strict: bool) -> Result<()> {
        if !strict {
            return Ok(());
        }

        for name in sheet_names {
            let name = name.as_ref();
            if !self.policy.is_valid_sheet_name(name) {
                return Err(ValidationError::InvalidSheetName {
                    name: name.to_string(),
                    pattern: self.policy.sheet_name_pattern().to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationErrorKind;

    const SHEETS: &[&str] = &["S", "Sales Data"];

    fn kind(query: &str, strict: bool) -> Option<ValidationErrorKind> {
        validate_query(query, SHEETS, strict).err().map(|e| e.kind())
    }

    #[test]
    fn test_accepts_select() {
        assert!(validate_query("SELECT * FROM {S}", SHEETS, false).is_ok());
        assert!(validate_query("  select a FROM {Sales Data}", SHEETS, true).is_ok());
        assert!(validate_query("SELECT 1", SHEETS, false).is_ok());
    }

    #[test]
    fn test_empty_query_is_accepted() {
        assert!(validate_query("", SHEETS, true).is_ok());
    }

    #[test]
    fn test_rejects_non_select() {
        assert_eq!(kind("DELETE FROM {S}", false), Some(ValidationErrorKind::NotASelect));
        assert_eq!(kind("WITH x AS (SELECT 1) SELECT * FROM x", false), Some(ValidationErrorKind::NotASelect));
        assert_eq!(kind("SELECTED * FROM {S}", false), Some(ValidationErrorKind::NotASelect));
        assert_eq!(kind("   ", false), Some(ValidationErrorKind::NotASelect));
    }

    #[test]
    fn test_rejects_forbidden_tokens() {
        assert_eq!(
            validate_query("SELECT * FROM {S}; DROP TABLE s", SHEETS, false),
            Err(ValidationError::ForbiddenToken("DROP".into()))
        );
        assert_eq!(
            validate_query("SELECT * FROM {S} WHERE x = 1; delete from s", SHEETS, false),
            Err(ValidationError::ForbiddenToken("DELETE".into()))
        );
    }

    #[test]
    fn test_keywords_inside_literals_are_allowed() {
        assert!(validate_query(
            "SELECT * FROM {S} WHERE note = 'please DROP by, it''s the END'",
            SHEETS,
            false
        )
        .is_ok());
    }

    #[test]
    fn test_strict_requires_placeholders() {
        assert_eq!(kind("SELECT 1", true), Some(ValidationErrorKind::NoPlaceholders));
        assert_eq!(kind("SELECT 1", false), None);
    }

    #[test]
    fn test_unknown_sheet() {
        assert_eq!(
            validate_query("SELECT * FROM {X}", &["S"], true),
            Err(ValidationError::UnknownSheet {
                name: "X".into(),
                known: vec!["S".into()],
            })
        );
        // Placeholder matching is case-sensitive
        assert_eq!(kind("SELECT * FROM {s}", false), Some(ValidationErrorKind::UnknownSheet));
    }

    #[test]
    fn test_extract_placeholders() {
        assert_eq!(
            extract_placeholders("SELECT * FROM {A} JOIN {B C} ON {A}.x = {B C}.x"),
            vec!["A", "B C", "A", "B C"]
        );
        assert_eq!(extract_placeholders("SELECT '{}' FROM {{A}}"), vec!["A"]);
    }

    #[test]
    fn test_validate_sheet_names() {
        assert!(validate_sheet_names(&["Sales Data"], false).is_ok());
        assert!(validate_sheet_names(&["Sales", "Costs_2024"], true).is_ok());
        assert_eq!(
            validate_sheet_names(&["Sales", "Sales Data"], true),
            Err(ValidationError::InvalidSheetName {
                name: "Sales Data".into(),
                pattern: r"^[A-Za-z][A-Za-z0-9_]*$".into(),
            })
        );
    }
}
