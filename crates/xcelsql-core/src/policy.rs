//! Validation policy: forbidden SQL keywords and the strict sheet name pattern

use lazy_regex::regex;
use regex::Regex;

/// Data-mutating and session/transaction-control keywords rejected in queries
pub const FORBIDDEN_SQL_TOKENS: &[&str] = &[
    "CREATE",
    "ALTER",
    "DROP",
    "TRUNCATE",
    "DELETE",
    "UPDATE",
    "INSERT",
    "MERGE",
    "GRANT",
    "REVOKE",
    "COMMIT",
    "ROLLBACK",
    "SAVEPOINT",
    "CONNECT",
    "SET",
    "PRAGMA",
    "COPY",
    "VACUUM",
    "ANALYZE",
    "ATTACH",
    "DETACH",
    "BEGIN",
    "END",
    "TRANSACTION",
];

/// Sheet names accepted in strict mode
pub const STRICT_SHEET_NAME_PATTERN: &str = r"^[A-Za-z][A-Za-z0-9_]*$";

/// Immutable rule set used by the query validator
///
/// The standard policy is built from compile-time checked patterns; custom
/// policies are compiled once in [`ValidationPolicy::new`] and never derived
/// from query text.
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    forbidden: Regex,
    sheet_name: Regex,
}

impl ValidationPolicy {
    /// Build a policy from a keyword list and a sheet name pattern
    pub fn new(forbidden_tokens: &[&str], sheet_name_pattern: &str) -> Result<Self, regex::Error> {
        let alternation = forbidden_tokens
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");
        Ok(Self {
            forbidden: Regex::new(&format!(r"(?i)\b({})\b", alternation))?,
            sheet_name: Regex::new(sheet_name_pattern)?,
        })
    }

    /// The default policy ([`FORBIDDEN_SQL_TOKENS`], [`STRICT_SHEET_NAME_PATTERN`])
    pub fn standard() -> Self {
        Self {
            forbidden: Regex::clone(regex!(
                r"(?i)\b(CREATE|ALTER|DROP|TRUNCATE|DELETE|UPDATE|INSERT|MERGE|GRANT|REVOKE|COMMIT|ROLLBACK|SAVEPOINT|CONNECT|SET|PRAGMA|COPY|VACUUM|ANALYZE|ATTACH|DETACH|BEGIN|END|TRANSACTION)\b"
            )),
            sheet_name: Regex::clone(regex!(r"^[A-Za-z][A-Za-z0-9_]*$")),
        }
    }

    /// First forbidden keyword (upper-cased) found as a whole word in `text`
    pub fn find_forbidden(&self, text: &str) -> Option<String> {
        self.forbidden
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_uppercase())
    }

    /// Whether `name` satisfies the strict sheet name pattern
    pub fn is_valid_sheet_name(&self, name: &str) -> bool {
        self.sheet_name.is_match(name)
    }

    /// Source of the sheet name pattern, for diagnostics
    pub fn sheet_name_pattern(&self) -> &str {
        self.sheet_name.as_str()
    }
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_matches_token_list() {
        let policy = ValidationPolicy::standard();
        for token in FORBIDDEN_SQL_TOKENS {
            assert_eq!(
                policy.find_forbidden(&format!("select x {} y", token.to_lowercase())),
                Some(token.to_string())
            );
        }
        assert_eq!(policy.sheet_name_pattern(), STRICT_SHEET_NAME_PATTERN);
    }

    #[test]
    fn test_whole_words_only() {
        let policy = ValidationPolicy::standard();
        assert_eq!(policy.find_forbidden("SELECT updated_at, offset FROM t"), None);
        assert_eq!(policy.find_forbidden("SELECT created FROM t"), None);
        assert_eq!(
            policy.find_forbidden("SELECT 1; drop table t"),
            Some("DROP".to_string())
        );
    }

    #[test]
    fn test_custom_policy() {
        let policy = ValidationPolicy::new(&["LOAD"], r"^[a-z]+$").unwrap();
        assert_eq!(policy.find_forbidden("LOAD x"), Some("LOAD".to_string()));
        assert_eq!(policy.find_forbidden("DROP x"), None);
        assert!(policy.is_valid_sheet_name("abc"));
        assert!(!policy.is_valid_sheet_name("Abc"));
    }

    #[test]
    fn test_sheet_name_pattern() {
        let policy = ValidationPolicy::standard();
        assert!(policy.is_valid_sheet_name("Sales_2024"));
        assert!(!policy.is_valid_sheet_name("2024Sales"));
        assert!(!policy.is_valid_sheet_name("Sales Data"));
        assert!(!policy.is_valid_sheet_name("_hidden"));
    }
}
