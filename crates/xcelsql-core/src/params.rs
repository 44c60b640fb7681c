//! `:name` parameter substitution
//!
//! Parameter values are inlined as SQL string literals with embedded single
//! quotes doubled, or as `NULL` for a missing value. All parameters are
//! substituted in one pass over the original text, so a substituted value is
//! never scanned again for further `:name` tokens.

use crate::scanner::{Segment, SqlScanner};
use lazy_regex::regex;
use std::collections::BTreeMap;

/// Parameter name to value; `None` is rendered as `NULL`
pub type SqlParams = BTreeMap<String, Option<String>>;

/// Whether `name` is usable as a parameter name
pub fn is_param_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Render a value as a SQL literal
pub fn quote_literal(value: Option<&str>) -> String {
    match value {
        Some(v) => format!("'{}'", v.replace('\'', "''")),
        None => "NULL".to_string(),
    }
}

/// Substitute `:name` tokens in `sql`
///
/// Returns `sql` unchanged when `params` is absent or empty. Tokens whose
/// name is not a valid identifier or has no entry in `params` are left as
/// they are, as are `::` casts and anything inside quotes.
pub fn apply_params(sql: &str, params: Option<&SqlParams>) -> String {
    let params = match params {
        Some(p) if !p.is_empty() => p,
        _ => return sql.to_string(),
    };

    let token = regex!(r":(\w+)");
    let mut out = String::with_capacity(sql.len());
    let mut substituted = 0usize;

    for segment in SqlScanner::new(sql) {
        let text = match segment {
            Segment::Text(text) => text,
            other => {
                out.push_str(other.as_str());
                continue;
            }
        };

        let mut last = 0;
        for caps in token.captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if !is_param_name(name.as_str()) || text[..whole.start()].ends_with(':') {
                continue;
            }
            if let Some(value) = params.get(name.as_str()) {
                out.push_str(&text[last..whole.start()]);
                out.push_str(&quote_literal(value.as_deref()));
                last = whole.end();
                substituted += 1;
            }
        }
        out.push_str(&text[last..]);
    }

    tracing::debug!(substituted, "applied query parameters");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn params(pairs: &[(&str, Option<&str>)]) -> SqlParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect()
    }

    #[test]
    fn test_basic_substitution() {
        let p = params(&[("param", Some("value"))]);
        assert_eq!(
            apply_params("SELECT * FROM t WHERE col = :param", Some(&p)),
            "SELECT * FROM t WHERE col = 'value'"
        );
    }

    #[test]
    fn test_escaping_quotes() {
        let p = params(&[("name", Some("O'Brien"))]);
        assert_eq!(
            apply_params("SELECT * FROM t WHERE name = :name", Some(&p)),
            "SELECT * FROM t WHERE name = 'O''Brien'"
        );
    }

    #[test]
    fn test_injection_attempt_stays_a_literal() {
        let p = params(&[("name", Some("'; DROP TABLE users; --"))]);
        assert_eq!(
            apply_params("SELECT * FROM t WHERE name = :name", Some(&p)),
            "SELECT * FROM t WHERE name = '''; DROP TABLE users; --'"
        );
    }

    #[test]
    fn test_null_value() {
        let p = params(&[("param", None)]);
        assert_eq!(
            apply_params("SELECT * FROM t WHERE col = :param", Some(&p)),
            "SELECT * FROM t WHERE col = NULL"
        );
    }

    #[test]
    fn test_multiple_params_and_repeats() {
        let p = params(&[("a", Some("1")), ("b", Some("2"))]);
        assert_eq!(
            apply_params("WHERE x = :a AND y = :b OR z = :a", Some(&p)),
            "WHERE x = '1' AND y = '2' OR z = '1'"
        );
    }

    #[test]
    fn test_empty_or_missing_params() {
        let sql = "SELECT * FROM t WHERE col = :param";
        assert_eq!(apply_params(sql, None), sql);
        assert_eq!(apply_params(sql, Some(&SqlParams::new())), sql);
        let p = params(&[("other", Some("v"))]);
        assert_eq!(apply_params("SELECT * FROM t", Some(&p)), "SELECT * FROM t");
    }

    #[test]
    fn test_invalid_identifier_skipped() {
        let p = params(&[("123invalid", Some("value"))]);
        let sql = "SELECT * FROM t WHERE col = :123invalid";
        assert_eq!(apply_params(sql, Some(&p)), sql);
    }

    #[test]
    fn test_word_boundary() {
        let p = params(&[("p", Some("x"))]);
        assert_eq!(
            apply_params("WHERE a = :p AND b = :p2 AND c = :p", Some(&p)),
            "WHERE a = 'x' AND b = :p2 AND c = 'x'"
        );
    }

    #[test]
    fn test_values_are_not_rescanned() {
        // Substituting `a` produces text that looks like `:b`
        let p = params(&[("a", Some(":b")), ("b", Some("boom"))]);
        assert_eq!(
            apply_params("WHERE x = :a AND y = :b", Some(&p)),
            "WHERE x = ':b' AND y = 'boom'"
        );
        let p = params(&[("b", Some("boom")), ("a", Some("x :b"))]);
        assert_eq!(apply_params("WHERE x = :a", Some(&p)), "WHERE x = 'x :b'");
    }

    #[test]
    fn test_literals_and_casts_untouched() {
        let p = params(&[("p", Some("v")), ("text", Some("t"))]);
        assert_eq!(
            apply_params("SELECT ':p', \"a:p\", x::text FROM t WHERE y = :p", Some(&p)),
            "SELECT ':p', \"a:p\", x::text FROM t WHERE y = 'v'"
        );
    }

    proptest! {
        #[test]
        fn prop_value_round_trips_as_single_literal(value in ".*") {
            let p = params(&[("v", Some(value.as_str()))]);
            let out = apply_params(":v", Some(&p));
            prop_assert!(out.starts_with('\'') && out.ends_with('\''));
            let inner = &out[1..out.len() - 1];
            prop_assert_eq!(inner.replace("''", "'"), value);
        }
    }
}
