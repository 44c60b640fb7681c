//! Session alias rewriting
//!
//! Interactive SQL refers to sheets either by their session alias or by the
//! original name in double quotes (`SELECT * FROM "Q1 Sales"`). The rewriter
//! replaces the quoted originals with their aliases and never touches string
//! literal payloads. It cannot fail: unbalanced quotes pass through verbatim.

use crate::identifier::{is_safe_identifier, IdentifierMapper};
use crate::scanner::{Segment, SqlScanner};
use std::collections::{BTreeMap, HashMap};

/// Lookup from original sheet name to session alias
pub trait AliasLookup {
    /// Alias for `original`, if one exists
    fn alias_for(&self, original: &str) -> Option<&str>;
}

impl AliasLookup for HashMap<String, String> {
    fn alias_for(&self, original: &str) -> Option<&str> {
        self.get(original).map(String::as_str)
    }
}

impl AliasLookup for BTreeMap<String, String> {
    fn alias_for(&self, original: &str) -> Option<&str> {
        self.get(original).map(String::as_str)
    }
}

impl AliasLookup for IdentifierMapper {
    fn alias_for(&self, original: &str) -> Option<&str> {
        self.lookup_forward(original)
    }
}

impl<T: AliasLookup + ?Sized> AliasLookup for &T {
    fn alias_for(&self, original: &str) -> Option<&str> {
        (**self).alias_for(original)
    }
}

/// Quote `name` as a SQL identifier unless it is already bare-safe
pub fn quote_identifier(name: &str) -> String {
    if is_safe_identifier(name) {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Replace double-quoted original sheet names in `sql` with their aliases
pub fn rewrite_identifiers<A: AliasLookup + ?Sized>(sql: &str, aliases: &A) -> String {
    let mut out = String::with_capacity(sql.len());

    for segment in SqlScanner::new(sql) {
        match segment {
            Segment::QuotedIdentifier { raw, name } => match aliases.alias_for(&name) {
                Some(alias) => {
                    tracing::debug!(sheet = %name, alias, "rewrote quoted sheet name");
                    out.push_str(&quote_identifier(alias));
                }
                None => out.push_str(raw),
            },
            other => out.push_str(other.as_str()),
        }
    }

    out
}
