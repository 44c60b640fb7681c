//! Placeholder resolution
//!
//! Rewrites `{Sheet Name}` placeholders into the identifiers assigned by an
//! [`IdentifierMapper`], and builds the small wrapper queries the pipeline
//! needs (default select, projection, limit).

use crate::identifier::IdentifierMapper;

/// Replace `{Name}` placeholders for sheets in scope with their identifiers
///
/// An empty query resolves to `SELECT * FROM <first sheet>`. Brace text that
/// does not name a sheet in scope is left untouched; unknown-sheet detection
/// belongs to the validator.
pub fn resolve_query<S: AsRef<str>>(
    query: &str,
    sheets_in_scope: &[S],
    mapper: &mut IdentifierMapper,
) -> String {
    if query.is_empty() {
        return match sheets_in_scope.first() {
            Some(first) => format!("SELECT * FROM {}", mapper.register(first.as_ref())),
            None => {
                tracing::debug!("empty query with no sheets in scope");
                String::new()
            }
        };
    }

    let mut out = String::with_capacity(query.len());
    let mut rest = query;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        // Longest sheet name that is immediately followed by '}'
        let matched = sheets_in_scope
            .iter()
            .map(|s| s.as_ref())
            .filter(|name| {
                after
                    .strip_prefix(name)
                    .map_or(false, |tail| tail.starts_with('}'))
            })
            .max_by_key(|name| name.len());

        match matched {
            Some(name) => {
                out.push_str(&mapper.register(name));
                rest = &after[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);

    out
}

/// Wrap `sql` in an outer select with a row limit
pub fn apply_limit(sql: &str, limit: Option<usize>) -> String {
    match limit {
        Some(n) => format!("SELECT * FROM ({}) sub LIMIT {}", sql, n),
        None => sql.to_string(),
    }
}

/// Query selecting `columns` from the placeholder of `sheet`
pub fn projection_query<S: AsRef<str>>(columns: &[S], sheet: &str) -> String {
    let projection = columns
        .iter()
        .map(|c| c.as_ref())
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {} FROM {{{}}}", projection, sheet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resolve_single_placeholder() {
        let mut mapper = IdentifierMapper::new();
        let sql = resolve_query("SELECT * FROM {Sheet1}", &["Sheet1"], &mut mapper);
        assert_eq!(sql, format!("SELECT * FROM {}", mapper.register("Sheet1")));
        assert_eq!(sql, "SELECT * FROM sheet1");
    }

    #[test]
    fn test_resolve_multiple_and_repeated() {
        let mut mapper = IdentifierMapper::new();
        let sql = resolve_query(
            "SELECT a.x, b.y FROM {Sales Data} a JOIN {123Costs} b ON a.id = b.id WHERE a.id IN (SELECT id FROM {Sales Data})",
            &["Sales Data", "123Costs"],
            &mut mapper,
        );
        assert_eq!(
            sql,
            "SELECT a.x, b.y FROM sales_data a JOIN s_123costs b ON a.id = b.id WHERE a.id IN (SELECT id FROM sales_data)"
        );
    }

    #[test]
    fn test_unknown_braces_untouched() {
        let mut mapper = IdentifierMapper::new();
        let sql = resolve_query("SELECT '{x}', {Other} FROM {S}", &["S"], &mut mapper);
        assert_eq!(sql, "SELECT '{x}', {Other} FROM s");
        assert_eq!(mapper.lookup_forward("Other"), None);
    }

    #[test]
    fn test_longest_name_wins() {
        let mut mapper = IdentifierMapper::new();
        let sql = resolve_query("SELECT * FROM {A}B}", &["A", "A}B"], &mut mapper);
        assert_eq!(sql, "SELECT * FROM a_b");
    }

    #[test]
    fn test_empty_query_selects_first_sheet() {
        let mut mapper = IdentifierMapper::new();
        assert_eq!(
            resolve_query("", &["First Sheet", "Second"], &mut mapper),
            "SELECT * FROM first_sheet"
        );
        let none: &[&str] = &[];
        assert_eq!(resolve_query("", none, &mut mapper), "");
    }

    #[test]
    fn test_apply_limit() {
        assert_eq!(apply_limit("SELECT 1", None), "SELECT 1");
        assert_eq!(
            apply_limit("SELECT * FROM t", Some(10)),
            "SELECT * FROM (SELECT * FROM t) sub LIMIT 10"
        );
    }

    #[test]
    fn test_projection_query() {
        assert_eq!(
            projection_query(&["a", "b"], "Sales"),
            "SELECT a, b FROM {Sales}"
        );
    }
}
