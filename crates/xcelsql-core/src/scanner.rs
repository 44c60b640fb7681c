//! Quote-aware SQL scanner
//!
//! Splits SQL text into plain text, single-quoted string literals and
//! double-quoted identifiers. Both quote styles escape themselves by doubling
//! (`'it''s'`, `"say ""hi"""`). The validator's literal masking, the
//! parameter substitutor and the alias rewriter all walk the same segments,
//! so none of them ever touches a literal payload.

/// A piece of SQL text as seen by [`SqlScanner`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Text outside any quotes
    Text(&'a str),
    /// A complete single-quoted literal, quotes included
    StringLiteral(&'a str),
    /// A complete double-quoted identifier
    QuotedIdentifier {
        /// Source text, quotes included
        raw: &'a str,
        /// Identifier with `""` unescaped
        name: String,
    },
    /// An opening quote with no matching close, through end of input
    Unterminated(&'a str),
}

impl<'a> Segment<'a> {
    /// Source text of this segment, exactly as it appeared in the input
    pub fn as_str(&self) -> &'a str {
        match self {
            Segment::Text(s) | Segment::StringLiteral(s) | Segment::Unterminated(s) => s,
            Segment::QuotedIdentifier { raw, .. } => raw,
        }
    }
}

/// Iterator over the [`Segment`]s of a SQL string
///
/// Concatenating `as_str()` of every segment reproduces the input.
pub struct SqlScanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> SqlScanner<'a> {
    /// Create a scanner over `input`
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Position of the closing quote, skipping doubled quotes
    fn find_closing(&self, from: usize, quote: u8) -> Option<usize> {
        let bytes = self.input.as_bytes();
        let mut i = from;
        while i < bytes.len() {
            if bytes[i] == quote {
                if bytes.get(i + 1) == Some(&quote) {
                    i += 2;
                    continue;
                }
                return Some(i);
            }
            i += 1;
        }
        None
    }
}

impl<'a> Iterator for SqlScanner<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Segment<'a>> {
        let bytes = self.input.as_bytes();
        let start = self.pos;
        if start >= bytes.len() {
            return None;
        }

        match bytes[start] {
            quote @ (b'\'' | b'"') => match self.find_closing(start + 1, quote) {
                Some(end) => {
                    self.pos = end + 1;
                    let raw = &self.input[start..self.pos];
                    if quote == b'\'' {
                        Some(Segment::StringLiteral(raw))
                    } else {
                        let name = self.input[start + 1..end].replace("\"\"", "\"");
                        Some(Segment::QuotedIdentifier { raw, name })
                    }
                }
                None => {
                    self.pos = bytes.len();
                    Some(Segment::Unterminated(&self.input[start..]))
                }
            },
            _ => {
                let end = bytes[start..]
                    .iter()
                    .position(|b| *b == b'\'' || *b == b'"')
                    .map_or(bytes.len(), |offset| start + offset);
                self.pos = end;
                Some(Segment::Text(&self.input[start..end]))
            }
        }
    }
}

/// Replace the contents of every complete string literal with `''`
///
/// Identifiers and unterminated quotes are kept verbatim so that keyword
/// scanning still sees them.
pub fn mask_string_literals(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    for segment in SqlScanner::new(sql) {
        match segment {
            Segment::StringLiteral(_) => out.push_str("''"),
            other => out.push_str(other.as_str()),
        }
    }
    out
}

/// Map typographic quotes pasted from documents to ASCII quotes
pub fn normalize_smart_quotes(sql: &str) -> String {
    sql.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn segments(sql: &str) -> Vec<Segment<'_>> {
        SqlScanner::new(sql).collect()
    }

    #[test]
    fn test_scan_mixed() {
        let sql = r#"SELECT "Sales ""Q1""" FROM t WHERE a = 'it''s'"#;
        assert_eq!(
            segments(sql),
            vec![
                Segment::Text("SELECT "),
                Segment::QuotedIdentifier {
                    raw: r#""Sales ""Q1""""#,
                    name: r#"Sales "Q1""#.to_string(),
                },
                Segment::Text(" FROM t WHERE a = "),
                Segment::StringLiteral("'it''s'"),
            ]
        );
    }

    #[test]
    fn test_scan_reassembles_input() {
        let sql = "SELECT 'a\"b', \"x'y\" FROM 'unterminated";
        let rebuilt: String = SqlScanner::new(sql).map(|s| s.as_str()).collect();
        assert_eq!(rebuilt, sql);
    }

    #[test]
    fn test_double_quote_inside_literal_is_payload() {
        assert_eq!(
            segments("'say \"hi\"'"),
            vec![Segment::StringLiteral("'say \"hi\"'")]
        );
    }

    #[test]
    fn test_unterminated() {
        assert_eq!(
            segments("SELECT \"open"),
            vec![Segment::Text("SELECT "), Segment::Unterminated("\"open")]
        );
    }

    #[test]
    fn test_mask_string_literals() {
        assert_eq!(
            mask_string_literals("SELECT * FROM t WHERE c = 'DROP TABLE x' AND d = 'it''s'"),
            "SELECT * FROM t WHERE c = '' AND d = ''"
        );
        assert_eq!(mask_string_literals("SELECT 'open"), "SELECT 'open");
    }

    #[test]
    fn test_normalize_smart_quotes() {
        assert_eq!(
            normalize_smart_quotes("SELECT \u{201C}Sales\u{201D} WHERE a = \u{2018}x\u{2019}"),
            "SELECT \"Sales\" WHERE a = 'x'"
        );
    }
}
