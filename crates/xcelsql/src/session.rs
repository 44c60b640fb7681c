//! Interactive session model
//!
//! Holds the state an interactive front end keeps between statements: the
//! workbook's sheet list, which sheets are loaded, session aliases, SQL
//! parameters and the history of executed SQL. In a session sheets are
//! referenced by alias or by their quoted original name rather than by
//! `{Sheet}` placeholders.

use crate::config::Config;
use crate::error::{Error, Result};
use regex::{Regex, RegexBuilder};
use std::collections::BTreeSet;
use tracing::debug;
use xcelsql_core::{
    apply_params, is_param_name, normalize_smart_quotes, rewrite_identifiers, IdentifierMapper,
    SqlParams,
};

/// Interactive session state
#[derive(Debug, Clone, Default)]
pub struct Session {
    sheets: Vec<String>,
    loaded: BTreeSet<String>,
    aliases: IdentifierMapper,
    params: SqlParams,
    history: Vec<String>,
    config: Config,
    alias_pattern: Option<Regex>,
}

impl Session {
    /// Create an empty session
    pub fn new(config: Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Create a session over a workbook's sheet names
    pub fn with_sheets<I, S>(config: Config, sheets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut session = Self::new(config);
        for sheet in sheets {
            session.add_sheet(sheet);
        }
        session
    }

    /// Add a sheet and return its alias
    pub fn add_sheet(&mut self, sheet: impl Into<String>) -> String {
        let sheet = sheet.into();
        let alias = self.aliases.register(&sheet);
        if !self.sheets.contains(&sheet) {
            self.sheets.push(sheet);
            self.alias_pattern = self.build_alias_pattern();
        }
        alias
    }

    /// All sheet names in workbook order
    pub fn sheets(&self) -> &[String] {
        &self.sheets
    }

    /// Session alias of a sheet
    pub fn alias(&self, sheet: &str) -> Option<&str> {
        self.aliases.lookup_forward(sheet)
    }

    /// Sheet behind an alias (case-insensitive)
    pub fn sheet_for_alias(&self, alias: &str) -> Option<&str> {
        self.aliases.lookup_reverse(alias)
    }

    /// Alias table
    pub fn aliases(&self) -> &IdentifierMapper {
        &self.aliases
    }

    /// Settings
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Mutable settings
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Record that a sheet's data is loaded; false for unknown sheets
    pub fn mark_loaded(&mut self, sheet: &str) -> bool {
        if !self.sheets.iter().any(|s| s == sheet) {
            return false;
        }
        self.loaded.insert(sheet.to_string());
        true
    }

    /// Whether a sheet's data is loaded
    pub fn is_loaded(&self, sheet: &str) -> bool {
        self.loaded.contains(sheet)
    }

    /// Loaded sheets in workbook order
    pub fn loaded_sheets(&self) -> Vec<&str> {
        self.sheets
            .iter()
            .filter(|s| self.loaded.contains(*s))
            .map(String::as_str)
            .collect()
    }

    /// Forget loaded data, keeping sheets, aliases and settings
    pub fn clear_loaded(&mut self) {
        self.loaded.clear();
    }

    /// Set a SQL parameter; `None` binds SQL NULL
    pub fn set_param(&mut self, name: &str, value: Option<String>) -> Result<()> {
        if !is_param_name(name) {
            return Err(Error::Config(format!("invalid parameter name '{}'", name)));
        }
        self.params.insert(name.to_string(), value);
        Ok(())
    }

    /// Remove a SQL parameter, returning its previous binding
    pub fn unset_param(&mut self, name: &str) -> Option<Option<String>> {
        self.params.remove(name)
    }

    /// Current SQL parameters
    pub fn params(&self) -> &SqlParams {
        &self.params
    }

    /// Remember executed SQL; repeats are kept once, at their first position
    pub fn record(&mut self, sql: &str) {
        if !self.history.iter().any(|h| h == sql) {
            self.history.push(sql.to_string());
        }
    }

    /// Up to `n` history entries, most recent first
    pub fn recent_history(&self, n: usize) -> Vec<&str> {
        self.history
            .iter()
            .rev()
            .take(n)
            .map(String::as_str)
            .collect()
    }

    /// Number of distinct executed statements
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Forget the history
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Sheets `sql` refers to, by quoted original name or alias as a whole word
    ///
    /// Matching is case-insensitive and does not look inside the SQL
    /// structure, so a mention inside a string literal also counts.
    pub fn referenced_sheets(&self, sql: &str) -> Vec<&str> {
        let lowered = sql.to_lowercase();
        let mentioned = self.mentioned_aliases(sql);
        self.sheets
            .iter()
            .filter(|sheet| {
                lowered.contains(&format!("\"{}\"", sheet.to_lowercase()))
                    || self
                        .alias(sheet)
                        .map_or(false, |alias| mentioned.contains(&alias.to_lowercase()))
            })
            .map(String::as_str)
            .collect()
    }

    /// Lowercased aliases occurring in `sql` as whole words
    fn mentioned_aliases(&self, sql: &str) -> BTreeSet<String> {
        self.alias_pattern
            .as_ref()
            .map(|re| re.find_iter(sql).map(|m| m.as_str().to_lowercase()).collect())
            .unwrap_or_default()
    }

    /// One case-insensitive whole-word alternation over every alias
    fn build_alias_pattern(&self) -> Option<Regex> {
        let aliases: Vec<String> = self
            .sheets
            .iter()
            .filter_map(|sheet| self.alias(sheet))
            .map(regex::escape)
            .collect();
        if aliases.is_empty() {
            return None;
        }

        let pattern = format!(r"\b(?:{})\b", aliases.join("|"));
        match RegexBuilder::new(&pattern).case_insensitive(true).build() {
            Ok(re) => Some(re),
            Err(err) => {
                debug!(%err, "alias pattern rejected");
                None
            }
        }
    }

    /// Referenced sheets that still need loading
    pub fn sheets_to_load(&self, sql: &str) -> Vec<&str> {
        self.referenced_sheets(sql)
            .into_iter()
            .filter(|sheet| !self.is_loaded(sheet))
            .collect()
    }

    /// Names usable as tables: each alias, plus the original when it differs
    pub fn table_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for (original, alias) in self.aliases.mappings() {
            names.push(alias.to_string());
            if original != alias {
                names.push(original.to_string());
            }
        }
        names
    }

    /// SQL for the engine: normalize quotes, rewrite quoted names, apply params
    pub fn prepare(&self, sql: &str) -> String {
        let normalized = normalize_smart_quotes(sql);
        let rewritten = rewrite_identifiers(&normalized, &self.aliases);
        let prepared = if self.params.is_empty() {
            rewritten
        } else {
            apply_params(&rewritten, Some(&self.params))
        };
        debug!(input = sql, sql = %prepared, "prepared session statement");
        prepared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn session() -> Session {
        Session::with_sheets(Config::default(), ["Q1 Sales", "Customers", "2024 Plan"])
    }

    #[test]
    fn test_aliases_assigned_in_order() {
        let s = session();
        assert_eq!(s.alias("Q1 Sales"), Some("q1_sales"));
        assert_eq!(s.alias("Customers"), Some("customers"));
        assert_eq!(s.sheet_for_alias("Q1_SALES"), Some("Q1 Sales"));
        assert_eq!(s.sheets().len(), 3);
    }

    #[test]
    fn test_prepare_rewrites_quotes_and_params() {
        let mut s = session();
        s.set_param("region", Some("North".into())).unwrap();
        assert_eq!(
            s.prepare("SELECT * FROM \u{201C}Q1 Sales\u{201D} WHERE region = :region AND note = '\"Q1 Sales\"'"),
            "SELECT * FROM q1_sales WHERE region = 'North' AND note = '\"Q1 Sales\"'"
        );
    }

    #[test]
    fn test_params_set_and_unset() {
        let mut s = session();
        assert!(s.set_param("bad-name", None).is_err());
        s.set_param("who", None).unwrap();
        assert_eq!(s.prepare("SELECT :who"), "SELECT NULL");
        assert_eq!(s.unset_param("who"), Some(None));
        assert_eq!(s.prepare("SELECT :who"), "SELECT :who");
    }

    #[test]
    fn test_referenced_sheets() {
        let s = session();
        assert_eq!(
            s.referenced_sheets("select * from \"q1 sales\" join CUSTOMERS using (id)"),
            vec!["Q1 Sales", "Customers"]
        );
        assert!(s.referenced_sheets("select * from customers_archive").is_empty());
    }

    #[test]
    fn test_referenced_sheets_with_overlapping_aliases() {
        let s = Session::with_sheets(Config::default(), ["Q1", "Q1 Sales", "Q1 Sales Archive", "Plan"]);
        assert_eq!(
            s.referenced_sheets("SELECT * FROM q1_sales_archive JOIN Q1 ON 1 = 1"),
            vec!["Q1", "Q1 Sales Archive"]
        );
        assert_eq!(s.referenced_sheets("SELECT * FROM Q1_SALES"), vec!["Q1 Sales"]);
        assert!(s.referenced_sheets("SELECT * FROM q1_sales_2").is_empty());
        assert!(Session::default().referenced_sheets("SELECT 1").is_empty());

        let mut later = s.clone();
        assert!(later.referenced_sheets("SELECT * FROM budget").is_empty());
        later.add_sheet("Budget");
        assert_eq!(later.referenced_sheets("SELECT * FROM budget"), vec!["Budget"]);
    }

    #[test]
    fn test_sheets_to_load_skips_loaded() {
        let mut s = session();
        assert!(s.mark_loaded("Customers"));
        assert!(!s.mark_loaded("Nope"));
        assert_eq!(s.sheets_to_load("SELECT * FROM customers, q1_sales"), vec!["Q1 Sales"]);
        assert_eq!(s.loaded_sheets(), vec!["Customers"]);
        s.clear_loaded();
        assert!(!s.is_loaded("Customers"));
    }

    #[test]
    fn test_history_deduplicated() {
        let mut s = session();
        s.record("SELECT 1");
        s.record("SELECT 2");
        s.record("SELECT 1");
        assert_eq!(s.history_len(), 2);
        assert_eq!(s.recent_history(10), vec!["SELECT 2", "SELECT 1"]);
        assert_eq!(s.recent_history(1), vec!["SELECT 2"]);
        s.clear_history();
        assert_eq!(s.history_len(), 0);
    }

    #[test]
    fn test_table_names() {
        let s = Session::with_sheets(Config::default(), ["orders", "Q1 Sales"]);
        assert_eq!(s.table_names(), vec!["orders", "q1_sales", "Q1 Sales"]);
    }
}
