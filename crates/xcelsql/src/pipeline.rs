//! One-shot query pipeline
//!
//! Turns a user query over named sheets into SQL for an external relational
//! engine. Validation always finishes before any rewriting starts, so a
//! rejected query is never partially resolved.
//!
//! # Example
//!
//! ```rust
//! use xcelsql::{prepare_query, IdentifierMapper, QueryRequest, SheetSpec};
//!
//! let request = QueryRequest::new(vec![SheetSpec::new("Q1 Sales")])
//!     .with_query("SELECT region FROM {Q1 Sales}")
//!     .with_limit(Some(10));
//!
//! let mut mapper = IdentifierMapper::new();
//! let prepared = prepare_query(&request, &mut mapper).unwrap();
//! assert_eq!(
//!     prepared.sql,
//!     "SELECT * FROM (SELECT region FROM q1_sales) sub LIMIT 10"
//! );
//! assert_eq!(prepared.tables, vec![("q1_sales".to_string(), "Q1 Sales".to_string())]);
//! ```

use crate::error::{Error, Result};
use tracing::info;
use xcelsql_core::{
    apply_limit, apply_params, projection_query, resolve_query, IdentifierMapper, QueryValidator,
    SheetSpec, SqlParams,
};

/// Everything needed to build the SQL for one run
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    /// Query text with `{Sheet}` placeholders; None selects the first sheet
    pub query: Option<String>,
    /// Sheets in scope, in command-line order
    pub sheets: Vec<SheetSpec>,
    /// Strict validation
    pub strict: bool,
    /// `:name` parameters
    pub params: Option<SqlParams>,
    /// Outer row limit
    pub limit: Option<usize>,
    /// Columns to project from the first sheet when no query is given
    pub select_columns: Vec<String>,
}

impl QueryRequest {
    /// Request over `sheets` with no query
    pub fn new(sheets: Vec<SheetSpec>) -> Self {
        Self {
            sheets,
            ..Self::default()
        }
    }

    /// Set the query text
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Set strict validation
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the parameters
    pub fn with_params(mut self, params: SqlParams) -> Self {
        self.params = Some(params);
        self
    }

    /// Set the row limit
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Set the projected columns
    pub fn with_select_columns(mut self, columns: Vec<String>) -> Self {
        self.select_columns = columns;
        self
    }

    /// Sheet names without header specs
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Query text the pipeline works on
    ///
    /// Without a query, selected columns become a projection of the first
    /// sheet; otherwise the text is empty and resolves to a full select.
    pub fn effective_query(&self) -> String {
        match (&self.query, self.sheets.first()) {
            (Some(query), _) => query.clone(),
            (None, Some(first)) if !self.select_columns.is_empty() => {
                projection_query(&self.select_columns, &first.name)
            }
            _ => String::new(),
        }
    }
}

/// SQL ready for the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedQuery {
    /// Final SQL text
    pub sql: String,
    /// `(identifier, sheet)` pairs the engine must register as tables
    pub tables: Vec<(String, String)>,
}

/// Relational engine that runs prepared SQL
pub trait QueryEngine {
    /// Result set type
    type Output;

    /// Register the tables and run the SQL
    fn execute(&mut self, query: &PreparedQuery) -> Result<Self::Output>;
}

/// Validate, resolve, parameterize and limit a request
pub fn prepare_query(request: &QueryRequest, mapper: &mut IdentifierMapper) -> Result<PreparedQuery> {
    prepare_query_with(&QueryValidator::default(), request, mapper)
}

/// [`prepare_query`] with a custom validation policy
pub fn prepare_query_with(
    validator: &QueryValidator,
    request: &QueryRequest,
    mapper: &mut IdentifierMapper,
) -> Result<PreparedQuery> {
    if request.sheets.is_empty() {
        return Err(Error::NoSheets);
    }
    let names = request.sheet_names();
    let query = request.effective_query();

    validator.validate_sheet_names(&names, request.strict)?;
    validator.validate(&query, &names, request.strict)?;

    let tables = names
        .iter()
        .map(|name| (mapper.register(name), name.to_string()))
        .collect();

    let sql = resolve_query(&query, &names, mapper);
    let sql = apply_params(&sql, request.params.as_ref());
    let sql = apply_limit(&sql, request.limit);

    info!(%sql, "resolved SQL");
    Ok(PreparedQuery { sql, tables })
}

/// Prepare a request and hand it to `engine`
///
/// With `dry_run` the SQL is prepared and logged but not executed.
pub fn run_query<E: QueryEngine>(
    request: &QueryRequest,
    mapper: &mut IdentifierMapper,
    engine: &mut E,
    dry_run: bool,
) -> Result<Option<E::Output>> {
    let prepared = prepare_query(request, mapper)?;
    if dry_run {
        info!("dry run: skipping execution");
        return Ok(None);
    }
    engine.execute(&prepared).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use xcelsql_core::ValidationError;

    struct RecordingEngine {
        executed: Vec<PreparedQuery>,
    }

    impl QueryEngine for RecordingEngine {
        type Output = usize;

        fn execute(&mut self, query: &PreparedQuery) -> Result<usize> {
            self.executed.push(query.clone());
            Ok(self.executed.len())
        }
    }

    fn sheets(names: &[&str]) -> Vec<SheetSpec> {
        names.iter().map(|n| SheetSpec::new(*n)).collect()
    }

    #[test]
    fn test_default_query_selects_first_sheet() {
        let mut mapper = IdentifierMapper::new();
        let prepared = prepare_query(&QueryRequest::new(sheets(&["Data", "Other"])), &mut mapper).unwrap();
        assert_eq!(prepared.sql, "SELECT * FROM data");
        assert_eq!(
            prepared.tables,
            vec![
                ("data".to_string(), "Data".to_string()),
                ("other".to_string(), "Other".to_string())
            ]
        );
    }

    #[test]
    fn test_projection_when_columns_selected() {
        let mut mapper = IdentifierMapper::new();
        let request = QueryRequest::new(sheets(&["Sales 2024"]))
            .with_select_columns(vec!["region".into(), "total".into()]);
        assert_eq!(request.effective_query(), "SELECT region, total FROM {Sales 2024}");
        let prepared = prepare_query(&request, &mut mapper).unwrap();
        assert_eq!(prepared.sql, "SELECT region, total FROM sales_2024");
    }

    #[test]
    fn test_params_and_limit() {
        let mut mapper = IdentifierMapper::new();
        let mut params = SqlParams::new();
        params.insert("who".into(), Some("O'Brien".into()));
        let request = QueryRequest::new(sheets(&["People"]))
            .with_query("SELECT * FROM {People} WHERE name = :who")
            .with_params(params)
            .with_limit(Some(5));
        let prepared = prepare_query(&request, &mut mapper).unwrap();
        assert_eq!(
            prepared.sql,
            "SELECT * FROM (SELECT * FROM people WHERE name = 'O''Brien') sub LIMIT 5"
        );
    }

    #[test]
    fn test_validation_failure_aborts_before_registration() {
        let mut mapper = IdentifierMapper::new();
        let request = QueryRequest::new(sheets(&["S"])).with_query("DELETE FROM {S}");
        assert!(matches!(
            prepare_query(&request, &mut mapper),
            Err(Error::Validation(ValidationError::ForbiddenToken(_)))
        ));
        assert!(mapper.is_empty());
    }

    #[test]
    fn test_strict_sheet_names() {
        let mut mapper = IdentifierMapper::new();
        let request = QueryRequest::new(sheets(&["Bad Name"]))
            .with_query("SELECT * FROM {Bad Name}")
            .with_strict(true);
        assert!(matches!(
            prepare_query(&request, &mut mapper),
            Err(Error::Validation(ValidationError::InvalidSheetName { .. }))
        ));
    }

    #[test]
    fn test_no_sheets() {
        let mut mapper = IdentifierMapper::new();
        assert!(matches!(
            prepare_query(&QueryRequest::default(), &mut mapper),
            Err(Error::NoSheets)
        ));
    }

    #[test]
    fn test_run_query_dry_run_skips_engine() {
        let mut mapper = IdentifierMapper::new();
        let mut engine = RecordingEngine { executed: Vec::new() };
        let request = QueryRequest::new(sheets(&["S"])).with_query("SELECT 1 FROM {S}");

        assert_eq!(run_query(&request, &mut mapper, &mut engine, true).unwrap(), None);
        assert!(engine.executed.is_empty());

        assert_eq!(run_query(&request, &mut mapper, &mut engine, false).unwrap(), Some(1));
        assert_eq!(engine.executed[0].sql, "SELECT 1 FROM s");
    }
}
