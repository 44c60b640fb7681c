//! # xcelsql
//!
//! SQL over spreadsheet sheets.
//!
//! xcelsql prepares human-friendly SQL for an external relational engine and
//! computes derived columns with a small, sandboxed expression language.
//!
//! ## Features
//!
//! - `{Sheet Name}` placeholders resolved to stable, SQL-safe table names
//! - SELECT-only validation with a forbidden keyword list
//! - `:name` parameters inlined as escaped literals
//! - Interactive sessions that refer to sheets by alias or `"Sheet Name"`
//! - Template transforms driven by per-column expressions
//!
//! ## Example
//!
//! ```rust
//! use xcelsql::prelude::*;
//!
//! // One-shot query
//! let request = QueryRequest::new(vec![SheetSpec::parse("Orders 2024:2").unwrap()])
//!     .with_query("SELECT id, total FROM {Orders 2024} WHERE total > 100");
//! let mut mapper = IdentifierMapper::new();
//! let prepared = prepare_query(&request, &mut mapper).unwrap();
//! assert_eq!(prepared.sql, "SELECT id, total FROM orders_2024 WHERE total > 100");
//!
//! // Derived column
//! let mut row = Row::new();
//! row.insert("total".to_string(), Value::Int(120));
//! let mapping = TemplateMapping::from_records(&[MappingRecord::new("Band", "case_when(total > 100, 'high', 'low')")], None).unwrap();
//! let (rows, errors) = apply_template(&[row], &mapping, &Interpreter::new(), false).unwrap();
//! assert!(errors.is_empty());
//! assert_eq!(rows[0]["Band"], Value::Str("high".into()));
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod prelude;
pub mod session;
pub mod template;

pub use config::{Config, OutputFormat};
pub use error::{Error, Result};
pub use pipeline::{prepare_query, prepare_query_with, run_query, PreparedQuery, QueryEngine, QueryRequest};
pub use session::Session;
pub use template::{apply_template, ErrorReport, MappingErrorRecord, MappingRecord, TemplateMapping};

// Re-export query building blocks
pub use xcelsql_core::{
    apply_limit, apply_params, extract_placeholders, infer_header_row, is_param_name,
    is_safe_identifier, mask_string_literals, normalize_headers, normalize_smart_quotes,
    projection_query, quote_identifier, quote_literal, resolve_query, rewrite_identifiers,
    validate_query, validate_sheet_names, AliasLookup, HeaderRow, IdentifierMapper,
    QueryValidator, SheetSpec, SqlParams, ValidationError, ValidationErrorKind, ValidationPolicy,
    AUTO_HEADER_SENTINELS, FORBIDDEN_SQL_TOKENS, STRICT_SHEET_NAME_PATTERN,
};

// Re-export expression types
pub use xcelsql_expr::{
    eval_fallback_enabled, evaluate_expression, evaluate_row, list_functions, lookup_function,
    parse_expression, register_function, seal_registry, set_eval_fallback, CompiledExpr,
    EvalError, Expr, FallbackEvaluator, FunctionDef, FunctionError, FunctionImpl,
    FunctionRegistry, FunctionScope, GlobalFunctions, Interpreter, PermissiveEvaluator,
    RegistryError, Row, Value, ValueMap,
};
