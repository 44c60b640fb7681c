//! # xcelsql-core
//!
//! Query-side building blocks for xcelsql.
//!
//! This crate turns human-friendly SQL over spreadsheet sheets into SQL a
//! relational engine can run:
//! - [`IdentifierMapper`] - Stable, unique, SQL-safe identifiers for sheet names
//! - [`QueryValidator`] - SELECT-only, forbidden keyword and placeholder checks
//! - [`resolve_query`] - `{Sheet Name}` placeholders to identifiers
//! - [`apply_params`] - `:name` parameters as escaped literals
//! - [`rewrite_identifiers`] - `"Sheet Name"` to the session alias
//! - [`SheetSpec`] - `Name[:header]` sheet specifications
//!
//! ## Example
//!
//! ```rust
//! use xcelsql_core::{apply_params, resolve_query, validate_query, IdentifierMapper, SqlParams};
//!
//! let sheets = ["Q1 Sales"];
//! let query = "SELECT * FROM {Q1 Sales} WHERE region = :region";
//! validate_query(query, &sheets, true).unwrap();
//!
//! let mut mapper = IdentifierMapper::new();
//! let sql = resolve_query(query, &sheets, &mut mapper);
//!
//! let mut params = SqlParams::new();
//! params.insert("region".into(), Some("O'Hare".into()));
//! assert_eq!(
//!     apply_params(&sql, Some(&params)),
//!     "SELECT * FROM q1_sales WHERE region = 'O''Hare'"
//! );
//! ```

pub mod alias;
pub mod error;
pub mod identifier;
pub mod params;
pub mod policy;
pub mod resolver;
pub mod scanner;
pub mod sheet;
pub mod validator;

// Re-exports for convenience
pub use alias::{quote_identifier, rewrite_identifiers, AliasLookup};
pub use error::{Result, ValidationError, ValidationErrorKind};
pub use identifier::{is_safe_identifier, IdentifierMapper};
pub use params::{apply_params, is_param_name, quote_literal, SqlParams};
pub use policy::{ValidationPolicy, FORBIDDEN_SQL_TOKENS, STRICT_SHEET_NAME_PATTERN};
pub use resolver::{apply_limit, projection_query, resolve_query};
pub use scanner::{mask_string_literals, normalize_smart_quotes, Segment, SqlScanner};
pub use sheet::{infer_header_row, normalize_headers, HeaderRow, SheetSpec, AUTO_HEADER_SENTINELS};
pub use validator::{extract_placeholders, validate_query, validate_sheet_names, QueryValidator};
