//! # xcelsql-expr
//!
//! Restricted expression language for xcelsql column templates.
//!
//! This crate provides:
//! - Expression parsing (text → AST) with conventional operator precedence
//! - Restricted evaluation against one row of named values
//! - A process-wide registry of allow-listed functions
//! - An opt-in fallback evaluator for constructs the restricted language refuses
//!
//! ## Example
//!
//! ```rust
//! use xcelsql_expr::{Interpreter, Row, Value};
//!
//! let mut row = Row::new();
//! row.insert("price".into(), Value::Float(9.5));
//! row.insert("qty".into(), Value::Int(2));
//!
//! let interpreter = Interpreter::new();
//! assert_eq!(interpreter.evaluate("price * qty", &row).unwrap(), Value::Float(19.0));
//! assert_eq!(
//!     interpreter.evaluate("'bulk' if qty > 10 else 'single'", &row).unwrap(),
//!     Value::Str("single".into())
//! );
//! ```

pub mod ast;
pub mod error;
pub mod evaluator;
pub mod fallback;
pub mod functions;
pub mod interpreter;
pub mod ops;
pub mod parser;
pub mod value;

pub use ast::{BinaryOperator, BoolOperator, CompareOperator, Expr, UnaryOperator};
pub use error::{EvalError, EvalResult, FunctionError, RegistryError};
pub use evaluator::{evaluate, walk, EvaluationContext, Extensions, Restricted, Row};
pub use fallback::{FallbackEvaluator, Permissive, PermissiveEvaluator};
pub use functions::{
    list_functions, lookup_function, register_function, seal_registry, FunctionDef,
    FunctionImpl, FunctionRegistry, FunctionScope, GlobalFunctions,
};
pub use interpreter::{
    eval_fallback_enabled, evaluate_expression, evaluate_row, set_eval_fallback, CompiledExpr,
    Interpreter,
};
pub use parser::{parse_expression, MAX_NESTING_DEPTH};
pub use value::{Value, ValueMap};
