//! Expression error types

use thiserror::Error;

/// Result type for expression operations
pub type EvalResult<T> = std::result::Result<T, EvalError>;

/// Errors that can occur while parsing or evaluating an expression
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Malformed expression text
    #[error("invalid syntax: {0}")]
    Syntax(String),

    /// Unknown variable or function name
    #[error("name '{0}' is not defined")]
    Name(String),

    /// Missing member on a value
    #[error("'{type_name}' object has no attribute '{attr}'")]
    Attribute { type_name: String, attr: String },

    /// Out-of-range index or missing key
    #[error("index error: {0}")]
    Index(String),

    /// A callable failed or could not be called
    #[error("error calling '{name}': {message}")]
    Call { name: String, message: String },

    /// Operator the restricted language parses but refuses to evaluate
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// Node kind the restricted language parses but refuses to evaluate
    #[error("unsupported expression: {0}")]
    UnsupportedExpression(String),

    /// Operand types do not support the operation
    #[error("type error: {0}")]
    Type(String),

    /// Division by zero, overflow and other numeric failures
    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    /// The restricted evaluator and the fallback both failed
    #[error("{primary} (fallback: {fallback})")]
    Fallback { primary: String, fallback: String },
}

impl EvalError {
    /// Shorthand for a type error about an operator and its operands
    pub(crate) fn operand_types(op: &str, left: &str, right: &str) -> Self {
        EvalError::Type(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op, left, right
        ))
    }
}

/// Failure raised by a registered function
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FunctionError {
    /// Wrong number of arguments
    #[error("takes {expected} argument(s) but {actual} were given")]
    Arity { expected: String, actual: usize },

    /// Keyword argument the function does not declare
    #[error("got an unexpected keyword argument '{0}'")]
    UnexpectedKeyword(String),

    /// Keyword argument that repeats a positional one
    #[error("got multiple values for argument '{0}'")]
    DuplicateArgument(String),

    /// Invalid argument value
    #[error("{0}")]
    Argument(String),
}

/// Errors raised by the function registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Registration attempted after [`crate::seal_registry`]
    #[error("function registry is sealed; cannot register '{0}'")]
    Sealed(String),

    /// Function name is not a valid identifier
    #[error("invalid function name: '{0}'")]
    InvalidName(String),
}
