//! Expression interpreter
//!
//! Parses expression text, evaluates it with the restricted evaluator and,
//! only when the eval fallback is switched on, gives a failing expression a
//! second attempt through a [`FallbackEvaluator`].
//!
//! The fallback is a capability escape: it accepts constructs the restricted
//! language refuses. It is off unless [`set_eval_fallback`] or
//! [`Interpreter::allow_fallback`] turns it on.

use crate::ast::Expr;
use crate::error::{EvalError, EvalResult};
use crate::evaluator::{evaluate, EvaluationContext, Row};
use crate::fallback::{FallbackEvaluator, PermissiveEvaluator};
use crate::functions::{FunctionScope, GlobalFunctions};
use crate::parser::parse_expression;
use crate::value::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Process-wide eval fallback switch
static EVAL_FALLBACK: AtomicBool = AtomicBool::new(false);

/// Enable or disable the eval fallback for interpreters without an override
pub fn set_eval_fallback(enabled: bool) {
    EVAL_FALLBACK.store(enabled, Ordering::SeqCst);
    if enabled {
        warn!("expression eval fallback enabled");
    }
}

/// Whether the process-wide eval fallback is on
pub fn eval_fallback_enabled() -> bool {
    EVAL_FALLBACK.load(Ordering::SeqCst)
}

/// Parsed expression, reusable across rows
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpr {
    source: String,
    ast: Expr,
}

impl CompiledExpr {
    /// Original expression text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parsed tree
    pub fn ast(&self) -> &Expr {
        &self.ast
    }
}

/// Expression interpreter
#[derive(Clone)]
pub struct Interpreter {
    scope: Arc<dyn FunctionScope>,
    fallback: Arc<dyn FallbackEvaluator>,
    allow_fallback: Option<bool>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("fallback", &self.fallback.name())
            .field("allow_fallback", &self.allow_fallback)
            .finish_non_exhaustive()
    }
}

impl Interpreter {
    /// Interpreter over the process-wide function registry
    pub fn new() -> Self {
        Self {
            scope: Arc::new(GlobalFunctions),
            fallback: Arc::new(PermissiveEvaluator),
            allow_fallback: None,
        }
    }

    /// Use a different function scope
    pub fn with_scope(mut self, scope: Arc<dyn FunctionScope>) -> Self {
        self.scope = scope;
        self
    }

    /// Use a different fallback strategy
    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackEvaluator>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Override the process-wide fallback switch for this interpreter
    pub fn allow_fallback(mut self, allow: bool) -> Self {
        self.allow_fallback = Some(allow);
        self
    }

    /// Whether a failing expression gets a fallback attempt
    pub fn fallback_enabled(&self) -> bool {
        self.allow_fallback.unwrap_or_else(eval_fallback_enabled)
    }

    /// Functions visible to expressions
    pub fn scope(&self) -> &dyn FunctionScope {
        self.scope.as_ref()
    }

    /// Parse expression text once
    pub fn compile(&self, source: &str) -> EvalResult<CompiledExpr> {
        Ok(CompiledExpr {
            source: source.to_string(),
            ast: parse_expression(source)?,
        })
    }

    /// Parse and evaluate expression text against a row
    pub fn evaluate(&self, source: &str, row: &Row) -> EvalResult<Value> {
        let primary = parse_expression(source).and_then(|ast| self.run(&ast, row));
        self.recover(source, row, primary)
    }

    /// Evaluate a compiled expression against a row
    pub fn evaluate_compiled(&self, expr: &CompiledExpr, row: &Row) -> EvalResult<Value> {
        let primary = self.run(&expr.ast, row);
        self.recover(&expr.source, row, primary)
    }

    /// Evaluate for a bulk transform
    ///
    /// Without `strict`, a failure becomes the value `"[Error: <message>]"`.
    pub fn evaluate_row(&self, source: &str, row: &Row, strict: bool) -> EvalResult<Value> {
        degrade(self.evaluate(source, row), strict)
    }

    /// [`Interpreter::evaluate_row`] for a compiled expression
    pub fn evaluate_compiled_row(
        &self,
        expr: &CompiledExpr,
        row: &Row,
        strict: bool,
    ) -> EvalResult<Value> {
        degrade(self.evaluate_compiled(expr, row), strict)
    }

    fn run(&self, ast: &Expr, row: &Row) -> EvalResult<Value> {
        evaluate(ast, &EvaluationContext::new(row, self.scope.as_ref()))
    }

    fn recover(&self, source: &str, row: &Row, primary: EvalResult<Value>) -> EvalResult<Value> {
        let error = match primary {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        if !self.fallback_enabled() {
            return Err(error);
        }

        warn!(
            expression = source,
            error = %error,
            fallback = self.fallback.name(),
            "restricted evaluation failed, using eval fallback"
        );
        let ctx = EvaluationContext::new(row, self.scope.as_ref());
        self.fallback
            .evaluate(source, &ctx)
            .map_err(|fallback| EvalError::Fallback {
                primary: error.to_string(),
                fallback: fallback.to_string(),
            })
    }
}

fn degrade(result: EvalResult<Value>, strict: bool) -> EvalResult<Value> {
    match result {
        Err(e) if !strict => Ok(Value::Str(format!("[Error: {}]", e))),
        other => other,
    }
}

/// Evaluate expression text against a row with the default interpreter
pub fn evaluate_expression(source: &str, row: &Row) -> EvalResult<Value> {
    Interpreter::new().evaluate(source, row)
}

/// [`Interpreter::evaluate_row`] with the default interpreter
pub fn evaluate_row(source: &str, row: &Row, strict: bool) -> EvalResult<Value> {
    Interpreter::new().evaluate_row(source, row, strict)
}
