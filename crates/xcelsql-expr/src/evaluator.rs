//! Restricted expression evaluator
//!
//! Walks an [`Expr`] tree against one row of named values. Every node kind
//! dispatches to a fixed operator table in [`crate::ops`]; constructs outside
//! that table are handed to an [`Extensions`] implementation, which for the
//! restricted evaluator rejects them.

use crate::ast::{BinaryOperator, BoolOperator, CompareOperator, Expr, UnaryOperator};
use crate::error::{EvalError, EvalResult};
use crate::functions::FunctionScope;
use crate::ops;
use crate::value::{Value, ValueMap};
use std::collections::BTreeMap;

/// Named values of one row
pub type Row = BTreeMap<String, Value>;

/// Evaluation context
///
/// Names resolve against the row first and then the function scope, so a
/// column can shadow a function of the same name.
#[derive(Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Row bindings
    pub row: &'a Row,
    /// Callable functions
    pub functions: &'a dyn FunctionScope,
}

impl<'a> EvaluationContext<'a> {
    /// Create a new evaluation context
    pub fn new(row: &'a Row, functions: &'a dyn FunctionScope) -> Self {
        Self { row, functions }
    }

    /// Value bound to `name`
    pub fn resolve(&self, name: &str) -> EvalResult<Value> {
        if let Some(value) = self.row.get(name) {
            return Ok(value.clone());
        }
        self.functions
            .lookup(name)
            .map(Value::Function)
            .ok_or_else(|| EvalError::Name(name.to_string()))
    }
}

/// Handling of constructs the restricted operator table does not cover
///
/// The defaults reject everything; a more permissive strategy overrides them.
pub trait Extensions {
    /// Unary operator outside `- + not`
    fn unary(&self, op: UnaryOperator, _operand: &Value) -> EvalResult<Value> {
        Err(EvalError::UnsupportedOperator(op.symbol().into()))
    }

    /// Binary operator outside `+ - * / // % **`
    fn binary(&self, op: BinaryOperator, _left: &Value, _right: &Value) -> EvalResult<Value> {
        Err(EvalError::UnsupportedOperator(op.symbol().into()))
    }

    /// Comparison outside `== != < <= > >=`
    fn compare(&self, op: CompareOperator, _left: &Value, _right: &Value) -> EvalResult<bool> {
        Err(EvalError::UnsupportedOperator(op.symbol().into()))
    }

    /// Tuple, set and slice nodes, and calls whose callee is not a plain name
    fn expression(&self, expr: &Expr, _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
        Err(EvalError::UnsupportedExpression(unsupported_kind(expr).into()))
    }
}

fn unsupported_kind(expr: &Expr) -> &'static str {
    match expr {
        Expr::Call { func, .. } if matches!(**func, Expr::Attribute { .. }) => "method call",
        other => other.kind(),
    }
}

/// The closed operator table, with no extensions
#[derive(Debug, Clone, Copy, Default)]
pub struct Restricted;

impl Extensions for Restricted {}

/// Evaluate an expression with the restricted operator table
pub fn evaluate(expr: &Expr, ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    walk(expr, ctx, &Restricted)
}

/// Evaluate an expression, routing unsupported constructs to `ext`
pub fn walk<X: Extensions + ?Sized>(
    expr: &Expr,
    ctx: &EvaluationContext<'_>,
    ext: &X,
) -> EvalResult<Value> {
    match expr {
        // === Atoms ===
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Name(name) => ctx.resolve(name),

        // === Operators ===
        Expr::UnaryOp { op, operand } => {
            let value = walk(operand, ctx, ext)?;
            match ops::unary_op(*op, &value) {
                Err(EvalError::UnsupportedOperator(_)) => ext.unary(*op, &value),
                result => result,
            }
        }

        Expr::BinaryOp { op, left, right } => {
            let l = walk(left, ctx, ext)?;
            let r = walk(right, ctx, ext)?;
            match ops::binary_op(*op, &l, &r) {
                Err(EvalError::UnsupportedOperator(_)) => ext.binary(*op, &l, &r),
                result => result,
            }
        }

        Expr::Compare {
            left,
            ops: operators,
            comparators,
        } => evaluate_compare(left, operators, comparators, ctx, ext),

        Expr::BoolOp { op, values } => {
            // Conjunction/disjunction: the result is a bool, not an operand
            let stop_on = matches!(op, BoolOperator::Or);
            for value in values {
                if walk(value, ctx, ext)?.is_truthy() == stop_on {
                    return Ok(Value::Bool(stop_on));
                }
            }
            Ok(Value::Bool(!stop_on))
        }

        Expr::Conditional { test, body, orelse } => {
            if walk(test, ctx, ext)?.is_truthy() {
                walk(body, ctx, ext)
            } else {
                walk(orelse, ctx, ext)
            }
        }

        // === Calls and access ===
        Expr::Call { func, args, kwargs } => match func.as_ref() {
            Expr::Name(name) => evaluate_call(name, args, kwargs, ctx, ext),
            _ => ext.expression(expr, ctx),
        },

        Expr::Index { target, key } => {
            let target = walk(target, ctx, ext)?;
            let key = walk(key, ctx, ext)?;
            ops::index(&target, &key)
        }

        Expr::Attribute { target, name } => ops::attribute(&walk(target, ctx, ext)?, name),

        // === Displays ===
        Expr::List(items) => items
            .iter()
            .map(|item| walk(item, ctx, ext))
            .collect::<EvalResult<Vec<_>>>()
            .map(Value::List),

        Expr::Map(pairs) => {
            let mut map = ValueMap::new();
            for (key, value) in pairs {
                let key = walk(key, ctx, ext)?;
                let value = walk(value, ctx, ext)?;
                map.insert(key, value)?;
            }
            Ok(Value::Map(map))
        }

        Expr::Tuple(_) | Expr::Set(_) | Expr::Slice { .. } => ext.expression(expr, ctx),
    }
}

/// Chained comparison, false at the first failing pair
fn evaluate_compare<X: Extensions + ?Sized>(
    left: &Expr,
    operators: &[CompareOperator],
    comparators: &[Expr],
    ctx: &EvaluationContext<'_>,
    ext: &X,
) -> EvalResult<Value> {
    let mut left = walk(left, ctx, ext)?;
    for (op, comparator) in operators.iter().zip(comparators) {
        let right = walk(comparator, ctx, ext)?;
        let holds = match ops::compare(*op, &left, &right) {
            Err(EvalError::UnsupportedOperator(_)) => ext.compare(*op, &left, &right)?,
            result => result?,
        };
        if !holds {
            return Ok(Value::Bool(false));
        }
        left = right;
    }
    Ok(Value::Bool(true))
}

/// Call a named function with eagerly evaluated arguments
fn evaluate_call<X: Extensions + ?Sized>(
    name: &str,
    args: &[Expr],
    kwargs: &[(String, Expr)],
    ctx: &EvaluationContext<'_>,
    ext: &X,
) -> EvalResult<Value> {
    let def = match ctx.resolve(name)? {
        Value::Function(def) => def,
        other => {
            return Err(EvalError::Call {
                name: name.to_string(),
                message: format!("'{}' object is not callable", other.type_name()),
            })
        }
    };

    let positional = args
        .iter()
        .map(|arg| walk(arg, ctx, ext))
        .collect::<EvalResult<Vec<_>>>()?;
    let mut keywords = Vec::with_capacity(kwargs.len());
    for (keyword, value) in kwargs {
        keywords.push((keyword.clone(), walk(value, ctx, ext)?));
    }

    def.call(positional, keywords).map_err(|e| EvalError::Call {
        name: name.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FunctionError;
    use crate::functions::{FunctionDef, FunctionRegistry};
    use crate::parser::parse_expression;
    use pretty_assertions::assert_eq;

    fn eval_with(source: &str, row: &Row, functions: &FunctionRegistry) -> EvalResult<Value> {
        let expr = parse_expression(source)?;
        evaluate(&expr, &EvaluationContext::new(row, functions))
    }

    fn eval(source: &str) -> EvalResult<Value> {
        eval_with(source, &Row::new(), &FunctionRegistry::new())
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn boom(_args: &[Value]) -> Result<Value, FunctionError> {
        Err(FunctionError::Argument("boom".into()))
    }

    #[test]
    fn test_literals_and_arithmetic() {
        assert_eq!(eval("1 + 2 * 3").unwrap(), Value::Int(7));
        assert_eq!(eval("(1 + 2) * 3").unwrap(), Value::Int(9));
        assert_eq!(eval("2 ** 3 ** 2").unwrap(), Value::Int(512));
        assert_eq!(eval("-7 // 2").unwrap(), Value::Int(-4));
        assert_eq!(eval("'a' + 'b'").unwrap(), Value::Str("ab".into()));
        assert_eq!(eval("None").unwrap(), Value::None);
    }

    #[test]
    fn test_map_literal_rejects_unhashable_keys() {
        assert_eq!(
            eval("{[1]: 2}"),
            Err(EvalError::Type("unhashable type: 'list'".into()))
        );
        assert_eq!(
            eval("{'a': 1, {}: 2}"),
            Err(EvalError::Type("unhashable type: 'dict'".into()))
        );
        assert_eq!(eval("{1: 'a', 1.0: 'b'}").unwrap().to_string(), "{1: 'b'}");
    }

    #[test]
    fn test_row_variables() {
        let r = row(&[("price", Value::Float(2.5)), ("qty", Value::Int(4))]);
        let functions = FunctionRegistry::new();
        assert_eq!(eval_with("price * qty", &r, &functions).unwrap(), Value::Float(10.0));
        assert_eq!(
            eval_with("missing + 1", &r, &functions),
            Err(EvalError::Name("missing".into()))
        );
    }

    #[test]
    fn test_chained_comparison() {
        assert_eq!(eval("1 < 2 < 3").unwrap(), Value::Bool(true));
        assert_eq!(eval("3 < 2 < 1").unwrap(), Value::Bool(false));
        assert_eq!(eval("1 == 1.0 != 2").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_chained_comparison_short_circuits() {
        let mut functions = FunctionRegistry::empty();
        functions.register(FunctionDef::new("boom", 0, None, boom)).unwrap();
        assert_eq!(
            eval_with("3 < 2 < boom()", &Row::new(), &functions).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_bool_ops_return_bools() {
        assert_eq!(eval("1 and 'x'").unwrap(), Value::Bool(true));
        assert_eq!(eval("1 and 0").unwrap(), Value::Bool(false));
        assert_eq!(eval("0 or ''").unwrap(), Value::Bool(false));
        assert_eq!(eval("0 or 5").unwrap(), Value::Bool(true));
        assert_eq!(eval("not 0").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_bool_ops_short_circuit() {
        let mut functions = FunctionRegistry::empty();
        functions.register(FunctionDef::new("boom", 0, None, boom)).unwrap();
        let r = Row::new();
        assert_eq!(eval_with("0 and boom()", &r, &functions).unwrap(), Value::Bool(false));
        assert_eq!(eval_with("1 or boom()", &r, &functions).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_conditional_evaluates_one_branch() {
        let mut functions = FunctionRegistry::empty();
        functions.register(FunctionDef::new("boom", 0, None, boom)).unwrap();
        let r = row(&[("condition", Value::Bool(true))]);
        assert_eq!(
            eval_with("'yes' if condition else boom()", &r, &functions).unwrap(),
            Value::Str("yes".into())
        );
        let r = row(&[("condition", Value::Bool(false))]);
        assert!(matches!(
            eval_with("'yes' if condition else boom()", &r, &functions),
            Err(EvalError::Call { .. })
        ));
    }

    #[test]
    fn test_function_calls() {
        assert_eq!(
            eval("clean('  a   b ')").unwrap(),
            Value::Str("a b".into())
        );
        assert_eq!(
            eval("format_date('2024-01-31', fmt='%d/%m')").unwrap(),
            Value::Str("31/01".into())
        );
        assert_eq!(eval("coalesce(None, 3)").unwrap(), Value::Int(3));
        assert_eq!(
            eval("clean()"),
            Err(EvalError::Call {
                name: "clean".into(),
                message: "takes 1 argument(s) but 0 were given".into()
            })
        );
        assert_eq!(eval("nope(1)"), Err(EvalError::Name("nope".into())));
    }

    #[test]
    fn test_row_shadows_function() {
        let r = row(&[("coalesce", Value::Int(1))]);
        let functions = FunctionRegistry::new();
        assert_eq!(eval_with("coalesce + 1", &r, &functions).unwrap(), Value::Int(2));
        assert_eq!(
            eval_with("coalesce(None, 2)", &r, &functions),
            Err(EvalError::Call {
                name: "coalesce".into(),
                message: "'int' object is not callable".into()
            })
        );
    }

    #[test]
    fn test_displays_and_access() {
        assert_eq!(
            eval("[1, 2 + 3]").unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(5)])
        );
        assert_eq!(eval("{'a': 1, 'b': 2}['b']").unwrap(), Value::Int(2));
        assert_eq!(eval("{'a': 1, 'a': 2}['a']").unwrap(), Value::Int(2));
        assert!(matches!(eval("[1][5]"), Err(EvalError::Index(_))));
        assert!(matches!(eval("{'a': 1}['z']"), Err(EvalError::Index(_))));
        assert_eq!(eval("clean.__name__").unwrap(), Value::Str("clean".into()));
        assert!(matches!(eval("(1).real"), Err(EvalError::Attribute { .. })));
    }

    #[test]
    fn test_rejected_constructs() {
        assert_eq!(eval("1 & 2"), Err(EvalError::UnsupportedOperator("&".into())));
        assert_eq!(eval("~1"), Err(EvalError::UnsupportedOperator("~".into())));
        assert_eq!(
            eval("1 in [1]"),
            Err(EvalError::UnsupportedOperator("in".into()))
        );
        assert_eq!(
            eval("(1, 2)"),
            Err(EvalError::UnsupportedExpression("Tuple".into()))
        );
        assert_eq!(
            eval("{1, 2}"),
            Err(EvalError::UnsupportedExpression("Set".into()))
        );
        assert_eq!(
            eval("'abc'[1:]"),
            Err(EvalError::UnsupportedExpression("Slice".into()))
        );
        assert_eq!(
            eval("'abc'.upper()"),
            Err(EvalError::UnsupportedExpression("method call".into()))
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(eval("1/0"), Err(EvalError::Arithmetic(_))));
    }
}
