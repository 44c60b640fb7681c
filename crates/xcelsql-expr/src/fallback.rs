//! Opt-in fallback evaluation
//!
//! When enabled, an expression the restricted evaluator rejects gets a second
//! attempt through a [`FallbackEvaluator`]. This widens what user text can do
//! and must stay behind an explicit switch (see
//! [`crate::set_eval_fallback`]); nothing here runs unless the operator asks.
//!
//! [`PermissiveEvaluator`] reuses the restricted tree walk and adds the
//! constructs it refuses: bitwise integer operators, membership and identity
//! tests, tuples, sets, slices and a fixed set of string, list, map and date
//! methods. It still has no access to I/O or host state.

use crate::ast::{BinaryOperator, CompareOperator, Expr, UnaryOperator};
use crate::error::{EvalError, EvalResult};
use crate::evaluator::{walk, EvaluationContext, Extensions};
use crate::parser::parse_expression;
use crate::value::{Number, Value, ValueMap};
use std::fmt::Write;
use std::sync::Arc;

/// Second-chance evaluation strategy
pub trait FallbackEvaluator: Send + Sync {
    /// Strategy name, used in log messages
    fn name(&self) -> &str;

    /// Evaluate `source` against the same bindings the restricted attempt saw
    fn evaluate(&self, source: &str, ctx: &EvaluationContext<'_>) -> EvalResult<Value>;
}

/// Fallback that widens the restricted language
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveEvaluator;

impl FallbackEvaluator for PermissiveEvaluator {
    fn name(&self) -> &str {
        "permissive"
    }

    fn evaluate(&self, source: &str, ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
        let expr = parse_expression(source)?;
        walk(&expr, ctx, &Permissive)
    }
}

/// Extensions used by [`PermissiveEvaluator`]
#[derive(Debug, Clone, Copy, Default)]
pub struct Permissive;

impl Extensions for Permissive {
    fn unary(&self, op: UnaryOperator, operand: &Value) -> EvalResult<Value> {
        match (op, operand.as_number()) {
            (UnaryOperator::Invert, Some(Number::Int(i))) => Ok(Value::Int(!i)),
            _ => Err(EvalError::Type(format!(
                "bad operand type for unary {}: '{}'",
                op.symbol(),
                operand.type_name()
            ))),
        }
    }

    fn binary(&self, op: BinaryOperator, left: &Value, right: &Value) -> EvalResult<Value> {
        if let (Value::Bool(a), Value::Bool(b)) = (left, right) {
            match op {
                BinaryOperator::BitAnd => return Ok(Value::Bool(a & b)),
                BinaryOperator::BitOr => return Ok(Value::Bool(a | b)),
                BinaryOperator::BitXor => return Ok(Value::Bool(a ^ b)),
                _ => {}
            }
        }

        let (a, b) = match (left.as_number(), right.as_number()) {
            (Some(Number::Int(a)), Some(Number::Int(b))) if op != BinaryOperator::MatMul => (a, b),
            _ => {
                return Err(EvalError::operand_types(
                    op.symbol(),
                    left.type_name(),
                    right.type_name(),
                ))
            }
        };

        match op {
            BinaryOperator::BitAnd => Ok(Value::Int(a & b)),
            BinaryOperator::BitOr => Ok(Value::Int(a | b)),
            BinaryOperator::BitXor => Ok(Value::Int(a ^ b)),
            BinaryOperator::LeftShift => shift_left(a, b).map(Value::Int),
            BinaryOperator::RightShift => shift_right(a, b).map(Value::Int),
            other => Err(EvalError::UnsupportedOperator(other.symbol().into())),
        }
    }

    fn compare(&self, op: CompareOperator, left: &Value, right: &Value) -> EvalResult<bool> {
        match op {
            CompareOperator::In => contains(right, left),
            CompareOperator::NotIn => contains(right, left).map(|found| !found),
            CompareOperator::Is => Ok(identical(left, right)),
            CompareOperator::IsNot => Ok(!identical(left, right)),
            other => Err(EvalError::UnsupportedOperator(other.symbol().into())),
        }
    }

    fn expression(&self, expr: &Expr, ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
        match expr {
            Expr::Tuple(items) => items
                .iter()
                .map(|item| walk(item, ctx, self))
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::List),

            Expr::Set(items) => {
                let mut seen = ValueMap::new();
                for item in items {
                    seen.insert(walk(item, ctx, self)?, Value::None)?;
                }
                Ok(Value::List(seen.iter().map(|(k, _)| k.clone()).collect()))
            }

            Expr::Slice {
                target,
                lower,
                upper,
                step,
            } => {
                let target = walk(target, ctx, self)?;
                let bound = |part: &Option<Box<Expr>>| -> EvalResult<Option<i64>> {
                    match part {
                        None => Ok(None),
                        Some(expr) => slice_bound(&walk(expr, ctx, self)?),
                    }
                };
                let (lower, upper, step) = (bound(lower)?, bound(upper)?, bound(step)?);
                slice(&target, lower, upper, step)
            }

            Expr::Call { func, args, kwargs } => {
                let positional = args
                    .iter()
                    .map(|arg| walk(arg, ctx, self))
                    .collect::<EvalResult<Vec<_>>>()?;

                if let Expr::Attribute { target, name } = func.as_ref() {
                    let receiver = walk(target, ctx, self)?;
                    if !kwargs.is_empty() {
                        return Err(EvalError::Type(format!(
                            "{}() takes no keyword arguments",
                            name
                        )));
                    }
                    return call_method(&receiver, name, &positional);
                }

                let mut keywords = Vec::with_capacity(kwargs.len());
                for (keyword, value) in kwargs {
                    keywords.push((keyword.clone(), walk(value, ctx, self)?));
                }
                match walk(func, ctx, self)? {
                    Value::Function(def) => {
                        def.call(positional, keywords).map_err(|e| EvalError::Call {
                            name: def.name.clone(),
                            message: e.to_string(),
                        })
                    }
                    other => Err(EvalError::Call {
                        name: func.kind().to_string(),
                        message: format!("'{}' object is not callable", other.type_name()),
                    }),
                }
            }

            other => Err(EvalError::UnsupportedExpression(other.kind().into())),
        }
    }
}

fn shift_left(value: i64, count: i64) -> EvalResult<i64> {
    if count < 0 {
        return Err(EvalError::Arithmetic("negative shift count".into()));
    }
    if value == 0 {
        return Ok(0);
    }
    let count = u32::try_from(count)
        .ok()
        .filter(|c| *c < 64)
        .ok_or_else(|| EvalError::Arithmetic("integer overflow".into()))?;
    let shifted = value << count;
    if shifted >> count != value {
        return Err(EvalError::Arithmetic("integer overflow".into()));
    }
    Ok(shifted)
}

fn shift_right(value: i64, count: i64) -> EvalResult<i64> {
    if count < 0 {
        return Err(EvalError::Arithmetic("negative shift count".into()));
    }
    Ok(match u32::try_from(count) {
        Ok(c) if c < 64 => value >> c,
        _ if value < 0 => -1,
        _ => 0,
    })
}

/// `item in container`
fn contains(container: &Value, item: &Value) -> EvalResult<bool> {
    match (container, item) {
        (Value::Str(haystack), Value::Str(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::Str(_), other) => Err(EvalError::Type(format!(
            "'in <string>' requires string as left operand, not {}",
            other.type_name()
        ))),
        (Value::List(items), _) => Ok(items.iter().any(|v| v.loose_eq(item))),
        (Value::Map(_), Value::List(_) | Value::Map(_)) => Err(EvalError::Type(format!(
            "unhashable type: '{}'",
            item.type_name()
        ))),
        (Value::Map(map), _) => Ok(map.get(item).is_some()),
        (other, _) => Err(EvalError::Type(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

/// `left is right`: singletons, booleans and the same function object
fn identical(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::None, Value::None) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

fn slice_bound(value: &Value) -> EvalResult<Option<i64>> {
    match value {
        Value::None => Ok(None),
        Value::Int(i) => Ok(Some(*i)),
        Value::Bool(b) => Ok(Some(i64::from(*b))),
        other => Err(EvalError::Type(format!(
            "slice indices must be integers or None, not '{}'",
            other.type_name()
        ))),
    }
}

/// Positions selected by `[lower:upper:step]` over a sequence of `len` items
fn slice_positions(
    len: usize,
    lower: Option<i64>,
    upper: Option<i64>,
    step: Option<i64>,
) -> EvalResult<Vec<usize>> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(EvalError::Index("slice step cannot be zero".into()));
    }
    let len = i64::try_from(len).map_err(|_| EvalError::Arithmetic("integer overflow".into()))?;

    // Clamp into [floor, ceil] after counting negatives from the end
    let clamp = |bound: i64, floor: i64, ceil: i64| {
        let bound = if bound < 0 { bound + len } else { bound };
        bound.clamp(floor, ceil)
    };

    let mut positions = Vec::new();
    if step > 0 {
        let start = lower.map_or(0, |b| clamp(b, 0, len));
        let stop = upper.map_or(len, |b| clamp(b, 0, len));
        let mut i = start;
        while i < stop {
            positions.push(i);
            i = match i.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
    } else {
        let start = lower.map_or(len - 1, |b| clamp(b, -1, len - 1));
        let stop = upper.map_or(-1, |b| clamp(b, -1, len - 1));
        let mut i = start;
        while i > stop {
            positions.push(i);
            i = match i.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
    }

    Ok(positions
        .into_iter()
        .filter_map(|i| usize::try_from(i).ok())
        .collect())
}

fn slice(
    target: &Value,
    lower: Option<i64>,
    upper: Option<i64>,
    step: Option<i64>,
) -> EvalResult<Value> {
    match target {
        Value::List(items) => Ok(Value::List(
            slice_positions(items.len(), lower, upper, step)?
                .into_iter()
                .map(|i| items[i].clone())
                .collect(),
        )),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Str(
                slice_positions(chars.len(), lower, upper, step)?
                    .into_iter()
                    .map(|i| chars[i])
                    .collect(),
            ))
        }
        other => Err(EvalError::Type(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn check_arity(method: &str, args: &[Value], min: usize, max: usize) -> EvalResult<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{} to {}", min, max)
        };
        return Err(EvalError::Type(format!(
            "{}() takes {} argument(s) but {} were given",
            method,
            expected,
            args.len()
        )));
    }
    Ok(())
}

fn str_arg<'v>(method: &str, value: &'v Value) -> EvalResult<&'v str> {
    value.as_str().ok_or_else(|| {
        EvalError::Type(format!(
            "{}() argument must be str, not {}",
            method,
            value.type_name()
        ))
    })
}

/// Character position of a byte offset
fn char_position(s: &str, byte: usize) -> i64 {
    i64::try_from(s[..byte].chars().count()).unwrap_or(i64::MAX)
}

fn count_of(n: usize) -> Value {
    Value::Int(i64::try_from(n).unwrap_or(i64::MAX))
}

fn call_method(receiver: &Value, method: &str, args: &[Value]) -> EvalResult<Value> {
    match receiver {
        Value::Str(s) => str_method(s, method, args),
        Value::List(items) => list_method(items, method, args),
        Value::Map(map) => map_method(map, method, args),
        Value::Date(_) | Value::DateTime(_) => date_method(receiver, method, args),
        _ => Err(no_attribute(receiver, method)),
    }
}

fn no_attribute(receiver: &Value, method: &str) -> EvalError {
    EvalError::Attribute {
        type_name: receiver.type_name().to_string(),
        attr: method.to_string(),
    }
}

fn str_method(s: &str, method: &str, args: &[Value]) -> EvalResult<Value> {
    let text = |t: &str| -> EvalResult<Value> { Ok(Value::Str(t.to_string())) };
    match method {
        "upper" => {
            check_arity(method, args, 0, 0)?;
            text(&s.to_uppercase())
        }
        "lower" => {
            check_arity(method, args, 0, 0)?;
            text(&s.to_lowercase())
        }
        "strip" | "lstrip" | "rstrip" => {
            check_arity(method, args, 0, 1)?;
            let chars: Option<Vec<char>> = match args.first() {
                None | Some(Value::None) => None,
                Some(v) => Some(str_arg(method, v)?.chars().collect()),
            };
            let strip = |c: char| match &chars {
                Some(set) => set.contains(&c),
                None => c.is_whitespace(),
            };
            text(match method {
                "strip" => s.trim_matches(strip),
                "lstrip" => s.trim_start_matches(strip),
                _ => s.trim_end_matches(strip),
            })
        }
        "startswith" => {
            check_arity(method, args, 1, 1)?;
            Ok(Value::Bool(s.starts_with(str_arg(method, &args[0])?)))
        }
        "endswith" => {
            check_arity(method, args, 1, 1)?;
            Ok(Value::Bool(s.ends_with(str_arg(method, &args[0])?)))
        }
        "replace" => {
            check_arity(method, args, 2, 2)?;
            text(&s.replace(str_arg(method, &args[0])?, str_arg(method, &args[1])?))
        }
        "split" => {
            check_arity(method, args, 0, 1)?;
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::None) => s.split_whitespace().map(Value::from).collect(),
                Some(sep) => {
                    let sep = str_arg(method, sep)?;
                    if sep.is_empty() {
                        return Err(EvalError::Type("empty separator".into()));
                    }
                    s.split(sep).map(Value::from).collect()
                }
            };
            Ok(Value::List(parts))
        }
        "join" => {
            check_arity(method, args, 1, 1)?;
            let items = match &args[0] {
                Value::List(items) => items,
                other => {
                    return Err(EvalError::Type(format!(
                        "can only join an iterable, not {}",
                        other.type_name()
                    )))
                }
            };
            let parts = items
                .iter()
                .map(|item| str_arg(method, item))
                .collect::<EvalResult<Vec<_>>>()?;
            text(&parts.join(s))
        }
        "count" => {
            check_arity(method, args, 1, 1)?;
            let needle = str_arg(method, &args[0])?;
            Ok(if needle.is_empty() {
                count_of(s.chars().count() + 1)
            } else {
                count_of(s.matches(needle).count())
            })
        }
        "find" => {
            check_arity(method, args, 1, 1)?;
            let needle = str_arg(method, &args[0])?;
            Ok(Value::Int(
                s.find(needle).map_or(-1, |byte| char_position(s, byte)),
            ))
        }
        _ => Err(no_attribute(&Value::Str(String::new()), method)),
    }
}

fn list_method(items: &[Value], method: &str, args: &[Value]) -> EvalResult<Value> {
    match method {
        "index" => {
            check_arity(method, args, 1, 1)?;
            items
                .iter()
                .position(|v| v.loose_eq(&args[0]))
                .map(count_of)
                .ok_or_else(|| EvalError::Index(format!("{} is not in list", args[0].repr())))
        }
        "count" => {
            check_arity(method, args, 1, 1)?;
            Ok(count_of(items.iter().filter(|v| v.loose_eq(&args[0])).count()))
        }
        _ => Err(no_attribute(&Value::List(Vec::new()), method)),
    }
}

fn map_method(map: &ValueMap, method: &str, args: &[Value]) -> EvalResult<Value> {
    match method {
        "get" => {
            check_arity(method, args, 1, 2)?;
            Ok(map
                .get(&args[0])
                .or_else(|| args.get(1))
                .cloned()
                .unwrap_or(Value::None))
        }
        "keys" => {
            check_arity(method, args, 0, 0)?;
            Ok(Value::List(map.iter().map(|(k, _)| k.clone()).collect()))
        }
        "values" => {
            check_arity(method, args, 0, 0)?;
            Ok(Value::List(map.iter().map(|(_, v)| v.clone()).collect()))
        }
        "items" => {
            check_arity(method, args, 0, 0)?;
            Ok(Value::List(
                map.iter()
                    .map(|(k, v)| Value::List(vec![k.clone(), v.clone()]))
                    .collect(),
            ))
        }
        _ => Err(no_attribute(&Value::Map(ValueMap::new()), method)),
    }
}

fn date_method(receiver: &Value, method: &str, args: &[Value]) -> EvalResult<Value> {
    let layout = match (method, receiver) {
        ("isoformat", Value::Date(_)) => "%Y-%m-%d",
        ("isoformat", _) => "%Y-%m-%dT%H:%M:%S%.f",
        ("strftime", _) => {
            check_arity(method, args, 1, 1)?;
            str_arg(method, &args[0])?
        }
        _ => return Err(no_attribute(receiver, method)),
    };
    if method == "isoformat" {
        check_arity(method, args, 0, 0)?;
    }

    let mut out = String::new();
    let written = match receiver {
        Value::Date(d) => write!(out, "{}", d.format(layout)),
        Value::DateTime(dt) => write!(out, "{}", dt.format(layout)),
        _ => return Err(no_attribute(receiver, method)),
    };
    written.map_err(|_| EvalError::Type(format!("invalid format string: {}", layout)))?;
    Ok(Value::Str(out))
}
