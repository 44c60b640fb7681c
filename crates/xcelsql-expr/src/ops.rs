//! Operator table
//!
//! Every operator the restricted evaluator supports dispatches to one of the
//! functions here. Integer arithmetic is checked; overflow and division by
//! zero are errors rather than wrapping or producing infinities.

use crate::ast::{BinaryOperator, CompareOperator, UnaryOperator};
use crate::error::{EvalError, EvalResult};
use crate::value::{Number, Value};
use chrono::Datelike;
use chrono::Timelike;
use std::cmp::Ordering;

fn overflow() -> EvalError {
    EvalError::Arithmetic("integer overflow".into())
}

fn check_float(result: f64, left: f64, right: f64) -> EvalResult<Value> {
    if result.is_infinite() && left.is_finite() && right.is_finite() {
        return Err(EvalError::Arithmetic("numerical result out of range".into()));
    }
    Ok(Value::Float(result))
}

/// Apply an arithmetic operator (`+ - * / // % **`)
pub fn binary_op(op: BinaryOperator, left: &Value, right: &Value) -> EvalResult<Value> {
    match op {
        BinaryOperator::Add => add(left, right),
        BinaryOperator::Subtract => numeric(op, left, right, i64::checked_sub, |a, b| a - b),
        BinaryOperator::Multiply => multiply(left, right),
        BinaryOperator::Divide => divide(left, right),
        BinaryOperator::FloorDivide => floor_divide(left, right),
        BinaryOperator::Modulo => modulo(left, right),
        BinaryOperator::Power => power(left, right),
        other => Err(EvalError::UnsupportedOperator(other.symbol().into())),
    }
}

fn numbers(op: BinaryOperator, left: &Value, right: &Value) -> EvalResult<(Number, Number)> {
    match (left.as_number(), right.as_number()) {
        (Some(l), Some(r)) => Ok((l, r)),
        _ => Err(EvalError::operand_types(
            op.symbol(),
            left.type_name(),
            right.type_name(),
        )),
    }
}

fn numeric(
    op: BinaryOperator,
    left: &Value,
    right: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> EvalResult<Value> {
    match numbers(op, left, right)? {
        (Number::Int(a), Number::Int(b)) => int_op(a, b).map(Value::Int).ok_or_else(overflow),
        (a, b) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            check_float(float_op(a, b), a, b)
        }
    }
}

fn add(left: &Value, right: &Value) -> EvalResult<Value> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
        (Value::List(a), Value::List(b)) => {
            Ok(Value::List(a.iter().chain(b.iter()).cloned().collect()))
        }
        _ => numeric(BinaryOperator::Add, left, right, i64::checked_add, |a, b| a + b),
    }
}

/// Upper bound on the length of a repeated string or list
pub(crate) const MAX_REPEAT_LEN: usize = 10_000_000;

fn repeat_count(count: &Value) -> Option<usize> {
    match count {
        Value::Int(n) => Some(usize::try_from(*n).unwrap_or(0)),
        Value::Bool(b) => Some(usize::from(*b)),
        _ => None,
    }
}

fn repeated_len(unit: usize, times: usize) -> EvalResult<usize> {
    match unit.checked_mul(times) {
        Some(len) if len <= MAX_REPEAT_LEN => Ok(len),
        _ => Err(EvalError::Arithmetic("repeated sequence is too long".into())),
    }
}

fn multiply(left: &Value, right: &Value) -> EvalResult<Value> {
    let (sequence, count) = match (left, right) {
        (Value::Str(_) | Value::List(_), n) => (left, n),
        (n, Value::Str(_) | Value::List(_)) => (right, n),
        _ => return numeric(BinaryOperator::Multiply, left, right, i64::checked_mul, |a, b| a * b),
    };
    let times = match repeat_count(count) {
        Some(times) => times,
        None => return Err(EvalError::operand_types("*", left.type_name(), right.type_name())),
    };

    match sequence {
        Value::Str(s) => {
            repeated_len(s.len(), times)?;
            Ok(Value::Str(s.repeat(times)))
        }
        Value::List(items) => {
            let len = repeated_len(items.len(), times)?;
            let mut out = Vec::new();
            out.try_reserve(len)
                .map_err(|_| EvalError::Arithmetic("repeated sequence is too long".into()))?;
            out.extend(items.iter().cycle().take(len).cloned());
            Ok(Value::List(out))
        }
        _ => numeric(BinaryOperator::Multiply, left, right, i64::checked_mul, |a, b| a * b),
    }
}

fn divide(left: &Value, right: &Value) -> EvalResult<Value> {
    let (a, b) = numbers(BinaryOperator::Divide, left, right)?;
    let (a, b) = (a.as_f64(), b.as_f64());
    if b == 0.0 {
        return Err(EvalError::Arithmetic("division by zero".into()));
    }
    check_float(a / b, a, b)
}

fn floor_divide(left: &Value, right: &Value) -> EvalResult<Value> {
    match numbers(BinaryOperator::FloorDivide, left, right)? {
        (Number::Int(_), Number::Int(0)) => Err(EvalError::Arithmetic(
            "integer division or modulo by zero".into(),
        )),
        (Number::Int(a), Number::Int(b)) => {
            let q = a.checked_div(b).ok_or_else(overflow)?;
            // Round toward negative infinity
            if (a % b != 0) && ((a < 0) != (b < 0)) {
                Ok(Value::Int(q - 1))
            } else {
                Ok(Value::Int(q))
            }
        }
        (a, b) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            if b == 0.0 {
                return Err(EvalError::Arithmetic("float floor division by zero".into()));
            }
            Ok(Value::Float((a / b).floor()))
        }
    }
}

fn modulo(left: &Value, right: &Value) -> EvalResult<Value> {
    match numbers(BinaryOperator::Modulo, left, right)? {
        (Number::Int(_), Number::Int(0)) => Err(EvalError::Arithmetic(
            "integer division or modulo by zero".into(),
        )),
        (Number::Int(a), Number::Int(b)) => {
            let r = a.checked_rem(b).ok_or_else(overflow)?;
            // Result takes the sign of the divisor
            if r != 0 && ((r < 0) != (b < 0)) {
                Ok(Value::Int(r + b))
            } else {
                Ok(Value::Int(r))
            }
        }
        (a, b) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            if b == 0.0 {
                return Err(EvalError::Arithmetic("float modulo".into()));
            }
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                Ok(Value::Float(r + b))
            } else {
                Ok(Value::Float(r))
            }
        }
    }
}

fn power(left: &Value, right: &Value) -> EvalResult<Value> {
    match numbers(BinaryOperator::Power, left, right)? {
        (Number::Int(base), Number::Int(exp)) if exp >= 0 => {
            let exp = u32::try_from(exp).map_err(|_| overflow())?;
            base.checked_pow(exp).map(Value::Int).ok_or_else(overflow)
        }
        (a, b) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            if a == 0.0 && b < 0.0 {
                return Err(EvalError::Arithmetic(
                    "0.0 cannot be raised to a negative power".into(),
                ));
            }
            let result = a.powf(b);
            if result.is_nan() && !a.is_nan() && !b.is_nan() {
                return Err(EvalError::Arithmetic("math domain error".into()));
            }
            check_float(result, a, b)
        }
    }
}

/// Apply `-`, `+` or `not`
pub fn unary_op(op: UnaryOperator, operand: &Value) -> EvalResult<Value> {
    match op {
        UnaryOperator::Not => Ok(Value::Bool(!operand.is_truthy())),
        UnaryOperator::Negate => match operand.as_number() {
            Some(Number::Int(i)) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
            Some(Number::Float(f)) => Ok(Value::Float(-f)),
            None => Err(EvalError::Type(format!(
                "bad operand type for unary -: '{}'",
                operand.type_name()
            ))),
        },
        UnaryOperator::Plus => match operand.as_number() {
            Some(Number::Int(i)) => Ok(Value::Int(i)),
            Some(Number::Float(f)) => Ok(Value::Float(f)),
            None => Err(EvalError::Type(format!(
                "bad operand type for unary +: '{}'",
                operand.type_name()
            ))),
        },
        UnaryOperator::Invert => Err(EvalError::UnsupportedOperator(op.symbol().into())),
    }
}

/// Apply one of `== != < <= > >=`
pub fn compare(op: CompareOperator, left: &Value, right: &Value) -> EvalResult<bool> {
    let ordering = |accept: fn(Ordering) -> bool| -> EvalResult<bool> {
        Ok(left.try_cmp(right, op.symbol())?.map_or(false, accept))
    };

    match op {
        CompareOperator::Equal => Ok(left.loose_eq(right)),
        CompareOperator::NotEqual => Ok(!left.loose_eq(right)),
        CompareOperator::LessThan => ordering(Ordering::is_lt),
        CompareOperator::LessEqual => ordering(Ordering::is_le),
        CompareOperator::GreaterThan => ordering(Ordering::is_gt),
        CompareOperator::GreaterEqual => ordering(Ordering::is_ge),
        other => Err(EvalError::UnsupportedOperator(other.symbol().into())),
    }
}

/// Resolve a possibly negative index against a sequence length
fn sequence_index(key: &Value, len: usize, what: &str) -> EvalResult<usize> {
    let i = match key {
        Value::Int(i) => *i,
        Value::Bool(b) => i64::from(*b),
        other => {
            return Err(EvalError::Type(format!(
                "{} indices must be integers, not '{}'",
                what,
                other.type_name()
            )))
        }
    };
    let len = i64::try_from(len).map_err(|_| overflow())?;
    let resolved = if i < 0 { i + len } else { i };
    if resolved < 0 || resolved >= len {
        return Err(EvalError::Index(format!("{} index out of range", what)));
    }
    usize::try_from(resolved).map_err(|_| overflow())
}

/// `target[key]` for lists, strings and maps
pub fn index(target: &Value, key: &Value) -> EvalResult<Value> {
    match target {
        Value::List(items) => {
            let i = sequence_index(key, items.len(), "list")?;
            Ok(items[i].clone())
        }
        Value::Str(s) => {
            let i = sequence_index(key, s.chars().count(), "string")?;
            Ok(Value::Str(s.chars().nth(i).map(String::from).unwrap_or_default()))
        }
        Value::Map(map) => map
            .get(key)
            .cloned()
            .ok_or_else(|| EvalError::Index(format!("key {} not found", key.repr()))),
        other => Err(EvalError::Type(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// `target.name` for date and datetime fields
pub fn attribute(target: &Value, name: &str) -> EvalResult<Value> {
    let field = match (target, name) {
        (Value::Date(d), "year") => Some(i64::from(d.year())),
        (Value::Date(d), "month") => Some(i64::from(d.month())),
        (Value::Date(d), "day") => Some(i64::from(d.day())),
        (Value::DateTime(dt), "year") => Some(i64::from(dt.year())),
        (Value::DateTime(dt), "month") => Some(i64::from(dt.month())),
        (Value::DateTime(dt), "day") => Some(i64::from(dt.day())),
        (Value::DateTime(dt), "hour") => Some(i64::from(dt.hour())),
        (Value::DateTime(dt), "minute") => Some(i64::from(dt.minute())),
        (Value::DateTime(dt), "second") => Some(i64::from(dt.second())),
        _ => None,
    };

    match (field, target, name) {
        (Some(v), _, _) => Ok(Value::Int(v)),
        (None, Value::Function(def), "__name__") => Ok(Value::Str(def.name.clone())),
        (None, Value::Function(def), "__doc__") => Ok(Value::Str(def.doc.clone())),
        _ => Err(EvalError::Attribute {
            type_name: target.type_name().to_string(),
            attr: name.to_string(),
        }),
    }
}
