//! Runtime values
//!
//! Values follow dynamic-language semantics where expressions can observe them:
//! truthiness, `==` across the numeric tower (`True == 1 == 1.0`) and
//! ordering only between comparable types.

use crate::error::{EvalError, EvalResult};
use crate::functions::FunctionDef;
use chrono::{NaiveDate, NaiveDateTime};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Value produced or consumed by an expression
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(ValueMap),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// A registered function bound to a name
    Function(Arc<FunctionDef>),
}

/// Numeric view of a value (bool is an int)
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub(crate) fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

impl Value {
    /// Type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Map(_) => "dict",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Function(_) => "function",
        }
    }

    /// Truthiness: empty, zero and None are false
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Date(_) | Value::DateTime(_) | Value::Function(_) => true,
        }
    }

    /// `None`, or a float NaN (a missing spreadsheet cell)
    pub fn is_missing(&self) -> bool {
        match self {
            Value::None => true,
            Value::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    pub(crate) fn as_number(&self) -> Option<Number> {
        match self {
            Value::Bool(b) => Some(Number::Int(i64::from(*b))),
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    /// Get as a string slice if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Expression `==` with numeric promotion
    pub fn loose_eq(&self, other: &Value) -> bool {
        if let (Some(l), Some(r)) = (self.as_number(), other.as_number()) {
            return match (l, r) {
                (Number::Int(a), Number::Int(b)) => a == b,
                (a, b) => a.as_f64() == b.as_f64(),
            };
        }
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).map_or(false, |other| v.loose_eq(other)))
            }
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Expression ordering
    ///
    /// `Ok(None)` means the operands are comparable but unordered (NaN).
    /// Incomparable types are a type error naming `op`.
    pub fn try_cmp(&self, other: &Value, op: &str) -> EvalResult<Option<Ordering>> {
        if let (Some(l), Some(r)) = (self.as_number(), other.as_number()) {
            return Ok(match (l, r) {
                (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
                (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
            });
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
            (Value::Date(a), Value::Date(b)) => Ok(Some(a.cmp(b))),
            (Value::DateTime(a), Value::DateTime(b)) => Ok(Some(a.cmp(b))),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    if !x.loose_eq(y) {
                        return x.try_cmp(y, op);
                    }
                }
                Ok(Some(a.len().cmp(&b.len())))
            }
            _ => Err(EvalError::Type(format!(
                "'{}' not supported between instances of '{}' and '{}'",
                op,
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    /// Display form with strings quoted
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            other => other.to_string(),
        }
    }

    /// Interpret command line text: int, float, `True`/`False`, `None`, else string
    pub fn infer(text: &str) -> Value {
        match text {
            "None" => return Value::None,
            "True" | "true" => return Value::Bool(true),
            "False" | "false" => return Value::Bool(false),
            _ => {}
        }
        if let Ok(i) = text.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = text.parse::<f64>() {
            if text.chars().any(|c| c.is_ascii_digit()) {
                return Value::Float(f);
            }
        }
        Value::Str(text.to_string())
    }
}

/// Structural equality (`Int(1) != Float(1.0)`); see [`Value::loose_eq`] for
/// the expression language's `==`
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn format_float(f: f64, out: &mut fmt::Formatter<'_>) -> fmt::Result {
    if f.is_nan() {
        write!(out, "nan")
    } else if f.is_infinite() {
        write!(out, "{}", if f > 0.0 { "inf" } else { "-inf" })
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        write!(out, "{:.1}", f)
    } else {
        write!(out, "{}", f)
    }
}

/// Plain display form
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => format_float(*x, f),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item.repr())?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k.repr(), v.repr())?;
                }
                write!(f, "}}")
            }
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Value::Function(def) => write!(f, "<function {}>", def.name),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::None, Into::into)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// Insertion-ordered mapping keyed by loose equality
///
/// Inserting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueMap {
    entries: Vec<(Value, Value)>,
}

impl ValueMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pair, rejecting unhashable keys
    pub fn insert(&mut self, key: Value, value: Value) -> EvalResult<()> {
        if matches!(key, Value::List(_) | Value::Map(_)) {
            return Err(EvalError::Type(format!(
                "unhashable type: '{}'",
                key.type_name()
            )));
        }
        match self.entries.iter_mut().find(|(k, _)| k.loose_eq(&key)) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        Ok(())
    }

    /// Value for `key`
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.loose_eq(key))
            .map(|(_, v)| v)
    }

    /// Iterate over pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the map has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(Value::Float(f64::NAN).is_truthy());
        assert!(Value::Str("0".into()).is_truthy());
    }

    #[test]
    fn test_numeric_tower_equality() {
        assert!(Value::Bool(true).loose_eq(&Value::Int(1)));
        assert!(Value::Int(2).loose_eq(&Value::Float(2.0)));
        assert!(!Value::Int(1).loose_eq(&Value::Str("1".into())));
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }

    #[test]
    fn test_ordering() {
        assert_eq!(
            Value::Int(1).try_cmp(&Value::Float(1.5), "<").unwrap(),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Float(f64::NAN).try_cmp(&Value::Int(1), "<").unwrap(),
            None
        );
        assert!(matches!(
            Value::Int(1).try_cmp(&Value::Str("a".into()), "<"),
            Err(EvalError::Type(_))
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Str("a".into())]).to_string(),
            "[1, 'a']"
        );
    }

    #[test]
    fn test_map_later_key_wins() {
        let mut map = ValueMap::new();
        map.insert(Value::Str("a".into()), Value::Int(1)).unwrap();
        map.insert(Value::Str("b".into()), Value::Int(2)).unwrap();
        map.insert(Value::Str("a".into()), Value::Int(3)).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&Value::Str("a".into())), Some(&Value::Int(3)));
        assert!(map.insert(Value::List(vec![]), Value::None).is_err());
    }

    #[test]
    fn test_infer() {
        assert_eq!(Value::infer("42"), Value::Int(42));
        assert_eq!(Value::infer("4.5"), Value::Float(4.5));
        assert_eq!(Value::infer("True"), Value::Bool(true));
        assert_eq!(Value::infer("None"), Value::None);
        assert_eq!(Value::infer("inf"), Value::Str("inf".into()));
        assert_eq!(Value::infer("hello"), Value::Str("hello".into()));
    }
}
