//! Logical functions

use super::arg;
use crate::error::FunctionError;
use crate::value::Value;

/// coalesce(*args): first argument that is not None/NaN
pub fn fn_coalesce(args: &[Value]) -> Result<Value, FunctionError> {
    Ok(args
        .iter()
        .find(|v| !v.is_missing())
        .cloned()
        .unwrap_or(Value::None))
}

/// case_when(condition, true_val, false_val)
///
/// Both branches are already evaluated; use `a if c else b` for a lazy choice.
pub fn fn_case_when(args: &[Value]) -> Result<Value, FunctionError> {
    Ok(if arg(args, 0).is_truthy() {
        arg(args, 1).clone()
    } else {
        arg(args, 2).clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coalesce() {
        assert_eq!(
            fn_coalesce(&[Value::None, Value::Float(f64::NAN), Value::Int(0), Value::Int(1)]).unwrap(),
            Value::Int(0)
        );
        assert_eq!(fn_coalesce(&[Value::None]).unwrap(), Value::None);
        assert_eq!(fn_coalesce(&[]).unwrap(), Value::None);
    }

    #[test]
    fn test_case_when() {
        let yes = Value::Str("yes".into());
        let no = Value::Str("no".into());
        assert_eq!(fn_case_when(&[Value::Int(1), yes.clone(), no.clone()]).unwrap(), yes);
        assert_eq!(fn_case_when(&[Value::Str(String::new()), yes, no.clone()]).unwrap(), no);
    }
}
