//! Text functions

use super::arg;
use crate::error::FunctionError;
use crate::value::Value;
use lazy_regex::regex;

/// clean(s): trim and collapse internal whitespace; missing values become ""
pub fn fn_clean(args: &[Value]) -> Result<Value, FunctionError> {
    let value = arg(args, 0);
    if value.is_missing() {
        return Ok(Value::Str(String::new()));
    }
    let text = value.to_string();
    Ok(Value::Str(regex!(r"\s+").replace_all(text.trim(), " ").into_owned()))
}

/// extract_number(s): first number in the text as a float, else None
pub fn fn_extract_number(args: &[Value]) -> Result<Value, FunctionError> {
    let value = arg(args, 0);
    if value.is_missing() {
        return Ok(Value::None);
    }
    let text = value.to_string();
    Ok(regex!(r"[-+]?\d*\.?\d+")
        .find(&text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map_or(Value::None, Value::Float))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Value {
        Value::Str(text.to_string())
    }

    #[test]
    fn test_clean() {
        assert_eq!(fn_clean(&[s("  hello \t  world \n")]).unwrap(), s("hello world"));
        assert_eq!(fn_clean(&[Value::None]).unwrap(), s(""));
        assert_eq!(fn_clean(&[Value::Float(f64::NAN)]).unwrap(), s(""));
        assert_eq!(fn_clean(&[Value::Int(42)]).unwrap(), s("42"));
    }

    #[test]
    fn test_extract_number() {
        assert_eq!(fn_extract_number(&[s("Price: $12.50")]).unwrap(), Value::Float(12.5));
        assert_eq!(fn_extract_number(&[s("temp -3 C")]).unwrap(), Value::Float(-3.0));
        assert_eq!(fn_extract_number(&[s("about .5 left")]).unwrap(), Value::Float(0.5));
        assert_eq!(fn_extract_number(&[s("none here")]).unwrap(), Value::None);
        assert_eq!(fn_extract_number(&[Value::None]).unwrap(), Value::None);
        assert_eq!(fn_extract_number(&[Value::Int(7)]).unwrap(), Value::Float(7.0));
    }
}
