//! Date functions
//!
//! Dates arrive either as [`Value::Date`]/[`Value::DateTime`] cells or as text.
//! Text is parsed with a fixed list of common layouts; unparseable input is
//! never an error, the functions degrade the way spreadsheet users expect
//! (echo the input, or return None).

use super::arg;
use crate::error::FunctionError;
use crate::value::Value;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use std::fmt::Write;

/// Default layout of `format_date`
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

const DATETIME_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_LAYOUTS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%Y%m%d"];

/// Parse date or date-time text
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    for layout in DATETIME_LAYOUTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, layout) {
            return Some(dt);
        }
    }
    DATE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(text, layout).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Date-time view of a date, date-time or date text value
pub fn to_datetime(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::DateTime(dt) => Some(*dt),
        Value::Date(d) => d.and_hms_opt(0, 0, 0),
        Value::Str(s) => parse_datetime(s),
        _ => None,
    }
}

/// format_date(dt, fmt="%Y-%m-%d")
///
/// Missing values format as "". Values that are not dates, and layouts chrono
/// rejects, fall back to the value's text.
pub fn fn_format_date(args: &[Value]) -> Result<Value, FunctionError> {
    let value = arg(args, 0);
    if value.is_missing() {
        return Ok(Value::Str(String::new()));
    }

    let layout = match args.get(1) {
        None => DEFAULT_DATE_FORMAT,
        Some(Value::Str(s)) => s.as_str(),
        Some(_) => return Ok(Value::Str(value.to_string())),
    };

    let formatted = to_datetime(value).and_then(|dt| {
        let mut out = String::new();
        write!(out, "{}", dt.format(layout)).ok().map(|_| out)
    });

    Ok(Value::Str(formatted.unwrap_or_else(|| value.to_string())))
}

/// date_diff_days(start, end): whole days from start to end, rounded down
pub fn fn_date_diff_days(args: &[Value]) -> Result<Value, FunctionError> {
    let (start, end) = (arg(args, 0), arg(args, 1));
    if start.is_missing() || end.is_missing() {
        return Ok(Value::None);
    }

    Ok(match (to_datetime(start), to_datetime(end)) {
        (Some(s), Some(e)) => Value::Int((e - s).num_seconds().div_euclid(86_400)),
        _ => Value::None,
    })
}

/// today(): the current local date
pub fn fn_today(_args: &[Value]) -> Result<Value, FunctionError> {
    Ok(Value::Date(Local::now().date_naive()))
}
