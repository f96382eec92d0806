//! Conversion of stored values into requested primitive types.
//!
//! # Conversion Table
//! ```text
//! target      accepted source kinds
//! ──────────  ───────────────────────────────────────────────────────
//! String      String, Integer, Float, Bool, Duration (textual form)
//! Integer     Integer, Float (truncated, must fit i64), String (parsed)
//! Float       Float, Integer, String (parsed)
//! Bool        Bool, String (parsed)
//! Duration    Duration, Integer/Float (milliseconds), String (units or bare ms)
//! StringList  StringList, List (each element → String)
//! IntList     IntList, List (each element → Integer)
//! ```
//!
//! Anything outside this table is a mismatch. In particular booleans never
//! come from numbers and lists never come from scalars.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use super::Value;

/// Kind tag used in mismatch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Integer,
    Float,
    Bool,
    Duration,
    StringList,
    IntList,
    List,
    Map,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "string",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Bool => "bool",
            ValueKind::Duration => "duration",
            ValueKind::StringList => "string list",
            ValueKind::IntList => "integer list",
            ValueKind::List => "list",
            ValueKind::Map => "map",
        };
        f.write_str(name)
    }
}

/// A value could not be converted to the requested kind.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot convert {actual} to {expected}{}", render_detail(.detail))]
pub struct CoerceError {
    pub expected: ValueKind,
    pub actual: ValueKind,
    pub detail: Option<String>,
}

fn render_detail(detail: &Option<String>) -> String {
    detail.as_ref().map(|d| format!(": {}", d)).unwrap_or_default()
}

impl CoerceError {
    fn mismatch(expected: ValueKind, value: &Value) -> Self {
        Self {
            expected,
            actual: value.kind(),
            detail: None,
        }
    }

    fn invalid(expected: ValueKind, value: &Value, detail: impl Into<String>) -> Self {
        Self {
            expected,
            actual: value.kind(),
            detail: Some(detail.into()),
        }
    }
}

/// Types that can be read out of a stored [`Value`].
pub trait FromValue: Sized {
    /// Kind reported when conversion fails.
    const KIND: ValueKind;

    fn from_value(value: &Value) -> Result<Self, CoerceError>;

    /// Parse a textual default literal.
    ///
    /// Literals go through the same table as a stored string would, so a bare
    /// number means milliseconds for durations here as well.
    fn from_literal(literal: &str) -> Result<Self, CoerceError> {
        Self::from_value(&Value::String(literal.to_string()))
    }
}

pub(crate) fn to_string(value: &Value) -> Result<String, CoerceError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Integer(_) | Value::Float(_) | Value::Bool(_) | Value::Duration(_) => {
            Ok(value.to_string())
        }
        other => Err(CoerceError::mismatch(ValueKind::String, other)),
    }
}

pub(crate) fn to_i64(value: &Value) -> Result<i64, CoerceError> {
    match value {
        Value::Integer(n) => Ok(*n),
        Value::Float(n) => truncate(*n).map_err(|e| CoerceError::invalid(ValueKind::Integer, value, e)),
        Value::String(s) => s
            .parse::<i64>()
            .map_err(|e| CoerceError::invalid(ValueKind::Integer, value, format!("{:?}: {}", s, e))),
        other => Err(CoerceError::mismatch(ValueKind::Integer, other)),
    }
}

pub(crate) fn to_f64(value: &Value) -> Result<f64, CoerceError> {
    match value {
        Value::Float(n) => Ok(*n),
        Value::Integer(n) => Ok(*n as f64),
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|e| CoerceError::invalid(ValueKind::Float, value, format!("{:?}: {}", s, e))),
        other => Err(CoerceError::mismatch(ValueKind::Float, other)),
    }
}

pub(crate) fn to_bool(value: &Value) -> Result<bool, CoerceError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => parse_bool(s)
            .ok_or_else(|| CoerceError::invalid(ValueKind::Bool, value, format!("{:?} is not a boolean", s))),
        other => Err(CoerceError::mismatch(ValueKind::Bool, other)),
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

pub(crate) fn to_duration(value: &Value) -> Result<Duration, CoerceError> {
    match value {
        Value::Duration(d) => Ok(*d),
        Value::Integer(n) => u64::try_from(*n)
            .map(Duration::from_millis)
            .map_err(|_| CoerceError::invalid(ValueKind::Duration, value, "negative duration")),
        Value::Float(n) => millis(*n).map_err(|e| CoerceError::invalid(ValueKind::Duration, value, e)),
        Value::String(s) => parse_duration(s).map_err(|e| CoerceError::invalid(ValueKind::Duration, value, e)),
        other => Err(CoerceError::mismatch(ValueKind::Duration, other)),
    }
}

pub(crate) fn to_string_list(value: &Value) -> Result<Vec<String>, CoerceError> {
    match value {
        Value::StringList(items) => Ok(items.clone()),
        Value::List(items) => items
            .iter()
            .map(|item| to_string(item).map_err(|e| element_error(ValueKind::StringList, value, e)))
            .collect(),
        other => Err(CoerceError::mismatch(ValueKind::StringList, other)),
    }
}

pub(crate) fn to_int_list(value: &Value) -> Result<Vec<i64>, CoerceError> {
    match value {
        Value::IntList(items) => Ok(items.clone()),
        Value::List(items) => items
            .iter()
            .map(|item| to_i64(item).map_err(|e| element_error(ValueKind::IntList, value, e)))
            .collect(),
        other => Err(CoerceError::mismatch(ValueKind::IntList, other)),
    }
}

fn element_error(expected: ValueKind, list: &Value, cause: CoerceError) -> CoerceError {
    CoerceError::invalid(expected, list, format!("element {}", cause))
}

/// Truncate toward zero, failing when the result does not fit an `i64`.
fn truncate(n: f64) -> Result<i64, String> {
    let t = n.trunc();
    // i64::MIN is exactly representable; i64::MAX rounds up to 2^63.
    if !t.is_finite() || t < i64::MIN as f64 || t >= i64::MAX as f64 {
        return Err(format!("{} out of range for integer", n));
    }
    Ok(t as i64)
}

fn millis(ms: f64) -> Result<Duration, String> {
    if !ms.is_finite() || ms < 0.0 {
        return Err(format!("invalid duration {} ms", ms));
    }
    from_nanos(ms * 1_000_000.0)
}

fn from_nanos(nanos: f64) -> Result<Duration, String> {
    let rounded = nanos.round();
    // u64::MAX as f64 rounds up to 2^64.
    if !rounded.is_finite() || rounded >= u64::MAX as f64 {
        return Err("duration out of range".to_string());
    }
    Ok(Duration::from_nanos(rounded as u64))
}

/// Parse a duration such as `"5s"`, `"1h30m"`, `"1.5s"` or `"250"`.
///
/// Bare numbers (digits and `.` only, no sign or exponent) are
/// milliseconds. Units are `ns`, `us` (`µs`), `ms`, `s`,
/// `m` and `h`; several may be chained.
pub fn parse_duration(text: &str) -> Result<Duration, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err("empty duration".to_string());
    }
    if trimmed.chars().all(|c| c.is_ascii_digit() || c == '.') {
        let ms = trimmed
            .parse::<f64>()
            .map_err(|_| format!("invalid duration {:?}", text))?;
        return millis(ms);
    }

    let mut rest = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let mut nanos = 0f64;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_end == 0 {
            return Err(format!("invalid duration {:?}", text));
        }
        let number: f64 = rest[..number_end]
            .parse()
            .map_err(|_| format!("invalid duration {:?}", text))?;
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_end] {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3_600e9,
            "" => return Err(format!("missing unit in duration {:?}", text)),
            unit => return Err(format!("unknown unit {:?} in duration {:?}", unit, text)),
        };
        nanos += number * scale;
        rest = &rest[unit_end..];
    }

    from_nanos(nanos).map_err(|e| format!("{} in {:?}", e, text))
}

impl FromValue for String {
    const KIND: ValueKind = ValueKind::String;

    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        to_string(value)
    }
}

impl FromValue for i64 {
    const KIND: ValueKind = ValueKind::Integer;

    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        to_i64(value)
    }
}

macro_rules! narrow_integer {
    ($($ty:ty),+) => {$(
        impl FromValue for $ty {
            const KIND: ValueKind = ValueKind::Integer;

            fn from_value(value: &Value) -> Result<Self, CoerceError> {
                let wide = to_i64(value)?;
                <$ty>::try_from(wide).map_err(|_| {
                    CoerceError::invalid(
                        ValueKind::Integer,
                        value,
                        format!("{} out of range for {}", wide, stringify!($ty)),
                    )
                })
            }
        }
    )+};
}

narrow_integer!(i8, i16, i32, isize, u8, u16, u32, u64, usize);

impl FromValue for f64 {
    const KIND: ValueKind = ValueKind::Float;

    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        to_f64(value)
    }
}

impl FromValue for f32 {
    const KIND: ValueKind = ValueKind::Float;

    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        to_f64(value).map(|n| n as f32)
    }
}

impl FromValue for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        to_bool(value)
    }
}

impl FromValue for Duration {
    const KIND: ValueKind = ValueKind::Duration;

    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        to_duration(value)
    }
}

impl FromValue for Vec<String> {
    const KIND: ValueKind = ValueKind::StringList;

    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        to_string_list(value)
    }

    fn from_literal(literal: &str) -> Result<Self, CoerceError> {
        Ok(split_literal(literal).map(str::to_string).collect())
    }
}

impl FromValue for Vec<i64> {
    const KIND: ValueKind = ValueKind::IntList;

    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        to_int_list(value)
    }

    fn from_literal(literal: &str) -> Result<Self, CoerceError> {
        let items: Vec<Value> = split_literal(literal).map(Value::from).collect();
        to_int_list(&Value::List(items))
    }
}

fn split_literal(literal: &str) -> impl Iterator<Item = &str> {
    literal
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
}
