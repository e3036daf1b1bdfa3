//! Scalar value representation shared by the criteria contract and the
//! predicate compiler's bound parameters.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Untagged scalar so the JSON contract stays plain (`"F"`, `25`, `true`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// Null literal.
    #[default]
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Signed 64-bit integer literal.
    Int(i64),
    /// 64-bit floating point literal.
    Float(f64),
    /// UTF-8 string literal.
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Blank strings count as absent, matching how the contract treats `""`.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view; numeric strings are parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Integral view; floats with a fractional part are rejected.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| Value::Float(s.parse().ok()?).as_i64())
            }
            _ => None,
        }
    }

    /// Converts an arbitrary JSON value; arrays and objects keep their JSON
    /// text so nothing is silently dropped.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        }
    }

    /// Parses a stored string back into the most specific numeric value.
    pub fn number_from_str(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(i) = raw.parse::<i64>() {
            return Some(Value::Int(i));
        }
        raw.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Value::Float)
    }
}

/// Storage stringification: null renders empty, integral floats drop `.0`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) if v.fract() == 0.0 && v.abs() < 1e15 => write!(f, "{}", *v as i64),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stringifies_for_storage() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Float(100.0).to_string(), "100");
        assert_eq!(Value::Float(99.5).to_string(), "99.5");
        assert_eq!(Value::from("F").to_string(), "F");
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(Value::from("  42 ").as_i64(), Some(42));
        assert_eq!(Value::from("42.0").as_i64(), Some(42));
        assert_eq!(Value::from("4.5").as_i64(), None);
        assert_eq!(Value::Int(7).as_f64(), Some(7.0));
        assert_eq!(Value::number_from_str("500"), Some(Value::Int(500)));
        assert_eq!(Value::number_from_str("abc"), None);
    }

    #[test]
    fn untagged_json() {
        let v: Vec<Value> = serde_json::from_str(r#"[null, true, 3, 2.5, "x"]"#).unwrap();
        assert_eq!(
            v,
            vec![
                Value::Null,
                Value::Bool(true),
                Value::Int(3),
                Value::Float(2.5),
                Value::from("x")
            ]
        );
        assert_eq!(Value::from_json(&serde_json::json!([1, 2])), Value::from("[1,2]"));
    }
}
