use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};

use crate::{error::ParseError, registry::Registry};

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("valid number pattern"));

/// Type tag of a [`ScalarValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    String,
    Number,
    Boolean,
    Null,
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarType::String => "string",
            ScalarType::Number => "number",
            ScalarType::Boolean => "boolean",
            ScalarType::Null => "null",
        };
        f.write_str(name)
    }
}

/// Typed payload of a scalar operand.
///
/// Numbers are kept as [`Decimal`] so `0.1 + 0.2`-style drift never leaks into
/// comparisons or the re-rendered query.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Number(Decimal),
    Boolean(bool),
    Null,
}

/// A scalar operand plus the text it was written as.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarValue {
    pub value: Scalar,
    pub text: String,
}

impl ScalarValue {
    pub fn string(s: impl Into<String>) -> Self {
        let s = s.into();
        ScalarValue {
            text: s.clone(),
            value: Scalar::String(s),
        }
    }

    pub fn number(n: impl Into<Decimal>) -> Self {
        let n = n.into();
        ScalarValue {
            text: n.to_string(),
            value: Scalar::Number(n),
        }
    }

    pub fn boolean(b: bool) -> Self {
        ScalarValue {
            text: b.to_string(),
            value: Scalar::Boolean(b),
        }
    }

    pub fn null() -> Self {
        ScalarValue {
            text: "null".to_string(),
            value: Scalar::Null,
        }
    }

    /// Infer a typed value from source text.
    ///
    /// Quoted literals always stay strings. Otherwise: signed decimal number,
    /// then `null` / `true` / `false`, then string. Digits beyond what a
    /// `Decimal` holds (more than 28 significant digits) stay a string.
    pub fn infer(text: &str, literal: bool) -> Self {
        if literal {
            return Self::string(text);
        }
        if NUMBER.is_match(text)
            && let Ok(n) = Decimal::from_str(text)
        {
            return ScalarValue {
                value: Scalar::Number(n),
                text: text.to_string(),
            };
        }
        let value = match text {
            "null" => Scalar::Null,
            "true" => Scalar::Boolean(true),
            "false" => Scalar::Boolean(false),
            _ => Scalar::String(text.to_string()),
        };
        ScalarValue {
            value,
            text: text.to_string(),
        }
    }

    /// Like [`ScalarValue::infer`], rejecting types outside `allowed` (empty means any).
    pub fn infer_as(text: &str, literal: bool, allowed: &[ScalarType]) -> Result<Self, ParseError> {
        let value = Self::infer(text, literal);
        if allowed.is_empty() || allowed.contains(&value.scalar_type()) {
            return Ok(value);
        }
        let expected = allowed
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" or ");
        Err(ParseError::type_error(format!(
            "expected a {expected} but found {} '{text}'",
            value.scalar_type()
        )))
    }

    /// Replace a friendly string value with its registered id, keeping the typed text.
    pub fn resolve_names(mut self, registry: &Registry) -> Self {
        if let Scalar::String(s) = &self.value
            && let Some(id) = registry.value_id(s)
        {
            self.value = Scalar::String(id.to_string());
        }
        self
    }

    pub fn scalar_type(&self) -> ScalarType {
        match self.value {
            Scalar::String(_) => ScalarType::String,
            Scalar::Number(_) => ScalarType::Number,
            Scalar::Boolean(_) => ScalarType::Boolean,
            Scalar::Null => ScalarType::Null,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self.value {
            Scalar::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match &self.value {
            Scalar::String(s) => Value::String(s.clone()),
            Scalar::Number(n) => decimal_to_json(*n),
            Scalar::Boolean(b) => Value::Bool(*b),
            Scalar::Null => Value::Null,
        }
    }

    pub fn from_json(value: &Value) -> Result<Self, ParseError> {
        match value {
            Value::String(s) => Ok(Self::string(s.as_str())),
            Value::Number(n) => {
                let text = n.to_string();
                let decimal = Decimal::from_str(&text)
                    .or_else(|_| Decimal::from_scientific(&text))
                    .map_err(|_| ParseError::json(format!("number {text} is out of range")))?;
                Ok(ScalarValue {
                    value: Scalar::Number(decimal),
                    text,
                })
            }
            Value::Bool(b) => Ok(Self::boolean(*b)),
            Value::Null => Ok(Self::null()),
            other => Err(ParseError::json(format!("expected a scalar value, found {other}"))),
        }
    }

    /// Render for the query string; strings become quoted literals showing
    /// their friendly name when one is registered.
    pub fn to_query_string(&self, registry: &Registry) -> String {
        match &self.value {
            Scalar::String(s) => quote(registry.value_name(s).unwrap_or(s)),
            Scalar::Number(n) => n.to_string(),
            Scalar::Boolean(b) => b.to_string(),
            Scalar::Null => "null".to_string(),
        }
    }
}

impl Serialize for ScalarValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        ScalarValue::string(s)
    }
}

impl From<String> for ScalarValue {
    fn from(s: String) -> Self {
        ScalarValue::string(s)
    }
}

impl From<i32> for ScalarValue {
    fn from(n: i32) -> Self {
        ScalarValue::number(n)
    }
}

impl From<i64> for ScalarValue {
    fn from(n: i64) -> Self {
        ScalarValue::number(n)
    }
}

impl From<Decimal> for ScalarValue {
    fn from(n: Decimal) -> Self {
        ScalarValue::number(n)
    }
}

impl From<bool> for ScalarValue {
    fn from(b: bool) -> Self {
        ScalarValue::boolean(b)
    }
}

pub fn decimal_to_json(n: Decimal) -> Value {
    if n.fract().is_zero()
        && let Some(i) = n.to_i64()
    {
        return Value::Number(i.into());
    }
    n.to_f64()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Quote a string literal, picking the form that survives re-tokenizing.
///
/// Single quotes with backslash escapes by default; double quotes when the
/// text holds a single quote; a `<<<...>>>` blob when it holds both, unless
/// the blob could not be closed cleanly.
pub fn quote(text: &str) -> String {
    let has_single = text.contains('\'');
    let has_double = text.contains('"');
    match (has_single, has_double) {
        (false, _) => format!("'{}'", escape(text, '\'')),
        (true, false) => format!("\"{}\"", escape(text, '"')),
        (true, true) if !text.contains(">>>") && !text.ends_with('>') => format!("<<<{text}>>>"),
        (true, true) => format!("'{}'", escape(text, '\'')),
    }
}

/// Quote text the tokenizer will read verbatim (regular expressions).
pub fn quote_verbatim(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{text}'")
    } else if !text.contains('"') {
        format!("\"{text}\"")
    } else {
        format!("<<<{text}>>>")
    }
}

fn escape(text: &str, quote: char) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch == '\\' || ch == quote {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[test]
fn test_infer_order() {
    assert_eq!(ScalarValue::infer("10", false).scalar_type(), ScalarType::Number);
    assert_eq!(ScalarValue::infer("-2.5", false).scalar_type(), ScalarType::Number);
    assert_eq!(ScalarValue::infer("10", true).scalar_type(), ScalarType::String);
    assert_eq!(ScalarValue::infer("true", false).value, Scalar::Boolean(true));
    assert_eq!(ScalarValue::infer("null", false).value, Scalar::Null);
    assert_eq!(ScalarValue::infer("1.2.3", false).scalar_type(), ScalarType::String);
    let huge = "1".repeat(40);
    assert_eq!(ScalarValue::infer(&huge, false).scalar_type(), ScalarType::String);
}

#[test]
fn test_quote_forms() {
    assert_eq!(quote("open"), "'open'");
    assert_eq!(quote(r"a\b"), r"'a\\b'");
    assert_eq!(quote("it's"), "\"it's\"");
    assert_eq!(quote("it's \"x\""), "<<<it's \"x\">>>");
    assert_eq!(quote("it's \"x\">"), "'it\\'s \"x\">'");
}
