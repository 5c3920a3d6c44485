//! Parameter values and their SQL literal form

use std::fmt::{self, Write as _};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

use crate::error::{Error, Result};

/// A query parameter.
///
/// The variant set is closed: everything a caller can bind is one of these,
/// and [`quote`] renders each of them without inspecting types at runtime.
/// Values that are neither scalars nor lists enter through
/// [`Value::stringable`] (or one of the typed conversions below) and are
/// quoted as strings.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    UInt(u64),
    /// Floating point, rendered with six fixed decimals
    Float(f64),
    /// String/text value
    String(String),
    /// A list of values.
    ///
    /// Scalars are comma-joined; nested lists become parenthesized rows,
    /// which is what multi-row `insert ... values :rows` needs.
    List(Vec<Value>),
    /// The string form of some other object
    Stringable(String),
}

impl Value {
    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Stringable(_) => "stringable",
        }
    }

    /// Capture the `Display` form of an arbitrary object.
    ///
    /// Fails with [`Error::Quote`] if the formatter reports an error.
    pub fn stringable<T: fmt::Display + ?Sized>(value: &T) -> Result<Self> {
        let mut text = String::new();
        write!(text, "{}", value)
            .map_err(|_| Error::Quote("value could not be converted to a string".to_string()))?;
        Ok(Value::Stringable(text))
    }

    /// Convert a JSON document into a value.
    ///
    /// Arrays become lists, objects are kept as their serialized text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(v) => Value::Bool(*v),
            serde_json::Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Value::Int(v)
                } else if let Some(v) = n.as_u64() {
                    Value::UInt(v)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(v) => Value::String(v.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(_) => Value::Stringable(value.to_string()),
        }
    }
}

/// Render a value as a SQL literal.
///
/// | value | literal |
/// |---|---|
/// | string, stringable | escaped, wrapped in single quotes |
/// | integer | decimal |
/// | float | fixed point, six decimals |
/// | bool | `true` / `false` |
/// | null | `null` |
/// | list | comma-joined; inner lists wrapped in parentheses |
pub fn quote(value: &Value) -> Result<String> {
    let quoted = match value {
        Value::Null => "null".to_string(),
        Value::Bool(v) => if *v { "true" } else { "false" }.to_string(),
        Value::Int(v) => v.to_string(),
        Value::UInt(v) => v.to_string(),
        Value::Float(v) => {
            if !v.is_finite() {
                return Err(Error::Quote(format!("non-finite float {}", v)));
            }
            format!("{:.6}", v)
        }
        Value::String(v) | Value::Stringable(v) => format!("'{}'", escape_string(v)),
        Value::List(items) => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                let literal = quote(item)?;
                if matches!(item, Value::List(_)) {
                    parts.push(format!("({})", literal));
                } else {
                    parts.push(literal);
                }
            }
            parts.join(", ")
        }
    };
    Ok(quoted)
}

/// Escape a string the way the MySQL client library does before it is
/// embedded between single quotes.
pub fn escape_string(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len() + 8);
    for ch in input.chars() {
        match ch {
            '\0' => escaped.push_str("\\0"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '"' => escaped.push_str("\\\""),
            '\x1a' => escaped.push_str("\\Z"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Quote an identifier (table, column, alias) with backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

// Implement From for common types
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

macro_rules! impl_from_signed {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::Int(v.into())
                }
            }
        )*
    };
}

macro_rules! impl_from_unsigned {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::UInt(v.into())
                }
            }
        )*
    };
}

impl_from_signed!(i8, i16, i32, i64);
impl_from_unsigned!(u8, u16, u32, u64);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::String(v.clone())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Stringable(v.format("%Y-%m-%d").to_string())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Stringable(v.format("%Y-%m-%d %H:%M:%S%.f").to_string())
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Stringable(v.format("%H:%M:%S%.f").to_string())
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Stringable(v.to_string())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Stringable(v.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

// Implement From for Option<T> where T: Into<Value>
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_scalars() {
        assert_eq!(quote(&"Foo".into()).unwrap(), "'Foo'");
        assert_eq!(quote(&"'Bar'".into()).unwrap(), "'\\'Bar\\''");
        assert_eq!(quote(&123.into()).unwrap(), "123");
        assert_eq!(quote(&(-123).into()).unwrap(), "-123");
        assert_eq!(quote(&0.5.into()).unwrap(), "0.500000");
        assert_eq!(quote(&true.into()).unwrap(), "true");
        assert_eq!(quote(&false.into()).unwrap(), "false");
        assert_eq!(quote(&Value::Null).unwrap(), "null");
        assert_eq!(quote(&Option::<i32>::None.into()).unwrap(), "null");
    }

    #[test]
    fn test_quote_lists() {
        let flat = Value::List(vec!["Baz".into(), 0.into()]);
        assert_eq!(quote(&flat).unwrap(), "'Baz', 0");

        let nested: Value = vec![
            Value::List(vec!["qux".into(), 1.into()]),
            Value::List(vec!["quux".into(), 2.into()]),
        ]
        .into();
        assert_eq!(quote(&nested).unwrap(), "('qux', 1), ('quux', 2)");

        assert_eq!(quote(&Value::List(vec![])).unwrap(), "");
    }

    #[test]
    fn test_quote_escapes_special_characters() {
        let value: Value = "\"'\\/?&%@=>;\0".into();
        assert_eq!(quote(&value).unwrap(), "'\\\"\\'\\\\/?&%@=>;\\0'");
        assert_eq!(escape_string("a\nb\r\x1a"), "a\\nb\\r\\Z");
    }

    #[test]
    fn test_quote_stringable() {
        let value = Value::stringable(&std::net::Ipv4Addr::LOCALHOST).unwrap();
        assert_eq!(quote(&value).unwrap(), "'127.0.0.1'");

        let date = NaiveDate::from_ymd_opt(2015, 7, 29).unwrap();
        assert_eq!(quote(&date.into()).unwrap(), "'2015-07-29'");

        let json: Value = serde_json::json!({"a": "it's"}).into();
        assert_eq!(quote(&json).unwrap(), "'{\\\"a\\\":\\\"it\\'s\\\"}'");
    }

    #[test]
    fn test_stringable_formatter_failure() {
        struct Broken;
        impl fmt::Display for Broken {
            fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
                Err(fmt::Error)
            }
        }
        assert!(matches!(Value::stringable(&Broken), Err(Error::Quote(_))));
    }

    #[test]
    fn test_quote_rejects_non_finite_float() {
        assert!(matches!(quote(&f64::NAN.into()), Err(Error::Quote(_))));
        assert!(matches!(quote(&f64::INFINITY.into()), Err(Error::Quote(_))));
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("users"), "`users`");
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_from_json() {
        let value = Value::from_json(&serde_json::json!([1, "a", null, [true, 2.5]]));
        assert_eq!(
            value,
            Value::List(vec![
                Value::Int(1),
                Value::String("a".into()),
                Value::Null,
                Value::List(vec![Value::Bool(true), Value::Float(2.5)]),
            ])
        );
    }
}
