//! FromValue trait for converting result cells to Rust types

use crate::error::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

/// Trait for types that can be parsed from a result cell.
///
/// Result rows carry the server's text representation of every value
/// (`None` for SQL NULL). This is implemented for common Rust types and can
/// be manually implemented for custom types (e.g., enums).
pub trait FromValue: Sized {
    /// Convert a cell to this type.
    fn from_value(value: Option<&str>) -> Result<Self>;
}

fn require(value: Option<&str>) -> Result<&str> {
    value.ok_or_else(|| Error::UnexpectedNull(String::new()))
}

fn conversion(expected: &'static str, text: &str) -> Error {
    Error::TypeConversion {
        expected,
        actual: format!("'{}'", text),
    }
}

impl FromValue for bool {
    fn from_value(value: Option<&str>) -> Result<Self> {
        let text = require(value)?;
        match text.trim() {
            "1" | "true" | "TRUE" => Ok(true),
            "0" | "false" | "FALSE" => Ok(false),
            other => other
                .parse::<i64>()
                .map(|v| v != 0)
                .map_err(|_| conversion("bool", text)),
        }
    }
}

macro_rules! impl_from_value_parse {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Option<&str>) -> Result<Self> {
                    let text = require(value)?;
                    text.trim().parse::<$ty>().map_err(|_| conversion($name, text))
                }
            }
        )*
    };
}

impl_from_value_parse! {
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
    f32 => "f32",
    f64 => "f64",
    Decimal => "decimal",
}

impl FromValue for String {
    fn from_value(value: Option<&str>) -> Result<Self> {
        require(value).map(str::to_string)
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: Option<&str>) -> Result<Self> {
        let text = require(value)?;
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f").map(|v| v.date()))
            .map_err(|_| conversion("date", text))
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Option<&str>) -> Result<Self> {
        let text = require(value)?;
        NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
            .or_else(|_| {
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .map(|d| d.and_time(NaiveTime::MIN))
            })
            .map_err(|_| conversion("datetime", text))
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: Option<&str>) -> Result<Self> {
        let text = require(value)?;
        // NaiveTime only supports 00:00:00 to 23:59:59; longer TIME values fail here
        NaiveTime::parse_from_str(text, "%H:%M:%S%.f").map_err(|_| Error::TypeConversion {
            expected: "time (00:00:00 to 23:59:59)",
            actual: format!("'{}'", text),
        })
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: Option<&str>) -> Result<Self> {
        let text = require(value)?;
        serde_json::from_str(text).map_err(|e| Error::TypeConversion {
            expected: "json",
            actual: format!("invalid json: {}", e),
        })
    }
}

// Implement for Option<T>
impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Option<&str>) -> Result<Self> {
        match value {
            None => Ok(None),
            Some(_) => Ok(Some(T::from_value(value)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers() {
        assert_eq!(i64::from_value(Some("1438168960")).unwrap(), 1438168960);
        assert_eq!(u8::from_value(Some("255")).unwrap(), 255);
        assert!(matches!(
            u8::from_value(Some("256")),
            Err(Error::TypeConversion { expected: "u8", .. })
        ));
        assert!(matches!(
            i32::from_value(None),
            Err(Error::UnexpectedNull(_))
        ));
    }

    #[test]
    fn test_bool() {
        assert!(bool::from_value(Some("1")).unwrap());
        assert!(!bool::from_value(Some("0")).unwrap());
        assert!(bool::from_value(Some("true")).unwrap());
        assert!(bool::from_value(Some("yes")).is_err());
    }

    #[test]
    fn test_decimal_and_float() {
        assert_eq!(
            Decimal::from_value(Some("12.50")).unwrap(),
            Decimal::new(1250, 2)
        );
        assert_eq!(f64::from_value(Some("0.5")).unwrap(), 0.5);
    }

    #[test]
    fn test_dates() {
        let date = NaiveDate::from_ymd_opt(2015, 7, 29).unwrap();
        assert_eq!(NaiveDate::from_value(Some("2015-07-29")).unwrap(), date);
        assert_eq!(
            NaiveDateTime::from_value(Some("2015-07-29 13:02:40")).unwrap(),
            date.and_hms_opt(13, 2, 40).unwrap()
        );
        assert_eq!(
            NaiveTime::from_value(Some("13:02:40.250000")).unwrap(),
            NaiveTime::from_hms_micro_opt(13, 2, 40, 250_000).unwrap()
        );
        assert!(NaiveTime::from_value(Some("26:00:00")).is_err());
    }

    #[test]
    fn test_option_and_json() {
        assert_eq!(Option::<i64>::from_value(None).unwrap(), None);
        assert_eq!(Option::<i64>::from_value(Some("7")).unwrap(), Some(7));
        assert_eq!(
            serde_json::Value::from_value(Some(r#"{"a":1}"#)).unwrap(),
            serde_json::json!({"a": 1})
        );
    }
}
