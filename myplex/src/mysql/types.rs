//! Type conversion utilities for MySQL

use mysql_async::Value as MySqlValue;

/// Convert a mysql_async cell into the text the server sent for it.
///
/// Queries go over the text protocol, so cells normally arrive as bytes;
/// the typed variants are formatted the way the server prints them.
pub fn cell_text(value: &MySqlValue) -> Option<String> {
    match value {
        MySqlValue::NULL => None,
        MySqlValue::Bytes(v) => Some(String::from_utf8_lossy(v).into_owned()),
        MySqlValue::Int(v) => Some(v.to_string()),
        MySqlValue::UInt(v) => Some(v.to_string()),
        MySqlValue::Float(v) => Some(v.to_string()),
        MySqlValue::Double(v) => Some(v.to_string()),
        MySqlValue::Date(year, month, day, hour, min, sec, micro) => {
            if *hour == 0 && *min == 0 && *sec == 0 && *micro == 0 {
                Some(format!("{:04}-{:02}-{:02}", year, month, day))
            } else if *micro == 0 {
                Some(format!(
                    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    year, month, day, hour, min, sec
                ))
            } else {
                Some(format!(
                    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06}",
                    year, month, day, hour, min, sec, micro
                ))
            }
        }
        MySqlValue::Time(is_neg, days, hours, mins, secs, micro) => {
            let sign = if *is_neg { "-" } else { "" };
            let hours = days * 24 + u32::from(*hours);
            if *micro == 0 {
                Some(format!("{}{:02}:{:02}:{:02}", sign, hours, mins, secs))
            } else {
                Some(format!(
                    "{}{:02}:{:02}:{:02}.{:06}",
                    sign, hours, mins, secs, micro
                ))
            }
        }
    }
}
