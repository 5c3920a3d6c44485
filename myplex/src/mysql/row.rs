//! MySQL row implementation

use std::sync::Arc;

use mysql_async::Row as MySqlAsyncRow;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{Error, Result};
use crate::traits::FromValue;

use super::types::cell_text;

/// A result row: column name → text value, in column order.
///
/// Values are kept as the text the server returned; `None` is SQL NULL.
/// Typed access goes through [`Row::get`].
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Option<String>>,
}

impl Row {
    /// Create a row from column names and cell values.
    ///
    /// Missing trailing cells are treated as NULL.
    pub fn new(columns: Arc<[String]>, mut values: Vec<Option<String>>) -> Self {
        values.resize(columns.len(), None);
        Self { columns, values }
    }

    /// Create a new Row from a mysql_async Row.
    pub(crate) fn from_mysql_row(columns: Arc<[String]>, row: &MySqlAsyncRow) -> Self {
        let values = (0..columns.len())
            .map(|i| row.as_ref(i).and_then(cell_text))
            .collect();
        Self::new(columns, values)
    }

    /// Column names in select order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Get the raw text of a column.
    ///
    /// When a name appears more than once the last column wins.
    pub fn get_value(&self, column: &str) -> Result<Option<&str>> {
        self.columns
            .iter()
            .rposition(|c| c == column)
            .map(|i| self.values[i].as_deref())
            .ok_or_else(|| Error::ColumnNotFound(column.to_string()))
    }

    /// Get a typed value from the row by column name.
    pub fn get<T: FromValue>(&self, column: &str) -> Result<T> {
        let value = self.get_value(column)?;
        T::from_value(value).map_err(|err| match err {
            Error::UnexpectedNull(_) => Error::UnexpectedNull(column.to_string()),
            other => other,
        })
    }

    /// Get a typed value by position.
    pub fn get_at<T: FromValue>(&self, index: usize) -> Result<T> {
        let value = self
            .values
            .get(index)
            .ok_or_else(|| Error::ColumnNotFound(format!("#{}", index)))?;
        T::from_value(value.as_deref())
    }

    /// Iterate over `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(Option::as_deref))
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, &value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Row {
        let columns: Arc<[String]> = vec!["id".to_string(), "title".to_string(), "ut".to_string()].into();
        Row::new(
            columns,
            vec![Some("3".to_string()), Some("Baz".to_string()), None],
        )
    }

    #[test]
    fn test_column_order_is_kept() {
        let row = row();
        assert_eq!(
            row.iter().collect::<Vec<_>>(),
            vec![("id", Some("3")), ("title", Some("Baz")), ("ut", None)]
        );
    }

    #[test]
    fn test_typed_access() {
        let row = row();
        assert_eq!(row.get::<i64>("id").unwrap(), 3);
        assert_eq!(row.get::<String>("title").unwrap(), "Baz");
        assert_eq!(row.get::<Option<u32>>("ut").unwrap(), None);
        assert_eq!(row.get_at::<u8>(0).unwrap(), 3);
    }

    #[test]
    fn test_missing_and_null_columns() {
        let row = row();
        assert_eq!(
            row.get::<i64>("nope"),
            Err(Error::ColumnNotFound("nope".to_string()))
        );
        assert_eq!(
            row.get::<u32>("ut"),
            Err(Error::UnexpectedNull("ut".to_string()))
        );
    }

    #[test]
    fn test_serializes_as_ordered_map() {
        let json = serde_json::to_string(&row()).unwrap();
        assert_eq!(json, r#"{"id":"3","title":"Baz","ut":null}"#);
    }
}
