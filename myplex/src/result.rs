//! The outcome of a completed query

use crate::error::{Error, Result};
use crate::mysql::Row;
use crate::traits::{FromRow, FromValue};

/// Immutable result of a completed query.
///
/// For statements that return rows, `affected_rows` is the number of rows
/// returned, matching what the MySQL client library reports for SELECT.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    sql: String,
    rows: Vec<Row>,
    affected_rows: u64,
    inserted_id: Option<u64>,
}

impl QueryResult {
    pub(crate) fn new(
        sql: String,
        rows: Vec<Row>,
        affected_rows: u64,
        inserted_id: Option<u64>,
    ) -> Self {
        Self {
            sql,
            rows,
            affected_rows,
            inserted_id,
        }
    }

    /// The SQL text that was executed, after substitution.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn first_row(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    /// The id generated for an AUTO_INCREMENT column.
    ///
    /// For a multi-row insert this is the id of the first inserted row.
    /// `None` when the statement generated no id.
    pub fn inserted_id(&self) -> Option<u64> {
        self.inserted_id
    }

    /// Map every row through [`FromRow`].
    pub fn rows_as<T: FromRow>(&self) -> Result<Vec<T>> {
        self.rows.iter().map(T::from_row).collect()
    }

    /// First column of the first row.
    pub fn scalar<T: FromValue>(&self) -> Result<T> {
        let row = self.first_row().ok_or_else(|| Error::Query {
            sql: self.sql.clone(),
            message: "Expected one row, found none".to_string(),
        })?;
        if row.is_empty() {
            return Err(Error::Query {
                sql: self.sql.clone(),
                message: "Expected at least one column".to_string(),
            });
        }
        row.get_at(0)
    }
}
