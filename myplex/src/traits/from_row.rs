//! FromRow trait for mapping result rows to Rust structs

use crate::error::Result;
use crate::mysql::Row;

/// Trait for types that can be constructed from a result row.
///
/// # Manual Implementation
///
/// ```ignore
/// use myplex::{FromRow, Row, Result};
///
/// pub struct Foo {
///     pub id: u64,
///     pub title: String,
/// }
///
/// impl FromRow for Foo {
///     fn from_row(row: &Row) -> Result<Self> {
///         Ok(Self {
///             id: row.get("id")?,
///             title: row.get("title")?,
///         })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    /// Construct an instance of this type from a result row.
    fn from_row(row: &Row) -> Result<Self>;
}

/// Rows map to themselves, which keeps `fetch_all::<Row>` usable.
impl FromRow for Row {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(row.clone())
    }
}

impl<A: crate::FromValue> FromRow for (A,) {
    fn from_row(row: &Row) -> Result<Self> {
        Ok((row.get_at(0)?,))
    }
}

impl<A: crate::FromValue, B: crate::FromValue> FromRow for (A, B) {
    fn from_row(row: &Row) -> Result<Self> {
        Ok((row.get_at(0)?, row.get_at(1)?))
    }
}
