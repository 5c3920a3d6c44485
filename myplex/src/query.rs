//! Named parameters, placeholder substitution and the fluent query API

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::mysql::AsyncResult;
use crate::result::QueryResult;
use crate::traits::{Executor, FromRow, FromValue};
use crate::value::{quote, Value};

/// Named query parameters.
///
/// Names are stored without the leading colon; `:name` in the SQL text is
/// the placeholder. A leading colon passed to [`Params::insert`] is
/// stripped, so `":id"` and `"id"` address the same placeholder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: BTreeMap<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any previous value with the same name.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<Value>) -> &mut Self {
        let name = name.as_ref();
        let name = name.strip_prefix(':').unwrap_or(name);
        self.values.insert(name.to_string(), value.into());
        self
    }

    /// Builder-style [`Params::insert`].
    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name.strip_prefix(':').unwrap_or(name))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

/// Build [`Params`] inline.
///
/// ```ignore
/// let params = myplex::params! { "id" => 7, "title" => "Foo" };
/// ```
#[macro_export]
macro_rules! params {
    () => { $crate::Params::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut params = $crate::Params::new();
        $( params.insert($name, $value); )+
        params
    }};
}

/// Replace every `:name` placeholder with the quoted literal of its value.
///
/// This is plain text replacement, not parameter binding. Longer names win
/// over their prefixes (`:id` never clobbers `:ident`), replaced text is
/// never scanned again, and `:word` sequences with no matching parameter
/// are left untouched.
pub fn substitute(sql: &str, params: &Params) -> Result<String> {
    if params.is_empty() {
        return Ok(sql.to_string());
    }

    let mut pairs = Vec::with_capacity(params.len());
    for (name, value) in params.iter() {
        if name.is_empty() {
            continue;
        }
        pairs.push((format!(":{}", name), quote(value)?));
    }
    pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;
    'scan: while let Some(ch) = rest.chars().next() {
        if ch == ':' {
            for (token, literal) in &pairs {
                if rest.starts_with(token.as_str()) {
                    out.push_str(literal);
                    rest = &rest[token.len()..];
                    continue 'scan;
                }
            }
        }
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    Ok(out)
}

/// A statement with named parameters, executed against any [`Executor`].
///
/// # Example
///
/// ```ignore
/// use myplex::Query;
///
/// let books: Vec<Book> = Query::new("SELECT * FROM books WHERE author = :author")
///     .bind("author", "McConnell")
///     .fetch_all(&client)
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct Query {
    sql: String,
    params: Params,
}

impl Query {
    /// Create a new query with the given SQL.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Params::new(),
        }
    }

    /// Bind a value to the `:name` placeholder.
    pub fn bind(mut self, name: impl AsRef<str>, value: impl Into<Value>) -> Self {
        self.params.insert(name, value);
        self
    }

    /// Bind every parameter from a [`Params`] set.
    pub fn bind_all(mut self, params: &Params) -> Self {
        for (name, value) in params.iter() {
            self.params.insert(name, value.clone());
        }
        self
    }

    /// Get the SQL template.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Get the bound parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The SQL text that will be sent to the server.
    pub fn to_sql(&self) -> Result<String> {
        substitute(&self.sql, &self.params)
    }

    /// Execute the query and wait for its result.
    pub async fn execute<E: Executor + ?Sized>(&self, executor: &E) -> Result<QueryResult> {
        executor.query(&self.sql, &self.params).await
    }

    /// Dispatch the query without waiting for the server.
    pub async fn dispatch<E: Executor + ?Sized>(&self, executor: &E) -> Result<AsyncResult> {
        executor.async_query(&self.sql, &self.params).await
    }

    /// Fetch all rows mapped through [`FromRow`].
    pub async fn fetch_all<T: FromRow, E: Executor + ?Sized>(&self, executor: &E) -> Result<Vec<T>> {
        self.execute(executor).await?.rows_as()
    }

    /// Fetch a single optional row.
    pub async fn fetch_optional<T: FromRow, E: Executor + ?Sized>(
        &self,
        executor: &E,
    ) -> Result<Option<T>> {
        match self.execute(executor).await?.first_row() {
            Some(row) => Ok(Some(T::from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Fetch exactly one row.
    pub async fn fetch_one<T: FromRow, E: Executor + ?Sized>(&self, executor: &E) -> Result<T> {
        self.fetch_optional(executor).await?.ok_or_else(|| Error::Query {
            sql: self.to_sql().unwrap_or_else(|_| self.sql.clone()),
            message: "Expected one row, found none".to_string(),
        })
    }

    /// Fetch a scalar value (first column of first row).
    pub async fn fetch_scalar<T: FromValue, E: Executor + ?Sized>(&self, executor: &E) -> Result<T> {
        self.execute(executor).await?.scalar()
    }
}
