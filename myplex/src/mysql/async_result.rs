//! Deferred result of an async query

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::result::QueryResult;

use super::connection::{Connection, Slot};
use super::row::Row;

/// Result of a query that was dispatched without waiting.
///
/// The first data access waits for the owning connection to finish the
/// query; later accesses return the stored outcome. A failed query reports
/// the same error on every access.
///
/// # Example
///
/// ```ignore
/// let slow = client.async_query("select sleep(1), 'slow' as name", &Params::new()).await?;
/// let fast = client.async_query("select 'fast' as name", &Params::new()).await?;
///
/// // both are running; this waits for `fast` only
/// let rows = fast.rows().await?;
/// ```
pub struct AsyncResult {
    sql: String,
    connection: Arc<Connection>,
    slot: Slot,
}

impl AsyncResult {
    pub(crate) fn new(sql: String, connection: Arc<Connection>, slot: Slot) -> Self {
        Self {
            sql,
            connection,
            slot,
        }
    }

    /// The SQL text that was dispatched. Never waits.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The connection the query was dispatched on.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Whether the result has been resolved.
    pub fn is_ready(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Wait for the query and return its result.
    pub async fn wait(&self) -> Result<&QueryResult> {
        if self.slot.get().is_none() {
            self.connection.sync().await;
        }
        match self.slot.get() {
            Some(Ok(result)) => Ok(result),
            Some(Err(err)) => Err(err.clone()),
            None => Err(Error::query(
                self.sql.as_str(),
                "query was abandoned before it completed",
            )),
        }
    }

    pub async fn rows(&self) -> Result<&[Row]> {
        Ok(self.wait().await?.rows())
    }

    pub async fn affected_rows(&self) -> Result<u64> {
        Ok(self.wait().await?.affected_rows())
    }

    pub async fn inserted_id(&self) -> Result<Option<u64>> {
        Ok(self.wait().await?.inserted_id())
    }

    /// Wait for the query and take an owned copy of its result.
    pub async fn into_result(self) -> Result<QueryResult> {
        self.wait().await.cloned()
    }
}

impl fmt::Debug for AsyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncResult")
            .field("sql", &self.sql)
            .field("connection", &self.connection.id())
            .field("ready", &self.is_ready())
            .finish()
    }
}
