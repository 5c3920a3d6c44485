//! Executor trait: anything that can run a statement

use crate::builder::Statement;
use crate::error::Result;
use crate::mysql::AsyncResult;
use crate::query::Params;
use crate::result::QueryResult;
use async_trait::async_trait;

/// Trait for query executors.
///
/// Implemented by the client facade, tag-filtered clients and open
/// transactions, so the same query code works inside and outside a
/// transaction.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run a statement and wait for its result.
    async fn query(&self, sql: &str, params: &Params) -> Result<QueryResult>;

    /// Dispatch a statement and return immediately.
    ///
    /// The returned [`AsyncResult`] resolves on first data access.
    async fn async_query(&self, sql: &str, params: &Params) -> Result<AsyncResult>;

    /// Run a statement produced by the query builder.
    async fn execute(&self, statement: &Statement) -> Result<QueryResult> {
        self.query(statement.sql(), statement.params()).await
    }
}

// Implement Executor for references to executors
#[async_trait]
impl<T: Executor + ?Sized> Executor for &T {
    async fn query(&self, sql: &str, params: &Params) -> Result<QueryResult> {
        (**self).query(sql, params).await
    }

    async fn async_query(&self, sql: &str, params: &Params) -> Result<AsyncResult> {
        (**self).async_query(sql, params).await
    }
}
