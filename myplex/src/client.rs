//! Client facade over the pool

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::debug;

use crate::config::{ClientConfig, ConnectionConfig};
use crate::error::Result;
use crate::mysql::{AsyncResult, Pool, Transaction};
use crate::query::Params;
use crate::result::QueryResult;
use crate::table::Table;
use crate::tags::Tags;
use crate::traits::{Executor, IsolationLevel};

/// Entry point for running queries against a pool.
///
/// Cloning is cheap; clones share the pool. Each call claims a free
/// connection matching the requested tags (any connection for an
/// untagged client) and releases it when the call returns.
///
/// # Example
///
/// ```ignore
/// use myplex::{params, Client, ConnectionConfig};
///
/// let client = Client::connect(vec![
///     ConnectionConfig::new("root").default_db("test"),
///     ConnectionConfig::new("root").default_db("test"),
/// ])
/// .await?;
///
/// let a = client.async_query("select sleep(1)", &params! {}).await?;
/// let b = client.async_query("select sleep(1)", &params! {}).await?;
/// a.wait().await?;
/// b.wait().await?;
/// ```
#[derive(Clone)]
pub struct Client {
    pool: Arc<Pool>,
}

impl Client {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Build the pool from connection configs and wrap it.
    pub async fn connect(configs: impl IntoIterator<Item = ConnectionConfig>) -> Result<Self> {
        Ok(Self::new(Pool::connect(configs).await?))
    }

    pub async fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        Self::connect(config.connections.iter().cloned()).await
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// A view of this client restricted to connections carrying at least
    /// one of the requested tags.
    pub fn tagged(&self, tags: impl Into<Tags>) -> TaggedClient {
        TaggedClient {
            client: self.clone(),
            tags: tags.into(),
        }
    }

    /// Run a statement and wait for its result.
    pub async fn query(&self, sql: &str, params: &Params) -> Result<QueryResult> {
        query_on(&self.pool, &Tags::any(), sql, params).await
    }

    /// Dispatch a statement and return without waiting for the server.
    pub async fn async_query(&self, sql: &str, params: &Params) -> Result<AsyncResult> {
        async_query_on(&self.pool, &Tags::any(), sql, params).await
    }

    pub fn table(&self, name: impl Into<String>, pk: impl Into<String>) -> Table<Client> {
        Table::new(self.clone(), name, pk)
    }

    /// Run `body` in a transaction on one connection.
    ///
    /// Commits when the body succeeds and rolls back when it fails, unless
    /// the body already committed or rolled back itself. A failed body is
    /// returned as [`Error::Transaction`](crate::Error::Transaction).
    ///
    /// ```ignore
    /// client
    ///     .transaction(|tx| Box::pin(async move {
    ///         tx.query("insert into foobar set title = 'Foo'", &Params::new()).await?;
    ///         Ok(())
    ///     }))
    ///     .await?;
    /// ```
    pub async fn transaction<R, F>(&self, body: F) -> Result<R>
    where
        R: Send,
        F: for<'a> FnOnce(&'a Transaction) -> BoxFuture<'a, Result<R>> + Send,
    {
        run_transaction(&self.pool, &Tags::any(), None, body).await
    }

    /// Like [`transaction`](Client::transaction), at an explicit isolation level.
    pub async fn transaction_with<R, F>(&self, level: IsolationLevel, body: F) -> Result<R>
    where
        R: Send,
        F: for<'a> FnOnce(&'a Transaction) -> BoxFuture<'a, Result<R>> + Send,
    {
        run_transaction(&self.pool, &Tags::any(), Some(level), body).await
    }

    pub async fn disconnect(&self) {
        self.pool.disconnect().await;
    }
}

/// A [`Client`] that only uses connections carrying at least one of its tags.
#[derive(Clone)]
pub struct TaggedClient {
    client: Client,
    tags: Tags,
}

impl TaggedClient {
    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn query(&self, sql: &str, params: &Params) -> Result<QueryResult> {
        query_on(&self.client.pool, &self.tags, sql, params).await
    }

    pub async fn async_query(&self, sql: &str, params: &Params) -> Result<AsyncResult> {
        async_query_on(&self.client.pool, &self.tags, sql, params).await
    }

    pub fn table(&self, name: impl Into<String>, pk: impl Into<String>) -> Table<TaggedClient> {
        Table::new(self.clone(), name, pk)
    }

    pub async fn transaction<R, F>(&self, body: F) -> Result<R>
    where
        R: Send,
        F: for<'a> FnOnce(&'a Transaction) -> BoxFuture<'a, Result<R>> + Send,
    {
        run_transaction(&self.client.pool, &self.tags, None, body).await
    }

    pub async fn transaction_with<R, F>(&self, level: IsolationLevel, body: F) -> Result<R>
    where
        R: Send,
        F: for<'a> FnOnce(&'a Transaction) -> BoxFuture<'a, Result<R>> + Send,
    {
        run_transaction(&self.client.pool, &self.tags, Some(level), body).await
    }
}

async fn query_on(pool: &Pool, tags: &Tags, sql: &str, params: &Params) -> Result<QueryResult> {
    let claim = pool.get_free_connection(tags).await?;
    claim.connection().query(sql, params).await
}

// The claim is released once the statement is on the wire; the connection
// stays pending until its result is picked up.
async fn async_query_on(
    pool: &Pool,
    tags: &Tags,
    sql: &str,
    params: &Params,
) -> Result<AsyncResult> {
    let claim = pool.get_free_connection(tags).await?;
    claim.connection().async_query(sql, params).await
}

async fn run_transaction<R, F>(
    pool: &Pool,
    tags: &Tags,
    level: Option<IsolationLevel>,
    body: F,
) -> Result<R>
where
    R: Send,
    F: for<'a> FnOnce(&'a Transaction) -> BoxFuture<'a, Result<R>> + Send,
{
    let claim = pool.get_free_connection(tags).await?;
    debug!(connection = %claim.connection().id(), %tags, "running transaction");
    let tx = Transaction::begin(claim, level).await?;
    let outcome = body(&tx).await;
    tx.finish(outcome).await
}

#[async_trait]
impl Executor for Client {
    async fn query(&self, sql: &str, params: &Params) -> Result<QueryResult> {
        Client::query(self, sql, params).await
    }

    async fn async_query(&self, sql: &str, params: &Params) -> Result<AsyncResult> {
        Client::async_query(self, sql, params).await
    }
}

#[async_trait]
impl Executor for TaggedClient {
    async fn query(&self, sql: &str, params: &Params) -> Result<QueryResult> {
        TaggedClient::query(self, sql, params).await
    }

    async fn async_query(&self, sql: &str, params: &Params) -> Result<AsyncResult> {
        TaggedClient::async_query(self, sql, params).await
    }
}
