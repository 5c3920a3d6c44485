//! MySQL transaction handle

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::query::Params;
use crate::result::QueryResult;
use crate::table::Table;
use crate::traits::{Executor, Finish, IsolationLevel, TxState};

use super::async_result::AsyncResult;
use super::connection::Connection;
use super::pool::Claim;

/// An open transaction on one connection.
///
/// Handed to the body of [`Client::transaction`](crate::Client::transaction).
/// Every statement run through it goes to the same connection, which stays
/// claimed until the transaction is over. The body may decide the outcome
/// itself with [`commit`](Transaction::commit) or
/// [`rollback`](Transaction::rollback); otherwise the runner commits when
/// the body succeeds and rolls back when it fails.
///
/// # Example
///
/// ```ignore
/// client.transaction(|tx| Box::pin(async move {
///     tx.query("insert into foobar set title = :title", &params! { "title" => "Foo" }).await?;
///     if should_abort {
///         tx.rollback().await?;
///     }
///     Ok(())
/// })).await?;
/// ```
pub struct Transaction {
    connection: Arc<Connection>,
    state: Mutex<TxState>,
    lease: Option<OwnedMutexGuard<()>>,
    finished: bool,
}

impl Transaction {
    /// Start a transaction on a claimed connection.
    ///
    /// If this is cancelled or fails after autocommit may have been turned
    /// off, autocommit is restored before the connection is released.
    pub(crate) async fn begin(claim: Claim, level: Option<IsolationLevel>) -> Result<Self> {
        let (connection, lease) = claim.into_parts();
        let mut tx = Self {
            connection,
            state: Mutex::new(TxState::Pending),
            lease: Some(lease),
            finished: false,
        };
        if let Err(err) = tx.connection.start_transaction(level).await {
            if let Err(restore) = tx.connection.rollback().await {
                debug!(connection = %tx.connection.id(), error = %restore, "autocommit not restored");
            }
            tx.finished = true;
            return Err(err);
        }
        debug!(connection = %tx.connection.id(), ?level, "transaction started");
        Ok(tx)
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// The explicit decision taken so far, if any.
    pub fn state(&self) -> TxState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Commit now. The runner will not commit or roll back afterwards.
    pub async fn commit(&self) -> Result<()> {
        self.connection.commit().await?;
        self.decide(TxState::Committed);
        Ok(())
    }

    /// Roll back now. The runner will not commit or roll back afterwards.
    pub async fn rollback(&self) -> Result<()> {
        self.connection.rollback().await?;
        self.decide(TxState::RolledBack);
        Ok(())
    }

    /// Run a statement inside the transaction.
    pub async fn query(&self, sql: &str, params: &Params) -> Result<QueryResult> {
        self.connection.query(sql, params).await
    }

    /// Dispatch a statement inside the transaction without waiting.
    pub async fn async_query(&self, sql: &str, params: &Params) -> Result<AsyncResult> {
        self.connection.async_query(sql, params).await
    }

    /// Table helper bound to this transaction.
    pub fn table(&self, name: impl Into<String>, pk: impl Into<String>) -> Table<&Transaction> {
        Table::new(self, name, pk)
    }

    fn decide(&self, state: TxState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
        debug!(connection = %self.connection.id(), ?state, "transaction decided");
    }

    /// Apply the automatic decision for the body's outcome.
    ///
    /// A failed body is reported as [`Error::Transaction`], carrying the
    /// rollback failure too if the automatic rollback failed.
    ///
    /// Until the automatic commit or rollback has completed, dropping the
    /// handle still rolls back.
    pub(crate) async fn finish<R>(mut self, outcome: Result<R>) -> Result<R> {
        let action = self.state().finish(outcome.is_ok());
        let result = self.apply(action, outcome).await;
        self.finished = true;
        result
    }

    async fn apply<R>(&self, action: Finish, outcome: Result<R>) -> Result<R> {
        match outcome {
            Ok(value) => {
                if action == Finish::Commit {
                    self.auto_commit().await?;
                }
                Ok(value)
            }
            Err(source) => {
                let rollback = if action == Finish::Rollback {
                    self.auto_rollback(&source).await
                } else {
                    None
                };
                Err(Error::Transaction {
                    source: Box::new(source),
                    rollback,
                })
            }
        }
    }

    async fn auto_commit(&self) -> Result<()> {
        let id = self.connection.id();
        let Err(err) = self.connection.commit().await else {
            debug!(connection = %id, "transaction committed");
            return Ok(());
        };
        // leave nothing half-open on the connection
        match self.connection.rollback().await {
            Ok(()) => warn!(connection = %id, error = %err, "commit failed, rolled back"),
            Err(rollback) => warn!(
                connection = %id,
                error = %err,
                rollback_error = %rollback,
                "commit failed and rollback failed"
            ),
        }
        Err(err)
    }

    async fn auto_rollback(&self, source: &Error) -> Option<Box<Error>> {
        let id = self.connection.id();
        match self.connection.rollback().await {
            Ok(()) => {
                debug!(connection = %id, error = %source, "transaction rolled back");
                None
            }
            Err(rollback) => {
                error!(
                    connection = %id,
                    error = %source,
                    rollback_error = %rollback,
                    "transaction failed and rollback failed"
                );
                Some(Box::new(rollback))
            }
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // The body's future was dropped mid-transaction. Roll back before
        // the connection is released.
        let Some(lease) = self.lease.take() else {
            return;
        };
        let connection = Arc::clone(&self.connection);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = connection.rollback().await {
                        warn!(connection = %connection.id(), error = %err, "rollback of abandoned transaction failed");
                    }
                    drop(lease);
                });
            }
            Err(_) => warn!(
                connection = %connection.id(),
                "transaction abandoned outside a runtime; not rolled back"
            ),
        }
    }
}

#[async_trait]
impl Executor for Transaction {
    async fn query(&self, sql: &str, params: &Params) -> Result<QueryResult> {
        Transaction::query(self, sql, params).await
    }

    async fn async_query(&self, sql: &str, params: &Params) -> Result<AsyncResult> {
        Transaction::async_query(self, sql, params).await
    }
}
