//! One physical connection and its state machine

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock, PoisonError};

use mysql_async::prelude::*;
use mysql_async::{Conn, OptsBuilder, Row as MySqlAsyncRow};
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::query::{substitute, Params};
use crate::result::QueryResult;
use crate::tags::Tags;
use crate::traits::IsolationLevel;
use crate::value::{escape_string, quote_identifier};

use super::async_result::AsyncResult;
use super::poller::ReadyHandle;
use super::row::Row;

static NEXT_CHANNEL: AtomicU64 = AtomicU64::new(1);

/// Process-unique id of a [`Connection`], used in logs and by the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl ChannelId {
    fn next() -> Self {
        ChannelId(NEXT_CHANNEL.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where the outcome of an async query is published, exactly once.
pub(crate) type Slot = Arc<OnceLock<Result<QueryResult>>>;

type Outcome = std::result::Result<QueryResult, mysql_async::Error>;

/// State of the channel.
///
/// `Closed → Idle → Pending → Idle → ...`; a fatal driver error sends the
/// channel back to `Closed`, and the next operation reconnects.
enum Link {
    Closed,
    Idle(Conn),
    Pending(PendingQuery),
}

/// An async query in flight. The task owns the channel until it finishes
/// and hands it back together with the outcome.
struct PendingQuery {
    sql: String,
    slot: Slot,
    done: watch::Receiver<bool>,
    task: JoinHandle<(Conn, Outcome)>,
}

pub(crate) struct Session {
    link: Link,
    default_db: Option<String>,
    charset: Option<String>,
}

pub(crate) enum Availability {
    Idle,
    Pending(ReadyHandle),
    Busy,
}

/// A single database channel with at most one outstanding query.
///
/// Every operation first waits for the outstanding async query, if any, so
/// operations on one connection run in dispatch order. The channel is
/// opened on first use unless [`Connection::connect`] is called earlier.
pub struct Connection {
    id: ChannelId,
    config: ConnectionConfig,
    session: Mutex<Session>,
    // completion signal of the pending query, readable while the session
    // is locked by whoever is resolving it
    signal: StdMutex<Option<watch::Receiver<bool>>>,
    lease: Arc<Mutex<()>>,
}

impl Connection {
    pub fn new(config: ConnectionConfig) -> Self {
        let session = Session {
            link: Link::Closed,
            default_db: config.default_db.clone(),
            charset: config.charset.clone(),
        };
        Self {
            id: ChannelId::next(),
            config,
            session: Mutex::new(session),
            signal: StdMutex::new(None),
            lease: Arc::new(Mutex::new(())),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn tags(&self) -> &Tags {
        &self.config.tags
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn address(&self) -> String {
        self.config.address()
    }

    /// Open the channel if it is not open yet.
    pub async fn connect(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if matches!(session.link, Link::Closed) {
            self.open(&mut session).await?;
        }
        Ok(())
    }

    /// Select the default database, now if the channel is open and on
    /// every later (re)connect.
    pub async fn set_default_db(&self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        let mut session = self.session.lock().await;
        self.settle(&mut session).await;
        session.default_db = Some(name.clone());
        if matches!(session.link, Link::Idle(_)) {
            self.apply_default_db(&mut session, &name).await?;
        }
        Ok(())
    }

    /// Set the connection charset, now if the channel is open and on every
    /// later (re)connect.
    pub async fn set_charset(&self, charset: impl Into<String>) -> Result<()> {
        let charset = charset.into();
        let mut session = self.session.lock().await;
        self.settle(&mut session).await;
        session.charset = Some(charset.clone());
        if matches!(session.link, Link::Idle(_)) {
            self.apply_charset(&mut session, &charset).await?;
        }
        Ok(())
    }

    /// Run a statement and wait for its result.
    pub async fn query(&self, sql: &str, params: &Params) -> Result<QueryResult> {
        let sql = substitute(sql, params)?;
        let mut session = self.session.lock().await;
        self.ready(&mut session).await?;

        let Link::Idle(conn) = &mut session.link else {
            return Err(self.not_idle());
        };
        debug!(connection = %self.id, sql = %sql, "query");
        match fetch(conn, &sql).await {
            Ok(result) => Ok(result),
            Err(err) => {
                if !channel_survives(&err) {
                    self.close_broken(&mut session, &err);
                }
                Err(Error::query(sql, err))
            }
        }
    }

    /// Dispatch a statement without waiting for the server.
    ///
    /// The returned [`AsyncResult`] resolves on first data access, or
    /// earlier when another operation needs this connection.
    pub async fn async_query(self: &Arc<Self>, sql: &str, params: &Params) -> Result<AsyncResult> {
        let sql = substitute(sql, params)?;
        let mut session = self.session.lock().await;
        self.ready(&mut session).await?;

        let mut conn = match mem::replace(&mut session.link, Link::Closed) {
            Link::Idle(conn) => conn,
            other => {
                session.link = other;
                return Err(self.not_idle());
            }
        };

        let slot: Slot = Arc::new(OnceLock::new());
        let (done_tx, done) = watch::channel(false);
        let task_sql = sql.clone();
        let task = tokio::spawn(async move {
            let outcome = fetch(&mut conn, &task_sql).await;
            let _ = done_tx.send(true);
            (conn, outcome)
        });

        debug!(connection = %self.id, sql = %sql, "dispatched async query");
        self.set_pending(
            &mut session,
            PendingQuery {
                sql: sql.clone(),
                slot: Arc::clone(&slot),
                done,
                task,
            },
        );
        Ok(AsyncResult::new(sql, Arc::clone(self), slot))
    }

    /// Wait for the outstanding async query, if any, and store its result.
    ///
    /// A failed query does not fail `sync`: the error is kept on the
    /// [`AsyncResult`] it belongs to.
    pub async fn sync(&self) {
        let mut session = self.session.lock().await;
        self.settle(&mut session).await;
    }

    /// Whether an async query is outstanding.
    pub async fn is_pending(&self) -> bool {
        matches!(self.session.lock().await.link, Link::Pending(_))
    }

    /// Readiness handle of the outstanding async query, if any.
    pub async fn ready_handle(&self) -> Option<ReadyHandle> {
        self.signal().map(|done| ReadyHandle::new(self.id, done))
    }

    /// Begin a transaction: optional isolation level, then autocommit off.
    pub async fn start_transaction(&self, level: Option<IsolationLevel>) -> Result<()> {
        let mut session = self.session.lock().await;
        self.ready(&mut session).await?;
        if let Some(level) = level {
            let sql = format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql());
            self.run_query(&mut session, &sql).await?;
        }
        self.run_query(&mut session, "SET autocommit = 0").await
    }

    pub async fn commit(&self) -> Result<()> {
        self.finish_transaction("COMMIT").await
    }

    pub async fn rollback(&self) -> Result<()> {
        self.finish_transaction("ROLLBACK").await
    }

    async fn finish_transaction(&self, statement: &str) -> Result<()> {
        let mut session = self.session.lock().await;
        self.settle(&mut session).await;
        // A reconnect would start a fresh session; the transaction is gone.
        if matches!(session.link, Link::Closed) {
            return Err(Error::query(statement, "channel closed during transaction"));
        }
        self.run_query(&mut session, statement).await?;
        self.run_query(&mut session, "SET autocommit = 1").await
    }

    /// Close the channel. Failures are logged, not returned.
    pub async fn disconnect(&self) {
        let mut session = self.session.lock().await;
        self.settle(&mut session).await;
        if let Link::Idle(conn) = mem::replace(&mut session.link, Link::Closed) {
            match conn.disconnect().await {
                Ok(()) => info!(connection = %self.id, "channel closed"),
                Err(err) => warn!(connection = %self.id, error = %err, "disconnect failed"),
            }
        }
    }

    pub(crate) fn try_lease(&self) -> Option<OwnedMutexGuard<()>> {
        Arc::clone(&self.lease).try_lock_owned().ok()
    }

    pub(crate) async fn lease(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.lease).lock_owned().await
    }

    /// Non-blocking look at the connection, for the pool's scan.
    ///
    /// A pending query is reported as pending even while another task holds
    /// the session to resolve it.
    pub(crate) fn availability(&self) -> Availability {
        if let Some(done) = self.signal() {
            return Availability::Pending(ReadyHandle::new(self.id, done));
        }
        match self.session.try_lock() {
            Err(_) => Availability::Busy,
            Ok(_) => Availability::Idle,
        }
    }

    fn signal(&self) -> Option<watch::Receiver<bool>> {
        self.signal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_pending(&self, session: &mut Session, pending: PendingQuery) {
        *self.signal.lock().unwrap_or_else(PoisonError::into_inner) = Some(pending.done.clone());
        session.link = Link::Pending(pending);
    }

    /// Settle the outstanding query, then make sure the channel is open.
    async fn ready(&self, session: &mut Session) -> Result<()> {
        self.settle(session).await;
        if matches!(session.link, Link::Closed) {
            self.open(session).await?;
        }
        Ok(())
    }

    async fn settle(&self, session: &mut Session) {
        session.link = match mem::replace(&mut session.link, Link::Closed) {
            Link::Pending(pending) => self.resolve(pending).await,
            other => other,
        };
        // also drops a signal left behind by a cancelled resolve
        *self.signal.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    async fn resolve(&self, pending: PendingQuery) -> Link {
        let PendingQuery { sql, slot, task, .. } = pending;
        let (link, outcome) = match task.await {
            Ok((conn, Ok(result))) => (Link::Idle(conn), Ok(result)),
            Ok((conn, Err(err))) => {
                let link = if channel_survives(&err) {
                    Link::Idle(conn)
                } else {
                    warn!(connection = %self.id, error = %err, "dropping broken channel");
                    Link::Closed
                };
                (link, Err(Error::query(sql.as_str(), err)))
            }
            Err(err) => (
                Link::Closed,
                Err(Error::Connection {
                    address: self.address(),
                    message: format!("async query task failed: {}", err),
                }),
            ),
        };
        debug!(connection = %self.id, sql = %sql, ok = outcome.is_ok(), "resolved async query");
        let _ = slot.set(outcome);
        link
    }

    async fn open(&self, session: &mut Session) -> Result<()> {
        let mut opts = OptsBuilder::default()
            .ip_or_hostname(self.config.host.clone())
            .tcp_port(self.config.port)
            .user(Some(self.config.user.clone()));
        if !self.config.password.is_empty() {
            opts = opts.pass(Some(self.config.password.clone()));
        }

        let conn = Conn::new(opts).await.map_err(|e| Error::Connection {
            address: self.address(),
            message: e.to_string(),
        })?;
        info!(connection = %self.id, address = %self.address(), "channel opened");
        session.link = Link::Idle(conn);

        // The channel stays open when either of these fails.
        if let Some(db) = session.default_db.clone() {
            self.apply_default_db(session, &db).await?;
        }
        if let Some(charset) = session.charset.clone() {
            self.apply_charset(session, &charset).await?;
        }
        Ok(())
    }

    async fn apply_default_db(&self, session: &mut Session, db: &str) -> Result<()> {
        let sql = format!("USE {}", quote_identifier(db));
        self.run(session, &sql)
            .await
            .map_err(|message| Error::DefaultDb {
                database: db.to_string(),
                message,
            })
    }

    async fn apply_charset(&self, session: &mut Session, charset: &str) -> Result<()> {
        let sql = format!("SET NAMES '{}'", escape_string(charset));
        self.run(session, &sql).await.map_err(|message| Error::Charset {
            charset: charset.to_string(),
            message,
        })
    }

    async fn run_query(&self, session: &mut Session, sql: &str) -> Result<()> {
        self.run(session, sql)
            .await
            .map_err(|message| Error::query(sql, message))
    }

    /// Run a statement on the open channel, discarding any rows.
    async fn run(&self, session: &mut Session, sql: &str) -> std::result::Result<(), String> {
        let Link::Idle(conn) = &mut session.link else {
            return Err("channel is not open".to_string());
        };
        debug!(connection = %self.id, sql, "run");
        match conn.query_drop(sql).await {
            Ok(()) => Ok(()),
            Err(err) => {
                let message = err.to_string();
                if !channel_survives(&err) {
                    self.close_broken(session, &err);
                }
                Err(message)
            }
        }
    }

    fn close_broken(&self, session: &mut Session, err: &mysql_async::Error) {
        warn!(connection = %self.id, error = %err, "dropping broken channel");
        session.link = Link::Closed;
    }

    fn not_idle(&self) -> Error {
        Error::PoolIntegrity(format!("channel {} is not idle after sync", self.id))
    }
}

#[cfg(test)]
impl Connection {
    /// Hold the session the way an operation in progress does.
    pub(crate) async fn lock_session(&self) -> tokio::sync::MutexGuard<'_, Session> {
        self.session.lock().await
    }

    /// Put a query in flight on a task that only ends when aborted.
    pub(crate) async fn stall_query(
        &self,
        sql: &str,
    ) -> (watch::Sender<bool>, tokio::task::AbortHandle) {
        let (done_tx, done) = watch::channel(false);
        let task = tokio::spawn(std::future::pending::<(Conn, Outcome)>());
        let abort = task.abort_handle();
        let mut session = self.session.lock().await;
        self.set_pending(
            &mut session,
            PendingQuery {
                sql: sql.to_string(),
                slot: Arc::new(OnceLock::new()),
                done,
                task,
            },
        );
        (done_tx, abort)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("address", &self.address())
            .field("tags", &self.config.tags)
            .finish()
    }
}

/// Server errors leave the channel usable; I/O and protocol errors do not.
fn channel_survives(err: &mysql_async::Error) -> bool {
    matches!(err, mysql_async::Error::Server(_))
}

/// Run a statement over the text protocol and collect its first result set.
async fn fetch(conn: &mut Conn, sql: &str) -> Outcome {
    let mut result = conn.query_iter(sql).await?;
    let columns: Vec<String> = result
        .columns()
        .map(|columns| columns.iter().map(|c| c.name_str().into_owned()).collect())
        .unwrap_or_default();
    let columns: Arc<[String]> = columns.into();
    let raw: Vec<MySqlAsyncRow> = result.collect().await?;
    result.drop_result().await?;

    let rows: Vec<Row> = raw
        .iter()
        .map(|row| Row::from_mysql_row(Arc::clone(&columns), row))
        .collect();
    // Like the C client, a statement that returns rows reports their count.
    let affected_rows = if columns.is_empty() {
        conn.affected_rows()
    } else {
        rows.len() as u64
    };
    Ok(QueryResult::new(
        sql.to_string(),
        rows,
        affected_rows,
        conn.last_insert_id(),
    ))
}
