//! Tag-aware pool over a fixed set of connections

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::tags::Tags;

use super::connection::{Connection, Availability};
use super::poller;

/// A connection handed out by [`Pool::get_free_connection`].
///
/// The claim holds the connection's lease: no other caller is given this
/// connection until the claim is dropped.
pub struct Claim {
    connection: Arc<Connection>,
    lease: OwnedMutexGuard<()>,
}

impl Claim {
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub(crate) fn into_parts(self) -> (Arc<Connection>, OwnedMutexGuard<()>) {
        (self.connection, self.lease)
    }
}

/// An ordered set of connections.
///
/// List order is selection priority: the first free connection matching
/// the requested tags wins, every time. There is no round-robin.
///
/// # Example
///
/// ```ignore
/// use myplex::{ConnectionConfig, Pool, Tags};
///
/// let pool = Pool::connect(vec![
///     ConnectionConfig::new("root").default_db("test").tags(["primary"]),
///     ConnectionConfig::new("reader").host("10.0.0.2").tags(["replica"]),
/// ])
/// .await?;
///
/// let claim = pool.get_free_connection(&Tags::from(["replica"])).await?;
/// ```
pub struct Pool {
    connections: Vec<Arc<Connection>>,
    // serializes scan-and-claim
    claim: Mutex<()>,
}

impl Pool {
    /// Build a pool over existing connections, in selection order.
    pub fn new(connections: Vec<Arc<Connection>>) -> Self {
        Self {
            connections,
            claim: Mutex::new(()),
        }
    }

    /// Create a connection per config, opening every non-lazy one now.
    pub async fn connect(configs: impl IntoIterator<Item = ConnectionConfig>) -> Result<Self> {
        let mut connections = Vec::new();
        for config in configs {
            config.validate()?;
            let connection = Arc::new(Connection::new(config));
            if !connection.config().lazy {
                connection.connect().await?;
            }
            connections.push(connection);
        }
        info!(connections = connections.len(), "pool ready");
        Ok(Self::new(connections))
    }

    pub fn connections(&self) -> &[Arc<Connection>] {
        &self.connections
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Claim a connection matching `tags`.
    ///
    /// Returns the first idle match. If every match has an async query in
    /// flight, waits until one of them finishes and claims that one. If
    /// every match is claimed by someone else, waits for the first of them
    /// to be released.
    ///
    /// The returned connection never has an unresolved async query.
    pub async fn get_free_connection(&self, tags: &Tags) -> Result<Claim> {
        let guard = self.claim.lock().await;

        let mut pending = Vec::new();
        let mut busy: Option<&Arc<Connection>> = None;
        for connection in self.connections.iter().filter(|c| c.tags().matches(tags)) {
            let Some(lease) = connection.try_lease() else {
                busy.get_or_insert(connection);
                continue;
            };
            match connection.availability() {
                Availability::Idle => {
                    debug!(connection = %connection.id(), %tags, "claimed idle connection");
                    return Ok(Claim {
                        connection: Arc::clone(connection),
                        lease,
                    });
                }
                Availability::Pending(handle) => pending.push(handle),
                Availability::Busy => {
                    busy.get_or_insert(connection);
                }
            }
        }

        if !pending.is_empty() {
            debug!(pending = pending.len(), %tags, "no idle connection, polling");
            let ready = poller::wait_any(pending).await?;
            let connection = self
                .connections
                .iter()
                .find(|c| c.id() == ready)
                .ok_or_else(|| {
                    Error::PoolIntegrity(format!("ready channel {} is not in the pool", ready))
                })?;
            let lease = connection.lease().await;
            connection.sync().await;
            debug!(connection = %connection.id(), %tags, "claimed connection after poll");
            return Ok(Claim {
                connection: Arc::clone(connection),
                lease,
            });
        }

        let Some(connection) = busy else {
            return Err(Error::NoMatchingConnection {
                tags: tags.to_vec(),
            });
        };

        // Every match is claimed: stop blocking other callers while waiting.
        drop(guard);
        debug!(connection = %connection.id(), %tags, "waiting for claimed connection");
        let lease = connection.lease().await;
        connection.sync().await;
        Ok(Claim {
            connection: Arc::clone(connection),
            lease,
        })
    }

    /// Close every channel. Failures are logged, not returned.
    pub async fn disconnect(&self) {
        for connection in &self.connections {
            connection.disconnect().await;
        }
        info!(connections = self.connections.len(), "pool disconnected");
    }
}
