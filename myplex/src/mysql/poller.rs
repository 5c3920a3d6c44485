//! Readiness polling across pending connections

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures::future::select_all;
use tokio::sync::watch;
use tracing::trace;

use crate::error::{Error, Result};

use super::connection::ChannelId;

/// Length of one wait slice; the poller wakes up at least this often.
pub const POLL_SLICE: Duration = Duration::from_millis(50);

/// Completion signal of the async query outstanding on one connection.
///
/// A handle counts as ready once the query has finished, failed, or its
/// task is gone.
#[derive(Debug, Clone)]
pub struct ReadyHandle {
    channel: ChannelId,
    done: watch::Receiver<bool>,
}

impl ReadyHandle {
    pub(crate) fn new(channel: ChannelId, done: watch::Receiver<bool>) -> Self {
        Self { channel, done }
    }

    /// The connection this handle belongs to.
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn is_ready(&self) -> bool {
        *self.done.borrow() || self.done.has_changed().is_err()
    }

    async fn wait(mut self) -> ChannelId {
        loop {
            if *self.done.borrow_and_update() {
                return self.channel;
            }
            if self.done.changed().await.is_err() {
                return self.channel;
            }
        }
    }
}

/// Wait until at least one handle is ready and return its channel.
///
/// When several are ready the earliest in `handles` wins.
pub async fn wait_any(handles: Vec<ReadyHandle>) -> Result<ChannelId> {
    wait_any_sliced(handles, POLL_SLICE).await
}

async fn wait_any_sliced(handles: Vec<ReadyHandle>, slice: Duration) -> Result<ChannelId> {
    if handles.is_empty() {
        return Err(Error::PoolIntegrity(
            "readiness poll over an empty handle set".to_string(),
        ));
    }
    if let Some(ready) = handles.iter().find(|h| h.is_ready()) {
        return Ok(ready.channel);
    }

    let pending = handles.len();
    let mut waits: Vec<Pin<Box<dyn Future<Output = ChannelId> + Send>>> = handles
        .into_iter()
        .map(|handle| Box::pin(handle.wait()) as Pin<Box<dyn Future<Output = ChannelId> + Send>>)
        .collect();

    loop {
        match tokio::time::timeout(slice, select_all(waits.iter_mut())).await {
            Ok((channel, _, _)) => return Ok(channel),
            Err(_) => trace!(pending, "no connection ready yet"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;
    use crate::mysql::Connection;

    fn channel_ids(n: usize) -> Vec<ChannelId> {
        (0..n)
            .map(|_| Connection::new(ConnectionConfig::new("root")).id())
            .collect()
    }

    #[tokio::test]
    async fn test_empty_set_is_an_error() {
        assert!(matches!(
            wait_any(Vec::new()).await,
            Err(Error::PoolIntegrity(_))
        ));
    }

    #[tokio::test]
    async fn test_returns_the_handle_that_completes() {
        let ids = channel_ids(2);
        let (slow_tx, slow_rx) = watch::channel(false);
        let (fast_tx, fast_rx) = watch::channel(false);
        let handles = vec![
            ReadyHandle::new(ids[0], slow_rx),
            ReadyHandle::new(ids[1], fast_rx),
        ];

        let signal = tokio::spawn(async move {
            // spans several poll slices
            tokio::time::sleep(Duration::from_millis(120)).await;
            fast_tx.send(true).unwrap();
            fast_tx
        });

        let ready = wait_any_sliced(handles, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(ready, ids[1]);
        drop(signal.await.unwrap());
        drop(slow_tx);
    }

    #[tokio::test]
    async fn test_already_ready_handle_wins_immediately() {
        let ids = channel_ids(2);
        let (_tx0, rx0) = watch::channel(false);
        let (_tx1, rx1) = watch::channel(true);
        let handles = vec![ReadyHandle::new(ids[0], rx0), ReadyHandle::new(ids[1], rx1)];
        assert!(handles[1].is_ready());
        assert_eq!(wait_any(handles).await.unwrap(), ids[1]);
    }

    #[tokio::test]
    async fn test_abandoned_handle_counts_as_ready() {
        let ids = channel_ids(1);
        let (tx, rx) = watch::channel(false);
        let handle = ReadyHandle::new(ids[0], rx);
        assert!(!handle.is_ready());
        drop(tx);
        assert!(handle.is_ready());
        assert_eq!(wait_any(vec![handle]).await.unwrap(), ids[0]);
    }
}
