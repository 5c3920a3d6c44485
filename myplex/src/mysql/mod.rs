//! MySQL connections, pooling and async query coordination

mod async_result;
mod connection;
pub mod poller;
mod pool;
mod row;
mod transaction;
mod types;

pub use async_result::AsyncResult;
pub use connection::{ChannelId, Connection};
pub use poller::ReadyHandle;
pub use pool::{Claim, Pool};
pub use row::Row;
pub use transaction::Transaction;
