//! myplex - tagged MySQL connection pool with async query multiplexing
//!
//! A client-side access layer built on `mysql_async`. A [`Client`] owns an
//! ordered pool of connections, each optionally carrying tags, and hands
//! every statement to the first free connection whose tags match.
//!
//! # Features
//!
//! - **Async dispatch**: [`Client::async_query`] puts a statement on the wire
//!   and returns an [`AsyncResult`] that resolves on first access, so slow
//!   statements on different connections overlap
//! - **Tag routing**: [`Client::tagged`] restricts a caller to, say, replica
//!   connections
//! - **Transactions**: [`Client::transaction`] pins a connection for the
//!   duration of a closure, committing or rolling back automatically
//! - **Named parameters**: `:name` placeholders are replaced client-side with
//!   quoted literals (see [`substitute`])
//! - **Query builder**: criteria, ordering and limits compiled to SQL
//!   ([`builder`]), plus a [`Table`] helper for primary-key CRUD
//!
//! # Example
//!
//! ```ignore
//! use myplex::{params, Client, ConnectionConfig};
//!
//! async fn titles(client: &Client) -> myplex::Result<Vec<String>> {
//!     let result = client
//!         .query(
//!             "select title from foobar where id > :id",
//!             &params! { "id" => 2 },
//!         )
//!         .await?;
//!     result.rows_as::<(String,)>().map(|rows| rows.into_iter().map(|(t,)| t).collect())
//! }
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod mysql;
pub mod query;
pub mod traits;
pub mod value;

mod client;
mod result;
mod table;
mod tags;

// Re-export main types
pub use builder::{Criteria, Fields, OrderBy, QueryBuilder, Select, Statement};
pub use client::{Client, TaggedClient};
pub use config::{ClientConfig, ConnectionConfig};
pub use error::{Error, Result};
pub use mysql::{AsyncResult, ChannelId, Claim, Connection, Pool, ReadyHandle, Row, Transaction};
pub use query::{substitute, Params, Query};
pub use result::QueryResult;
pub use table::Table;
pub use tags::Tags;
pub use traits::{Executor, FromRow, FromValue, IsolationLevel, TxState};
pub use value::{escape_string, quote, quote_identifier, Value};
