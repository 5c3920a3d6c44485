//! Core traits for myplex

mod executor;
mod from_row;
mod from_value;
mod transaction;

pub use executor::Executor;
pub use from_row::FromRow;
pub use from_value::FromValue;
pub(crate) use transaction::Finish;
pub use transaction::{IsolationLevel, TxState};
