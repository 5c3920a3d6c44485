//! Connection and client configuration

pub mod defaults;
mod settings;

pub use settings::{ClientConfig, ConnectionConfig};
