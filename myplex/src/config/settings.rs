//! Configuration settings for myplex

use std::fmt;
use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use super::defaults;
use crate::error::{Error, Result};
use crate::tags::Tags;

/// Options for one pooled connection.
///
/// Unknown keys are rejected when deserializing.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// User name for authentication
    pub user: String,

    /// Password for authentication
    #[serde(default = "default_password")]
    pub password: String,

    /// Server host name or address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database selected after connecting
    #[serde(default, alias = "defaultDb", alias = "defaultdb")]
    pub default_db: Option<String>,

    /// Connection charset, applied with `SET NAMES` after connecting
    #[serde(default)]
    pub charset: Option<String>,

    /// Open the channel on first use instead of when the pool is built
    #[serde(default = "default_lazy")]
    pub lazy: bool,

    /// Labels used to route queries to this connection
    #[serde(default)]
    pub tags: Tags,
}

// Default value functions for serde
fn default_password() -> String {
    defaults::PASSWORD.to_string()
}
fn default_host() -> String {
    defaults::HOST.to_string()
}
fn default_port() -> u16 {
    defaults::PORT
}
fn default_lazy() -> bool {
    defaults::LAZY
}

impl ConnectionConfig {
    /// Options for `user` with every other field at its default.
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: default_password(),
            host: default_host(),
            port: default_port(),
            default_db: None,
            charset: None,
            lazy: default_lazy(),
            tags: Tags::any(),
        }
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn default_db(mut self, db: impl Into<String>) -> Self {
        self.default_db = Some(db.into());
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn tags(mut self, tags: impl Into<Tags>) -> Self {
        self.tags = tags.into();
        self
    }

    /// `host:port`, used in connection errors and logs.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate the options
    pub fn validate(&self) -> Result<()> {
        if self.user.is_empty() {
            return Err(Error::Config(format!(
                "user is required for connection {}",
                self.address()
            )));
        }
        if self.host.is_empty() {
            return Err(Error::Config("host must not be empty".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("default_db", &self.default_db)
            .field("charset", &self.charset)
            .field("lazy", &self.lazy)
            .field("tags", &self.tags)
            .finish()
    }
}

/// Configuration for a [`Client`](crate::Client): the pooled connections,
/// in selection order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Connections in selection order
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,

    /// Log level (trace, debug, info, warn, error)
    /// Can be overridden by RUST_LOG env var
    #[serde(default)]
    pub log_level: Option<String>,
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration using config-rs (file + environment variables)
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from config file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path));
        } else {
            // Try default locations
            builder = builder.add_source(File::with_name(defaults::CONFIG_FILE).required(false));
        }

        // Override with environment variables (MYPLEX_LOG_LEVEL, ...)
        builder = builder.add_source(
            Environment::with_prefix(defaults::ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

        let config: ClientConfig = builder.build()?.try_deserialize()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.connections.is_empty() {
            return Err(Error::Config("at least one connection is required".into()));
        }
        for connection in &self.connections {
            connection.validate()?;
        }
        Ok(())
    }
}
