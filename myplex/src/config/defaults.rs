//! Default configuration values - single source of truth

/// Default server host
pub const HOST: &str = "localhost";

/// Default server port
pub const PORT: u16 = 3306;

/// Default password (empty)
pub const PASSWORD: &str = "";

/// Whether connections open lazily (on first use) by default
pub const LAZY: bool = false;

/// Default configuration file name looked up by [`ClientConfig::load`](super::ClientConfig::load)
pub const CONFIG_FILE: &str = "myplex";

/// Prefix of environment variables read by [`ClientConfig::load`](super::ClientConfig::load)
pub const ENV_PREFIX: &str = "MYPLEX";
