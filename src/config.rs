//! Client configuration.
//!
//! Every field has a default that matches a playback service running on the
//! local machine, so an empty configuration file is valid. Durations are
//! given in milliseconds.
//!
//! # Example
//!
//! ```toml
//! address = "127.0.0.1:3333"
//! timeout = 1500
//! refresh_interval = 100
//! ```

use std::{
    fs,
    net::{Ipv4Addr, SocketAddr},
    path::Path,
    time::Duration,
};

use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds};

use crate::{error::Result, protocol};

#[serde_as]
#[derive(Clone, Debug, Deserialize, Hash, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Endpoint of the playback service.
    pub address: SocketAddr,

    /// Bound on every socket read and write.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub timeout: Duration,

    /// Period of the refresh battery that re-polls all cached state.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub refresh_interval: Duration,

    /// Sleep of the processing loop while the connection is errored.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub error_backoff: Duration,

    /// Sleep of the processing loop when there is nothing to do.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub idle_sleep: Duration,

    /// Range end when fetching the whole main queue.
    pub queue_limit: usize,

    /// Range end when fetching the whole sub-queue.
    pub sub_queue_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: SocketAddr::from((Ipv4Addr::LOCALHOST, protocol::PORT)),
            timeout: protocol::TIMEOUT,
            refresh_interval: Duration::from_millis(100),
            error_backoff: Duration::from_millis(50),
            idle_sleep: Duration::from_millis(5),
            queue_limit: 25_000,
            sub_queue_limit: 5_000,
        }
    }
}

impl Config {
    /// Loads a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid
    /// configuration.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config = contents.parse()?;
        debug!("loaded configuration from {}", path.display());
        Ok(config)
    }
}

impl std::str::FromStr for Config {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = "".parse().unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.address.port(), protocol::PORT);
    }

    #[test]
    fn durations_are_milliseconds() {
        let config: Config = "refresh_interval = 250\ntimeout = 20".parse().unwrap();
        assert_eq!(config.refresh_interval, Duration::from_millis(250));
        assert_eq!(config.timeout, Duration::from_millis(20));
        assert_eq!(config.queue_limit, 25_000);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!("port = 1".parse::<Config>().is_err());
    }
}
