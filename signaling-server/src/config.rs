use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::Context;
use log::LevelFilter;
use serde::Deserialize;

const ENV_PREFIX: &str = "RENDEZVOUS_";

/// Server settings read from `RENDEZVOUS_*` environment variables.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `RENDEZVOUS_ADDRESS`, where the server listens
    #[serde(default = "default_address")]
    pub address: SocketAddr,
    /// `RENDEZVOUS_LOG_LEVEL`, one of `off`, `error`, `warn`, `info`, `debug`, `trace`
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9001))
}

fn default_log_level() -> String {
    "info".to_owned()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: default_address(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// # Errors
    /// Fails when a `RENDEZVOUS_*` variable holds a value that does not parse.
    pub fn from_env() -> crate::Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// # Errors
    /// Fails when a `RENDEZVOUS_*` variable holds a value that does not parse.
    pub fn from_vars<I>(vars: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX)
            .from_iter(vars)
            .context("invalid RENDEZVOUS_* environment variable")
    }

    /// # Errors
    /// Fails for an unknown level name.
    pub fn level_filter(&self) -> crate::Result<LevelFilter> {
        LevelFilter::from_str(&self.log_level)
            .ok()
            .with_context(|| format!("unknown log level {:?}", self.log_level))
    }
}
