//! Runtime configuration read from the process environment at startup.

use std::{
    env,
    net::{AddrParseError, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use thiserror::Error;

/// Environment variable carrying the identifier of this instance.
const INSTANCE_ENV: &str = "FLY_MACHINE_ID";
/// Fallback variable for the instance identifier outside the edge platform.
const INSTANCE_FALLBACK_ENV: &str = "MACHINE_ID";
/// Explicit listen address, e.g. `0.0.0.0:8080`.
const LISTEN_ENV: &str = "LISTEN";
/// Location of the room snapshot; unset means in-memory only.
const DATA_FILE_ENV: &str = "DATA_FILE_PATH";
const DEFAULT_PORT: u16 = 8080;

/// Rooms idle for longer than this are evicted.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(10 * 24 * 60 * 60);
/// Interval between two cleanup + snapshot passes.
pub const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(1);
/// Longest time a long-poll request is parked before answering "unchanged".
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(20);

/// Failures while reading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is missing or empty.
    #[error("missing environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the variable.
        var: &'static str,
    },
    /// Listen address could not be parsed.
    #[error("invalid listen address `{value}`")]
    InvalidListenAddr {
        /// Raw value found in the environment.
        value: String,
        /// Parser failure.
        #[source]
        source: AddrParseError,
    },
}

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Identifier of this process instance, used for room affinity.
    pub instance_id: String,
    /// Socket address the HTTP server binds to.
    pub listen: SocketAddr,
    /// Snapshot file; `None` disables restore and periodic writes.
    pub data_file: Option<PathBuf>,
    /// Idle time after which a room is evicted.
    pub retention: Duration,
    /// Period of the cleanup and snapshot pass.
    pub snapshot_interval: Duration,
    /// Longest time a long poll stays parked.
    pub poll_timeout: Duration,
}

impl AppConfig {
    /// Configuration for `instance_id` with the default tunables and no snapshot file.
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            listen: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            data_file: None,
            retention: DEFAULT_RETENTION,
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Enable snapshot persistence to `path`.
    pub fn with_data_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_file = Some(path.into());
        self
    }

    /// Build the configuration from the environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let instance_id = non_empty_var(INSTANCE_ENV)
            .or_else(|| non_empty_var(INSTANCE_FALLBACK_ENV))
            .ok_or(ConfigError::MissingEnvVar { var: INSTANCE_ENV })?;

        let mut config = Self::new(instance_id);
        config.listen = resolve_listen_addr()?;
        config.data_file = non_empty_var(DATA_FILE_ENV).map(PathBuf::from);
        Ok(config)
    }
}

/// `LISTEN` wins; otherwise bind every interface on `PORT`/`SERVER_PORT`.
fn resolve_listen_addr() -> Result<SocketAddr, ConfigError> {
    if let Some(value) = non_empty_var(LISTEN_ENV) {
        // Accept the `:8080` shorthand.
        let normalized = if value.starts_with(':') {
            format!("0.0.0.0{value}")
        } else {
            value.clone()
        };
        return normalized
            .parse()
            .map_err(|source| ConfigError::InvalidListenAddr { value, source });
    }

    let port = non_empty_var("PORT")
        .or_else(|| non_empty_var("SERVER_PORT"))
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    Ok(SocketAddr::from(([0, 0, 0, 0], port)))
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
