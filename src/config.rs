use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::supervisor::{SupervisorConfig, DEFAULT_GRACE_PERIOD, DEFAULT_READINESS_TIMEOUT};

const DEFAULT_LISTEN_ADDR: &str = "[::1]:50051";
const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub ffmpeg_path: PathBuf,
    pub readiness_timeout: Duration,
    pub grace_period: Duration,
}

impl Config {
    /// Reads settings from the process environment (after `.env` is loaded).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr = match lookup("STREAMER_LISTEN_ADDR") {
            Some(value) => parse_addr("STREAMER_LISTEN_ADDR", value)?,
            None => parse_addr("STREAMER_LISTEN_ADDR", DEFAULT_LISTEN_ADDR.to_string())?,
        };

        let ffmpeg_path = lookup("FFMPEG_PATH")
            .filter(|path| !path.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FFMPEG_PATH.to_string())
            .into();

        let readiness_timeout = match lookup("STREAMER_READINESS_TIMEOUT_SECS") {
            Some(value) => parse_secs("STREAMER_READINESS_TIMEOUT_SECS", value)?,
            None => DEFAULT_READINESS_TIMEOUT,
        };

        let grace_period = match lookup("STREAMER_STOP_GRACE_SECS") {
            Some(value) => parse_secs("STREAMER_STOP_GRACE_SECS", value)?,
            None => DEFAULT_GRACE_PERIOD,
        };

        Ok(Config {
            listen_addr,
            ffmpeg_path,
            readiness_timeout,
            grace_period,
        })
    }

    pub fn supervisor(&self) -> SupervisorConfig {
        SupervisorConfig {
            readiness_timeout: self.readiness_timeout,
            grace_period: self.grace_period,
        }
    }
}

fn parse_addr(key: &'static str, value: String) -> Result<SocketAddr, ConfigError> {
    let resolved = value.to_socket_addrs().map(|mut addrs| addrs.next());
    match resolved {
        Ok(Some(addr)) => Ok(addr),
        Ok(None) => Err(ConfigError::Invalid {
            key,
            value,
            reason: "resolved to no address".to_string(),
        }),
        Err(e) => Err(ConfigError::Invalid {
            key,
            value,
            reason: e.to_string(),
        }),
    }
}

fn parse_secs(key: &'static str, value: String) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            key,
            value,
            reason: "must be at least 1".to_string(),
        }),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(ConfigError::Invalid {
            key,
            value,
            reason: e.to_string(),
        }),
    }
}
