//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::client::transport::{TransportConfig, TransportKind};
use crate::util::rate_limit::MOVE_SEND_RATE;
use crate::util::time::FRAME_RATE;

/// Relay server configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Directory served at the process root
    pub static_dir: PathBuf,
    /// Allowed CORS origins (comma-separated); any origin when unset
    pub client_origin: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // PORT wins (hosting platforms set it), then SERVER_ADDR, then port 3000
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            static_dir: env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("public")),
            client_origin: env::var("CLIENT_ORIGIN").ok().filter(|s| !s.trim().is_empty()),
        })
    }
}

/// Headless client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub server_url: String,
    pub nickname: String,
    pub transports: Vec<TransportKind>,
    pub frame_rate: u32,
    /// Outbound `playerMove` quota per second
    pub move_rate: u32,
    pub log_level: String,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let transports = match env::var("TRANSPORTS") {
            Ok(list) => parse_transports(&list)?,
            Err(_) => vec![TransportKind::WebSocket, TransportKind::Polling],
        };

        Ok(Self {
            server_url: env::var("SERVER_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:3000".to_string()),
            nickname: env::var("NICKNAME").unwrap_or_else(|_| "bot".to_string()),
            transports,
            frame_rate: parse_u32("FRAME_RATE", FRAME_RATE)?,
            move_rate: parse_u32("MOVE_RATE", MOVE_SEND_RATE)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            transports: self.transports.clone(),
            ..TransportConfig::new(self.server_url.clone())
        }
    }

    pub fn frame_period(&self) -> Duration {
        crate::util::time::frame_period(self.frame_rate)
    }
}

fn parse_transports(list: &str) -> Result<Vec<TransportKind>, ConfigError> {
    let transports = list
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|name| {
            TransportKind::parse(name)
                .ok_or_else(|| ConfigError::Invalid("TRANSPORTS", name.trim().to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if transports.is_empty() {
        return Err(ConfigError::Invalid("TRANSPORTS", list.to_string()));
    }
    Ok(transports)
}

fn parse_u32(key: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(key, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_list_parses_in_order() {
        assert_eq!(
            parse_transports("polling, websocket").unwrap(),
            vec![TransportKind::Polling, TransportKind::WebSocket]
        );
        assert!(matches!(
            parse_transports("websocket,smoke-signals"),
            Err(ConfigError::Invalid("TRANSPORTS", name)) if name == "smoke-signals"
        ));
        assert!(parse_transports(" , ").is_err());
    }
}
