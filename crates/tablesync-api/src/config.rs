//! Server configuration from the environment.

use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use tablesync_session::OrchestratorConfig;

use crate::error::AppError;

/// Everything the binary reads at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Orchestrator tuning.
    pub orchestrator: OrchestratorConfig,
}

impl ServerConfig {
    /// Reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from `lookup`, falling back to defaults for
    /// unset keys.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a value does not parse or is zero where
    /// zero makes no sense.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = OrchestratorConfig::default();
        let orchestrator = OrchestratorConfig {
            idle_room_ttl: Duration::from_secs(parse_or(
                &lookup,
                "TABLESYNC_IDLE_ROOM_TTL_SECS",
                defaults.idle_room_ttl.as_secs(),
            )?),
            sweep_interval: Duration::from_secs(positive(
                &lookup,
                "TABLESYNC_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval.as_secs(),
            )?),
            outbound_buffer: positive(&lookup, "TABLESYNC_OUTBOUND_BUFFER", defaults.outbound_buffer)?,
            session_mailbox: positive(&lookup, "TABLESYNC_SESSION_MAILBOX", defaults.session_mailbox)?,
            log_retention: parse_or(&lookup, "TABLESYNC_LOG_RETENTION", defaults.log_retention)?,
            flood_max_messages: positive(
                &lookup,
                "TABLESYNC_FLOOD_MAX_MESSAGES",
                defaults.flood_max_messages,
            )?,
            flood_window: Duration::from_secs(positive(
                &lookup,
                "TABLESYNC_FLOOD_WINDOW_SECS",
                defaults.flood_window.as_secs(),
            )?),
            max_frame_bytes: positive(&lookup, "TABLESYNC_MAX_FRAME_BYTES", defaults.max_frame_bytes)?,
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: parse_or(&lookup, "PORT", 3000)?,
            orchestrator,
        })
    }

    /// The address to bind.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for an unparseable `HOST:PORT`.
    pub fn socket_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid: {e}"))),
        None => Ok(default),
    }
}

fn positive<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr + Default + PartialEq,
    T::Err: Display,
{
    let value = parse_or(lookup, key, default)?;
    if value == T::default() {
        return Err(AppError::Config(format!("{key} must be greater than zero")));
    }
    Ok(value)
}
