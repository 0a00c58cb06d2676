// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! once at startup into a [`GatewayConfig`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Mount point of the encrypted volume | `/mnt/secure` |
//! | `KEY_PATH` | Key directory below the mount point | `keys` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `4430` |
//! | `TLS_CERT_PATH` | PEM certificate chain (HTTPS when set with key) | unset |
//! | `TLS_KEY_PATH` | PEM private key | unset |
//! | `TRANSPORT_URL` | signal-cli REST API endpoint | `http://127.0.0.1:8080` |
//! | `TRANSPORT_VERIFICATION` | `sms` or `voice` | `sms` |
//! | `TRANSPORT_POLL_SECS` | Receive poll interval | `5` |
//! | `HISTORY_LIMIT_BYTES` | History tail-read bound | `10240` |
//! | `NOTIFICATION_TTL_SECS` | Notification lifetime | `30` |
//! | `VOLUME_DEVICE_DIR` | Directory of LUKS volumes | `/dev/lvmvolume` |
//! | `VOLUME_TEST_MODE` | Skip real volume unlock/lock | `false` |
//! | `GATEWAY_DEBUG` | Log message payloads | `false` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::notify::DEFAULT_NOTIFICATION_TTL;
use crate::storage::paths::{DATA_ROOT, DEFAULT_KEY_PATH};
use crate::storage::HISTORY_LIMIT_BYTES;
use crate::transport::signal_rest::DEFAULT_POLL_INTERVAL;
use crate::transport::VerificationType;

/// Environment variable name for the encrypted volume mount point.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const KEY_PATH_ENV: &str = "KEY_PATH";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const TLS_CERT_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_ENV: &str = "TLS_KEY_PATH";
pub const TRANSPORT_URL_ENV: &str = "TRANSPORT_URL";
pub const TRANSPORT_VERIFICATION_ENV: &str = "TRANSPORT_VERIFICATION";
pub const TRANSPORT_POLL_ENV: &str = "TRANSPORT_POLL_SECS";
pub const HISTORY_LIMIT_ENV: &str = "HISTORY_LIMIT_BYTES";
pub const NOTIFICATION_TTL_ENV: &str = "NOTIFICATION_TTL_SECS";
pub const VOLUME_DEVICE_DIR_ENV: &str = "VOLUME_DEVICE_DIR";
pub const VOLUME_TEST_MODE_ENV: &str = "VOLUME_TEST_MODE";
pub const DEBUG_ENV: &str = "GATEWAY_DEBUG";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 4430;
const DEFAULT_TRANSPORT_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_VOLUME_DEVICE_DIR: &str = "/dev/lvmvolume";

/// Error raised for a malformed environment variable.
#[derive(Debug, thiserror::Error)]
#[error("invalid value for {name}: {reason}")]
pub struct ConfigError {
    pub name: &'static str,
    pub reason: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// PEM files for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Configuration loaded once at startup.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub data_dir: PathBuf,
    pub key_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub tls: Option<TlsFiles>,
    pub transport_url: Url,
    pub verification: VerificationType,
    pub poll_interval: Duration,
    pub history_limit: u64,
    pub notification_ttl: Duration,
    pub volume_device_dir: PathBuf,
    pub volume_test_mode: bool,
    pub debug: bool,
    pub log_format: LogFormat,
}

impl GatewayConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port: u16 = parse_or(get(PORT_ENV), PORT_ENV, DEFAULT_PORT)?;
        let bind_addr = format!("{host}:{port}")
            .parse()
            .map_err(|e| invalid(HOST_ENV, e))?;

        let tls = match (get(TLS_CERT_ENV), get(TLS_KEY_ENV)) {
            (Some(cert), Some(key)) => Some(TlsFiles {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => {
                return Err(ConfigError {
                    name: TLS_CERT_ENV,
                    reason: format!("{TLS_CERT_ENV} and {TLS_KEY_ENV} must be set together"),
                })
            }
        };

        let transport_url = Url::parse(
            &get(TRANSPORT_URL_ENV).unwrap_or_else(|| DEFAULT_TRANSPORT_URL.to_string()),
        )
        .map_err(|e| invalid(TRANSPORT_URL_ENV, e))?;

        let verification = parse_or(
            get(TRANSPORT_VERIFICATION_ENV),
            TRANSPORT_VERIFICATION_ENV,
            VerificationType::default(),
        )?;

        let poll_secs = parse_or(
            get(TRANSPORT_POLL_ENV),
            TRANSPORT_POLL_ENV,
            DEFAULT_POLL_INTERVAL.as_secs(),
        )?;
        let ttl_secs = parse_or(
            get(NOTIFICATION_TTL_ENV),
            NOTIFICATION_TTL_ENV,
            DEFAULT_NOTIFICATION_TTL.as_secs(),
        )?;
        let history_limit =
            parse_or(get(HISTORY_LIMIT_ENV), HISTORY_LIMIT_ENV, HISTORY_LIMIT_BYTES)?;
        if history_limit == 0 {
            return Err(ConfigError {
                name: HISTORY_LIMIT_ENV,
                reason: "must be greater than zero".to_string(),
            });
        }

        let log_format = match get(LOG_FORMAT_ENV).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError {
                    name: LOG_FORMAT_ENV,
                    reason: format!("expected json or pretty, got {other}"),
                })
            }
        };

        Ok(Self {
            data_dir: get(DATA_DIR_ENV).unwrap_or_else(|| DATA_ROOT.to_string()).into(),
            key_path: get(KEY_PATH_ENV)
                .unwrap_or_else(|| DEFAULT_KEY_PATH.to_string())
                .into(),
            bind_addr,
            tls,
            transport_url,
            verification,
            poll_interval: Duration::from_secs(poll_secs),
            history_limit,
            notification_ttl: Duration::from_secs(ttl_secs),
            volume_device_dir: get(VOLUME_DEVICE_DIR_ENV)
                .unwrap_or_else(|| DEFAULT_VOLUME_DEVICE_DIR.to_string())
                .into(),
            volume_test_mode: flag(get(VOLUME_TEST_MODE_ENV)),
            debug: flag(get(DEBUG_ENV)),
            log_format,
        })
    }
}

fn parse_or<T>(value: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) => v.parse().map_err(|e| invalid(name, e)),
        None => Ok(default),
    }
}

fn flag(value: Option<String>) -> bool {
    matches!(
        value.as_deref().map(str::to_ascii_lowercase).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

fn invalid(name: &'static str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError {
        name,
        reason: reason.to_string(),
    }
}
