// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! at startup by [`RegistryConfig::from_env`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory for the registry database | unset (in-memory only) |
//! | `RELAYER_ADDRESS` | The only identity allowed to submit operations | Required |
//! | `REGISTRY_ADDRESS` | Identity forwarded calls originate from | derived, see [`default_registry_address`] |
//! | `RELAYER_JWT_SECRET` | HS256 secret for relayer bearer tokens | Required |
//! | `EXECUTE_GAS_LIMIT` | Gas limit for `execute` when the request omits one | `3000000` |
//! | `TLS_CERT_PATH` | PEM certificate chain; HTTPS when set with the key | unset |
//! | `TLS_KEY_PATH` | PEM private key | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use alloy::primitives::{keccak256, Address};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Directory holding `registry.redb`. Unset means no persistence.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const RELAYER_ADDRESS_ENV: &str = "RELAYER_ADDRESS";
pub const REGISTRY_ADDRESS_ENV: &str = "REGISTRY_ADDRESS";
pub const RELAYER_JWT_SECRET_ENV: &str = "RELAYER_JWT_SECRET";
pub const EXECUTE_GAS_LIMIT_ENV: &str = "EXECUTE_GAS_LIMIT";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_EXECUTE_GAS_LIMIT: u64 = 3_000_000;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Caller address of forwarded calls when `REGISTRY_ADDRESS` is unset: the
/// last 20 bytes of `keccak256("relational-registry")`.
pub fn default_registry_address() -> Address {
    Address::from_word(keccak256(b"relational-registry"))
}

/// File name of the database inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "registry.redb";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: Option<PathBuf>,
    pub relayer: Address,
    /// Identity the call host presents to forwarded-call targets.
    pub registry_address: Address,
    pub jwt_secret: String,
    pub execute_gas_limit: u64,
    pub tls: Option<TlsPaths>,
    pub log_format: LogFormat,
}

impl RegistryConfig {
    /// Load the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = var(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match var(PORT_ENV) {
            Some(port) => parse(PORT_ENV, &port)?,
            None => DEFAULT_PORT,
        };
        let bind_addr = parse(HOST_ENV, &format!("{host}:{port}"))?;

        let relayer: Address = parse(
            RELAYER_ADDRESS_ENV,
            &var(RELAYER_ADDRESS_ENV).ok_or(ConfigError::Missing(RELAYER_ADDRESS_ENV))?,
        )?;
        if relayer == Address::ZERO {
            return Err(ConfigError::Invalid {
                name: RELAYER_ADDRESS_ENV,
                reason: "the zero address cannot be the relayer".to_string(),
            });
        }

        let registry_address = match var(REGISTRY_ADDRESS_ENV) {
            Some(address) => parse(REGISTRY_ADDRESS_ENV, &address)?,
            None => default_registry_address(),
        };
        if registry_address == Address::ZERO || registry_address == relayer {
            return Err(ConfigError::Invalid {
                name: REGISTRY_ADDRESS_ENV,
                reason: "must be non-zero and distinct from the relayer".to_string(),
            });
        }

        let jwt_secret =
            var(RELAYER_JWT_SECRET_ENV).ok_or(ConfigError::Missing(RELAYER_JWT_SECRET_ENV))?;

        let execute_gas_limit = match var(EXECUTE_GAS_LIMIT_ENV) {
            Some(limit) => parse(EXECUTE_GAS_LIMIT_ENV, &limit)?,
            None => DEFAULT_EXECUTE_GAS_LIMIT,
        };

        let tls = match (var(TLS_CERT_PATH_ENV), var(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        let log_format = match var(LOG_FORMAT_ENV).as_deref() {
            Some("json") => LogFormat::Json,
            Some("pretty") | None => LogFormat::Pretty,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: LOG_FORMAT_ENV,
                    reason: format!("expected `json` or `pretty`, got `{other}`"),
                })
            }
        };

        Ok(Self {
            bind_addr,
            data_dir: var(DATA_DIR_ENV).map(PathBuf::from),
            relayer,
            registry_address,
            jwt_secret,
            execute_gas_limit,
            tls,
            log_format,
        })
    }

    /// Path of the registry database, when persistence is enabled.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join(DATABASE_FILE))
    }
}

fn parse<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}
