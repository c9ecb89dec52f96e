// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the typed [`Config`] loaded from
//! them once at startup. There are no config files.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8000` |
//! | `JWT_PRIVATE_KEY_PATH` | PEM key used to sign bearer tokens | `doc/test_jwt_key/private_key.pem` |
//! | `JWT_PUBLIC_KEY_PATH` | PEM key used to verify bearer tokens | `doc/test_jwt_key/public_key.pem` |
//! | `JWT_ALGORITHM` | Asymmetric JWS algorithm | `RS256` |
//! | `ACCESS_TOKEN_EXPIRE_MINUTES` | Bearer token lifetime | `60` |
//! | `DID_DOCUMENTS_PATH` | Root of the local DID document store | `did_keys` |
//! | `NONCE_EXPIRATION_MINUTES` | Nonce validity window, at least the timestamp skew | `6` |
//! | `TIMESTAMP_EXPIRATION_MINUTES` | Accepted header timestamp skew | `5` |
//! | `NONCE_CACHE_CAPACITY` | Upper bound on tracked nonces | `100000` |
//! | `DID_RESOLVE_SCHEME` | Scheme for remote DID document fetches | `http` |
//! | `HTTP_TIMEOUT_SECS` | Outbound HTTP timeout | `30` |
//! | `AGENT_DESCRIPTION` | Description served in the agent description document | built-in text |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;

use crate::auth::nonce::DEFAULT_NONCE_CAPACITY;
use crate::auth::token::ensure_asymmetric;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const JWT_PRIVATE_KEY_PATH_ENV: &str = "JWT_PRIVATE_KEY_PATH";
pub const JWT_PUBLIC_KEY_PATH_ENV: &str = "JWT_PUBLIC_KEY_PATH";
pub const JWT_ALGORITHM_ENV: &str = "JWT_ALGORITHM";
pub const ACCESS_TOKEN_EXPIRE_MINUTES_ENV: &str = "ACCESS_TOKEN_EXPIRE_MINUTES";

/// Environment variable name for the local DID document store.
///
/// Documents live at `{root}/user_{id}/did.json`, next to the key files the
/// client side generates for the same identity.
pub const DID_DOCUMENTS_PATH_ENV: &str = "DID_DOCUMENTS_PATH";

pub const NONCE_EXPIRATION_MINUTES_ENV: &str = "NONCE_EXPIRATION_MINUTES";
pub const TIMESTAMP_EXPIRATION_MINUTES_ENV: &str = "TIMESTAMP_EXPIRATION_MINUTES";
pub const NONCE_CACHE_CAPACITY_ENV: &str = "NONCE_CACHE_CAPACITY";
pub const DID_RESOLVE_SCHEME_ENV: &str = "DID_RESOLVE_SCHEME";
pub const HTTP_TIMEOUT_SECS_ENV: &str = "HTTP_TIMEOUT_SECS";
pub const AGENT_DESCRIPTION_ENV: &str = "AGENT_DESCRIPTION";

/// Environment variable name for the log output format.
///
/// `json` selects structured JSON lines; anything else selects the
/// human-readable formatter.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_JWT_PRIVATE_KEY_PATH: &str = "doc/test_jwt_key/private_key.pem";
const DEFAULT_JWT_PUBLIC_KEY_PATH: &str = "doc/test_jwt_key/public_key.pem";
const DEFAULT_DID_DOCUMENTS_PATH: &str = "did_keys";
const DEFAULT_NONCE_EXPIRATION_MINUTES: i64 = 6;
const DEFAULT_TIMESTAMP_EXPIRATION_MINUTES: i64 = 5;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_AGENT_DESCRIPTION: &str = "An example agent implementing DID WBA authentication";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got '{value}'")]
    InvalidValue {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("JWT_ALGORITHM '{0}' is not supported: {1}")]
    UnsupportedAlgorithm(String, String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Everything the server reads from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub jwt_private_key_path: PathBuf,
    pub jwt_public_key_path: PathBuf,
    pub jwt_algorithm: Algorithm,
    pub access_token_expire_minutes: i64,
    pub did_documents_path: PathBuf,
    pub nonce_expiration_minutes: i64,
    pub timestamp_expiration_minutes: i64,
    pub nonce_cache_capacity: usize,
    pub did_resolve_scheme: String,
    pub http_timeout: Duration,
    pub agent_description: String,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let jwt_algorithm = match get(JWT_ALGORITHM_ENV) {
            Some(raw) => {
                let algorithm = parse_algorithm(&raw).map_err(|e| {
                    ConfigError::UnsupportedAlgorithm(raw.clone(), e.to_string())
                })?;
                ensure_asymmetric(algorithm)
                    .map_err(|reason| ConfigError::UnsupportedAlgorithm(raw, reason))?;
                algorithm
            }
            None => Algorithm::RS256,
        };

        let did_resolve_scheme = get(DID_RESOLVE_SCHEME_ENV)
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_else(|| "http".to_string());
        if did_resolve_scheme != "http" && did_resolve_scheme != "https" {
            return Err(ConfigError::InvalidValue {
                name: DID_RESOLVE_SCHEME_ENV,
                value: did_resolve_scheme,
                expected: "http or https",
            });
        }

        let log_format = match get(LOG_FORMAT_ENV).as_deref() {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let config = Self {
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&get, PORT_ENV, DEFAULT_PORT, "a port number")?,
            jwt_private_key_path: get(JWT_PRIVATE_KEY_PATH_ENV)
                .unwrap_or_else(|| DEFAULT_JWT_PRIVATE_KEY_PATH.to_string())
                .into(),
            jwt_public_key_path: get(JWT_PUBLIC_KEY_PATH_ENV)
                .unwrap_or_else(|| DEFAULT_JWT_PUBLIC_KEY_PATH.to_string())
                .into(),
            jwt_algorithm,
            access_token_expire_minutes: positive_or(
                &get,
                ACCESS_TOKEN_EXPIRE_MINUTES_ENV,
                crate::auth::token::DEFAULT_TOKEN_TTL_MINUTES,
            )?,
            did_documents_path: get(DID_DOCUMENTS_PATH_ENV)
                .unwrap_or_else(|| DEFAULT_DID_DOCUMENTS_PATH.to_string())
                .into(),
            nonce_expiration_minutes: positive_or(
                &get,
                NONCE_EXPIRATION_MINUTES_ENV,
                DEFAULT_NONCE_EXPIRATION_MINUTES,
            )?,
            timestamp_expiration_minutes: positive_or(
                &get,
                TIMESTAMP_EXPIRATION_MINUTES_ENV,
                DEFAULT_TIMESTAMP_EXPIRATION_MINUTES,
            )?,
            nonce_cache_capacity: positive_or(
                &get,
                NONCE_CACHE_CAPACITY_ENV,
                DEFAULT_NONCE_CAPACITY as i64,
            )? as usize,
            did_resolve_scheme,
            http_timeout: Duration::from_secs(parse_or(
                &get,
                HTTP_TIMEOUT_SECS_ENV,
                DEFAULT_HTTP_TIMEOUT_SECS,
                "a whole number of seconds",
            )?),
            agent_description: get(AGENT_DESCRIPTION_ENV)
                .unwrap_or_else(|| DEFAULT_AGENT_DESCRIPTION.to_string()),
            log_format,
        };

        // A nonce must stay recorded for as long as its header's timestamp is
        // still accepted.
        if config.nonce_expiration_minutes < config.timestamp_expiration_minutes {
            return Err(ConfigError::InvalidValue {
                name: NONCE_EXPIRATION_MINUTES_ENV,
                value: config.nonce_expiration_minutes.to_string(),
                expected: "at least TIMESTAMP_EXPIRATION_MINUTES",
            });
        }

        Ok(config)
    }

    /// `host:port` for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// `EdDSA` is the only mixed-case algorithm name.
fn parse_algorithm(raw: &str) -> Result<Algorithm, jsonwebtoken::errors::Error> {
    if raw.eq_ignore_ascii_case("eddsa") {
        return Ok(Algorithm::EdDSA);
    }
    Algorithm::from_str(&raw.to_ascii_uppercase())
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T, expected: &'static str) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            name,
            value: raw,
            expected,
        }),
        None => Ok(default),
    }
}

fn positive_or<G>(get: &G, name: &'static str, default: i64) -> Result<i64, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let value = parse_or(get, name, default, "a positive integer")?;
    if value <= 0 {
        return Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
            expected: "a positive integer",
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_with(&[]).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:8000");
        assert_eq!(config.jwt_algorithm, Algorithm::RS256);
        assert_eq!(config.access_token_expire_minutes, 60);
        assert_eq!(config.did_documents_path, PathBuf::from("did_keys"));
        assert_eq!(config.nonce_expiration_minutes, 6);
        assert_eq!(config.timestamp_expiration_minutes, 5);
        assert_eq!(config.nonce_cache_capacity, 100_000);
        assert_eq!(config.did_resolve_scheme, "http");
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.agent_description, DEFAULT_AGENT_DESCRIPTION);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn overrides_are_read() {
        let config = config_with(&[
            (PORT_ENV, "9000"),
            (JWT_ALGORITHM_ENV, "es256"),
            (ACCESS_TOKEN_EXPIRE_MINUTES_ENV, "15"),
            (DID_RESOLVE_SCHEME_ENV, "HTTPS"),
            (LOG_FORMAT_ENV, "json"),
            (HOST_ENV, "  127.0.0.1 "),
        ])
        .unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert_eq!(config.jwt_algorithm, Algorithm::ES256);
        assert_eq!(config.access_token_expire_minutes, 15);
        assert_eq!(config.did_resolve_scheme, "https");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = config_with(&[(PORT_ENV, "   ")]).unwrap();
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn unparsable_numbers_are_errors() {
        let err = config_with(&[(PORT_ENV, "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: PORT_ENV, .. }));

        let err = config_with(&[(NONCE_EXPIRATION_MINUTES_ENV, "0")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { name: NONCE_EXPIRATION_MINUTES_ENV, .. }
        ));
    }

    #[test]
    fn nonce_window_shorter_than_timestamp_tolerance_is_refused() {
        let err = config_with(&[
            (NONCE_EXPIRATION_MINUTES_ENV, "3"),
            (TIMESTAMP_EXPIRATION_MINUTES_ENV, "5"),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                name: NONCE_EXPIRATION_MINUTES_ENV,
                value: "3".to_string(),
                expected: "at least TIMESTAMP_EXPIRATION_MINUTES",
            }
        );

        let config = config_with(&[
            (NONCE_EXPIRATION_MINUTES_ENV, "5"),
            (TIMESTAMP_EXPIRATION_MINUTES_ENV, "5"),
        ])
        .unwrap();
        assert_eq!(config.nonce_expiration_minutes, 5);
    }

    #[test]
    fn symmetric_algorithms_are_refused() {
        let err = config_with(&[(JWT_ALGORITHM_ENV, "HS256")]).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedAlgorithm(..)));

        let err = config_with(&[(JWT_ALGORITHM_ENV, "nope")]).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedAlgorithm(..)));
    }

    #[test]
    fn unknown_resolve_scheme_is_refused() {
        let err = config_with(&[(DID_RESOLVE_SCHEME_ENV, "ftp")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { name: DID_RESOLVE_SCHEME_ENV, .. }
        ));
    }
}
