// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! during bootstrap. The process environment is read exactly once, into an
//! [`EnvVars`] snapshot, and every binder resolves its values from that
//! snapshot.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `APP_ENV` | Deployment environment (`testing`, `development`, `production`, or any name) | `development` |
//! | `APP_ENV_PROFILE` | How a custom environment behaves (`testing` or `production`) | `production` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `JWKS_KEYPAIR_FILE` | JWKS file, relative to the working directory | `keypair.jwks` |
//! | `POSTGRES_HOSTNAME` | Database host | `localhost` |
//! | `POSTGRES_USERNAME` | Database user | `vapor` |
//! | `POSTGRES_PASSWORD` | Database password | `password` |
//! | `POSTGRES_DATABASE` | Database name | `vapor` |
//! | `DATABASE_MAX_CONNECTIONS` | Pool size | `20` |
//! | `DATABASE_ACQUIRE_TIMEOUT_SECS` | Pool acquire timeout | `5` |
//! | `MAILGUN_API_KEY` | Mailgun API key | empty |
//! | `MAILGUN_REGION` | Mailgun region (`us` or `eu`) | `us` |
//! | `MAILGUN_DEFAULT_DOMAIN` | Sending domain | `sandbox.mailgun.org` |
//! | `REDIS_URL` | Queue backend URL | `redis://127.0.0.1:6379` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::environment::Environment;

/// Environment variable selecting the deployment environment.
pub const APP_ENV_ENV: &str = "APP_ENV";

/// Environment variable selecting the behaviour of a custom environment.
pub const APP_ENV_PROFILE_ENV: &str = "APP_ENV_PROFILE";

/// Environment variable for the server bind address.
pub const HOST_ENV: &str = "HOST";

/// Default bind address.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// HTTP listen port. Fixed, not configurable.
pub const HTTP_PORT: u16 = 8081;

/// Environment variable overriding the JWKS key-set file name.
///
/// The value is joined onto the working directory, so an absolute path
/// replaces it entirely.
pub const JWKS_KEYPAIR_FILE_ENV: &str = "JWKS_KEYPAIR_FILE";

/// Default JWKS key-set file name.
pub const DEFAULT_JWKS_KEYPAIR_FILE: &str = "keypair.jwks";

pub const POSTGRES_HOSTNAME_ENV: &str = "POSTGRES_HOSTNAME";
pub const POSTGRES_USERNAME_ENV: &str = "POSTGRES_USERNAME";
pub const POSTGRES_PASSWORD_ENV: &str = "POSTGRES_PASSWORD";
pub const POSTGRES_DATABASE_ENV: &str = "POSTGRES_DATABASE";

pub const DEFAULT_POSTGRES_HOSTNAME: &str = "localhost";
pub const DEFAULT_POSTGRES_USERNAME: &str = "vapor";
pub const DEFAULT_POSTGRES_PASSWORD: &str = "password";
pub const DEFAULT_POSTGRES_DATABASE: &str = "vapor";

/// Environment variable for the database pool size.
pub const DATABASE_MAX_CONNECTIONS_ENV: &str = "DATABASE_MAX_CONNECTIONS";

/// Environment variable for the pool acquire timeout, in seconds.
pub const DATABASE_ACQUIRE_TIMEOUT_ENV: &str = "DATABASE_ACQUIRE_TIMEOUT_SECS";

pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 20;
pub const DEFAULT_DATABASE_ACQUIRE_TIMEOUT_SECS: u64 = 5;

pub const MAILGUN_API_KEY_ENV: &str = "MAILGUN_API_KEY";
pub const MAILGUN_REGION_ENV: &str = "MAILGUN_REGION";
pub const MAILGUN_DEFAULT_DOMAIN_ENV: &str = "MAILGUN_DEFAULT_DOMAIN";

/// Mailgun sandbox domain used when no sending domain is configured.
pub const DEFAULT_MAILGUN_DOMAIN: &str = "sandbox.mailgun.org";

/// Environment variable for the queue backend URL.
pub const REDIS_URL_ENV: &str = "REDIS_URL";

/// Default queue backend URL.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Environment variable selecting the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// A variable is set but its value is not valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Environment variable {name} is not valid UTF-8: {lossy}")]
pub struct EnvVarError {
    pub name: String,
    /// The value with invalid sequences replaced by U+FFFD.
    pub lossy: String,
}

/// Immutable snapshot of environment variables.
///
/// Taken once at startup; binders never read the live process environment.
/// Values that are not valid UTF-8 are kept apart so that binders which
/// depend on them fail instead of falling back to defaults.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EnvVars {
    vars: HashMap<String, String>,
    /// Name to lossily-decoded value.
    undecodable: HashMap<String, String>,
}

impl EnvVars {
    /// Snapshot the current process environment.
    pub fn from_process() -> Self {
        Self::from_os_pairs(std::env::vars_os())
    }

    /// Build a snapshot from raw OS strings.
    ///
    /// Names that are not valid UTF-8 are skipped: no variable this server
    /// reads can have one.
    pub fn from_os_pairs(pairs: impl IntoIterator<Item = (OsString, OsString)>) -> Self {
        let mut snapshot = Self::default();
        for (name, value) in pairs {
            let Ok(name) = name.into_string() else {
                continue;
            };
            match value.into_string() {
                Ok(value) => {
                    snapshot.vars.insert(name, value);
                }
                Err(raw) => {
                    let lossy = raw.to_string_lossy().into_owned();
                    snapshot.undecodable.insert(name, lossy);
                }
            }
        }
        snapshot
    }

    /// Build a snapshot from literal pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            undecodable: HashMap::new(),
        }
    }

    /// Get a variable. A value that is not valid UTF-8 reads as unset; use
    /// [`EnvVars::try_get`] where that must be an error.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Get a variable, failing when it is set to a value that is not valid
    /// UTF-8.
    pub fn try_get(&self, key: &str) -> Result<Option<&str>, EnvVarError> {
        if let Some(lossy) = self.undecodable.get(key) {
            return Err(EnvVarError {
                name: key.to_string(),
                lossy: lossy.clone(),
            });
        }
        Ok(self.get(key))
    }

    /// Get a variable, falling back to `default` when it is unset.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Like [`EnvVars::get_or`], but a value that is not valid UTF-8 is an
    /// error rather than unset.
    pub fn try_get_or<'a>(&'a self, key: &str, default: &'a str) -> Result<&'a str, EnvVarError> {
        Ok(self.try_get(key)?.unwrap_or(default))
    }

    /// Get and parse a variable, falling back to `default` when it is unset
    /// or does not parse.
    pub fn parse_or<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }
}

// Values may hold credentials, so only names are printed.
impl fmt::Debug for EnvVars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self
            .vars
            .keys()
            .chain(self.undecodable.keys())
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        f.debug_struct("EnvVars").field("keys", &keys).finish()
    }
}

/// Process-level settings resolved before bootstrap starts.
#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: Environment,
    /// Base directory for relative file paths (the JWKS file).
    pub working_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub vars: EnvVars,
}

impl Settings {
    /// Resolve settings from an environment snapshot and working directory.
    pub fn from_vars(vars: EnvVars, working_dir: impl Into<PathBuf>) -> Self {
        let environment = Environment::from_vars(&vars);
        let host = vars.get_or(HOST_ENV, DEFAULT_HOST).to_string();
        Self {
            environment,
            working_dir: working_dir.into(),
            host,
            port: HTTP_PORT,
            vars,
        }
    }

    /// Resolve settings from the live process environment and current
    /// directory.
    pub fn from_env() -> std::io::Result<Self> {
        let working_dir = std::env::current_dir()?;
        Ok(Self::from_vars(EnvVars::from_process(), working_dir))
    }
}
