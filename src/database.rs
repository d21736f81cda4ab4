// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Database Connector
//!
//! Resolves PostgreSQL connection parameters from the environment and
//! registers the `psql` profile. Registration is lazy: the pool opens its
//! first connection on first use (a query or an explicit migration run), so
//! bad credentials surface there rather than at startup.

use std::fmt;
use std::time::Duration;

use sqlx::migrate::{MigrateError, Migrator};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::{
    EnvVarError, EnvVars, DATABASE_ACQUIRE_TIMEOUT_ENV, DATABASE_MAX_CONNECTIONS_ENV,
    DEFAULT_DATABASE_ACQUIRE_TIMEOUT_SECS, DEFAULT_DATABASE_MAX_CONNECTIONS,
    DEFAULT_POSTGRES_DATABASE, DEFAULT_POSTGRES_HOSTNAME, DEFAULT_POSTGRES_PASSWORD,
    DEFAULT_POSTGRES_USERNAME, POSTGRES_DATABASE_ENV, POSTGRES_HOSTNAME_ENV,
    POSTGRES_PASSWORD_ENV, POSTGRES_USERNAME_ENV,
};

/// Symbolic name of a registered database profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseId {
    Psql,
}

impl DatabaseId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Psql => "psql",
        }
    }
}

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PostgreSQL connection parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub hostname: String,
    pub username: String,
    pub password: String,
    pub database: String,
}

impl DatabaseConfig {
    /// Resolve the configuration from an environment snapshot.
    ///
    /// Pure: the same snapshot always yields the same configuration. A
    /// variable set to a value that is not valid UTF-8 is an error.
    pub fn from_vars(vars: &EnvVars) -> Result<Self, EnvVarError> {
        Ok(Self {
            hostname: vars
                .try_get_or(POSTGRES_HOSTNAME_ENV, DEFAULT_POSTGRES_HOSTNAME)?
                .to_string(),
            username: vars
                .try_get_or(POSTGRES_USERNAME_ENV, DEFAULT_POSTGRES_USERNAME)?
                .to_string(),
            password: vars
                .try_get_or(POSTGRES_PASSWORD_ENV, DEFAULT_POSTGRES_PASSWORD)?
                .to_string(),
            database: vars
                .try_get_or(POSTGRES_DATABASE_ENV, DEFAULT_POSTGRES_DATABASE)?
                .to_string(),
        })
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new_without_pgpass()
            .host(&self.hostname)
            .username(&self.username)
            .password(&self.password)
            .database(&self.database)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// A registered database profile and its lazily-connected pool.
#[derive(Clone)]
pub struct Database {
    id: DatabaseId,
    config: DatabaseConfig,
    pool: PgPool,
}

impl Database {
    pub fn id(&self) -> DatabaseId {
        self.id
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trip a trivial query. Opens a connection if none is pooled.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map(|_| ())
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("pool", &"<PgPool>")
            .finish()
    }
}

fn max_connections(vars: &EnvVars) -> u32 {
    match vars.parse_or(DATABASE_MAX_CONNECTIONS_ENV, DEFAULT_DATABASE_MAX_CONNECTIONS) {
        0 => {
            warn!(
                default = DEFAULT_DATABASE_MAX_CONNECTIONS,
                "DATABASE_MAX_CONNECTIONS must be at least 1, using default"
            );
            DEFAULT_DATABASE_MAX_CONNECTIONS
        }
        n => n,
    }
}

/// Register the `psql` profile without opening a connection.
///
/// Only fails on connection variables that are not valid UTF-8. Must be
/// called from within a Tokio runtime.
pub fn connect(vars: &EnvVars) -> Result<Database, EnvVarError> {
    let config = DatabaseConfig::from_vars(vars)?;
    let max_connections = max_connections(vars);
    let acquire_timeout = Duration::from_secs(
        vars.parse_or(DATABASE_ACQUIRE_TIMEOUT_ENV, DEFAULT_DATABASE_ACQUIRE_TIMEOUT_SECS),
    );

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect_lazy_with(config.connect_options());

    info!(
        id = %DatabaseId::Psql,
        hostname = %config.hostname,
        database = %config.database,
        max_connections,
        "DB configured per env settings"
    );

    Ok(Database {
        id: DatabaseId::Psql,
        config,
        pool,
    })
}

/// Schema migrations registered during bootstrap.
///
/// Each entry is an embedded `sqlx` migrator; they run in registration order.
#[derive(Debug, Default)]
pub struct Migrations {
    migrators: Vec<(&'static str, Migrator)>,
}

impl Migrations {
    pub fn add(&mut self, name: &'static str, migrator: Migrator) {
        self.migrators.push((name, migrator));
    }

    pub fn len(&self) -> usize {
        self.migrators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrators.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.migrators.iter().map(|(name, _)| *name).collect()
    }

    /// Run every registered migrator against `database`, in order.
    pub async fn run(&self, database: &Database) -> Result<(), MigrateError> {
        for (name, migrator) in &self.migrators {
            migrator.run(database.pool()).await?;
            info!(migrator = name, "Migrations applied");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let config = DatabaseConfig::from_vars(&EnvVars::default()).unwrap();
        assert_eq!(config.hostname, "localhost");
        assert_eq!(config.username, "vapor");
        assert_eq!(config.password, "password");
        assert_eq!(config.database, "vapor");
    }

    #[test]
    fn env_values_override_defaults() {
        let vars = EnvVars::from_pairs([
            ("POSTGRES_HOSTNAME", "db.internal"),
            ("POSTGRES_USERNAME", "postbox"),
            ("POSTGRES_PASSWORD", "s3cret"),
            ("POSTGRES_DATABASE", "mail"),
        ]);
        let config = DatabaseConfig::from_vars(&vars).unwrap();
        assert_eq!(config.hostname, "db.internal");
        assert_eq!(config.username, "postbox");
        assert_eq!(config.password, "s3cret");
        assert_eq!(config.database, "mail");
    }

    #[test]
    fn resolution_is_idempotent() {
        let vars = EnvVars::from_pairs([("POSTGRES_HOSTNAME", "db.internal")]);
        assert_eq!(
            DatabaseConfig::from_vars(&vars).unwrap(),
            DatabaseConfig::from_vars(&vars).unwrap()
        );
    }

    #[test]
    fn debug_redacts_password() {
        let vars = EnvVars::from_pairs([("POSTGRES_PASSWORD", "s3cret")]);
        let printed = format!("{:?}", DatabaseConfig::from_vars(&vars).unwrap());
        assert!(!printed.contains("s3cret"));
        assert!(printed.contains("<redacted>"));
    }

    #[tokio::test]
    async fn connect_registers_psql_profile_lazily() {
        let database = connect(&EnvVars::default()).unwrap();
        assert_eq!(database.id(), DatabaseId::Psql);
        assert_eq!(database.id().to_string(), "psql");
        assert_eq!(
            database.config(),
            &DatabaseConfig::from_vars(&EnvVars::default()).unwrap()
        );
        assert_eq!(database.pool().size(), 0);
        assert_eq!(database.pool().options().get_max_connections(), 20);
    }

    #[tokio::test]
    async fn zero_max_connections_falls_back_to_default() {
        let vars = EnvVars::from_pairs([("DATABASE_MAX_CONNECTIONS", "0")]);
        let database = connect(&vars).unwrap();
        assert_eq!(database.pool().options().get_max_connections(), 20);

        let vars = EnvVars::from_pairs([("DATABASE_MAX_CONNECTIONS", "3")]);
        let database = connect(&vars).unwrap();
        assert_eq!(database.pool().options().get_max_connections(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn undecodable_connection_value_is_an_error() {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let vars = EnvVars::from_os_pairs([(
            OsString::from("POSTGRES_PASSWORD"),
            OsString::from_vec(vec![b'p', 0xff]),
        )]);
        let err = DatabaseConfig::from_vars(&vars).unwrap_err();
        assert_eq!(err.name, "POSTGRES_PASSWORD");
    }

    #[test]
    fn migrations_keep_registration_order() {
        let mut migrations = Migrations::default();
        assert!(migrations.is_empty());
        migrations.add("postbox", sqlx::migrate!("./migrations"));
        migrations.add("audit", sqlx::migrate!("./migrations"));
        assert_eq!(migrations.len(), 2);
        assert_eq!(migrations.names(), vec!["postbox", "audit"]);
    }
}
