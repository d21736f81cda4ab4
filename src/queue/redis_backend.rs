// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Redis queue backend.
//!
//! Jobs are JSON envelopes in a single Redis list: pushed with `RPUSH`,
//! taken with `LPOP`.

use std::sync::Arc;

use ::redis::aio::MultiplexedConnection;
use ::redis::AsyncCommands;
use async_trait::async_trait;

use super::backend::{QueueBackend, QueueConnector};
use super::error::QueueError;
use super::QueuedJob;

/// Redis list holding the default queue.
pub const QUEUE_KEY: &str = "queues:default";

#[derive(Clone)]
pub struct RedisBackend {
    connection: MultiplexedConnection,
    key: String,
}

impl RedisBackend {
    /// Connect to `url` and verify the server answers `PING`.
    pub async fn connect(url: &str) -> Result<Self, QueueError> {
        let connect_error = |e: ::redis::RedisError| QueueError::Connect {
            url: super::redact_url(url),
            reason: e.to_string(),
        };

        let client = ::redis::Client::open(url).map_err(connect_error)?;
        let mut connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(connect_error)?;
        let _: String = ::redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(connect_error)?;

        Ok(Self {
            connection,
            key: QUEUE_KEY.to_string(),
        })
    }
}

fn backend_error(e: ::redis::RedisError) -> QueueError {
    QueueError::Backend(e.to_string())
}

#[async_trait]
impl QueueBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn push(&self, job: &QueuedJob) -> Result<(), QueueError> {
        let value = serde_json::to_string(job)?;
        let mut connection = self.connection.clone();
        let _: () = connection
            .rpush(self.key.as_str(), value)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn pop(&self) -> Result<Option<QueuedJob>, QueueError> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = connection
            .lpop(self.key.as_str(), None)
            .await
            .map_err(backend_error)?;
        Ok(raw.map(|s| serde_json::from_str(&s)).transpose()?)
    }

    async fn ping(&self) -> Result<(), QueueError> {
        let mut connection = self.connection.clone();
        let _: String = ::redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(backend_error)?;
        Ok(())
    }
}

/// Connects [`RedisBackend`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisConnector;

#[async_trait]
impl QueueConnector for RedisConnector {
    async fn connect(&self, url: &str) -> Result<Arc<dyn QueueBackend>, QueueError> {
        Ok(Arc::new(RedisBackend::connect(url).await?))
    }
}
