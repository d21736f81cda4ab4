// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Job Queue
//!
//! Job handlers are registered by kind in a [`JobRegistry`]. Jobs travel as
//! JSON [`QueuedJob`] envelopes through a [`QueueBackend`] and are picked up
//! by a [`Worker`].
//!
//! ## Binding by environment
//!
//! - `testing` (and custom environments with the testing profile): no
//!   backend, no network
//! - every other environment: connect to `REDIS_URL`; failure aborts startup
//!
//! `EmailJob` is registered in every environment.

pub mod backend;
pub mod error;
pub mod redis_backend;
pub mod worker;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::info;
use url::Url;
use uuid::Uuid;

use crate::config::{EnvVars, DEFAULT_REDIS_URL, REDIS_URL_ENV};
use crate::environment::{CustomProfile, Environment};
use crate::jobs::EmailJob;
use crate::mail::MailBinding;

pub use backend::{MemoryBackend, QueueBackend, QueueConnector};
pub use error::{JobError, QueueError};
pub use redis_backend::{RedisBackend, RedisConnector};
pub use worker::Worker;

/// A unit of background work, identified by its kind.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Kind name stored in the envelope and used for dispatch.
    const KIND: &'static str;

    type Payload: Serialize + DeserializeOwned + Send + 'static;

    async fn dequeue(&self, payload: Self::Payload) -> Result<(), JobError>;
}

/// JSON envelope stored in the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub id: Uuid,
    pub kind: String,
    pub payload: serde_json::Value,
    /// Failed runs so far.
    pub attempts: u32,
    /// Retries allowed after the first failure.
    pub max_retries: u32,
    pub queued_at: DateTime<Utc>,
}

impl QueuedJob {
    pub fn new<J: Job>(payload: &J::Payload, max_retries: u32) -> Result<Self, QueueError> {
        Ok(Self {
            id: Uuid::new_v4(),
            kind: J::KIND.to_string(),
            payload: serde_json::to_value(payload)?,
            attempts: 0,
            max_retries,
            queued_at: Utc::now(),
        })
    }
}

#[async_trait]
trait ErasedJob: Send + Sync {
    async fn run(&self, payload: serde_json::Value) -> Result<(), JobError>;
}

struct Erased<J>(J);

#[async_trait]
impl<J: Job> ErasedJob for Erased<J> {
    async fn run(&self, payload: serde_json::Value) -> Result<(), JobError> {
        let payload: J::Payload = serde_json::from_value(payload).map_err(JobError::Payload)?;
        self.0.dequeue(payload).await
    }
}

/// Dispatch table from job kind to handler.
#[derive(Clone, Default)]
pub struct JobRegistry {
    handlers: HashMap<&'static str, Arc<dyn ErasedJob>>,
}

impl JobRegistry {
    /// Register a handler, replacing any handler of the same kind.
    pub fn add<J: Job>(&mut self, job: J) {
        self.handlers.insert(J::KIND, Arc::new(Erased(job)));
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<&'static str> = self.handlers.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    /// Run the handler registered for `job.kind`.
    pub async fn run(&self, job: &QueuedJob) -> Result<(), JobError> {
        let handler = self
            .handlers
            .get(job.kind.as_str())
            .ok_or_else(|| JobError::UnknownKind(job.kind.clone()))?;
        handler.run(job.payload.clone()).await
    }
}

impl fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// Queue backend connection (when the environment has one) and the job
/// dispatch table.
#[derive(Clone, Default)]
pub struct QueueBinding {
    backend: Option<Arc<dyn QueueBackend>>,
    registry: JobRegistry,
}

impl QueueBinding {
    pub fn new(backend: Option<Arc<dyn QueueBackend>>) -> Self {
        Self {
            backend,
            registry: JobRegistry::default(),
        }
    }

    pub fn backend(&self) -> Option<&Arc<dyn QueueBackend>> {
        self.backend.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.backend.is_some()
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn add<J: Job>(&mut self, job: J) {
        self.registry.add(job);
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.registry.kinds()
    }

    /// Enqueue a job without retries.
    pub async fn dispatch<J: Job>(&self, payload: J::Payload) -> Result<Uuid, QueueError> {
        self.dispatch_with_retries::<J>(payload, 0).await
    }

    pub async fn dispatch_with_retries<J: Job>(
        &self,
        payload: J::Payload,
        max_retries: u32,
    ) -> Result<Uuid, QueueError> {
        let backend = self.backend.as_ref().ok_or(QueueError::NoBackend)?;
        let job = QueuedJob::new::<J>(&payload, max_retries)?;
        backend.push(&job).await?;
        Ok(job.id)
    }
}

impl fmt::Debug for QueueBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueBinding")
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .field("registry", &self.registry)
            .finish()
    }
}

/// Strip the password from a backend URL for logging.
pub(crate) fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("***"));
            }
            url.to_string()
        }
        Err(_) => "<invalid url>".to_string(),
    }
}

/// Bind the job queue for `environment`.
pub async fn bind(
    environment: &Environment,
    vars: &EnvVars,
    connector: &dyn QueueConnector,
    mail: &MailBinding,
) -> Result<QueueBinding, QueueError> {
    let backend = match environment {
        Environment::Testing
        | Environment::Custom {
            profile: CustomProfile::LikeTesting,
            ..
        } => None,
        Environment::Development
        | Environment::Production
        | Environment::Custom {
            profile: CustomProfile::LikeProduction,
            ..
        } => {
            let url = vars.try_get_or(REDIS_URL_ENV, DEFAULT_REDIS_URL)?;
            let backend = connector.connect(url).await?;
            info!(url = %redact_url(url), backend = backend.name(), "connected to redis.");
            Some(backend)
        }
    };

    let mut binding = QueueBinding::new(backend);
    binding.add(EmailJob::new(mail.mailer.clone()));
    Ok(binding)
}
