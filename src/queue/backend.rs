// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Queue backend abstraction and the in-memory backend.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::error::QueueError;
use super::QueuedJob;

/// Storage for queued jobs.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Append a job to the tail of the queue.
    async fn push(&self, job: &QueuedJob) -> Result<(), QueueError>;

    /// Remove and return the job at the head of the queue, if any.
    async fn pop(&self) -> Result<Option<QueuedJob>, QueueError>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), QueueError>;
}

/// Opens a backend connection from a URL.
#[async_trait]
pub trait QueueConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Arc<dyn QueueBackend>, QueueError>;
}

/// Process-local FIFO backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    jobs: Mutex<VecDeque<QueuedJob>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<QueuedJob>> {
        // A panic while holding the lock cannot leave the deque half-updated.
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl QueueBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn push(&self, job: &QueuedJob) -> Result<(), QueueError> {
        self.lock().push_back(job.clone());
        Ok(())
    }

    async fn pop(&self) -> Result<Option<QueuedJob>, QueueError> {
        Ok(self.lock().pop_front())
    }

    async fn ping(&self) -> Result<(), QueueError> {
        Ok(())
    }
}
