// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Queue Worker
//!
//! Background task that drains the queue backend and dispatches each job to
//! the handler registered for its kind.
//!
//! ## Strategy
//!
//! Every `poll_interval` (default 1 s) the worker pops jobs until the queue
//! is empty or a sweep limit is hit, then sleeps. A failed job is pushed
//! back with `attempts + 1` at the end of the sweep while it has retries
//! left, otherwise dropped.
//! Jobs of unknown kind are dropped.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`. A job that is already running
//! finishes before the worker returns.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::backend::QueueBackend;
use super::error::{JobError, QueueError};
use super::{QueueBinding, QueuedJob};

/// Default interval between polling sweeps.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound on jobs processed in one sweep.
const MAX_JOBS_PER_SWEEP: usize = 100;

pub struct Worker {
    binding: QueueBinding,
    backend: Arc<dyn QueueBackend>,
    poll_interval: Duration,
}

impl Worker {
    /// Create a worker for a connected queue binding.
    pub fn new(binding: QueueBinding) -> Result<Self, QueueError> {
        let backend = binding.backend().cloned().ok_or(QueueError::NoBackend)?;
        Ok(Self {
            binding,
            backend,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run the worker loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(worker.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            backend = self.backend.name(),
            kinds = ?self.binding.kinds(),
            interval_ms = self.poll_interval.as_millis() as u64,
            "Queue worker starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Queue worker shutting down");
                return;
            }

            self.poll_step().await;

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Queue worker shutting down");
                    return;
                }
            }
        }
    }

    /// Execute one sweep. Returns the number of jobs taken off the queue.
    ///
    /// Failed jobs with retries left are pushed back once the sweep is
    /// over, so a retry runs no earlier than the next sweep.
    pub async fn poll_step(&self) -> usize {
        let mut taken = 0;
        let mut retries = Vec::new();
        while taken < MAX_JOBS_PER_SWEEP {
            match self.backend.pop().await {
                Ok(Some(job)) => {
                    taken += 1;
                    if let Some(retry) = self.process(job).await {
                        retries.push(retry);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Queue worker: failed to pop job");
                    break;
                }
            }
        }

        for job in retries {
            if let Err(e) = self.backend.push(&job).await {
                warn!(job_id = %job.id, error = %e, "Queue worker: failed to requeue job");
            }
        }
        taken
    }

    /// Run one job. Returns the job to requeue when it failed with retries
    /// left.
    async fn process(&self, mut job: QueuedJob) -> Option<QueuedJob> {
        match self.binding.registry().run(&job).await {
            Ok(()) => {
                info!(job_id = %job.id, kind = %job.kind, "Queue worker: job completed");
                None
            }
            Err(JobError::UnknownKind(kind)) => {
                warn!(job_id = %job.id, kind = %kind, "Queue worker: no handler, dropping job");
                None
            }
            Err(e) if job.attempts < job.max_retries => {
                job.attempts += 1;
                warn!(
                    job_id = %job.id,
                    kind = %job.kind,
                    attempt = job.attempts,
                    max_retries = job.max_retries,
                    error = %e,
                    "Queue worker: job failed, retrying"
                );
                Some(job)
            }
            Err(e) => {
                warn!(
                    job_id = %job.id,
                    kind = %job.kind,
                    attempts = job.attempts,
                    error = %e,
                    "Queue worker: job failed, giving up"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::testing::{CountingJob, Ping};
    use crate::queue::MemoryBackend;

    fn binding_with(job: CountingJob) -> (QueueBinding, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let mut binding = QueueBinding::new(Some(backend.clone()));
        binding.add(job);
        (binding, backend)
    }

    #[test]
    fn requires_a_backend() {
        assert!(matches!(
            Worker::new(QueueBinding::default()),
            Err(QueueError::NoBackend)
        ));
    }

    #[tokio::test]
    async fn sweep_dispatches_queued_jobs() {
        let job = CountingJob::default();
        let (binding, backend) = binding_with(job.clone());
        binding.dispatch::<CountingJob>(Ping { n: 1 }).await.unwrap();
        binding.dispatch::<CountingJob>(Ping { n: 2 }).await.unwrap();

        let worker = Worker::new(binding).unwrap();
        assert_eq!(worker.poll_step().await, 2);
        assert_eq!(job.runs(), 2);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn failed_job_is_requeued_with_attempt_count() {
        let job = CountingJob {
            failures: 1,
            ..CountingJob::default()
        };
        let (binding, backend) = binding_with(job.clone());
        binding
            .dispatch_with_retries::<CountingJob>(Ping { n: 1 }, 3)
            .await
            .unwrap();

        let worker = Worker::new(binding).unwrap();
        assert_eq!(worker.poll_step().await, 1);
        assert_eq!(job.runs(), 1);
        assert_eq!(backend.len(), 1);
        assert_eq!(backend.pop().await.unwrap().map(|j| j.attempts), Some(1));
    }

    #[tokio::test]
    async fn retry_waits_for_next_sweep() {
        let job = CountingJob {
            failures: 1,
            ..CountingJob::default()
        };
        let (binding, backend) = binding_with(job.clone());
        binding
            .dispatch_with_retries::<CountingJob>(Ping { n: 1 }, 3)
            .await
            .unwrap();

        let worker = Worker::new(binding).unwrap();
        assert_eq!(worker.poll_step().await, 1);
        assert_eq!(job.runs(), 1);

        assert_eq!(worker.poll_step().await, 1);
        assert_eq!(job.runs(), 2);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn failed_job_without_retries_is_dropped() {
        let job = CountingJob {
            failures: 5,
            ..CountingJob::default()
        };
        let (binding, backend) = binding_with(job.clone());
        binding.dispatch::<CountingJob>(Ping { n: 1 }).await.unwrap();

        let worker = Worker::new(binding).unwrap();
        assert_eq!(worker.poll_step().await, 1);
        assert_eq!(job.runs(), 1);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn unknown_kind_is_dropped() {
        let (binding, backend) = binding_with(CountingJob::default());
        let mut stray = QueuedJob::new::<CountingJob>(&Ping { n: 1 }, 3).unwrap();
        stray.kind = "Retired".into();
        backend.push(&stray).await.unwrap();

        let worker = Worker::new(binding).unwrap();
        assert_eq!(worker.poll_step().await, 1);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn run_returns_once_cancelled() {
        let (binding, _backend) = binding_with(CountingJob::default());
        let worker = Worker::new(binding)
            .unwrap()
            .with_poll_interval(Duration::from_millis(10));

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(worker.run(shutdown.clone()));
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
