// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bootstrap errors.

use std::fmt;

use sqlx::migrate::MigrateError;
use thiserror::Error;

use super::Stage;
use crate::config::EnvVarError;
use crate::mail::MailError;
use crate::queue::QueueError;
use crate::secrets::SigningKeyError;

/// Registration hook identifiers, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookName {
    RegisterRoutes,
    RegisterMigrations,
    RegisterQueueJobs,
    RegisterServices,
    AutoMigrate,
    StartInProcessWorker,
}

impl HookName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RegisterRoutes => "register_routes",
            Self::RegisterMigrations => "register_migrations",
            Self::RegisterQueueJobs => "register_queue_jobs",
            Self::RegisterServices => "register_services",
            Self::AutoMigrate => "auto_migrate",
            Self::StartInProcessWorker => "start_in_process_worker",
        }
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error("Migration failed: {0}")]
    Migration(#[from] MigrateError),

    /// The in-process worker needs a connected queue backend.
    #[error("No queue backend is bound")]
    NoQueueBackend,

    #[error("{0}")]
    Rejected(String),
}

/// Why bootstrap could not continue.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error(transparent)]
    Secrets(#[from] SigningKeyError),

    #[error(transparent)]
    Config(#[from] EnvVarError),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error("Queue binding failed: {0}")]
    Queue(#[from] QueueError),

    #[error("Hook {hook} failed: {source}")]
    Hook {
        hook: HookName,
        #[source]
        source: HookError,
    },
}

/// A fatal startup error and the stage that could not be reached.
#[derive(Debug, Error)]
#[error("Bootstrap failed at {stage}: {source}")]
pub struct BootstrapError {
    pub stage: Stage,
    #[source]
    pub source: FatalError,
}

impl BootstrapError {
    pub fn new(stage: Stage, source: impl Into<FatalError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}
