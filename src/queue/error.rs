// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Queue and job errors.

use thiserror::Error;

use crate::config::EnvVarError;
use crate::mail::MailError;

#[derive(Debug, Error)]
pub enum QueueError {
    /// The backend could not be reached at bind time.
    #[error("Failed to connect to queue backend at {url}: {reason}")]
    Connect { url: String, reason: String },

    /// The backend URL is set to a value that is not valid UTF-8.
    #[error(transparent)]
    Config(#[from] EnvVarError),

    /// A backend command failed after connecting.
    #[error("Queue backend error: {0}")]
    Backend(String),

    /// Dispatch was attempted without a connected backend.
    #[error("No queue backend is configured")]
    NoBackend,

    /// A job envelope could not be encoded or decoded.
    #[error("Invalid job envelope: {0}")]
    Envelope(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum JobError {
    /// No handler is registered for the job's kind.
    #[error("No handler registered for job kind '{0}'")]
    UnknownKind(String),

    /// The payload does not match the handler's payload type.
    #[error("Invalid job payload: {0}")]
    Payload(#[source] serde_json::Error),

    #[error("Mail delivery failed: {0}")]
    Mail(#[from] MailError),

    #[error("{0}")]
    Failed(String),
}
