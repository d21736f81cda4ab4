// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::database::Database;
use crate::environment::Environment;
use crate::mail::MailBinding;
use crate::queue::QueueBinding;
use crate::secrets::SigningKeys;

/// Shared, read-only state handed to every request handler.
///
/// Built once when bootstrap finishes; nothing in it changes afterwards.
#[derive(Debug, Clone)]
pub struct AppState {
    pub environment: Environment,
    /// `None` when the environment skips signing keys.
    pub signing_keys: Option<Arc<SigningKeys>>,
    pub database: Database,
    pub mail: Arc<MailBinding>,
    pub queue: Arc<QueueBinding>,
}
