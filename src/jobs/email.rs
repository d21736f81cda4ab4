// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outbound email delivery through the mail binding.

use async_trait::async_trait;

use crate::mail::{EmailMessage, Mailer};
use crate::queue::{Job, JobError};

/// Sends one [`EmailMessage`] per job.
#[derive(Debug, Clone)]
pub struct EmailJob {
    mailer: Mailer,
}

impl EmailJob {
    pub fn new(mailer: Mailer) -> Self {
        Self { mailer }
    }
}

#[async_trait]
impl Job for EmailJob {
    const KIND: &'static str = "EmailJob";
    type Payload = EmailMessage;

    async fn dequeue(&self, message: EmailMessage) -> Result<(), JobError> {
        self.mailer.send(&message).await?;
        Ok(())
    }
}
