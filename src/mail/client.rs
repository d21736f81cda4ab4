// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Mailgun HTTP client.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use url::Url;

use super::{MailConfig, MailDomain};

/// Request timeout for the Mailgun API.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid Mailgun endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("Failed to build Mailgun HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Mailgun request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Mailgun rejected the message: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// An outbound email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Sender; defaults to `postmaster@<default domain>` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct Mailer {
    config: MailConfig,
    domain: MailDomain,
    api_base: String,
    client: reqwest::Client,
}

impl Mailer {
    pub fn new(config: MailConfig, domain: MailDomain) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(MailError::Client)?;
        Ok(Self {
            config,
            api_base: domain.region.api_base().to_string(),
            domain,
            client,
        })
    }

    /// Send to a different API host than the region's.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn domain(&self) -> &MailDomain {
        &self.domain
    }

    /// The `messages` endpoint of the default domain.
    pub fn messages_url(&self) -> Result<Url, MailError> {
        let base = Url::parse(&self.api_base)?;
        Ok(base.join(&format!("v3/{}/messages", self.domain.name))?)
    }

    fn default_sender(&self) -> String {
        format!("postmaster@{}", self.domain.name)
    }

    pub async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let url = self.messages_url()?;
        let from = message
            .from
            .clone()
            .unwrap_or_else(|| self.default_sender());
        let form = [
            ("from", from.as_str()),
            ("to", message.to.as_str()),
            ("subject", message.subject.as_str()),
            ("text", message.text.as_str()),
        ];

        let response = self
            .client
            .post(url)
            .basic_auth("api", Some(&self.config.api_key))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(to = %message.to, domain = %self.domain.name, "Email sent");
        Ok(())
    }
}
