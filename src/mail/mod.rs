// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Mail Service
//!
//! Binds the Mailgun provider configuration and default sending domain.
//! Binding only fails if the HTTP client cannot be built. A missing or
//! wrong API key surfaces when the first message is sent.

pub mod client;

use std::fmt;

use tracing::{info, warn};

use crate::config::{
    EnvVars, DEFAULT_MAILGUN_DOMAIN, MAILGUN_API_KEY_ENV, MAILGUN_DEFAULT_DOMAIN_ENV,
    MAILGUN_REGION_ENV,
};

pub use client::{EmailMessage, MailError, Mailer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailRegion {
    Us,
    Eu,
}

impl MailRegion {
    /// Mailgun API base URL for this region.
    pub fn api_base(&self) -> &'static str {
        match self {
            Self::Us => "https://api.mailgun.net",
            Self::Eu => "https://api.eu.mailgun.net",
        }
    }
}

/// Provider credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub api_key: String,
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("MailConfig").field("api_key", &api_key).finish()
    }
}

/// A sending domain and the region it is hosted in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailDomain {
    pub name: String,
    pub region: MailRegion,
}

impl MailDomain {
    pub fn sandbox() -> Self {
        Self {
            name: DEFAULT_MAILGUN_DOMAIN.to_string(),
            region: MailRegion::Us,
        }
    }
}

impl fmt::Display for MailDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.name, self.region)
    }
}

/// Mail configuration bound at startup, plus a client ready to send.
#[derive(Debug, Clone)]
pub struct MailBinding {
    pub configuration: MailConfig,
    pub default_domain: MailDomain,
    pub mailer: Mailer,
}

fn parse_region(vars: &EnvVars) -> MailRegion {
    match vars.get(MAILGUN_REGION_ENV).map(str::trim) {
        None => MailRegion::Us,
        Some(r) if r.eq_ignore_ascii_case("us") => MailRegion::Us,
        Some(r) if r.eq_ignore_ascii_case("eu") => MailRegion::Eu,
        Some(other) => {
            warn!(region = other, "Unknown Mailgun region, using us");
            MailRegion::Us
        }
    }
}

/// Resolve the mail binding from an environment snapshot.
///
/// Fails only when the HTTP client cannot be built.
pub fn bind(vars: &EnvVars) -> Result<MailBinding, MailError> {
    let configuration = MailConfig {
        api_key: vars.get_or(MAILGUN_API_KEY_ENV, "").to_string(),
    };
    let default_domain = MailDomain {
        name: vars
            .get_or(MAILGUN_DEFAULT_DOMAIN_ENV, DEFAULT_MAILGUN_DOMAIN)
            .to_string(),
        region: parse_region(vars),
    };

    info!(
        configuration = ?configuration,
        default_domain = %default_domain,
        "Mailgun configured"
    );

    let mailer = Mailer::new(configuration.clone(), default_domain.clone())?;
    Ok(MailBinding {
        configuration,
        default_domain,
        mailer,
    })
}
