// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cross-origin resource sharing policy.

use std::fmt;

use axum::http::{header, HeaderName, Method};
use tower_http::cors::{Any, CorsLayer};

/// Origins a [`CorsPolicy`] accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigin {
    /// Any origin (`*`).
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    pub allowed_origin: AllowedOrigin,
    pub allowed_methods: Vec<Method>,
    pub allowed_headers: Vec<HeaderName>,
}

impl CorsPolicy {
    /// The API's policy: every origin, the REST verbs, and the headers
    /// browser clients send.
    pub fn api() -> Self {
        Self {
            allowed_origin: AllowedOrigin::All,
            allowed_methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::OPTIONS,
                Method::DELETE,
                Method::PATCH,
            ],
            allowed_headers: vec![
                header::ACCEPT,
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                header::ORIGIN,
                HeaderName::from_static("x-requested-with"),
                header::USER_AGENT,
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
            ],
        }
    }

    pub fn to_layer(&self) -> CorsLayer {
        let layer = match self.allowed_origin {
            AllowedOrigin::All => CorsLayer::new().allow_origin(Any),
        };
        layer
            .allow_methods(self.allowed_methods.clone())
            .allow_headers(self.allowed_headers.clone())
    }
}

impl fmt::Display for CorsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = match self.allowed_origin {
            AllowedOrigin::All => "*",
        };
        let methods: Vec<&str> = self.allowed_methods.iter().map(Method::as_str).collect();
        let headers: Vec<&str> = self.allowed_headers.iter().map(HeaderName::as_str).collect();
        write!(
            f,
            "origin={origin} methods=[{}] headers=[{}]",
            methods.join(", "),
            headers.join(", ")
        )
    }
}
