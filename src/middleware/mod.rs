// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Middleware Pipeline
//!
//! An ordered chain of request/response interceptors. Index 0 is the
//! outermost layer: it sees the request first and the response last.
//!
//! The CORS interceptor is pinned to index 0 so that it wraps everything
//! else, including error translation. Error responses therefore carry CORS
//! headers too.

pub mod cors;
pub mod errors;

use axum::Router;
use tracing::info;

use crate::environment::Environment;

pub use cors::{AllowedOrigin, CorsPolicy};
pub use errors::{translate_errors, REDACTED_REASON};

/// A single interceptor in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Middleware {
    Cors(CorsPolicy),
    /// Error translation, with the environment that decides redaction.
    ErrorTranslation(Environment),
}

impl Middleware {
    pub fn is_cors(&self) -> bool {
        matches!(self, Self::Cors(_))
    }
}

/// Where [`MiddlewareChain::insert`] places an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Beginning,
    End,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MiddlewareChain {
    entries: Vec<Middleware>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, middleware: Middleware) {
        self.insert(middleware, Position::End);
    }

    /// Insert an entry.
    ///
    /// A CORS entry at `Beginning` takes index 0. Any other entry at
    /// `Beginning` goes right after an existing CORS entry, so CORS stays
    /// outermost.
    pub fn insert(&mut self, middleware: Middleware, position: Position) {
        match position {
            Position::End => self.entries.push(middleware),
            Position::Beginning => {
                let index = match self.entries.first() {
                    Some(first) if first.is_cors() && !middleware.is_cors() => 1,
                    _ => 0,
                };
                self.entries.insert(index, middleware);
            }
        }
    }

    pub fn entries(&self) -> &[Middleware] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Wrap `router` in every entry, consuming the chain.
    pub fn apply(self, router: Router) -> Router {
        // `Router::layer` wraps what is already there, so the last layer
        // applied is the outermost one.
        self.entries
            .into_iter()
            .rev()
            .fold(router, |router, middleware| match middleware {
                Middleware::Cors(policy) => router.layer(policy.to_layer()),
                Middleware::ErrorTranslation(environment) => router.layer(
                    axum::middleware::from_fn_with_state(environment, translate_errors),
                ),
            })
    }
}

/// Build the API middleware chain for `environment`.
pub fn build(environment: &Environment) -> MiddlewareChain {
    let mut chain = MiddlewareChain::new();
    chain.push(Middleware::ErrorTranslation(environment.clone()));

    let policy = CorsPolicy::api();
    info!(cors = %policy, "CORS configured");
    chain.insert(Middleware::Cors(policy), Position::Beginning);

    chain
}
