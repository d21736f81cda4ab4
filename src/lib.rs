// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Postbox - Mail Delivery API Server
//!
//! Startup orchestration for an HTTP API that sends email through Mailgun
//! from a Redis-backed job queue, with PostgreSQL storage and JWKS-based
//! token verification.
//!
//! ## Modules
//!
//! - `bootstrap` - Ordered startup stages and registration hooks
//! - `secrets` - JWKS signing key loading
//! - `database` - PostgreSQL pool and migrations (sqlx)
//! - `middleware` - CORS and error translation
//! - `mail` - Mailgun binding and client
//! - `queue` - Job queue binding, backends and worker
//! - `api` - HTTP handlers (Axum)

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod database;
pub mod environment;
pub mod error;
pub mod jobs;
pub mod mail;
pub mod middleware;
pub mod queue;
pub mod secrets;
pub mod state;
pub mod telemetry;
