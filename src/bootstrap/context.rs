// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bootstrap context and the finished application.

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::database::{Database, Migrations};
use crate::environment::Environment;
use crate::mail::MailBinding;
use crate::middleware::MiddlewareChain;
use crate::queue::QueueBinding;
use crate::secrets::SigningKeys;
use crate::state::AppState;

/// Everything the binders produced, handed to the registration hooks.
///
/// Built once, after the queue is bound, and consumed into an [`App`] when
/// bootstrap finishes.
#[derive(Debug)]
pub struct BootstrapContext {
    pub environment: Environment,
    pub signing_keys: Option<SigningKeys>,
    pub database: Database,
    pub middleware: MiddlewareChain,
    pub mail: MailBinding,
    pub queue: QueueBinding,
    pub routes: Router<AppState>,
    pub migrations: Migrations,
    /// Cancelled when the server stops; background tasks watch it.
    pub shutdown: CancellationToken,
    pub workers: Vec<JoinHandle<()>>,
}

impl BootstrapContext {
    pub(crate) fn new(
        environment: Environment,
        signing_keys: Option<SigningKeys>,
        database: Database,
        middleware: MiddlewareChain,
        mail: MailBinding,
        queue: QueueBinding,
    ) -> Self {
        Self {
            environment,
            signing_keys,
            database,
            middleware,
            mail,
            queue,
            routes: Router::new(),
            migrations: Migrations::default(),
            shutdown: CancellationToken::new(),
            workers: Vec::new(),
        }
    }

    /// Merge `routes` into the route table.
    pub fn add_routes(&mut self, routes: Router<AppState>) {
        let current = std::mem::take(&mut self.routes);
        self.routes = current.merge(routes);
    }

    /// Freeze the context and finalize the router.
    pub(crate) fn into_app(self, host: String, port: u16) -> App {
        let state = AppState {
            environment: self.environment.clone(),
            signing_keys: self.signing_keys.map(Arc::new),
            database: self.database,
            mail: Arc::new(self.mail),
            queue: Arc::new(self.queue),
        };

        let router = self
            .routes
            .with_state(state.clone())
            .layer(TraceLayer::new_for_http());
        let router = self.middleware.apply(router);

        App {
            environment: self.environment,
            host,
            port,
            router,
            state,
            shutdown: self.shutdown,
            workers: self.workers,
        }
    }
}

/// A fully bootstrapped application, ready to listen.
#[derive(Debug)]
pub struct App {
    environment: Environment,
    host: String,
    port: u16,
    router: Router,
    state: AppState,
    shutdown: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl App {
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The finalized router, with state and middleware applied.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Cancelling this token stops the server and its background workers.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop background workers without serving.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        join_workers(self.workers).await;
    }

    /// Listen on `HOST:8081` until Ctrl-C, SIGTERM, or the shutdown token.
    pub async fn serve(self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.address()).await?;
        info!(
            addr = %listener.local_addr()?,
            environment = %self.environment,
            "Postbox server listening (docs at /docs)"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal(self.shutdown.clone()))
            .await?;

        self.shutdown.cancel();
        join_workers(self.workers).await;
        info!("Postbox server stopped");
        Ok(())
    }
}

async fn join_workers(workers: Vec<JoinHandle<()>>) {
    for worker in workers {
        if let Err(e) = worker.await {
            warn!(error = %e, "Background worker ended abnormally");
        }
    }
}

/// Wait for Ctrl-C, SIGTERM, or cancellation of `token`.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = token.cancelled() => {},
    }
    info!("Shutdown signal received");
}
