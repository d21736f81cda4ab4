// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Application registration hooks.

use async_trait::async_trait;
use tracing::info;

use super::context::BootstrapContext;
use super::error::HookError;
use crate::api;
use crate::queue::Worker;

/// Application-specific steps the sequencer calls once the binders are done.
///
/// `auto_migrate` and `start_in_process_worker` are only called in
/// development.
#[async_trait]
pub trait Hooks: Send + Sync {
    async fn register_routes(&self, ctx: &mut BootstrapContext) -> Result<(), HookError>;

    async fn register_migrations(&self, ctx: &mut BootstrapContext) -> Result<(), HookError>;

    async fn register_queue_jobs(&self, ctx: &mut BootstrapContext) -> Result<(), HookError>;

    /// Last registration step, for services built on top of the bindings.
    async fn register_services(&self, ctx: &mut BootstrapContext) -> Result<(), HookError>;

    async fn auto_migrate(&self, ctx: &BootstrapContext) -> Result<(), HookError>;

    async fn start_in_process_worker(&self, ctx: &mut BootstrapContext) -> Result<(), HookError>;
}

/// Spawn a queue worker bound to the context's shutdown token.
pub fn spawn_in_process_worker(ctx: &mut BootstrapContext) -> Result<(), HookError> {
    let worker = Worker::new(ctx.queue.clone()).map_err(|_| HookError::NoQueueBackend)?;
    let handle = tokio::spawn(worker.run(ctx.shutdown.clone()));
    ctx.workers.push(handle);
    info!(kinds = ?ctx.queue.kinds(), "In-process queue worker started");
    Ok(())
}

/// The hooks the server binary runs with.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppHooks;

#[async_trait]
impl Hooks for AppHooks {
    async fn register_routes(&self, ctx: &mut BootstrapContext) -> Result<(), HookError> {
        ctx.add_routes(api::routes());
        Ok(())
    }

    async fn register_migrations(&self, ctx: &mut BootstrapContext) -> Result<(), HookError> {
        ctx.migrations.add("postbox", sqlx::migrate!("./migrations"));
        Ok(())
    }

    async fn register_queue_jobs(&self, ctx: &mut BootstrapContext) -> Result<(), HookError> {
        // EmailJob is registered by the queue binder itself.
        info!(kinds = ?ctx.queue.kinds(), "Queue jobs registered");
        Ok(())
    }

    async fn register_services(&self, ctx: &mut BootstrapContext) -> Result<(), HookError> {
        info!(
            mail_domain = %ctx.mail.default_domain.name,
            queue_connected = ctx.queue.is_connected(),
            "Services registered"
        );
        Ok(())
    }

    async fn auto_migrate(&self, ctx: &BootstrapContext) -> Result<(), HookError> {
        info!(migrators = ?ctx.migrations.names(), "Running migrations");
        ctx.migrations.run(&ctx.database).await?;
        Ok(())
    }

    async fn start_in_process_worker(&self, ctx: &mut BootstrapContext) -> Result<(), HookError> {
        spawn_in_process_worker(ctx)
    }
}
