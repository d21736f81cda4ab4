// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Bootstrap Sequencer
//!
//! Brings the server from process start to a listening [`App`] in a fixed
//! order of stages:
//!
//! ```text
//! Init → SecretsLoaded → DatabaseRegistered → MiddlewareBuilt → MailBound
//!      → QueueBound → RoutesAndMigrationsRegistered → DevPostSteps → Listening
//! ```
//!
//! Every step either completes or aborts the whole sequence with a
//! [`BootstrapError`] naming the stage that could not be reached. There is no
//! retry and no partially-started server.
//!
//! Development additionally runs pending migrations and starts a queue
//! worker inside the server process.

pub mod context;
pub mod error;
pub mod hooks;

#[cfg(test)]
mod tests;

use std::fmt;

use tracing::info;

use crate::config::Settings;
use crate::environment::Environment;
use crate::queue::QueueConnector;
use crate::{database, mail, middleware, queue, secrets};

pub use context::{App, BootstrapContext};
pub use error::{BootstrapError, FatalError, HookError, HookName};
pub use hooks::{spawn_in_process_worker, AppHooks, Hooks};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Init,
    SecretsLoaded,
    DatabaseRegistered,
    MiddlewareBuilt,
    MailBound,
    QueueBound,
    RoutesAndMigrationsRegistered,
    DevPostSteps,
    Listening,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::SecretsLoaded => "secrets_loaded",
            Self::DatabaseRegistered => "database_registered",
            Self::MiddlewareBuilt => "middleware_built",
            Self::MailBound => "mail_bound",
            Self::QueueBound => "queue_bound",
            Self::RoutesAndMigrationsRegistered => "routes_and_migrations_registered",
            Self::DevPostSteps => "dev_post_steps",
            Self::Listening => "listening",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn reached(stage: Stage) {
    info!(stage = %stage, "Bootstrap stage reached");
}

fn hook_failed(stage: Stage, hook: HookName) -> impl FnOnce(HookError) -> BootstrapError {
    move |source| BootstrapError::new(stage, FatalError::Hook { hook, source })
}

pub struct Bootstrap {
    settings: Settings,
}

impl Bootstrap {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Run every stage in order and return the application ready to serve.
    pub async fn run(
        self,
        hooks: &dyn Hooks,
        connector: &dyn QueueConnector,
    ) -> Result<App, BootstrapError> {
        let Settings {
            environment,
            working_dir,
            host,
            port,
            vars,
        } = self.settings;

        info!(
            stage = %Stage::Init,
            environment = %environment,
            working_dir = %working_dir.display(),
            "Bootstrap starting"
        );

        let signing_keys = secrets::load(&environment, &working_dir, &vars)
            .map_err(|e| BootstrapError::new(Stage::SecretsLoaded, e))?;
        reached(Stage::SecretsLoaded);

        let database = database::connect(&vars)
            .map_err(|e| BootstrapError::new(Stage::DatabaseRegistered, e))?;
        reached(Stage::DatabaseRegistered);

        let middleware = middleware::build(&environment);
        reached(Stage::MiddlewareBuilt);

        let mail =
            mail::bind(&vars).map_err(|e| BootstrapError::new(Stage::MailBound, e))?;
        reached(Stage::MailBound);

        let queue = queue::bind(&environment, &vars, connector, &mail)
            .await
            .map_err(|e| BootstrapError::new(Stage::QueueBound, e))?;
        reached(Stage::QueueBound);

        let mut ctx = BootstrapContext::new(
            environment.clone(),
            signing_keys,
            database,
            middleware,
            mail,
            queue,
        );

        let stage = Stage::RoutesAndMigrationsRegistered;
        hooks
            .register_routes(&mut ctx)
            .await
            .map_err(hook_failed(stage, HookName::RegisterRoutes))?;
        hooks
            .register_migrations(&mut ctx)
            .await
            .map_err(hook_failed(stage, HookName::RegisterMigrations))?;
        hooks
            .register_queue_jobs(&mut ctx)
            .await
            .map_err(hook_failed(stage, HookName::RegisterQueueJobs))?;
        hooks
            .register_services(&mut ctx)
            .await
            .map_err(hook_failed(stage, HookName::RegisterServices))?;
        reached(stage);

        match environment {
            Environment::Development => {
                let stage = Stage::DevPostSteps;
                hooks
                    .auto_migrate(&ctx)
                    .await
                    .map_err(hook_failed(stage, HookName::AutoMigrate))?;
                hooks
                    .start_in_process_worker(&mut ctx)
                    .await
                    .map_err(hook_failed(stage, HookName::StartInProcessWorker))?;
                reached(stage);
            }
            Environment::Testing | Environment::Production | Environment::Custom { .. } => {}
        }

        let app = ctx.into_app(host, port);
        reached(Stage::Listening);
        Ok(app)
    }
}
