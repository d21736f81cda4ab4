// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;

use postbox_server::bootstrap::{AppHooks, Bootstrap};
use postbox_server::config::{Settings, APP_ENV_ENV};
use postbox_server::queue::RedisConnector;
use postbox_server::telemetry;

/// Load `.env.{APP_ENV}` then `.env`. Variables already set are kept, so
/// the process environment wins over both files.
///
/// Missing files are skipped. Other failures are returned so they can be
/// logged once tracing is up.
fn load_dotenv() -> Vec<dotenvy::Error> {
    let mut results = Vec::new();
    if let Ok(app_env) = std::env::var(APP_ENV_ENV) {
        results.push(dotenvy::from_filename(format!(".env.{app_env}")).map(|_| ()));
    }
    results.push(dotenvy::dotenv().map(|_| ()));
    results
        .into_iter()
        .filter_map(Result::err)
        .filter(|e| !e.not_found())
        .collect()
}

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv_errors = load_dotenv();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to resolve working directory: {e}");
            return ExitCode::FAILURE;
        }
    };
    telemetry::init_tracing(&settings.vars);
    for e in &dotenv_errors {
        tracing::warn!(error = %e, "Failed to load dotenv file");
    }

    let app = match Bootstrap::new(settings).run(&AppHooks, &RedisConnector).await {
        Ok(app) => app,
        Err(e) => {
            tracing::error!(stage = %e.stage, error = %e, "Bootstrap failed");
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = app.serve().await {
        tracing::error!(error = %e, "Server failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
