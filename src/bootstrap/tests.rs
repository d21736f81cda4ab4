// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    routing::get,
    Router,
};
use tower::ServiceExt;

use super::*;
use crate::config::EnvVars;
use crate::error::ErrorBody;
use crate::queue::testing::{CountingJob, Ping, RecordingConnector};
use crate::queue::QueueError;
use crate::secrets::{SigningKeyError, TEST_JWKS};

/// Records hook calls; optionally fails one of them.
#[derive(Default)]
struct RecordingHooks {
    calls: Mutex<Vec<HookName>>,
    fail_at: Option<HookName>,
    job: CountingJob,
}

impl RecordingHooks {
    fn failing_at(hook: HookName) -> Self {
        Self {
            fail_at: Some(hook),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<HookName> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, hook: HookName) -> Result<(), HookError> {
        self.calls.lock().unwrap().push(hook);
        if self.fail_at == Some(hook) {
            return Err(HookError::Rejected(format!("{hook} refused")));
        }
        Ok(())
    }
}

#[async_trait]
impl Hooks for RecordingHooks {
    async fn register_routes(&self, ctx: &mut BootstrapContext) -> Result<(), HookError> {
        self.record(HookName::RegisterRoutes)?;
        ctx.add_routes(Router::new().route("/ping", get(|| async { "pong" })));
        Ok(())
    }

    async fn register_migrations(&self, _ctx: &mut BootstrapContext) -> Result<(), HookError> {
        self.record(HookName::RegisterMigrations)
    }

    async fn register_queue_jobs(&self, ctx: &mut BootstrapContext) -> Result<(), HookError> {
        self.record(HookName::RegisterQueueJobs)?;
        ctx.queue.add(self.job.clone());
        Ok(())
    }

    async fn register_services(&self, _ctx: &mut BootstrapContext) -> Result<(), HookError> {
        self.record(HookName::RegisterServices)
    }

    async fn auto_migrate(&self, _ctx: &BootstrapContext) -> Result<(), HookError> {
        self.record(HookName::AutoMigrate)
    }

    async fn start_in_process_worker(&self, ctx: &mut BootstrapContext) -> Result<(), HookError> {
        self.record(HookName::StartInProcessWorker)?;
        spawn_in_process_worker(ctx)
    }
}

const REGISTRATION_HOOKS: [HookName; 4] = [
    HookName::RegisterRoutes,
    HookName::RegisterMigrations,
    HookName::RegisterQueueJobs,
    HookName::RegisterServices,
];

fn settings(app_env: &str, working_dir: &Path, extra: &[(&str, &str)]) -> Settings {
    let mut pairs = vec![("APP_ENV", app_env)];
    pairs.extend_from_slice(extra);
    Settings::from_vars(EnvVars::from_pairs(pairs), working_dir)
}

fn dir_with_keys() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("keypair.jwks"), TEST_JWKS).unwrap();
    dir
}

async fn run(
    settings: Settings,
    hooks: &RecordingHooks,
    connector: &RecordingConnector,
) -> Result<App, BootstrapError> {
    Bootstrap::new(settings).run(hooks, connector).await
}

#[test]
fn stages_are_ordered() {
    assert!(Stage::Init < Stage::SecretsLoaded);
    assert!(Stage::SecretsLoaded < Stage::DatabaseRegistered);
    assert!(Stage::QueueBound < Stage::RoutesAndMigrationsRegistered);
    assert!(Stage::DevPostSteps < Stage::Listening);
}

#[tokio::test]
async fn missing_key_file_aborts_before_database() {
    let dir = tempfile::tempdir().unwrap();
    let hooks = RecordingHooks::default();
    let connector = RecordingConnector::default();

    let err = run(settings("production", dir.path(), &[]), &hooks, &connector)
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::SecretsLoaded);
    assert!(err.stage < Stage::DatabaseRegistered);
    assert!(matches!(
        err.source,
        FatalError::Secrets(SigningKeyError::KeyFileUnreadable { .. })
    ));
    assert!(err
        .to_string()
        .contains(&dir.path().join("keypair.jwks").display().to_string()));
    assert!(connector.calls().is_empty());
    assert!(hooks.calls().is_empty());
}

#[tokio::test]
async fn testing_reaches_listening_without_keys_or_queue() {
    let hooks = RecordingHooks::default();
    let connector = RecordingConnector::default();

    let app = run(
        settings("testing", Path::new("/nonexistent/postbox"), &[]),
        &hooks,
        &connector,
    )
    .await
    .unwrap();

    assert_eq!(app.environment(), &Environment::Testing);
    assert_eq!(app.port(), 8081);
    assert_eq!(app.address(), "0.0.0.0:8081");
    assert!(app.state().signing_keys.is_none());
    assert!(!app.state().queue.is_connected());
    assert_eq!(app.worker_count(), 0);
    assert!(connector.calls().is_empty());
    assert_eq!(hooks.calls(), REGISTRATION_HOOKS.to_vec());
}

#[tokio::test]
async fn custom_testing_profile_behaves_like_testing() {
    let hooks = RecordingHooks::default();
    let connector = RecordingConnector::default();

    let app = run(
        settings(
            "ci",
            Path::new("/nonexistent/postbox"),
            &[("APP_ENV_PROFILE", "testing")],
        ),
        &hooks,
        &connector,
    )
    .await
    .unwrap();

    assert_eq!(app.environment().name(), "ci");
    assert!(connector.calls().is_empty());
    assert_eq!(hooks.calls(), REGISTRATION_HOOKS.to_vec());
}

#[tokio::test]
async fn development_migrates_and_starts_worker_after_queue_hooks() {
    let dir = dir_with_keys();
    let hooks = RecordingHooks::default();
    let connector = RecordingConnector::default();

    let app = run(settings("development", dir.path(), &[]), &hooks, &connector)
        .await
        .unwrap();

    assert_eq!(
        hooks.calls(),
        vec![
            HookName::RegisterRoutes,
            HookName::RegisterMigrations,
            HookName::RegisterQueueJobs,
            HookName::RegisterServices,
            HookName::AutoMigrate,
            HookName::StartInProcessWorker,
        ]
    );
    assert_eq!(app.worker_count(), 1);
    assert_eq!(connector.calls(), vec!["redis://127.0.0.1:6379".to_string()]);

    let config = app.state().database.config();
    assert_eq!(config.hostname, "localhost");
    assert_eq!(config.username, "vapor");
    assert_eq!(config.password, "password");
    assert_eq!(config.database, "vapor");
    assert_eq!(app.state().signing_keys.as_ref().map(|k| k.len()), Some(2));

    // The in-process worker picks up dispatched jobs.
    app.state()
        .queue
        .dispatch::<CountingJob>(Ping { n: 1 })
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while hooks.job.runs() == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    tokio::time::timeout(Duration::from_secs(5), app.shutdown())
        .await
        .unwrap();
}

#[tokio::test]
async fn production_skips_development_post_steps() {
    let dir = dir_with_keys();
    let hooks = RecordingHooks::default();
    let connector = RecordingConnector::default();

    let app = run(settings("production", dir.path(), &[]), &hooks, &connector)
        .await
        .unwrap();

    assert_eq!(hooks.calls(), REGISTRATION_HOOKS.to_vec());
    assert_eq!(app.worker_count(), 0);
    assert!(app.state().queue.is_connected());
}

#[tokio::test]
async fn unreachable_queue_aborts_at_queue_bound() {
    let dir = dir_with_keys();
    let hooks = RecordingHooks::default();
    let connector = RecordingConnector::failing();

    let err = run(settings("production", dir.path(), &[]), &hooks, &connector)
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::QueueBound);
    assert!(matches!(
        err.source,
        FatalError::Queue(QueueError::Connect { .. })
    ));
    assert_eq!(connector.calls(), vec!["redis://127.0.0.1:6379".to_string()]);
    assert!(hooks.calls().is_empty());
}

#[tokio::test]
async fn non_utf8_key_file_names_resolved_path() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("keys")).unwrap();
    let path = dir.path().join("keys").join("bad.jwks");
    std::fs::write(&path, [0xff, 0xfe, 0x00, 0x80]).unwrap();

    let hooks = RecordingHooks::default();
    let connector = RecordingConnector::default();
    let err = run(
        settings(
            "production",
            dir.path(),
            &[("JWKS_KEYPAIR_FILE", "keys/bad.jwks")],
        ),
        &hooks,
        &connector,
    )
    .await
    .unwrap_err();

    assert_eq!(err.stage, Stage::SecretsLoaded);
    assert!(matches!(
        err.source,
        FatalError::Secrets(SigningKeyError::KeyFileNotUtf8 { .. })
    ));
    assert!(err.to_string().contains(&path.display().to_string()));
}

#[cfg(unix)]
#[tokio::test]
async fn undecodable_key_path_aborts_before_database() {
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;

    let dir = dir_with_keys();
    let vars = EnvVars::from_os_pairs([
        (OsString::from("APP_ENV"), OsString::from("production")),
        (
            OsString::from("JWKS_KEYPAIR_FILE"),
            OsString::from_vec(b"keys/prod\xff.jwks".to_vec()),
        ),
    ]);
    let hooks = RecordingHooks::default();
    let connector = RecordingConnector::default();

    let err = run(Settings::from_vars(vars, dir.path()), &hooks, &connector)
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::SecretsLoaded);
    assert!(matches!(
        err.source,
        FatalError::Secrets(SigningKeyError::KeyPathNotUtf8 { .. })
    ));
    let lossy = dir.path().join("keys/prod\u{fffd}.jwks");
    assert!(err.to_string().contains(&lossy.display().to_string()));
    assert!(connector.calls().is_empty());
    assert!(hooks.calls().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn undecodable_database_setting_aborts_at_database_registered() {
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;

    let vars = EnvVars::from_os_pairs([
        (OsString::from("APP_ENV"), OsString::from("testing")),
        (
            OsString::from("POSTGRES_PASSWORD"),
            OsString::from_vec(b"pa\xffss".to_vec()),
        ),
    ]);
    let hooks = RecordingHooks::default();
    let connector = RecordingConnector::default();

    let err = run(
        Settings::from_vars(vars, Path::new("/nonexistent/postbox")),
        &hooks,
        &connector,
    )
    .await
    .unwrap_err();

    assert_eq!(err.stage, Stage::DatabaseRegistered);
    assert!(matches!(
        err.source,
        FatalError::Config(ref e) if e.name == "POSTGRES_PASSWORD"
    ));
    assert!(hooks.calls().is_empty());
}

#[tokio::test]
async fn zero_max_connections_still_boots() {
    let hooks = RecordingHooks::default();
    let connector = RecordingConnector::default();

    let app = run(
        settings(
            "testing",
            Path::new("/nonexistent/postbox"),
            &[("DATABASE_MAX_CONNECTIONS", "0")],
        ),
        &hooks,
        &connector,
    )
    .await
    .unwrap();

    assert_eq!(
        app.state().database.pool().options().get_max_connections(),
        20
    );
}

#[tokio::test]
async fn failing_registration_hook_aborts() {
    let hooks = RecordingHooks::failing_at(HookName::RegisterMigrations);
    let connector = RecordingConnector::default();

    let err = run(
        settings("testing", Path::new("/nonexistent/postbox"), &[]),
        &hooks,
        &connector,
    )
    .await
    .unwrap_err();

    assert_eq!(err.stage, Stage::RoutesAndMigrationsRegistered);
    assert!(matches!(
        err.source,
        FatalError::Hook {
            hook: HookName::RegisterMigrations,
            ..
        }
    ));
    assert_eq!(
        hooks.calls(),
        vec![HookName::RegisterRoutes, HookName::RegisterMigrations]
    );
}

#[tokio::test]
async fn failing_auto_migrate_skips_worker() {
    let dir = dir_with_keys();
    let hooks = RecordingHooks::failing_at(HookName::AutoMigrate);
    let connector = RecordingConnector::default();

    let err = run(settings("development", dir.path(), &[]), &hooks, &connector)
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::DevPostSteps);
    assert!(!hooks.calls().contains(&HookName::StartInProcessWorker));
}

#[tokio::test]
async fn finalized_router_serves_routes_behind_cors_and_error_translation() {
    let hooks = RecordingHooks::default();
    let connector = RecordingConnector::default();
    let app = run(
        settings("testing", Path::new("/nonexistent/postbox"), &[]),
        &hooks,
        &connector,
    )
    .await
    .unwrap();

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri("/ping")
                .header(header::ORIGIN, "https://app.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri("/missing")
                .header(header::ORIGIN, "https://app.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
    assert!(body.error);
    assert_eq!(body.reason, "Not Found");
}

#[tokio::test]
async fn app_hooks_register_health_routes_and_migrations() {
    let connector = RecordingConnector::default();
    let app = Bootstrap::new(settings("testing", Path::new("/nonexistent/postbox"), &[]))
        .run(&AppHooks, &connector)
        .await
        .unwrap();

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri("/health/live")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], br#"{"status":"ok"}"#);
}
