// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error translation middleware.
//!
//! Rewrites every 4xx/5xx response into an [`ErrorBody`] JSON document.
//! In production, reasons of server errors are replaced by a generic
//! message; client errors always keep their reason.

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::error;

use crate::environment::Environment;
use crate::error::{ErrorBody, ErrorReport};

/// Reason shown in place of server error details when redacting.
pub const REDACTED_REASON: &str = "Something went wrong.";

/// Upper bound on an error body read back for its reason.
const MAX_ERROR_BODY: usize = 64 * 1024;

pub async fn translate_errors(
    State(environment): State<Environment>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let reason = match parts.extensions.remove::<ErrorReport>() {
        Some(report) => report.reason,
        None => body_reason(body, status).await,
    };

    if status.is_server_error() {
        error!(status = %status, reason = %reason, "Request failed");
    }

    let reason = if status.is_server_error() && environment.redacts_internal_errors() {
        REDACTED_REASON.to_string()
    } else {
        reason
    };

    let body = match serde_json::to_vec(&ErrorBody {
        error: true,
        reason,
    }) {
        Ok(bytes) => bytes,
        Err(_) => return Response::from_parts(parts, Body::empty()),
    };

    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Response::from_parts(parts, Body::from(body))
}

/// Reason for an error response that did not come from `ApiError`: its
/// text body if it has one, otherwise the status's canonical reason.
async fn body_reason(body: Body, status: StatusCode) -> String {
    let fallback = || status.canonical_reason().unwrap_or("Unknown error").to_string();
    match to_bytes(body, MAX_ERROR_BODY).await {
        Ok(bytes) if !bytes.is_empty() => match std::str::from_utf8(&bytes) {
            Ok(text) => text.trim().to_string(),
            Err(_) => fallback(),
        },
        _ => fallback(),
    }
}
