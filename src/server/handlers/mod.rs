// src/server/handlers/mod.rs
//! HTTP request handlers for the repository server
//!
//! Every JSON response is wrapped in the [`ApiResponse`] envelope.

pub mod packages;
pub mod transfer;

pub(crate) use crate::archive::path::sanitize_filename;
use crate::repository::ApiResponse;
use crate::server::ServerConfig;
use axum::{
    Json,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Default and upper bound for `limit` query parameters
pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 100;

pub(crate) fn ok<T: Serialize>(data: T) -> Response {
    Json(ApiResponse::ok(data)).into_response()
}

pub(crate) fn ok_with_message<T: Serialize>(
    status: StatusCode,
    data: T,
    message: &str,
) -> Response {
    (status, Json(ApiResponse::ok_with_message(data, message))).into_response()
}

pub(crate) fn failure(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(ApiResponse::<()>::failure(error))).into_response()
}

/// Page size from a query parameter: missing or zero gives the default
pub(crate) fn clamp_limit(limit: Option<usize>) -> usize {
    match limit {
        None | Some(0) => DEFAULT_LIMIT,
        Some(limit) => limit.min(MAX_LIMIT),
    }
}

/// Check `Authorization: Bearer <upload_token>`
pub(crate) fn authorized(headers: &HeaderMap, config: &ServerConfig) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| !config.upload_token.is_empty() && token == config.upload_token)
}
