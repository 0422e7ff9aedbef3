// src/server/routes.rs
//! Axum router configuration for the repository server

use crate::server::ServerState;
use crate::server::handlers::{packages, transfer};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Method, header},
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main application router
pub fn create_router(state: ServerState) -> Router {
    let body_limit = usize::try_from(state.config.max_file_size).unwrap_or(usize::MAX);
    let enable_cors = state.config.enable_cors;

    let upload_routes = Router::new()
        .route("/api/v1/upload", post(transfer::upload))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/api/v1", get(packages::repository_info))
        .route("/api/v1/", get(packages::repository_info))
        .route("/api/v1/stats", get(packages::stats))
        .route("/api/v1/packages", get(packages::list_packages))
        .route("/api/v1/packages/:name", get(packages::get_package))
        .route(
            "/api/v1/packages/:name/:version",
            get(packages::get_package_version),
        )
        .route("/api/v1/search", get(packages::search))
        .route(
            "/api/v1/download/:name/:version/:file",
            get(transfer::download),
        )
        .route("/api/v1/refresh", post(transfer::refresh))
        .with_state(state);

    let router = Router::new()
        .merge(api_routes)
        .merge(upload_routes)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
        router.layer(cors)
    } else {
        router
    }
}
