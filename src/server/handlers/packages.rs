// src/server/handlers/packages.rs
//! Catalog queries: repository info, statistics, listing, lookup and search

use super::{clamp_limit, failure, ok};
use crate::repository::{PackageEntry, SearchResponse};
use crate::server::ServerState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name reported by `GET /api/v1/`
pub const REPOSITORY_NAME: &str = "criage package repository";

#[derive(Serialize)]
pub struct RepositoryInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub last_updated: DateTime<Utc>,
    pub total_packages: usize,
    pub formats: Vec<String>,
}

/// Paging parameters; unparsable values fall back to the defaults
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<String>,
}

#[derive(Serialize)]
pub struct PackagePage {
    pub packages: Vec<PackageEntry>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

fn parse_number(value: Option<&str>) -> Option<usize> {
    value.and_then(|v| v.trim().parse().ok())
}

/// GET /api/v1/
pub async fn repository_info(State(state): State<ServerState>) -> Response {
    let (last_updated, total_packages) = state
        .index
        .read(|index| (index.last_updated, index.packages.len()))
        .await;

    ok(RepositoryInfo {
        name: REPOSITORY_NAME,
        version: env!("CARGO_PKG_VERSION"),
        last_updated,
        total_packages,
        formats: state.config.allowed_formats.clone(),
    })
}

/// GET /api/v1/stats
pub async fn stats(State(state): State<ServerState>) -> Response {
    let statistics = state.index.read(|index| index.statistics.clone()).await;
    ok(statistics)
}

/// GET /api/v1/packages?page=&limit=
pub async fn list_packages(
    State(state): State<ServerState>,
    Query(query): Query<PageQuery>,
) -> Response {
    let page = parse_number(query.page.as_deref()).filter(|p| *p >= 1).unwrap_or(1);
    let limit = clamp_limit(parse_number(query.limit.as_deref()));

    let (packages, total) = state
        .index
        .read(|index| {
            let total = index.packages.len();
            let packages = index
                .packages
                .values()
                .skip((page - 1).saturating_mul(limit))
                .take(limit)
                .cloned()
                .collect();
            (packages, total)
        })
        .await;

    ok(PackagePage {
        packages,
        total,
        page,
        limit,
        total_pages: total.div_ceil(limit),
    })
}

/// GET /api/v1/packages/:name
pub async fn get_package(State(state): State<ServerState>, Path(name): Path<String>) -> Response {
    match state.index.read(|index| index.packages.get(&name).cloned()).await {
        Some(package) => ok(package),
        None => failure(StatusCode::NOT_FOUND, "Package not found"),
    }
}

/// GET /api/v1/packages/:name/:version
pub async fn get_package_version(
    State(state): State<ServerState>,
    Path((name, version)): Path<(String, String)>,
) -> Response {
    let found = state
        .index
        .read(|index| {
            index
                .packages
                .get(&name)
                .map(|package| package.version(&version).cloned())
        })
        .await;

    match found {
        Some(Some(entry)) => ok(entry),
        Some(None) => failure(StatusCode::NOT_FOUND, "Version not found"),
        None => failure(StatusCode::NOT_FOUND, "Package not found"),
    }
}

/// GET /api/v1/search?q=&limit=
pub async fn search(State(state): State<ServerState>, Query(query): Query<SearchQuery>) -> Response {
    let q = match query.q.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => q.to_string(),
        _ => return failure(StatusCode::BAD_REQUEST, "Search query is required"),
    };
    let limit = clamp_limit(parse_number(query.limit.as_deref()));

    let mut results = state.index.search(&q).await;
    results.truncate(limit);

    ok(SearchResponse {
        query: q,
        total: results.len(),
        results,
    })
}
