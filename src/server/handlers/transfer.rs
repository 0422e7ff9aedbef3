// src/server/handlers/transfer.rs
//! Archive download, upload and forced rescans

use super::{authorized, failure, ok_with_message, sanitize_filename};
use crate::server::ServerState;
use axum::{
    body::Body,
    extract::{Multipart, Path, State, multipart::Field},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

/// Multipart field carrying the archive
pub const UPLOAD_FIELD: &str = "package";

/// Response header with the archive's SHA-256
pub const CHECKSUM_HEADER: &str = "x-checksum";

#[derive(Serialize)]
pub struct UploadResult {
    pub filename: String,
    pub size: u64,
}

#[derive(Serialize)]
pub struct RefreshResult {
    pub total_packages: usize,
    pub last_updated: DateTime<Utc>,
    pub added: usize,
}

/// GET /api/v1/download/:name/:version/:file
///
/// Streams the archive and bumps the download counters in the background.
pub async fn download(
    State(state): State<ServerState>,
    Path((name, version, filename)): Path<(String, String, String)>,
) -> Response {
    if sanitize_filename(&filename).as_deref() != Some(filename.as_str()) {
        return failure(StatusCode::NOT_FOUND, "File not found");
    }

    let entry = state
        .index
        .read(|index| {
            index
                .packages
                .get(&name)
                .and_then(|package| package.version(&version))
                .and_then(|v| v.file_named(&filename))
                .cloned()
        })
        .await;
    let Some(entry) = entry else {
        return failure(StatusCode::NOT_FOUND, "File not found");
    };

    let path = state.index.storage_path().join(&filename);
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) => {
            tracing::warn!("Indexed file {} unavailable: {}", path.display(), e);
            return failure(StatusCode::NOT_FOUND, "File not found on disk");
        }
    };
    let length = match file.metadata().await {
        Ok(meta) => meta.len(),
        Err(_) => entry.size,
    };

    let index = state.index.clone();
    tokio::spawn(async move {
        if let Err(e) = index.increment_download(&name, &version).await {
            tracing::warn!("Failed to count download of {} {}: {}", name, version, e);
        }
    });

    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
        (header::CONTENT_LENGTH, length.to_string()),
        (
            header::HeaderName::from_static(CHECKSUM_HEADER),
            entry.checksum,
        ),
    ];
    let body = Body::from_stream(ReaderStream::new(file));
    (StatusCode::OK, headers, body).into_response()
}

/// POST /api/v1/upload
///
/// Stores the `package` multipart field under its own file name and
/// triggers a background rescan.
pub async fn upload(
    State(state): State<ServerState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if !authorized(&headers, &state.config) {
        return failure(StatusCode::UNAUTHORIZED, "Invalid token");
    }

    let field = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(UPLOAD_FIELD) => break field,
            Ok(Some(_)) => continue,
            Ok(None) => return failure(StatusCode::BAD_REQUEST, "No package file provided"),
            Err(e) => return failure(e.status(), format!("Failed to parse form: {}", e.body_text())),
        }
    };

    let Some(filename) = field.file_name().and_then(sanitize_filename) else {
        return failure(StatusCode::BAD_REQUEST, "Invalid file name");
    };
    if state.config.matching_format(&filename).is_none() {
        return failure(StatusCode::BAD_REQUEST, "Unsupported file format");
    }

    let storage = state.index.storage_path().to_path_buf();
    if let Err(e) = tokio::fs::create_dir_all(&storage).await {
        tracing::error!("Failed to create {}: {}", storage.display(), e);
        return failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create file");
    }
    let dest = storage.join(&filename);
    let partial = match tempfile::Builder::new()
        .prefix(".upload-")
        .suffix(".part")
        .tempfile_in(&storage)
    {
        Ok(partial) => partial,
        Err(e) => {
            tracing::error!("Failed to create upload file in {}: {}", storage.display(), e);
            return failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create file");
        }
    };
    // Dropping the path removes the partial file on every early return
    let (file, partial_path) = partial.into_parts();

    let size = match write_field(field, tokio::fs::File::from_std(file), &partial_path).await {
        Ok(size) => size,
        Err((status, message)) => return failure(status, message),
    };
    if let Err(e) = partial_path.persist(&dest) {
        tracing::error!("Failed to store {}: {}", dest.display(), e.error);
        return failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save file");
    }

    tracing::info!("Uploaded package: {} ({} bytes)", filename, size);

    let index = state.index.clone();
    tokio::spawn(async move {
        if let Err(e) = index.scan().await {
            tracing::error!("Failed to update index after upload: {}", e);
        }
    });

    ok_with_message(
        StatusCode::CREATED,
        UploadResult { filename, size },
        "Package uploaded successfully",
    )
}

/// Copy a multipart field into `file` at `path`, returning the byte count
async fn write_field(
    mut field: Field<'_>,
    mut file: tokio::fs::File,
    path: &std::path::Path,
) -> Result<u64, (StatusCode, String)> {
    let mut size = 0u64;
    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                size += chunk.len() as u64;
                file.write_all(&chunk).await.map_err(|e| {
                    tracing::error!("Failed to write {}: {}", path.display(), e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to save file".to_string(),
                    )
                })?;
            }
            Ok(None) => break,
            Err(e) => return Err((e.status(), format!("Failed to read upload: {}", e.body_text()))),
        }
    }

    file.flush().await.map_err(|e| {
        tracing::error!("Failed to flush {}: {}", path.display(), e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to save file".to_string(),
        )
    })?;
    Ok(size)
}

/// POST /api/v1/refresh
pub async fn refresh(State(state): State<ServerState>, headers: HeaderMap) -> Response {
    if !authorized(&headers, &state.config) {
        return failure(StatusCode::UNAUTHORIZED, "Invalid token");
    }

    let added = match state.index.scan().await {
        Ok(added) => added,
        Err(e) => {
            return failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to refresh index: {e}"),
            );
        }
    };

    let (total_packages, last_updated) = state
        .index
        .read(|index| (index.packages.len(), index.last_updated))
        .await;
    ok_with_message(
        StatusCode::OK,
        RefreshResult {
            total_packages,
            last_updated,
            added,
        },
        "Index refreshed successfully",
    )
}
