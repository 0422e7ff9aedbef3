// src/repository/client.rs

//! HTTP client for repository operations
//!
//! Wraps a blocking reqwest client. Requests are not retried: a failure
//! surfaces to the caller, which moves on to the next repository.

use super::{ApiResponse, PackageEntry, PackageSource, RemotePackage, SearchResponse, SearchResult, VersionEntry};
use crate::config::Repository;
use crate::error::{Error, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response, multipart};
use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Byte progress bar for a download, a spinner when the size is unknown
fn download_progress_bar(total_size: u64, label: String) -> ProgressBar {
    if total_size == 0 {
        let pb = ProgressBar::new_spinner();
        pb.set_message(format!("{label} (unknown size)"));
        return pb;
    }

    let pb = ProgressBar::new(total_size);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(label);
    pb
}

/// [`PackageSource`] speaking the repository HTTP API
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("criage/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    fn authorized(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) if !token.is_empty() => request.bearer_auth(token),
            _ => request,
        }
    }

    fn send(&self, request: RequestBuilder, url: &str) -> Result<Response> {
        let response = request
            .send()
            .map_err(|e| Error::Network(format!("failed to reach {url}: {e}")))?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(Error::NotFound(url.to_string())),
            status => Err(Error::Network(format!("HTTP {status} from {url}"))),
        }
    }

    /// GET a JSON envelope and unwrap its `data`
    fn get_data<T: DeserializeOwned>(&self, url: &str, token: Option<&str>) -> Result<T> {
        debug!("GET {}", url);
        let response = self.send(Self::authorized(self.client.get(url), token), url)?;
        let envelope: ApiResponse<T> = response
            .json()
            .map_err(|e| Error::Network(format!("invalid response from {url}: {e}")))?;

        if !envelope.success {
            return Err(Error::Network(
                envelope
                    .error
                    .unwrap_or_else(|| format!("request to {url} failed")),
            ));
        }
        envelope
            .data
            .ok_or_else(|| Error::Network(format!("empty response from {url}")))
    }
}

impl PackageSource for HttpSource {
    fn find(
        &self,
        repo: &Repository,
        name: &str,
        version: Option<&str>,
        os: &str,
        arch: &str,
    ) -> Result<RemotePackage> {
        let base = repo.url.trim_end_matches('/');
        let token = repo.auth_token.as_deref();

        let (entry, author, fallback_description) = match version {
            Some(version) => {
                let url = format!("{base}/packages/{name}/{version}");
                let entry: VersionEntry = self.get_data(&url, token)?;
                (entry, String::new(), String::new())
            }
            None => {
                let url = format!("{base}/packages/{name}");
                let package: PackageEntry = self.get_data(&url, token)?;
                let latest = package.latest().cloned().ok_or_else(|| {
                    Error::NotFound(format!("{name} has no published versions in {}", repo.name))
                })?;
                (latest, package.author, package.description)
            }
        };

        let file = entry.file_for(os, arch).ok_or_else(|| {
            Error::NotFound(format!(
                "{name} {} has no build for {os}/{arch} in {}",
                entry.version, repo.name
            ))
        })?;

        let mut found = RemotePackage::from_entry(repo, name, &entry, file);
        found.author = author;
        if found.description.is_empty() {
            found.description = fallback_description;
        }
        Ok(found)
    }

    /// Stream the archive into a hidden sibling of `dest`, then rename it
    ///
    /// The partial file is dropped on any failure, so `dest` only ever
    /// holds a complete body.
    fn download(&self, package: &RemotePackage, dest: &Path) -> Result<()> {
        info!("Downloading {} to {}", package.download_url, dest.display());

        let parent = dest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let request = Self::authorized(
            self.client.get(&package.download_url),
            package.auth_token.as_deref(),
        );
        let mut response = self.send(request, &package.download_url)?;
        let total_size = response.content_length().unwrap_or(package.size);

        let mut partial = tempfile::Builder::new()
            .prefix(".download-")
            .suffix(".part")
            .tempfile_in(parent)?;
        let progress =
            download_progress_bar(total_size, format!("{} {}", package.name, package.version));
        let copied = io::copy(&mut response, &mut progress.wrap_write(partial.as_file_mut()));
        progress.finish_and_clear();

        let downloaded = copied.map_err(|e| {
            Error::Network(format!("download of {} interrupted: {e}", package.download_url))
        })?;
        partial.as_file().sync_all()?;
        partial.persist(dest).map_err(|e| e.error)?;

        debug!("Downloaded {} bytes to {}", downloaded, dest.display());
        Ok(())
    }

    fn search(&self, repo: &Repository, query: &str) -> Result<Vec<SearchResult>> {
        let base = repo.url.trim_end_matches('/');
        let url = reqwest::Url::parse_with_params(&format!("{base}/search"), &[("q", query)])
            .map_err(|e| Error::Config(format!("invalid repository URL {}: {e}", repo.url)))?;

        let response: SearchResponse = self.get_data(url.as_str(), repo.auth_token.as_deref())?;
        Ok(response
            .results
            .into_iter()
            .map(|mut result| {
                result.repository = repo.name.clone();
                result
            })
            .collect())
    }

    fn upload(
        &self,
        registry_url: &str,
        token: Option<&str>,
        archive: &Path,
        name: &str,
        version: &str,
    ) -> Result<()> {
        let url = format!("{}/upload", registry_url.trim_end_matches('/'));
        info!("Uploading {} to {}", archive.display(), url);

        let form = multipart::Form::new().file("package", archive)?;
        let request = self
            .client
            .post(&url)
            .header("X-Package-Name", name)
            .header("X-Package-Version", version)
            .multipart(form);

        let response = self.send(Self::authorized(request, token), &url)?;
        debug!("Upload accepted with HTTP {}", response.status());
        Ok(())
    }
}
