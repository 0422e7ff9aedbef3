// src/lib.rs

//! criage package manager
//!
//! Package manager and repository server built around self-describing
//! compressed archives.
//!
//! # Architecture
//!
//! - Archives: five container formats (tar+zstd, tar+lz4, tar+xz, tar+gzip,
//!   zip), each carrying an embedded JSON metadata block
//! - Registry: installed packages are rebuilt from `.criage/package.json`
//!   sidecars under each install root, no central database
//! - Manager: one explicit [`manager::PackageManager`] per process drives
//!   install, uninstall, update, build and publish
//! - Repositories: an HTTP catalog with ranked search, served by the
//!   `criage-repo` binary (feature `server`)

pub mod archive;
pub mod config;
mod error;
pub mod hash;
pub mod manager;
pub mod manifest;
pub mod registry;
pub mod repository;
pub mod scriptlet;

#[cfg(feature = "server")]
pub mod server;

pub use error::{Error, Result};
