// src/config.rs

//! Client configuration store
//!
//! The configuration lives in `~/.config/criage/config.yaml` unless
//! `CRIAGE_CONFIG` or `--config` points elsewhere. A default file is written
//! on first use. Keys exposed to `criage config get/set/list` are flat
//! dotted names; anything unknown is kept in the free-form `settings` map.

use crate::archive::ArchiveFormat;
use crate::error::{Error, Result};
use crate::manifest::{COMPRESSION_BEST, COMPRESSION_FAST, COMPRESSION_NORMAL, CompressionConfig};
use crate::registry::Scope;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "CRIAGE_CONFIG";

const CONFIG_DIR: &str = ".config/criage";
const CONFIG_FILE: &str = "config.yaml";
const CACHE_DIR: &str = ".cache/criage";

/// A package repository the client talks to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    /// API base URL, e.g. `https://packages.criage.io/api/v1`
    pub url: String,
    #[serde(default = "default_repo_type", rename = "type")]
    pub repo_type: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

fn default_repo_type() -> String {
    "http".to_string()
}

fn default_true() -> bool {
    true
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub global_path: String,
    pub local_path: String,
    pub cache_path: String,
    pub temp_path: String,
    pub repositories: Vec<Repository>,
    pub compression: CompressionConfig,
    pub parallel: u32,
    /// Network timeout in seconds
    pub timeout: u64,
    pub retry_count: u32,
    pub auto_update: bool,
    pub verify_hashes: bool,
    pub settings: BTreeMap<String, serde_yaml::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            global_path: "/usr/local/lib/criage".to_string(),
            local_path: "./criage_modules".to_string(),
            cache_path: "~/.cache/criage".to_string(),
            temp_path: "/tmp/criage".to_string(),
            repositories: vec![Repository {
                name: "default".to_string(),
                url: "https://packages.criage.io".to_string(),
                repo_type: default_repo_type(),
                priority: 100,
                enabled: true,
                auth_token: None,
                fingerprint: None,
            }],
            compression: CompressionConfig::default(),
            parallel: 4,
            timeout: 60,
            retry_count: 3,
            auto_update: false,
            verify_hashes: true,
            settings: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Enabled repositories, highest priority first
    pub fn enabled_repositories(&self) -> Vec<Repository> {
        let mut repos: Vec<Repository> = self
            .repositories
            .iter()
            .filter(|r| r.enabled)
            .cloned()
            .collect();
        repos.sort_by(|a, b| b.priority.cmp(&a.priority));
        repos
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Loads, queries and persists the client configuration
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Config file location: `$CRIAGE_CONFIG` or `~/.config/criage/config.yaml`
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".to_string()))?;
        Ok(home.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load the config at `path`, writing defaults when it does not exist
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let config: Config = serde_yaml::from_str(&content)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
            debug!("Loaded config from {}", path.display());
            return Ok(Self {
                path: path.to_path_buf(),
                config,
            });
        }

        let mut config = Config::default();
        if let Some(home) = dirs::home_dir() {
            config.cache_path = home.join(CACHE_DIR).to_string_lossy().into_owned();
        }
        config.temp_path = std::env::temp_dir()
            .join("criage")
            .to_string_lossy()
            .into_owned();

        let manager = Self {
            path: path.to_path_buf(),
            config,
        };
        manager.save()?;
        info!("Created default config at {}", path.display());
        Ok(manager)
    }

    /// Wrap an existing config; `save` writes to `path`
    pub fn with_config(path: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Persist the config as YAML
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_yaml::to_string(&self.config)?)?;
        Ok(())
    }

    /// Read a single key
    pub fn get_value(&self, key: &str) -> Result<String> {
        let c = &self.config;
        let value = match key {
            "global_path" => c.global_path.clone(),
            "local_path" => c.local_path.clone(),
            "cache_path" => c.cache_path.clone(),
            "temp_path" => c.temp_path.clone(),
            "compression.format" => c.compression.format.clone(),
            "compression.level" => c.compression.level.to_string(),
            "parallel" => c.parallel.to_string(),
            "timeout" => c.timeout.to_string(),
            "retry_count" => c.retry_count.to_string(),
            "auto_update" => c.auto_update.to_string(),
            "verify_hashes" => c.verify_hashes.to_string(),
            other => match c.settings.get(other) {
                Some(value) => setting_to_string(value),
                None => return Err(Error::Config(format!("config key not found: {other}"))),
            },
        };
        Ok(value)
    }

    /// Set a single key and persist
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let c = &mut self.config;
        match key {
            "global_path" => c.global_path = value.to_string(),
            "local_path" => c.local_path = value.to_string(),
            "cache_path" => c.cache_path = value.to_string(),
            "temp_path" => c.temp_path = value.to_string(),
            "compression.format" => {
                let format = ArchiveFormat::from_name(value).ok_or_else(|| {
                    Error::Config(format!("unknown compression format: {value}"))
                })?;
                c.compression.format = format.name().to_string();
            }
            "compression.level" => {
                c.compression.level = match value {
                    "fast" | "1" => COMPRESSION_FAST,
                    "best" | "9" => COMPRESSION_BEST,
                    _ => COMPRESSION_NORMAL,
                };
            }
            "parallel" => {
                let parallel: u32 = parse_number(key, value)?;
                if !(1..=64).contains(&parallel) {
                    return Err(Error::Config("parallel must be between 1 and 64".to_string()));
                }
                c.parallel = parallel;
            }
            "timeout" => c.timeout = parse_number(key, value)?,
            "retry_count" => c.retry_count = parse_number(key, value)?,
            "auto_update" => c.auto_update = value.eq_ignore_ascii_case("true"),
            "verify_hashes" => c.verify_hashes = value.eq_ignore_ascii_case("true"),
            other => {
                c.settings
                    .insert(other.to_string(), serde_yaml::Value::String(value.to_string()));
            }
        }
        self.save()
    }

    /// All keys and their values, sorted by key
    pub fn list_values(&self) -> BTreeMap<String, String> {
        let mut values = BTreeMap::new();
        for key in [
            "global_path",
            "local_path",
            "cache_path",
            "temp_path",
            "compression.format",
            "compression.level",
            "parallel",
            "timeout",
            "retry_count",
            "auto_update",
            "verify_hashes",
        ] {
            if let Ok(value) = self.get_value(key) {
                values.insert(key.to_string(), value);
            }
        }
        for (key, value) in &self.config.settings {
            values.insert(key.clone(), setting_to_string(value));
        }
        values
    }

    /// Add a repository, replacing one with the same name
    pub fn add_repository(&mut self, name: &str, url: &str, repo_type: &str, priority: i32) -> Result<()> {
        url::Url::parse(url).map_err(|e| Error::Config(format!("invalid repository URL {url}: {e}")))?;

        let repo = Repository {
            name: name.to_string(),
            url: url.trim_end_matches('/').to_string(),
            repo_type: repo_type.to_string(),
            priority,
            enabled: true,
            auth_token: None,
            fingerprint: None,
        };

        match self.config.repositories.iter_mut().find(|r| r.name == name) {
            Some(existing) => *existing = repo,
            None => self.config.repositories.push(repo),
        }
        self.save()
    }

    /// Remove a repository by name
    pub fn remove_repository(&mut self, name: &str) -> Result<()> {
        let before = self.config.repositories.len();
        self.config.repositories.retain(|r| r.name != name);
        if self.config.repositories.len() == before {
            return Err(Error::NotFound(format!("repository {name}")));
        }
        self.save()
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.config.repositories
    }

    /// `<cache>/<name>/<version>`
    pub fn cache_path(&self, name: &str, version: &str) -> PathBuf {
        expand_home(&self.config.cache_path).join(name).join(version)
    }

    pub fn temp_dir(&self) -> PathBuf {
        expand_home(&self.config.temp_path)
    }

    /// Root directory holding all packages of a scope
    pub fn install_root(&self, scope: Scope) -> PathBuf {
        match scope {
            Scope::Global => expand_home(&self.config.global_path),
            Scope::Local => expand_home(&self.config.local_path),
        }
    }

    /// `<root>/<name>`
    pub fn install_path(&self, name: &str, scope: Scope) -> PathBuf {
        self.install_root(scope).join(name)
    }

    /// Create cache, temp and local install directories
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            expand_home(&self.config.cache_path),
            self.temp_dir(),
            self.install_root(Scope::Local),
        ] {
            fs::create_dir_all(&dir).map_err(|e| {
                Error::Config(format!("failed to create directory {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid {key} value: {value}")))
}

fn setting_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (tempfile::TempDir, ConfigManager) {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::load_or_init(&dir.path().join("config.yaml")).unwrap();
        (dir, manager)
    }

    #[test]
    fn test_init_writes_defaults() {
        let (dir, manager) = manager();
        assert!(dir.path().join("config.yaml").exists());
        assert_eq!(manager.config().repositories.len(), 1);
        assert_eq!(manager.config().repositories[0].priority, 100);
        assert_eq!(manager.get_value("compression.format").unwrap(), "tar.zst");
        assert_eq!(manager.get_value("verify_hashes").unwrap(), "true");
    }

    #[test]
    fn test_set_values_persist() {
        let (dir, mut manager) = manager();
        manager.set_value("compression.level", "best").unwrap();
        manager.set_value("parallel", "8").unwrap();
        manager.set_value("auto_update", "TRUE").unwrap();
        manager.set_value("custom.key", "x").unwrap();

        let reloaded = ConfigManager::load_or_init(&dir.path().join("config.yaml")).unwrap();
        assert_eq!(reloaded.get_value("compression.level").unwrap(), "9");
        assert_eq!(reloaded.get_value("parallel").unwrap(), "8");
        assert_eq!(reloaded.get_value("auto_update").unwrap(), "true");
        assert_eq!(reloaded.get_value("custom.key").unwrap(), "x");
        assert!(reloaded.list_values().contains_key("custom.key"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let (_dir, mut manager) = manager();
        assert!(matches!(manager.set_value("parallel", "0"), Err(Error::Config(_))));
        assert!(matches!(manager.set_value("timeout", "soon"), Err(Error::Config(_))));
        assert!(matches!(
            manager.set_value("compression.format", "rar"),
            Err(Error::Config(_))
        ));
        assert!(matches!(manager.get_value("does.not.exist"), Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_level_falls_back_to_normal() {
        let (_dir, mut manager) = manager();
        manager.set_value("compression.level", "7").unwrap();
        assert_eq!(manager.get_value("compression.level").unwrap(), "3");
    }

    #[test]
    fn test_repository_management() {
        let (_dir, mut manager) = manager();
        manager.add_repository("mirror", "http://localhost:8080/api/v1/", "http", 200).unwrap();
        manager.add_repository("mirror", "http://localhost:9090/api/v1", "http", 50).unwrap();
        assert!(manager.add_repository("bad", "not a url", "http", 1).is_err());

        let repos = manager.config().enabled_repositories();
        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0].name, "default");
        assert_eq!(repos[1].url, "http://localhost:9090/api/v1");

        manager.remove_repository("mirror").unwrap();
        assert!(manager.remove_repository("mirror").unwrap_err().is_not_found());
    }

    #[test]
    fn test_expand_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/x"), home.join("x"));
        }
        assert_eq!(expand_home("/abs"), PathBuf::from("/abs"));
    }
}
