// src/scriptlet/mod.rs

//! Lifecycle hook and build command execution
//!
//! Every hook is a shell command line run through `sh -c` with:
//!
//! - The package identity exported as `CRIAGE_PACKAGE_NAME`,
//!   `CRIAGE_PACKAGE_VERSION` and `CRIAGE_INSTALL_PATH`
//! - stdin nulled so an interactive command cannot hang an install
//! - stdout/stderr relayed line by line into the log
//! - A timeout after which the child is killed

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

/// Default timeout for a single hook command
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(300);

/// Default timeout for a build script
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(3600);

pub const ENV_PACKAGE_NAME: &str = "CRIAGE_PACKAGE_NAME";
pub const ENV_PACKAGE_VERSION: &str = "CRIAGE_PACKAGE_VERSION";
pub const ENV_INSTALL_PATH: &str = "CRIAGE_INSTALL_PATH";

/// Runs shell command lines on behalf of one package
#[derive(Debug, Clone)]
pub struct CommandRunner {
    env: BTreeMap<String, String>,
    timeout: Duration,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self {
            env: BTreeMap::new(),
            timeout: DEFAULT_HOOK_TIMEOUT,
        }
    }
}

impl CommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner with the package identity variables set
    pub fn for_package(name: &str, version: &str, install_path: &Path) -> Self {
        Self::new()
            .with_var(ENV_PACKAGE_NAME, name)
            .with_var(ENV_PACKAGE_VERSION, version)
            .with_var(ENV_INSTALL_PATH, install_path.to_string_lossy())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Merge variables over the inherited environment
    pub fn with_env(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Run each command in order, stopping at the first failure
    pub fn run_all(&self, label: &str, commands: &[String], cwd: &Path) -> Result<()> {
        for command in commands {
            self.run(label, command, cwd)?;
        }
        Ok(())
    }

    /// Run one command line, failing on spawn error, non-zero exit or timeout
    pub fn run(&self, label: &str, command: &str, cwd: &Path) -> Result<()> {
        if command.trim().is_empty() {
            return Ok(());
        }

        info!("Running {} command: {}", label, command);
        debug!("Working directory: {}", cwd.display());

        let mut child = shell(command)
            .current_dir(cwd)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::HookExecution(format!("failed to spawn {label} command: {e}")))?;

        let stdout = child.stdout.take().map(|out| relay(label, out, false));
        let stderr = child.stderr.take().map(|err| relay(label, err, true));

        let status = match child.wait_timeout(self.timeout)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                join(stdout);
                join(stderr);
                return Err(Error::HookExecution(format!(
                    "{} command timed out after {} seconds: {}",
                    label,
                    self.timeout.as_secs(),
                    command
                )));
            }
        };
        join(stdout);
        join(stderr);

        if status.success() {
            debug!("{} command completed successfully", label);
            Ok(())
        } else {
            Err(Error::HookExecution(format!(
                "{} command failed with exit code {}: {}",
                label,
                status.code().unwrap_or(-1),
                command
            )))
        }
    }
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(not(unix))]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

fn relay<R: Read + Send + 'static>(label: &str, stream: R, is_stderr: bool) -> JoinHandle<()> {
    let label = label.to_string();
    thread::spawn(move || {
        for line in BufReader::new(stream).lines() {
            let Ok(line) = line else { break };
            if is_stderr {
                warn!("[{}] {}", label, line);
            } else {
                info!("[{}] {}", label, line);
            }
        }
    })
}

fn join(handle: Option<JoinHandle<()>>) {
    if let Some(handle) = handle {
        let _ = handle.join();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_run_success_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let runner = CommandRunner::for_package("demo", "1.2.3", Path::new("/opt/demo"));
        runner
            .run(
                "post_install",
                "echo \"$CRIAGE_PACKAGE_NAME@$CRIAGE_PACKAGE_VERSION:$CRIAGE_INSTALL_PATH\" > out.txt",
                dir.path(),
            )
            .unwrap();

        let out = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(out.trim(), "demo@1.2.3:/opt/demo");
    }

    #[test]
    fn test_non_zero_exit_is_hook_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CommandRunner::new()
            .run("pre_install", "echo boom >&2; exit 3", dir.path())
            .unwrap_err();
        assert!(matches!(err, Error::HookExecution(ref msg) if msg.contains("exit code 3")));
    }

    #[test]
    fn test_run_all_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let commands = vec![
            "touch first".to_string(),
            "false".to_string(),
            "touch third".to_string(),
        ];
        assert!(CommandRunner::new().run_all("hook", &commands, dir.path()).is_err());
        assert!(dir.path().join("first").exists());
        assert!(!dir.path().join("third").exists());
    }

    #[test]
    fn test_timeout_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let err = CommandRunner::new()
            .with_timeout(Duration::from_millis(200))
            .run("hook", "sleep 5", dir.path())
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_build_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = BTreeMap::new();
        env.insert("BUILD_MODE".to_string(), "release".to_string());
        CommandRunner::new()
            .with_env(&env)
            .run("build", "test \"$BUILD_MODE\" = release", dir.path())
            .unwrap();
    }
}
