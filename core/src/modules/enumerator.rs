use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use log::debug;
use thiserror::Error;
use tokio::process::Command;

use crate::core::target_manager::RootDomain;
use crate::utils;

pub const SUBFINDER: &str = "subfinder";

#[derive(Debug, Error)]
pub enum EnumerationError {
    #[error("'{0}' binary not found")]
    ToolNotFound(String),
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with {status}: {stderr}")]
    NonZeroExit {
        tool: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Discovers candidate hostnames for one root domain.
#[async_trait]
pub trait Enumerator: Send + Sync {
    async fn enumerate(&self, domain: &RootDomain) -> Result<Vec<String>, EnumerationError>;
}

/// Runs `subfinder -d <domain> -silent` and reads hostnames from stdout.
#[derive(Debug, Clone, Default)]
pub struct SubfinderEnumerator {
    binary: Option<PathBuf>,
}

impl SubfinderEnumerator {
    /// Resolves the binary lazily on every call (`./tools`, cwd, `PATH`).
    pub fn new() -> Self {
        Self { binary: None }
    }

    pub fn with_binary(path: impl Into<PathBuf>) -> Self {
        Self { binary: Some(path.into()) }
    }

    fn resolve_binary(&self) -> Result<PathBuf, EnumerationError> {
        match &self.binary {
            Some(path) => Ok(path.clone()),
            None => utils::get_binary_path(SUBFINDER)
                .map(PathBuf::from)
                .ok_or_else(|| EnumerationError::ToolNotFound(SUBFINDER.to_string())),
        }
    }
}

#[async_trait]
impl Enumerator for SubfinderEnumerator {
    async fn enumerate(&self, domain: &RootDomain) -> Result<Vec<String>, EnumerationError> {
        let binary = self.resolve_binary()?;
        let tool = binary.to_string_lossy().to_string();
        debug!("running {} -d {} -silent", tool, domain);

        let output = Command::new(&binary)
            .args(["-d", domain.as_str(), "-silent"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| match source.kind() {
                std::io::ErrorKind::NotFound => EnumerationError::ToolNotFound(tool.clone()),
                _ => EnumerationError::Spawn { tool: tool.clone(), source },
            })?;

        if !output.status.success() {
            return Err(EnumerationError::NonZeroExit {
                tool,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let candidates = parse_hostnames(&String::from_utf8_lossy(&output.stdout));
        debug!("{} returned {} unique hostname(s) for {}", tool, candidates.len(), domain);
        Ok(candidates)
    }
}

/// Splits tool output into unique, non-empty hostnames, keeping first-seen order.
pub fn parse_hostnames(stdout: &str) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(*line))
        .map(str::to_string)
        .collect()
}
