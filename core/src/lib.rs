pub mod core;
pub mod http;
pub mod modules;
pub mod utils;

#[cfg(test)]
mod testing;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

pub use crate::core::engine::{ScanLimits, ScanOrchestrator};
pub use crate::core::events::{timestamp, EventBus, EventStream, LogLevel, ScanEvent};
pub use crate::core::result_aggregator::{ExportRow, ResultAggregator, StatusRecord};
pub use crate::core::state::{progress_percent, JobPhase, JobSnapshot, JobStats};
pub use crate::core::target_manager::{normalize, RootDomain};
pub use crate::core::Classification;
pub use crate::http::{Fetcher, HttpClient};
pub use crate::modules::enumerator::{EnumerationError, Enumerator, SubfinderEnumerator};
pub use crate::modules::prober::{ProbeOutcome, Prober};
pub use crate::utils::read_lines;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Shared scan configuration used by the CLI and any other front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanConfig {
    pub domains: Vec<String>,
    pub list_file: String,
    pub subfinder: String,
    pub timeout: u64,
    pub max_redirects: usize,
    pub max_domains: usize,
    pub probe_concurrency: usize,
    pub user_agent: String,
    pub proxy: String,
    pub accept_invalid_certs: bool,
    pub output: String,
    pub verbose: bool,
    pub dry_run: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            domains: Vec::new(),
            list_file: String::new(),
            subfinder: String::new(),
            timeout: http::client::DEFAULT_TIMEOUT_SECS,
            max_redirects: http::client::DEFAULT_MAX_REDIRECTS,
            max_domains: 0,
            probe_concurrency: 1,
            user_agent: String::new(),
            proxy: String::new(),
            accept_invalid_certs: false,
            output: String::new(),
            verbose: false,
            dry_run: false,
        }
    }
}

impl ScanConfig {
    /// Loads a JSON config file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse { path: display, source })
    }

    /// Raw domains from the list file (if any) followed by `domains`.
    pub fn collect_domains(&self) -> Result<Vec<String>, ConfigError> {
        let mut domains = Vec::new();
        if !self.list_file.is_empty() {
            let lines = read_lines(&self.list_file).map_err(|source| ConfigError::Io {
                path: self.list_file.clone(),
                source,
            })?;
            domains.extend(lines);
        }
        domains.extend(self.domains.iter().cloned());
        Ok(domains)
    }

    pub fn http_options(&self) -> http::client::HttpClientOptions {
        http::client::HttpClientOptions {
            timeout_seconds: self.timeout,
            max_redirects: self.max_redirects,
            proxy: non_empty(&self.proxy).map(str::to_string),
            user_agent: non_empty(&self.user_agent).map(str::to_string),
            accept_invalid_certs: self.accept_invalid_certs,
        }
    }

    pub fn limits(&self) -> ScanLimits {
        ScanLimits {
            max_domains: self.max_domains,
            probe_concurrency: self.probe_concurrency.max(1),
        }
    }

    pub fn subfinder_ref(&self) -> Option<&str> {
        non_empty(&self.subfinder)
    }

    pub fn output_ref(&self) -> Option<&str> {
        non_empty(&self.output)
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() { None } else { Some(s) }
}

/// Output abstraction for scan events.
/// The CLI implements this with colored terminal lines or progress bars.
pub trait ScanEventSink: Send + Sync {
    fn on_log(&self, level: LogLevel, message: &str);
    fn on_domain_initialized(&self, domain: &RootDomain, total: usize);
    fn on_progress(&self, domain: &RootDomain, checked: usize, found: usize);
    fn on_result(&self, domain: &RootDomain, message: &str);
    fn on_status(&self, domain: &RootDomain, code: u16, url: &str, size: u64);

    fn dispatch(&self, event: &ScanEvent) {
        match event {
            ScanEvent::Log { level, message } => self.on_log(*level, message),
            ScanEvent::DomainInitialized { domain, total } => self.on_domain_initialized(domain, *total),
            ScanEvent::ProgressUpdate { domain, checked, found } => self.on_progress(domain, *checked, *found),
            ScanEvent::ResultFound { domain, message } => self.on_result(domain, message),
            ScanEvent::StatusObserved { domain, code, url, size } => self.on_status(domain, *code, url, *size),
        }
    }
}

pub type SinkRef = Arc<dyn ScanEventSink>;

/// Terminal output sink. Progress needs each domain's total, which only
/// arrives with `DomainInitialized`, so totals are remembered here.
#[derive(Default)]
pub struct ConsoleSink {
    totals: std::sync::Mutex<std::collections::HashMap<RootDomain, usize>>,
}

impl ConsoleSink {
    pub fn new_ref() -> SinkRef {
        Arc::new(Self::default())
    }

    fn out(text: &str) {
        use std::io::Write;
        print!("{}\r\n", text);
        std::io::stdout().flush().ok();
    }
}

impl ScanEventSink for ConsoleSink {
    fn on_log(&self, level: LogLevel, message: &str) {
        use colored::*;
        let colored = match level {
            LogLevel::Success => message.green().to_string(),
            LogLevel::Error => message.red().to_string(),
            LogLevel::Warn => message.yellow().to_string(),
            LogLevel::Info => message.to_string(),
        };
        Self::out(&colored);
    }

    fn on_domain_initialized(&self, domain: &RootDomain, total: usize) {
        use colored::*;
        self.totals
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(domain.clone(), total);
        Self::out(&format!(
            "{} [INFO] Subdomains found: {}",
            format!("[{}]", domain).bright_cyan().bold(),
            total
        ));
    }

    fn on_progress(&self, domain: &RootDomain, checked: usize, found: usize) {
        use colored::*;
        let total = self
            .totals
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(domain)
            .copied()
            .unwrap_or(checked);
        Self::out(&format!(
            "{} Checked: {}/{} | 200 OK: {} | Progress: {}%",
            format!("[{}]", domain).bright_cyan(),
            checked,
            total,
            found,
            progress_percent(checked, total)
        ));
    }

    fn on_result(&self, domain: &RootDomain, message: &str) {
        use colored::*;
        Self::out(&format!(
            "{} {} {}",
            format!("[{}]", domain).bright_cyan(),
            "✔".green().bold(),
            message.green()
        ));
    }

    fn on_status(&self, domain: &RootDomain, code: u16, url: &str, size: u64) {
        use colored::*;
        Self::out(&format!(
            "{} {} {} | {} Bytes",
            format!("[{}]", domain).bright_cyan(),
            format!("[{}]", code).yellow(),
            url.white(),
            size.to_string().dimmed()
        ));
    }
}
