use std::sync::Arc;

use log::debug;
use serde::Serialize;

use crate::core::Classification;
use crate::http::{FetchedPage, Fetcher};

/// Schemes in the order they are attempted.
pub const SCHEMES: [&str; 2] = ["https://", "http://"];

/// Result of probing one candidate hostname.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeOutcome {
    /// Final URL after redirects, or the bare candidate when unreachable.
    pub url: String,
    pub status: Option<u16>,
    pub size: u64,
    pub classification: Classification,
}

impl ProbeOutcome {
    fn from_page(page: FetchedPage) -> Self {
        Self {
            url: page.final_url.to_string(),
            status: Some(page.status),
            size: page.body_len,
            classification: Classification::from_status(Some(page.status)),
        }
    }

    fn unreachable(candidate: &str) -> Self {
        Self {
            url: candidate.to_string(),
            status: None,
            size: 0,
            classification: Classification::Unreachable,
        }
    }

    pub fn is_success(&self) -> bool {
        self.classification == Classification::Success
    }

    /// `"<url> [200] | <size> Bytes"` for a successful probe, `None` otherwise.
    pub fn summary(&self) -> Option<String> {
        match (self.classification, self.status) {
            (Classification::Success, Some(code)) => {
                Some(format!("{} [{}] | {} Bytes", self.url, code, self.size))
            }
            _ => None,
        }
    }
}

/// HTTPS-first prober with HTTP fallback on transport failure.
///
/// The first scheme that yields any HTTP response decides the outcome, so a
/// 404 over HTTPS is final and HTTP is never tried for it.
#[derive(Clone)]
pub struct Prober {
    fetcher: Arc<dyn Fetcher>,
}

impl Prober {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    pub async fn probe(&self, candidate: &str) -> ProbeOutcome {
        for scheme in SCHEMES {
            let url = format!("{}{}", scheme, candidate);
            match self.fetcher.get(&url).await {
                Ok(page) => {
                    debug!("{} -> {} [{}]", url, page.final_url, page.status);
                    return ProbeOutcome::from_page(page);
                }
                Err(e) => {
                    debug!("{} failed: {}", url, e);
                }
            }
        }
        ProbeOutcome::unreachable(candidate)
    }
}
