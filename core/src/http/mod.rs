pub mod client;

pub use client::HttpClient;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// A completed HTTP exchange after redirects were followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub final_url: Url,
    pub status: u16,
    pub body_len: u64,
}

/// The request never produced a complete HTTP response: connection, TLS,
/// timeout, redirect-loop or body-read failure.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid url '{0}'")]
    InvalidUrl(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Issues a single GET with redirect following.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchedPage, TransportError>;
}
