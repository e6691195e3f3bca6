use async_trait::async_trait;
use rand::prelude::IndexedRandom;
use reqwest::{redirect, Client, ClientBuilder, Proxy};
use std::time::Duration;
use url::Url;

use super::{FetchedPage, Fetcher, TransportError};
use crate::ConfigError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 6;
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) \
     Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_0) AppleWebKit/605.1.15 \
     (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
];

/// reqwest-backed [`Fetcher`] used for live probing.
pub struct HttpClient {
    inner: Client,
    user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpClientOptions {
    pub timeout_seconds: u64,
    pub max_redirects: usize,
    pub proxy: Option<String>,
    pub user_agent: Option<String>,
    pub accept_invalid_certs: bool,
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            proxy: None,
            user_agent: None,
            accept_invalid_certs: false,
        }
    }
}

impl HttpClient {
    pub fn new(options: &HttpClientOptions) -> Result<Self, ConfigError> {
        let mut builder = ClientBuilder::new()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .redirect(redirect::Policy::limited(options.max_redirects))
            .danger_accept_invalid_certs(options.accept_invalid_certs);

        // Only an explicitly configured proxy is used, never *_PROXY env vars.
        builder = match options.proxy.as_deref() {
            Some(proxy) => builder.proxy(Proxy::all(proxy).map_err(ConfigError::Client)?),
            None => builder.no_proxy(),
        };

        let inner = builder.build().map_err(ConfigError::Client)?;

        Ok(Self {
            inner,
            user_agent: options.user_agent.clone().filter(|ua| !ua.is_empty()),
        })
    }

    fn pick_user_agent(&self) -> &str {
        if let Some(ua) = self.user_agent.as_deref() {
            return ua;
        }
        let mut rng = rand::rng();
        USER_AGENTS.choose(&mut rng).copied().unwrap_or("Mozilla/5.0")
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn get(&self, url: &str) -> Result<FetchedPage, TransportError> {
        let url = Url::parse(url).map_err(|_| TransportError::InvalidUrl(url.to_string()))?;

        let response = self
            .inner
            .get(url)
            .header(reqwest::header::USER_AGENT, self.pick_user_agent())
            .send()
            .await?;

        let final_url = response.url().clone();
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok(FetchedPage {
            final_url,
            status,
            body_len: body.len() as u64,
        })
    }
}
