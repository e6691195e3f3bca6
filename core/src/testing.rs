//! In-process fakes for the network and process seams.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

use crate::core::target_manager::RootDomain;
use crate::http::{FetchedPage, Fetcher, TransportError};
use crate::modules::enumerator::{EnumerationError, Enumerator};

#[derive(Debug, Clone)]
pub enum Reply {
    Page {
        final_url: String,
        status: u16,
        size: u64,
        delay: Duration,
    },
    Transport,
}

impl Reply {
    pub fn page(final_url: &str, status: u16, size: u64) -> Self {
        Reply::Page { final_url: final_url.to_string(), status, size, delay: Duration::ZERO }
    }

    pub fn delayed(self, delay: Duration) -> Self {
        match self {
            Reply::Page { final_url, status, size, .. } => Reply::Page { final_url, status, size, delay },
            other => other,
        }
    }
}

/// Answers from a fixed URL table; unknown URLs fail at the transport level.
#[derive(Debug, Clone, Default)]
pub struct FakeFetcher {
    replies: HashMap<String, Reply>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, url: &str, reply: Reply) -> Self {
        self.replies.insert(url.to_string(), reply);
        self
    }

    pub fn shared(&self) -> Arc<dyn Fetcher> {
        Arc::new(self.clone())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn get(&self, url: &str) -> Result<FetchedPage, TransportError> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.replies.get(url) {
            Some(Reply::Page { final_url, status, size, delay }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(*delay).await;
                }
                Ok(FetchedPage {
                    final_url: Url::parse(final_url).unwrap(),
                    status: *status,
                    body_len: *size,
                })
            }
            _ => Err(TransportError::InvalidUrl(url.to_string())),
        }
    }
}

/// Returns a fixed candidate list per domain, or a missing-tool failure.
#[derive(Debug, Clone, Default)]
pub struct FakeEnumerator {
    results: HashMap<String, Vec<String>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeEnumerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, domain: &str, candidates: &[&str]) -> Self {
        self.results
            .insert(domain.to_string(), candidates.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn shared(&self) -> Arc<dyn Enumerator> {
        Arc::new(self.clone())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Enumerator for FakeEnumerator {
    async fn enumerate(&self, domain: &RootDomain) -> Result<Vec<String>, EnumerationError> {
        self.calls.lock().unwrap().push(domain.to_string());
        self.results
            .get(domain.as_str())
            .cloned()
            .ok_or_else(|| EnumerationError::ToolNotFound("subfinder".to_string()))
    }
}

pub const FINAL_BODY_LEN: usize = 1024;

/// Plain-HTTP server on `127.0.0.1:<random port>` with fixed routes:
///
/// - `/` and `/final`: 200 (`/final` carries a `FINAL_BODY_LEN` byte body)
/// - `/start`: 301 to `/final`
/// - `/loop`: 302 to itself
/// - anything else: 404
///
/// Connections that do not open with an HTTP request line (a TLS
/// ClientHello, say) are closed without a reply.
pub async fn spawn_http_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(handle_connection(socket));
        }
    });
    addr
}

async fn handle_connection(mut socket: TcpStream) {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        request.extend_from_slice(&chunk[..n]);
        if !request[0].is_ascii_uppercase() {
            return;
        }
        if request.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }

    let request = String::from_utf8_lossy(&request);
    let path = request.split_whitespace().nth(1).unwrap_or("/");
    let response = match path {
        "/" => http_response("200 OK", None, "ok"),
        "/final" => http_response("200 OK", None, &"a".repeat(FINAL_BODY_LEN)),
        "/start" => http_response("301 Moved Permanently", Some("/final"), ""),
        "/loop" => http_response("302 Found", Some("/loop"), ""),
        _ => http_response("404 Not Found", None, "missing"),
    };
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

fn http_response(status: &str, location: Option<&str>, body: &str) -> String {
    let location = location.map(|l| format!("Location: {}\r\n", l)).unwrap_or_default();
    format!(
        "HTTP/1.1 {}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        location,
        body.len(),
        body
    )
}
