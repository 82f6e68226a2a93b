//! Feed retrieval.

use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::error::{BridgeError, Result};

/// Source of raw feed documents.
///
/// An `Err` that [`is_recoverable`](BridgeError::is_recoverable) means "no
/// data this time"; the caller decides when to ask again.
pub trait FeedSource {
    fn fetch(&self) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// One GET per call against a fixed URL, no retries.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    url: String,
}

impl HttpFetcher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ra-state-bridge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl FeedSource for HttpFetcher {
    async fn fetch(&self) -> Result<Vec<u8>> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(BridgeError::HttpStatus {
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await?;
        debug!(url = %self.url, bytes = body.len(), "Feed fetched");
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response, return the URL.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let mut read = 0;
            while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf[read..]).await.unwrap();
                if n == 0 {
                    break;
                }
                read += n;
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: text/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}/cgi-bin/mt_pleasant_26_xml.pl")
    }

    #[tokio::test]
    async fn test_fetch_ok_returns_body() {
        let url = serve_once("200 OK", "<status><telescope>Mt Pleasant 26m</telescope></status>").await;
        let fetcher = HttpFetcher::new(url, Duration::from_secs(5)).unwrap();
        let body = fetcher.fetch().await.unwrap();
        assert_eq!(body, b"<status><telescope>Mt Pleasant 26m</telescope></status>");
    }

    #[tokio::test]
    async fn test_fetch_non_200_is_recoverable() {
        let url = serve_once("503 Service Unavailable", "").await;
        let fetcher = HttpFetcher::new(url, Duration::from_secs(5)).unwrap();
        let err = fetcher.fetch().await.unwrap_err();
        assert!(matches!(err, BridgeError::HttpStatus { status: 503 }));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_recoverable() {
        let url = serve_once("404 Not Found", "missing").await;
        let fetcher = HttpFetcher::new(url, Duration::from_secs(5)).unwrap();
        let err = fetcher.fetch().await.unwrap_err();
        assert!(matches!(err, BridgeError::HttpStatus { status: 404 }));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_connection_refused_is_recoverable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = HttpFetcher::new(format!("http://{addr}/feed"), Duration::from_secs(5)).unwrap();
        let err = fetcher.fetch().await.unwrap_err();
        assert!(matches!(err, BridgeError::Fetch(_)));
        assert!(err.is_recoverable());
    }
}
