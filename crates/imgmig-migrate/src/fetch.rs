//! Image downloads from the legacy image host
//!
//! Each legacy row's file lives at `{base}/{relative_path}/{file_name}`. A
//! download either yields the whole body in memory or one of the
//! [`FetchError`] variants; it never panics and never aborts the run.

use async_trait::async_trait;
use imgmig_common::LegacyImageRecord;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::FetchConfig;

/// Why a single image could not be downloaded
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid image URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("failed to fetch image from {url}: {source}")]
    Transport {
        url: String,
        source: reqwest::Error,
    },

    #[error("bad status from {url}: {status}")]
    Status { url: String, status: StatusCode },

    #[error("failed to read image data from {url}: {source}")]
    Body {
        url: String,
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Short label for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::InvalidUrl { .. } => "invalid_url",
            FetchError::Transport { .. } => "transport",
            FetchError::Status { .. } => "status",
            FetchError::Body { .. } => "body",
        }
    }
}

/// Retrieves raw bytes for a URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError>;
}

/// Builds download URLs from legacy rows
#[derive(Debug, Clone)]
pub struct ImageUrlBuilder {
    base: String,
}

impl ImageUrlBuilder {
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let base = base_url.trim().trim_end_matches('/').to_string();
        Url::parse(&base).map_err(|source| FetchError::InvalidUrl {
            url: base.clone(),
            source,
        })?;

        Ok(Self { base })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn build(&self, record: &LegacyImageRecord) -> Result<Url, FetchError> {
        let raw = format!("{}/{}/{}", self.base, record.relative_path, record.file_name);
        Url::parse(&raw).map_err(|source| FetchError::InvalidUrl { url: raw, source })
    }
}

/// GET-only fetcher over one shared HTTP client
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> reqwest::Result<Self> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self::with_client(builder.build()?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        // The response owns the connection; every early return below drops it.
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response.bytes().await.map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })?;

        Ok(body.to_vec())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn record(relative_path: &str, file_name: &str) -> LegacyImageRecord {
        LegacyImageRecord {
            id: 1,
            relative_path: relative_path.to_string(),
            file_name: file_name.to_string(),
            original_file_name: "cat.png".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&FetchConfig {
            base_url: "http://localhost".to_string(),
            timeout_secs: Some(5),
            user_agent: "imgmig-test".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_url_builder_joins_parts() {
        let builder = ImageUrlBuilder::new("https://pic.example.com:8443/i/").unwrap();
        assert_eq!(builder.base(), "https://pic.example.com:8443/i");

        let url = builder.build(&record("2024/09/24", "66f2cbaf9c143.png")).unwrap();
        assert_eq!(url.as_str(), "https://pic.example.com:8443/i/2024/09/24/66f2cbaf9c143.png");
    }

    #[test]
    fn test_url_builder_rejects_relative_base() {
        let err = ImageUrlBuilder::new("pic.example.com/i").unwrap_err();
        assert_eq!(err.kind(), "invalid_url");
    }

    #[tokio::test]
    async fn test_fetch_success_returns_exact_bytes() {
        let server = MockServer::start().await;
        let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();

        Mock::given(method("GET"))
            .and(path("/i/2024/09/24/abc.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/i/2024/09/24/abc.png", server.uri())).unwrap();
        let body = fetcher().fetch(&url).await.unwrap();
        assert_eq!(body, payload);
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/i/missing.png", server.uri())).unwrap();
        let err = fetcher().fetch(&url).await.unwrap_err();

        match err {
            FetchError::Status { status, .. } => assert_eq!(status, StatusCode::NOT_FOUND),
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_server_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/i/busy.png", server.uri())).unwrap();
        let err = fetcher().fetch(&url).await.unwrap_err();
        assert_eq!(err.kind(), "status");
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_fetch_transport_failure() {
        // Bind and release a port so nothing is listening on it.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let url = Url::parse(&format!("http://127.0.0.1:{port}/i/abc.png")).unwrap();
        let err = fetcher().fetch(&url).await.unwrap_err();
        assert_eq!(err.kind(), "transport");
    }

    #[tokio::test]
    async fn test_fetch_truncated_body() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Promise 100 bytes, send 5, then hang up.
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nhello")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });

        let url = Url::parse(&format!("http://{addr}/i/2024/09/24/abc.png")).unwrap();
        let err = fetcher().fetch(&url).await.unwrap_err();

        assert_eq!(err.kind(), "body");
        assert!(matches!(err, FetchError::Body { .. }));
        assert!(err.to_string().contains("/i/2024/09/24/abc.png"));

        server.await.unwrap();
    }
}
