use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Method, SyncRequest, SyncResponse, SyncTransport, TransportError};

/// Default server of the public sync service
pub const DEFAULT_SERVER_URL: &str = "https://sync.koreader.rocks";

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 12;

/// `reqwest`-backed transport
#[derive(Clone, Debug)]
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport for the given server root (e.g. "https://sync.example.org")
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("kosync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let base_url: String = base_url.into();
        debug!(base_url = %base_url, "creating HttpTransport");
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TransportError::Timeout
        } else if error.is_builder() {
            TransportError::InvalidRequest(error.to_string())
        } else {
            TransportError::Network(error.to_string())
        }
    }
}

#[async_trait]
impl SyncTransport for HttpTransport {
    #[tracing::instrument(level = "debug", skip(self, request), fields(method = request.method.as_str(), path = %request.path))]
    async fn send(&self, request: SyncRequest) -> Result<SyncResponse, TransportError> {
        let url = self.url(&request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Put => self.client.put(&url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();

        // The status already tells whether the service applied the request
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(status, error = %e, "failed to read response body");
                String::new()
            }
        };
        debug!(status, body_len = body.len(), "response received");

        Ok(SyncResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let transport =
            HttpTransport::new("https://sync.example.org/", Duration::from_secs(5)).unwrap();

        assert_eq!(transport.base_url(), "https://sync.example.org");
        assert_eq!(
            transport.url("/syncs/progress/abc"),
            "https://sync.example.org/syncs/progress/abc"
        );
        assert_eq!(
            transport.url("users/auth"),
            "https://sync.example.org/users/auth"
        );
    }

    #[tokio::test]
    async fn test_truncated_body_keeps_status() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            // Promise more bytes than are sent, then hang up
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nshort")
                .await;
        });

        let transport =
            HttpTransport::new(format!("http://{}", addr), Duration::from_secs(5)).unwrap();
        let response = transport
            .send(SyncRequest::get("/syncs/progress/abc"))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        // Port 9 (discard) on localhost is expected to refuse connections
        let transport = HttpTransport::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let result = transport.send(SyncRequest::get("/users/auth")).await;

        assert!(matches!(
            result,
            Err(TransportError::Network(_)) | Err(TransportError::Timeout)
        ));
    }
}
