pub mod doctor;
mod error;

pub use error::TransportError;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tiller_proto::wire::{Endpoint, Method};
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    /// Device root, e.g. `http://192.168.4.1:5000`
    pub base_url: String,
    /// Optional per-request timeout handed to the HTTP client.
    pub request_timeout_ms: Option<u64>,
}

/// One request/response exchange with the device.
///
/// Implementations never panic on device misbehaviour: network failures,
/// non-success statuses and malformed bodies all come back as
/// [`TransportError`]. No retries happen at this layer.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, endpoint: Endpoint, body: Option<&Value>) -> Result<Value, TransportError>;
}

/// Requests `endpoint` and decodes its body into `T`.
pub async fn fetch<T, X>(transport: &X, endpoint: Endpoint) -> Result<T, TransportError>
where
    T: DeserializeOwned,
    X: Transport + ?Sized,
{
    let body = transport.request(endpoint, None).await?;
    serde_json::from_value(body).map_err(|e| TransportError::Decode {
        endpoint: endpoint.path(),
        message: e.to_string(),
    })
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(cfg: &LinkConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(ms) = cfg.request_timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        let client = builder.build().context("build http client")?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self, endpoint: Endpoint) -> String {
        format!("{}/{}", self.base_url, endpoint.path())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, endpoint: Endpoint, body: Option<&Value>) -> Result<Value, TransportError> {
        let url = self.url(endpoint);
        let start = Instant::now();
        let network = |e: reqwest::Error| TransportError::Network {
            endpoint: endpoint.path(),
            message: e.to_string(),
        };

        let mut req = match endpoint.method() {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(network)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                endpoint: endpoint.path(),
                status: status.as_u16(),
            });
        }
        let bytes = resp.bytes().await.map_err(network)?;
        debug!("link: {} -> {} ({} bytes, {}ms)", endpoint, status, bytes.len(), start.elapsed().as_millis());

        // Command endpoints answer with an empty body
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode {
            endpoint: endpoint.path(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tiller_proto::telemetry::PollRecord;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Answers a single HTTP request with `status_line` and `body`, and hands
    /// back the request head it saw.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut chunk = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = sock.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&chunk[..n]);
            }
            let reply = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            sock.write_all(reply.as_bytes()).await.unwrap();
            sock.shutdown().await.ok();
            let _ = tx.send(String::from_utf8_lossy(&head).into_owned());
        });
        (format!("http://{}", addr), rx)
    }

    fn transport(base_url: String) -> HttpTransport {
        HttpTransport::new(&LinkConfig { base_url, request_timeout_ms: Some(2000) }).unwrap()
    }

    #[test]
    fn url_joins_without_double_slash() {
        let t = transport("http://pilot.local:5000/".into());
        assert_eq!(t.url(Endpoint::Poll), "http://pilot.local:5000/poll");
        assert_eq!(t.url(Endpoint::AdjustCourse(-10)), "http://pilot.local:5000/adjust_course/-10");
    }

    #[tokio::test]
    async fn poll_body_is_decoded() {
        let (url, head) = serve_once("200 OK", r#"{"course":"NAN","heading":"100","clutch_status":"1"}"#).await;
        let rec: PollRecord = fetch(&transport(url), Endpoint::Poll).await.unwrap();
        assert_eq!(rec.course, None);
        assert_eq!(rec.heading, Some(100.0));
        assert!(rec.clutch_status);
        assert!(head.await.unwrap().starts_with("GET /poll HTTP/1.1"));
    }

    #[tokio::test]
    async fn empty_body_is_null() {
        let (url, head) = serve_once("200 OK", "").await;
        let v = transport(url).request(Endpoint::AdjustCourse(10), None).await.unwrap();
        assert_eq!(v, Value::Null);
        assert!(head.await.unwrap().starts_with("GET /adjust_course/+10 HTTP/1.1"));
    }

    #[tokio::test]
    async fn server_error_is_status_error() {
        let (url, _head) = serve_once("500 Internal Server Error", "boom").await;
        let err = transport(url).request(Endpoint::Poll, None).await.unwrap_err();
        assert_eq!(err, TransportError::Status { endpoint: "poll".into(), status: 500 });
    }

    #[tokio::test]
    async fn garbage_body_is_decode_error() {
        let (url, _head) = serve_once("200 OK", "<html>").await;
        let err = transport(url).request(Endpoint::Poll, None).await.unwrap_err();
        assert!(matches!(err, TransportError::Decode { .. }), "{err}");
    }

    #[tokio::test]
    async fn unreachable_device_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = transport(format!("http://{}", addr))
            .request(Endpoint::Poll, Some(&json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Network { .. }), "{err}");
        assert_eq!(err.endpoint(), "poll");
    }
}
