//! Request/response types and the HTTP network backend.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use reqwest::Client;
use tracing::{debug, trace};
use url::Url;

use crate::error::{Result, ServiceWorkerError};
use crate::platform::Network;

/// A request the agent is asked to mediate.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl Request {
    /// Create a GET request.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

/// A response handed back to the page.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: StatusCode,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    /// Create a response with the canonical status text.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// The fixed 503 returned when the network call fails.
    pub fn service_unavailable(body: &str) -> Self {
        let mut response = Self::new(StatusCode::SERVICE_UNAVAILABLE, body.to_owned());
        response.status_text = "Service Unavailable".to_string();
        response.headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }

    /// Whether the status is 2xx.
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// [`Network`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: Client,
}

impl HttpNetwork {
    /// Create a backend with a per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("olxmon-sw/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServiceWorkerError::network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        trace!(url = %request.url, method = %request.method, "Sending request");

        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ServiceWorkerError::network(e.to_string()))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| ServiceWorkerError::network(e.to_string()))?;

        debug!(url = %request.url, status = status.as_u16(), bytes = body.len(), "Response received");

        Ok(Response {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_unavailable() {
        let response = Response::service_unavailable("Offline - conecte à internet");
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.status_text, "Service Unavailable");
        assert_eq!(response.text(), "Offline - conecte à internet");
        assert!(!response.ok());
    }

    #[test]
    fn test_response_ok() {
        assert!(Response::new(StatusCode::OK, "").ok());
        assert!(Response::new(StatusCode::NO_CONTENT, "").ok());
        assert!(!Response::new(StatusCode::NOT_FOUND, "").ok());
    }

    #[test]
    fn test_get_request_defaults() {
        let request = Request::get(Url::parse("http://localhost:8080/").unwrap());
        assert_eq!(request.method, Method::GET);
        assert!(request.headers.is_empty());
        assert!(request.body.is_none());
    }

    #[tokio::test]
    async fn test_http_network_unreachable_host_errors() {
        let network = HttpNetwork::new(Duration::from_secs(2)).unwrap();
        let url = Url::parse("http://127.0.0.1:9/unreachable").unwrap();
        let err = network.fetch(&Request::get(url)).await.unwrap_err();
        assert_eq!(err.category(), "network");
    }
}
