//! HTTP transport to the carrier API.
//!
//! A [`Transport`] performs exactly one exchange and reports what happened:
//! a response of any status, or a network-level [`TransportError`]. Retry and
//! status interpretation live in [`crate::client`] and [`crate::translate`].

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde_json::Value;
use thiserror::Error;

use crate::config::{CarrierConfig, ConfigError};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// One outbound call, before it is bound to a base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct CarrierRequest {
    pub method: Method,
    /// Raw path segments; encoded when the URL is built.
    pub segments: Vec<String>,
    pub body: Option<Value>,
    pub request_id: Option<String>,
}

impl CarrierRequest {
    pub fn get<S: Into<String>>(segments: impl IntoIterator<Item = S>) -> Self {
        Self::new(Method::GET, segments, None)
    }

    pub fn post<S: Into<String>>(
        segments: impl IntoIterator<Item = S>,
        body: Option<Value>,
    ) -> Self {
        Self::new(Method::POST, segments, body)
    }

    fn new<S: Into<String>>(
        method: Method,
        segments: impl IntoIterator<Item = S>,
        body: Option<Value>,
    ) -> Self {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            body,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Unencoded path, for logs and assertions.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    /// Resolve against `base`, percent-encoding every segment.
    pub fn url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(&self.segments);
        }
        url
    }
}

/// Raw carrier reply, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct CarrierResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    /// `Retry-After` in seconds, when sent in that form.
    pub retry_after: Option<u64>,
    pub body: Bytes,
}

impl CarrierResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: None,
            retry_after: None,
            body: body.into(),
        }
    }

    /// JSON reply with the given status.
    pub fn json(status: StatusCode, body: &Value) -> Self {
        Self::new(status, body.to_string()).with_content_type("application/json")
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    /// Media type without parameters, lower-cased.
    pub fn media_type(&self) -> Option<String> {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase())
            .filter(|ct| !ct.is_empty())
    }

    /// Whether the body should be read as JSON.
    pub fn is_json(&self) -> bool {
        match self.media_type() {
            Some(media_type) => media_type.ends_with("json"),
            None => self
                .body
                .iter()
                .find(|b| !b.is_ascii_whitespace())
                .is_some_and(|b| *b == b'{' || *b == b'['),
        }
    }

    /// Body as text, lossily decoded.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// What kind of network failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The connection could not be established; nothing was sent.
    Connect,
    Timeout,
    /// The connection broke during the exchange.
    Interrupted,
    /// The request could not be built.
    Invalid,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Interrupted => "interrupted",
            TransportErrorKind::Invalid => "invalid request",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Presumed recoverable by trying again.
    pub fn is_transient(&self) -> bool {
        !matches!(self.kind, TransportErrorKind::Invalid)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        // A connect timeout reports both; nothing was sent, so it counts as connect.
        let kind = if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_builder() {
            TransportErrorKind::Invalid
        } else {
            TransportErrorKind::Interrupted
        };
        Self::new(kind, error_chain(&err))
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// A single carrier exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &CarrierRequest) -> Result<CarrierResponse, TransportError>;
}

/// [`Transport`] over a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(config: &CarrierConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            http: build_http_client(config)?,
            base_url: config.url()?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &CarrierRequest) -> Result<CarrierResponse, TransportError> {
        let url = request.url(&self.base_url);
        tracing::debug!(method = %request.method, %url, "carrier request");

        let mut builder = self.http.request(request.method.clone(), url);
        if let Some(request_id) = &request.request_id {
            builder = builder.header(REQUEST_ID_HEADER, request_id);
        }
        if let Some(body) = &request.body {
            builder = builder.json_logged(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers();
        let content_type = header_str(headers, CONTENT_TYPE).map(str::to_string);
        let retry_after = header_str(headers, RETRY_AFTER).and_then(|v| v.trim().parse().ok());
        let body = response.bytes_logged().await?;

        Ok(CarrierResponse {
            status,
            content_type,
            retry_after,
            body,
        })
    }
}

fn header_str(headers: &HeaderMap, name: HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Build the pooled HTTP client: credential, default headers, timeout, proxy.
pub fn build_http_client(config: &CarrierConfig) -> Result<Client, ConfigError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let (name, value) = config.credential_header();
    let mut credential = HeaderValue::from_str(&value).map_err(|_| ConfigError::Invalid {
        key: crate::config::ENV_API_KEY,
        value: "<redacted>".to_string(),
        reason: "not a valid header value".to_string(),
    })?;
    credential.set_sensitive(true);
    headers.insert(name, credential);

    for (key, value) in config.headers() {
        let invalid = |reason: &str| ConfigError::Invalid {
            key: "header",
            value: key.clone(),
            reason: reason.to_string(),
        };
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| invalid("bad header name"))?;
        let value = HeaderValue::from_str(value).map_err(|_| invalid("bad header value"))?;
        headers.insert(name, value);
    }

    let mut builder = Client::builder()
        .user_agent(concat!("cargoboard/", env!("CARGO_PKG_VERSION")))
        .default_headers(headers)
        .timeout(config.timeout());

    if let Some(proxy_url) = config.proxy() {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
    }

    Ok(builder.build()?)
}

/// Extension trait for RequestBuilder that logs request body.
pub trait RequestBuilderExt {
    /// Set JSON request body and log it. Returns the RequestBuilder for chaining.
    fn json_logged<T: serde::Serialize + ?Sized>(self, json: &T) -> Self;
}

impl RequestBuilderExt for RequestBuilder {
    fn json_logged<T: serde::Serialize + ?Sized>(self, json: &T) -> Self {
        if let Ok(req_body) = serde_json::to_string_pretty(json) {
            tracing::debug!("carrier request body ({} bytes):\n{}", req_body.len(), req_body);
        }

        self.json(json)
    }
}

/// Extension trait for Response that logs response body.
#[async_trait]
pub trait ResponseExt {
    /// Read the whole body and log it when it is text. Consumes the response.
    async fn bytes_logged(self) -> Result<Bytes, reqwest::Error>;
}

#[async_trait]
impl ResponseExt for reqwest::Response {
    async fn bytes_logged(self) -> Result<Bytes, reqwest::Error> {
        let status = self.status();
        let bytes = self.bytes().await?;

        match std::str::from_utf8(&bytes) {
            Ok(text) => {
                tracing::debug!(%status, "carrier response ({} bytes):\n{}", text.len(), text)
            }
            Err(_) => tracing::debug!(%status, "carrier response ({} bytes, binary)", bytes.len()),
        }

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn segments_are_encoded_under_the_base_path() {
        let base = Url::parse("https://api.cargoboard.test/v1").unwrap();
        let request = CarrierRequest::post(["orders", "A/B 7", "labels"], None);

        assert_eq!(
            request.url(&base).as_str(),
            "https://api.cargoboard.test/v1/orders/A%2FB%207/labels"
        );
        assert_eq!(request.path(), "/orders/A/B 7/labels");
    }

    #[test]
    fn json_detection_uses_content_type_then_body() {
        let typed = CarrierResponse::json(StatusCode::OK, &json!({"id": 1}));
        assert!(typed.is_json());

        let problem = CarrierResponse::new(StatusCode::BAD_REQUEST, "{}")
            .with_content_type("application/problem+json; charset=utf-8");
        assert!(problem.is_json());

        let pdf =
            CarrierResponse::new(StatusCode::OK, "%PDF-1.7").with_content_type("application/pdf");
        assert!(!pdf.is_json());

        let untyped = CarrierResponse::new(StatusCode::OK, "  [1]");
        assert!(untyped.is_json());
    }

    #[test]
    fn only_unbuildable_requests_are_permanent() {
        assert!(TransportError::new(TransportErrorKind::Connect, "refused").is_transient());
        assert!(TransportError::new(TransportErrorKind::Timeout, "slow").is_transient());
        assert!(TransportError::new(TransportErrorKind::Interrupted, "reset").is_transient());
        assert!(!TransportError::new(TransportErrorKind::Invalid, "bad").is_transient());
    }
}
