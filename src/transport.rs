use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header::HeaderMap, Method};

use crate::{AbortSignal, TransportError};

/// Fully prepared request handed to a [`Transport`].
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// Settled response with its body fully read.
///
/// Cloning is cheap: the body is reference counted, so every resolver call
/// works on its own copy without exhausting a shared stream.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    /// Builds a response with the canonical reason phrase for `status`.
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Bytes>) -> Self {
        let status_text = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or_default()
            .to_owned();
        Self {
            url: url.into(),
            status,
            status_text,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Returns `true` for 2xx statuses.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the `Content-Type` header value, if present and valid UTF-8.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }
}

/// Primitive HTTP send operation wrapped by the orchestrator.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request and returns the settled response.
    ///
    /// When `signal` is present and fires, the call should abandon the
    /// in-flight request and fail with [`TransportError::Aborted`].
    async fn send(
        &self,
        request: HttpRequest,
        signal: Option<AbortSignal>,
    ) -> Result<HttpResponse, TransportError>;

    /// Declares whether [`Transport::send`] observes abort signals.
    ///
    /// The orchestrator only creates cancellation handles for transports
    /// that return `true`.
    fn supports_abort(&self) -> bool {
        false
    }
}

/// Default [`Transport`] backed by `reqwest`.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport").finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing client, keeping its pool and TLS settings.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .http
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let url = response.url().to_string();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(HttpResponse {
            url,
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
            headers,
            body,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: HttpRequest,
        signal: Option<AbortSignal>,
    ) -> Result<HttpResponse, TransportError> {
        match signal {
            Some(signal) => {
                tokio::select! {
                    result = self.fetch(request) => result,
                    _ = signal.aborted() => Err(TransportError::Aborted),
                }
            }
            None => self.fetch(request).await,
        }
    }

    fn supports_abort(&self) -> bool {
        true
    }
}
