use std::fmt;

/// Boxed error returned by user-supplied `before` hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type returned while constructing a request.
///
/// Once a [`RequestHandle`](crate::RequestHandle) exists, failures are only
/// ever reported through the `error` side of a [`GretchResponse`](crate::GretchResponse).
#[derive(Debug, thiserror::Error)]
pub enum GretchError {
    /// A `before` hook rejected the request.
    #[error("before hook failed: {0}")]
    Hook(#[source] BoxError),
    /// The `json` payload could not be serialized.
    #[error("failed to serialize json payload: {0}")]
    Serialize(#[from] serde_json::Error),
    /// A header name or value could not be represented.
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    /// Environment or file configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),
}

/// Failure raised by the underlying transport before a response was received.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection could not be established.
    #[error("connect error: {0}")]
    Connect(String),
    /// Request failed while being sent or awaited.
    #[error("request error: {0}")]
    Request(String),
    /// Response body could not be read.
    #[error("body error: {0}")]
    Body(String),
    /// Request could not be built from the given parts.
    #[error("builder error: {0}")]
    Builder(String),
    /// The in-flight call observed a fired abort signal.
    #[error("request aborted")]
    Aborted,
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();
        if err.is_builder() {
            Self::Builder(message)
        } else if err.is_body() || err.is_decode() {
            Self::Body(message)
        } else if err.is_connect() {
            Self::Connect(message)
        } else {
            Self::Request(message)
        }
    }
}

/// Deadline expiry. The request never completed, so there is no status.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("request timed out: {url}")]
pub struct HttpTimeout {
    pub url: String,
}

/// Non-2xx response whose body was empty and could not serve as the error payload.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("http error {status} {status_text}: {url}")]
pub struct HttpError {
    pub status: u16,
    pub status_text: String,
    pub url: String,
}

/// Failed outcome of a single transport attempt.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AttemptFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Timeout(#[from] HttpTimeout),
}

/// Body could not be materialized in the requested representation.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid json body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("body is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("invalid form body: {0}")]
    Form(String),
}

/// The `error` side of a resolved response.
#[derive(Debug)]
pub enum ResponseError<A> {
    /// Non-2xx response; its body materialized as `A`.
    Body(A),
    /// Non-2xx response with an empty body.
    Http(HttpError),
    /// Deadline exceeded.
    Timeout(HttpTimeout),
    /// Transport failed outright.
    Transport(TransportError),
    /// Body could not be materialized.
    Decode(DecodeError),
}

impl<A> ResponseError<A> {
    /// Returns the materialized error body, if the failure carried one.
    pub fn body(&self) -> Option<&A> {
        match self {
            Self::Body(body) => Some(body),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    pub fn is_http(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}

impl<A> From<AttemptFailure> for ResponseError<A> {
    fn from(failure: AttemptFailure) -> Self {
        match failure {
            AttemptFailure::Transport(err) => Self::Transport(err),
            AttemptFailure::Timeout(err) => Self::Timeout(err),
        }
    }
}

impl<A: fmt::Debug> fmt::Display for ResponseError<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Body(body) => write!(f, "error response body: {body:?}"),
            Self::Http(err) => write!(f, "{err}"),
            Self::Timeout(err) => write!(f, "{err}"),
            Self::Transport(err) => write!(f, "{err}"),
            Self::Decode(err) => write!(f, "{err}"),
        }
    }
}

impl<A: fmt::Debug> std::error::Error for ResponseError<A> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Body(_) => None,
            Self::Http(err) => Some(err),
            Self::Timeout(err) => Some(err),
            Self::Transport(err) => Some(err),
            Self::Decode(err) => Some(err),
        }
    }
}
