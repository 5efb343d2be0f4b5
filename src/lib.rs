//! `gretch` wraps a primitive HTTP transport with bounded-time execution,
//! policy-driven retry and uniform data/error resolution of the body.
//!
//! A request is started with [`gretch`] (or [`Gretch::request`] on an
//! instance built by [`create`]) and resolved through one of the
//! [`RequestHandle`] resolvers:
//! - [`RequestHandle::json`]
//! - [`RequestHandle::text`]
//! - [`RequestHandle::bytes`]
//! - [`RequestHandle::blob`]
//! - [`RequestHandle::form_data`]
//! - [`RequestHandle::flush`]
//!
//! Resolvers never fail: the outcome is carried by [`GretchResponse`].

mod base_url;
mod client;
mod error;
pub mod merge;
mod options;
mod resolve;
pub mod retry;
pub mod timeout;
mod transport;
mod types;

pub use base_url::normalize_url;
pub use client::{create, gretch, Gretch, RequestHandle};
pub use error::{
    AttemptFailure, BoxError, DecodeError, GretchError, HttpError, HttpTimeout, ResponseError,
    TransportError,
};
pub use merge::{merge, Merge};
pub use options::{
    AfterHook, BeforeHook, GretchOptions, Hooks, RetryOptions, RetrySetting, DEFAULT_TIMEOUT_MS,
};
pub use retry::RetryPolicy;
pub use timeout::{AbortController, AbortSignal, Attempt};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use types::{Blob, Flushed, FormData, GretchResponse, Outcome, ResponseSummary};

pub use reqwest::{header, Method};

pub type Result<T> = std::result::Result<T, GretchError>;
