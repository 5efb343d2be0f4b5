use bytes::Bytes;

use crate::{HttpResponse, ResponseError};

/// Classified body of a resolved response.
#[derive(Debug)]
pub enum Outcome<T, A> {
    /// 2xx response with a materialized body.
    Data(T),
    /// Anything else: non-2xx, timeout, transport or decode failure.
    Error(ResponseError<A>),
    /// 204, or a 2xx response with nothing to materialize.
    Empty,
}

/// Terminal value of a resolver call.
///
/// Exactly one of [`data`](Self::data) and [`error`](Self::error) is
/// populated, except for [`Outcome::Empty`] where neither is.
#[derive(Debug)]
pub struct GretchResponse<T, A> {
    pub url: String,
    /// Response status, or 500 when no response was received.
    pub status: u16,
    pub response: Option<HttpResponse>,
    pub outcome: Outcome<T, A>,
}

impl<T, A> GretchResponse<T, A> {
    pub fn data(&self) -> Option<&T> {
        match &self.outcome {
            Outcome::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ResponseError<A>> {
        match &self.outcome {
            Outcome::Error(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }

    /// Converts into a `Result`; [`Outcome::Empty`] becomes `Ok(None)`.
    pub fn into_result(self) -> Result<Option<T>, ResponseError<A>> {
        match self.outcome {
            Outcome::Data(data) => Ok(Some(data)),
            Outcome::Empty => Ok(None),
            Outcome::Error(error) => Err(error),
        }
    }

    pub(crate) fn summary(&self) -> ResponseSummary<'_> {
        ResponseSummary {
            url: &self.url,
            status: self.status,
            response: self.response.as_ref(),
            has_data: matches!(self.outcome, Outcome::Data(_)),
            has_error: self.is_error(),
        }
    }
}

/// Status metadata returned by `flush`, without touching the body.
#[derive(Clone, Debug)]
pub struct Flushed {
    pub url: String,
    pub status: u16,
    pub response: Option<HttpResponse>,
}

/// Raw body together with its declared content type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl Blob {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Decoded `application/x-www-form-urlencoded` body, in wire order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormData(pub Vec<(String, String)>);

impl FormData {
    /// Returns the first value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Type-erased view of a resolved response passed to `after` hooks.
#[derive(Clone, Copy, Debug)]
pub struct ResponseSummary<'a> {
    pub url: &'a str,
    pub status: u16,
    pub response: Option<&'a HttpResponse>,
    pub has_data: bool,
    pub has_error: bool,
}
