use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::{
    timeout::Attempt, Blob, DecodeError, Flushed, FormData, GretchOptions, GretchResponse,
    HttpError, HttpResponse, Outcome, ResponseError,
};

/// Status reported when no usable response was received.
pub const FALLBACK_STATUS: u16 = 500;

const NO_CONTENT: u16 = 204;

/// Materializes a body in one representation. `Ok(None)` means the body
/// was empty.
pub(crate) type Materializer<T> = fn(&HttpResponse) -> Result<Option<T>, DecodeError>;

pub(crate) fn json<T>(response: &HttpResponse) -> Result<Option<T>, DecodeError>
where
    T: DeserializeOwned,
{
    if response.body.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(&response.body)?))
}

pub(crate) fn text(response: &HttpResponse) -> Result<Option<String>, DecodeError> {
    if response.body.is_empty() {
        return Ok(None);
    }
    Ok(Some(String::from_utf8(response.body.to_vec())?))
}

pub(crate) fn bytes(response: &HttpResponse) -> Result<Option<Bytes>, DecodeError> {
    Ok((!response.body.is_empty()).then(|| response.body.clone()))
}

pub(crate) fn blob(response: &HttpResponse) -> Result<Option<Blob>, DecodeError> {
    Ok((!response.body.is_empty()).then(|| Blob {
        content_type: response.content_type().map(str::to_owned),
        bytes: response.body.clone(),
    }))
}

pub(crate) fn form_data(response: &HttpResponse) -> Result<Option<FormData>, DecodeError> {
    if response.body.is_empty() {
        return Ok(None);
    }
    let Some(content_type) = response.content_type() else {
        return Err(DecodeError::Form("missing content type".to_owned()));
    };
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    if !essence.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
        return Err(DecodeError::Form(format!(
            "unsupported content type '{content_type}'"
        )));
    }

    let pairs = ::url::form_urlencoded::parse(&response.body)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    Ok(Some(FormData(pairs)))
}

/// Classifies a settled attempt and runs the `after` hooks on the result.
pub(crate) fn resolve<T, A>(
    settled: Attempt,
    url: &str,
    options: &GretchOptions,
    on_success: Materializer<T>,
    on_failure: Materializer<A>,
) -> GretchResponse<T, A> {
    let result = classify(settled, url, on_success, on_failure);
    let summary = result.summary();
    for hook in &options.hooks.after {
        hook(&summary, options);
    }
    result
}

fn classify<T, A>(
    settled: Attempt,
    url: &str,
    on_success: Materializer<T>,
    on_failure: Materializer<A>,
) -> GretchResponse<T, A> {
    let response = match settled {
        Ok(response) => response,
        Err(failure) => {
            return GretchResponse {
                url: url.to_owned(),
                status: FALLBACK_STATUS,
                response: None,
                outcome: Outcome::Error(failure.into()),
            }
        }
    };

    let status = match response.status {
        0 => FALLBACK_STATUS,
        status => status,
    };

    let outcome = if status == NO_CONTENT {
        Outcome::Empty
    } else if (200..300).contains(&status) {
        match on_success(&response) {
            Ok(Some(data)) => Outcome::Data(data),
            Ok(None) => Outcome::Empty,
            Err(err) => Outcome::Error(ResponseError::Decode(err)),
        }
    } else {
        match on_failure(&response) {
            Ok(Some(body)) => Outcome::Error(ResponseError::Body(body)),
            Ok(None) => Outcome::Error(ResponseError::Http(HttpError {
                status,
                status_text: response.status_text.clone(),
                url: url.to_owned(),
            })),
            Err(err) => Outcome::Error(ResponseError::Decode(err)),
        }
    };

    GretchResponse {
        url: url.to_owned(),
        status,
        response: Some(response),
        outcome,
    }
}

pub(crate) fn flush(settled: Attempt, url: &str) -> Flushed {
    match settled {
        Ok(response) => Flushed {
            url: url.to_owned(),
            status: match response.status {
                0 => FALLBACK_STATUS,
                status => status,
            },
            response: Some(response),
        },
        Err(_) => Flushed {
            url: url.to_owned(),
            status: FALLBACK_STATUS,
            response: None,
        },
    }
}
