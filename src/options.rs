use std::{fmt, sync::Arc, time::Duration};

use bytes::Bytes;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Method,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{BoxError, GretchError, HttpRequest, ResponseSummary, RetryPolicy};

/// Deadline applied when no `timeout_ms` is configured.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Hook run synchronously before the transport is first invoked.
///
/// Returning an error aborts request construction.
pub type BeforeHook =
    Arc<dyn Fn(&HttpRequest, &GretchOptions) -> Result<(), BoxError> + Send + Sync>;

/// Hook run after a resolver call has assembled its result.
pub type AfterHook = Arc<dyn Fn(&ResponseSummary<'_>, &GretchOptions) + Send + Sync>;

/// Partial retry policy; unset fields fall back to the defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    pub attempts: Option<u32>,
    pub codes: Option<Vec<u16>>,
    pub methods: Option<Vec<String>>,
    #[serde(alias = "delay")]
    pub delay_ms: Option<u64>,
}

impl RetryOptions {
    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    pub fn codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.codes = Some(codes.into_iter().collect());
        self
    }

    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = Some(methods.into_iter().map(Into::into).collect());
        self
    }

    pub fn delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }
}

/// The `retry` option: explicitly off, or a partial policy.
///
/// In plain data `false` disables retry, `true` selects the default policy
/// and an object is read as [`RetryOptions`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetrySetting {
    Disabled,
    Policy(RetryOptions),
}

impl From<RetryOptions> for RetrySetting {
    fn from(options: RetryOptions) -> Self {
        Self::Policy(options)
    }
}

impl From<bool> for RetrySetting {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::Policy(RetryOptions::default())
        } else {
            Self::Disabled
        }
    }
}

impl Serialize for RetrySetting {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Disabled => serializer.serialize_bool(false),
            Self::Policy(options) => options.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for RetrySetting {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Policy(RetryOptions),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Flag(enabled) => Self::from(enabled),
            Raw::Policy(options) => Self::Policy(options),
        })
    }
}

/// Lifecycle hooks; each slot fires in registration order.
#[derive(Clone, Default)]
pub struct Hooks {
    pub before: Vec<BeforeHook>,
    pub after: Vec<AfterHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .finish()
    }
}

impl Hooks {
    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&HttpRequest, &GretchOptions) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.before.push(Arc::new(hook));
        self
    }

    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ResponseSummary<'_>, &GretchOptions) + Send + Sync + 'static,
    {
        self.after.push(Arc::new(hook));
        self
    }
}

/// Per-call or per-instance request configuration.
///
/// Every field is optional so that call options can be layered over
/// instance defaults with [`merge`](crate::merge()).
#[derive(Clone, Debug, Default)]
pub struct GretchOptions {
    pub method: Option<Method>,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    /// Serialized into the body with `Content-Type: application/json`.
    /// Takes precedence over `body`.
    pub json: Option<serde_json::Value>,
    /// Deadline per attempt in milliseconds. `Some(0)` disables it.
    pub timeout_ms: Option<u64>,
    pub retry: Option<RetrySetting>,
    pub hooks: Hooks,
    pub base_url: Option<String>,
    /// Free-form values carried to hooks and deep-merged like the rest.
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GretchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Adds a header, replacing any value with the same (case-insensitive) name.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, GretchError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| GretchError::InvalidHeader(format!("{name}: {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| GretchError::InvalidHeader(format!("{name}: {err}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn json(mut self, json: serde_json::Value) -> Self {
        self.json = Some(json);
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn retry(mut self, retry: impl Into<RetrySetting>) -> Self {
        self.retry = Some(retry.into());
        self
    }

    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Effective deadline; `None` when disabled.
    pub fn deadline(&self) -> Option<Duration> {
        match self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Effective retry policy; `None` when retry is disabled.
    pub fn retry_policy(&self) -> Option<RetryPolicy> {
        match &self.retry {
            Some(RetrySetting::Disabled) => None,
            Some(RetrySetting::Policy(options)) => Some(RetryPolicy::from_options(options)),
            None => Some(RetryPolicy::default()),
        }
    }

    /// Reads instance defaults from the environment.
    ///
    /// Reads (all optional):
    /// - `GRETCH_BASE_URL`
    /// - `GRETCH_TIMEOUT_MS`
    /// - `GRETCH_RETRY_ATTEMPTS`
    /// - `GRETCH_RETRY_DELAY_MS`
    pub fn from_env() -> Result<Self, GretchError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, GretchError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();

        if let Some(base_url) = lookup("GRETCH_BASE_URL").filter(|v| !v.trim().is_empty()) {
            options.base_url = Some(base_url.trim().to_owned());
        }
        options.timeout_ms = parse_number(&lookup, "GRETCH_TIMEOUT_MS")?;

        let attempts = parse_number(&lookup, "GRETCH_RETRY_ATTEMPTS")?;
        let delay_ms = parse_number(&lookup, "GRETCH_RETRY_DELAY_MS")?;
        if attempts.is_some() || delay_ms.is_some() {
            let attempts = attempts
                .map(u32::try_from)
                .transpose()
                .map_err(|_| GretchError::Config("GRETCH_RETRY_ATTEMPTS is too large".to_owned()))?;
            options.retry = Some(RetrySetting::Policy(RetryOptions {
                attempts,
                delay_ms,
                ..RetryOptions::default()
            }));
        }

        Ok(options)
    }
}

fn parse_number<F>(lookup: &F, key: &str) -> Result<Option<u64>, GretchError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|err| GretchError::Config(format!("{key} must be an integer: {err}"))),
    }
}
