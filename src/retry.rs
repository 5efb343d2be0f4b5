use std::{
    collections::{BTreeSet, HashSet},
    future::Future,
    time::Duration,
};

use reqwest::{
    header::{HeaderMap, RETRY_AFTER},
    Method,
};

use crate::{timeout::Attempt, AttemptFailure, RetryOptions};

pub const DEFAULT_ATTEMPTS: u32 = 2;
pub const DEFAULT_CODES: [u16; 3] = [408, 413, 429];
pub const DEFAULT_DELAY_MS: u64 = 6;

/// Fully resolved retry policy for one logical request.
///
/// Each retry builds the next policy value; the caller's value is never
/// mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries still permitted after the next attempt.
    pub attempts: u32,
    /// Retryable statuses in addition to the implicit 500..600 range.
    pub codes: BTreeSet<u16>,
    pub methods: HashSet<Method>,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            codes: DEFAULT_CODES.into_iter().collect(),
            methods: HashSet::from([Method::GET]),
            delay_ms: DEFAULT_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    /// Resolves a partial policy over the defaults, field by field.
    ///
    /// Method names are matched case-insensitively; names that are not valid
    /// HTTP tokens are skipped.
    pub fn from_options(options: &RetryOptions) -> Self {
        let defaults = Self::default();
        Self {
            attempts: options.attempts.unwrap_or(defaults.attempts),
            codes: options
                .codes
                .as_ref()
                .map(|codes| codes.iter().copied().collect())
                .unwrap_or(defaults.codes),
            methods: options
                .methods
                .as_ref()
                .map(|methods| {
                    methods
                        .iter()
                        .filter_map(|method| {
                            let name = method.trim().to_ascii_uppercase();
                            Method::from_bytes(name.as_bytes()).ok()
                        })
                        .collect()
                })
                .unwrap_or(defaults.methods),
            delay_ms: options.delay_ms.unwrap_or(defaults.delay_ms),
        }
    }

    pub fn codes_match(&self, status: u16) -> bool {
        self.codes.contains(&status) || (500..600).contains(&status)
    }

    pub fn methods_match(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    /// Policy for the following attempt: one fewer retry, delay squared.
    pub fn next(&self) -> Self {
        Self {
            attempts: self.attempts.saturating_sub(1),
            codes: self.codes.clone(),
            methods: self.methods.clone(),
            delay_ms: self.delay_ms.saturating_mul(self.delay_ms),
        }
    }

    fn is_retryable(&self, attempt: &Attempt, method: &Method) -> bool {
        let codes_match = match attempt {
            Ok(response) => self.codes_match(response.status),
            Err(AttemptFailure::Transport(_)) => true,
            Err(AttemptFailure::Timeout(_)) => false,
        };
        codes_match && self.methods_match(method)
    }
}

/// Reads an integer-seconds `Retry-After` header.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?;
    let seconds = value.to_str().ok()?.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds))
}

/// Runs `attempt` until it yields a final outcome under `policy`.
///
/// Timeouts are returned immediately. Otherwise an outcome is retried while
/// its status (or transport failure) and `method` both match the policy and
/// retries remain. Attempts are strictly sequential.
pub async fn evaluate<F, Fut>(mut attempt: F, method: &Method, policy: RetryPolicy) -> Attempt
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Attempt>,
{
    let mut policy = policy;
    loop {
        let outcome = attempt().await;

        if matches!(outcome, Err(AttemptFailure::Timeout(_))) {
            return outcome;
        }
        if policy.attempts == 0 || !policy.is_retryable(&outcome, method) {
            return outcome;
        }

        let delay = outcome
            .as_ref()
            .ok()
            .and_then(|response| parse_retry_after(&response.headers))
            .unwrap_or(Duration::from_millis(policy.delay_ms));

        #[cfg(feature = "tracing")]
        tracing::debug!(
            remaining = policy.attempts,
            delay_ms = delay.as_millis() as u64,
            status = outcome.as_ref().ok().map(|response| response.status),
            "retrying request"
        );

        tokio::time::sleep(delay).await;
        policy = policy.next();
    }
}
