use std::{future::Future, time::Duration};

use tokio::sync::watch;

use crate::{transport::HttpResponse, AttemptFailure, HttpTimeout, TransportError};

/// Outcome of one transport call after its deadline race.
pub type Attempt = Result<HttpResponse, AttemptFailure>;

/// Owning side of a cancellation handle.
///
/// Once aborted it stays aborted; a fresh controller is needed for any
/// later attempt.
#[derive(Debug)]
pub struct AbortController {
    tx: watch::Sender<bool>,
}

/// Observer side of an [`AbortController`], handed to the transport.
#[derive(Clone, Debug)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortController {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }

    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the controller fires.
    ///
    /// Pends forever if the controller is dropped without aborting.
    pub async fn aborted(mut self) {
        if self.rx.wait_for(|aborted| *aborted).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Races `attempt` against `deadline`.
///
/// If the transport settles first its outcome is returned unchanged. If the
/// deadline fires first, `controller` is aborted (when present) and the
/// attempt resolves to [`AttemptFailure::Timeout`]. A `None` deadline awaits
/// the transport directly with no timer.
pub async fn with_timeout<F>(
    url: &str,
    attempt: F,
    deadline: Option<Duration>,
    controller: Option<&AbortController>,
) -> Attempt
where
    F: Future<Output = Result<HttpResponse, TransportError>>,
{
    let Some(deadline) = deadline else {
        return attempt.await.map_err(AttemptFailure::from);
    };

    match tokio::time::timeout(deadline, attempt).await {
        Ok(settled) => settled.map_err(AttemptFailure::from),
        Err(_) => {
            #[cfg(feature = "tracing")]
            tracing::debug!(url, deadline_ms = deadline.as_millis() as u64, "request deadline fired");

            if let Some(controller) = controller {
                controller.abort();
            }
            Err(AttemptFailure::Timeout(HttpTimeout {
                url: url.to_owned(),
            }))
        }
    }
}
