use std::{fmt, sync::Arc};

use bytes::Bytes;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use reqwest::{
    header::{HeaderValue, CONTENT_TYPE},
    Method,
};
use serde::de::DeserializeOwned;

use crate::{
    base_url::normalize_url,
    merge::Merge,
    resolve::{self, Materializer},
    retry::evaluate,
    timeout::{with_timeout, AbortController, Attempt},
    Blob, Flushed, FormData, GretchError, GretchOptions, GretchResponse, HttpRequest,
    ReqwestTransport, Result, Transport,
};

#[derive(Clone)]
/// Request orchestrator holding a transport and instance defaults.
pub struct Gretch {
    transport: Arc<dyn Transport>,
    defaults: GretchOptions,
}

impl fmt::Debug for Gretch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gretch")
            .field("supports_abort", &self.transport.supports_abort())
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl Default for Gretch {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates an instance whose defaults are merged under every call's options.
pub fn create(defaults: GretchOptions) -> Gretch {
    Gretch::create(defaults)
}

/// Starts a request on a default instance backed by `reqwest`.
pub fn gretch(url: &str, options: GretchOptions) -> Result<RequestHandle> {
    Gretch::new().request(url, options)
}

impl Gretch {
    /// Creates an instance with no defaults.
    pub fn new() -> Self {
        Self::create(GretchOptions::default())
    }

    /// Creates an instance with the given defaults.
    pub fn create(defaults: GretchOptions) -> Self {
        Self {
            transport: Arc::new(ReqwestTransport::new()),
            defaults,
        }
    }

    /// Creates an instance with defaults read from `GRETCH_*` environment
    /// variables. See [`GretchOptions::from_env`].
    pub fn from_env() -> Result<Self> {
        Ok(Self::create(GretchOptions::from_env()?))
    }

    /// Replaces the transport used for every attempt.
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    pub fn defaults(&self) -> &GretchOptions {
        &self.defaults
    }

    /// Prepares and starts one logical request.
    ///
    /// `before` hooks run synchronously here, strictly before the transport
    /// is invoked; a failing hook is returned as [`GretchError::Hook`] and
    /// nothing is sent. Inside a tokio runtime the attempt pipeline starts
    /// immediately, otherwise on the first resolver call. Either way every
    /// resolver on the returned handle shares the same attempt sequence.
    pub fn request(&self, url: &str, options: GretchOptions) -> Result<RequestHandle> {
        let mut options = self.defaults.merge(&options);
        let url = normalize_url(url, options.base_url.as_deref());
        let method = options.method.clone().unwrap_or(Method::GET);

        if let Some(json) = &options.json {
            let body = Bytes::from(serde_json::to_vec(json)?);
            options
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            options.body = Some(body);
        }

        let request = HttpRequest {
            method: method.clone(),
            url: url.clone(),
            headers: options.headers.clone(),
            body: options.body.clone(),
        };

        for hook in &options.hooks.before {
            hook(&request, &options).map_err(GretchError::Hook)?;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(method = %method, url = %url, "dispatching request");

        let pipeline = self.pipeline(request, &options);
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(pipeline.clone());
        }

        Ok(RequestHandle {
            url,
            options: Arc::new(options),
            pipeline,
        })
    }

    fn pipeline(
        &self,
        request: HttpRequest,
        options: &GretchOptions,
    ) -> Shared<BoxFuture<'static, Attempt>> {
        let transport = Arc::clone(&self.transport);
        let deadline = options.deadline();
        let policy = options.retry_policy();

        async move {
            let method = request.method.clone();
            let attempt = || {
                let transport = Arc::clone(&transport);
                let request = request.clone();
                async move {
                    let controller = (deadline.is_some() && transport.supports_abort())
                        .then(AbortController::new);
                    let signal = controller.as_ref().map(AbortController::signal);
                    let url = request.url.clone();
                    let outcome = with_timeout(
                        &url,
                        transport.send(request, signal),
                        deadline,
                        controller.as_ref(),
                    )
                    .await;

                    #[cfg(feature = "tracing")]
                    if let Err(crate::AttemptFailure::Transport(err)) = &outcome {
                        tracing::debug!(url = %url, error = %err, "transport failed");
                    }

                    outcome
                }
            };

            match policy {
                Some(policy) => evaluate(attempt, &method, policy).await,
                None => attempt().await,
            }
        }
        .boxed()
        .shared()
    }
}

/// Handle to one logical request.
///
/// Every resolver awaits the same settled attempt and works on its own copy
/// of the response, so resolvers can be called repeatedly and in any order
/// without re-sending the request.
#[derive(Clone)]
pub struct RequestHandle {
    url: String,
    options: Arc<GretchOptions>,
    pipeline: Shared<BoxFuture<'static, Attempt>>,
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("url", &self.url)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl RequestHandle {
    /// Final request URL after base URL joining.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Decodes a 2xx body as `T` and any other body as `A`.
    pub async fn json<T, A>(&self) -> GretchResponse<T, A>
    where
        T: DeserializeOwned,
        A: DeserializeOwned,
    {
        self.resolve(resolve::json::<T>, resolve::json::<A>).await
    }

    pub async fn text(&self) -> GretchResponse<String, String> {
        self.resolve(resolve::text, resolve::text).await
    }

    /// Raw body bytes.
    pub async fn bytes(&self) -> GretchResponse<Bytes, Bytes> {
        self.resolve(resolve::bytes, resolve::bytes).await
    }

    pub async fn blob(&self) -> GretchResponse<Blob, Blob> {
        self.resolve(resolve::blob, resolve::blob).await
    }

    /// Decodes an `application/x-www-form-urlencoded` body.
    pub async fn form_data(&self) -> GretchResponse<FormData, FormData> {
        self.resolve(resolve::form_data, resolve::form_data).await
    }

    /// Waits for the request to settle and returns status metadata only.
    pub async fn flush(&self) -> Flushed {
        resolve::flush(self.pipeline.clone().await, &self.url)
    }

    async fn resolve<T, A>(
        &self,
        on_success: Materializer<T>,
        on_failure: Materializer<A>,
    ) -> GretchResponse<T, A> {
        let settled = self.pipeline.clone().await;
        resolve::resolve(settled, &self.url, &self.options, on_success, on_failure)
    }
}
