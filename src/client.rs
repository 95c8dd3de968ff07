//! The request executor.
//!
//! Every API operation funnels through [`Client::execute`]: serialize the body,
//! resolve the idempotency key, run the attempt loop under the call's deadline
//! and cancellation token, classify failures, and deserialize the success body.
//! Use [`ClientBuilder`] to configure and create clients.

use crate::{
    classify::classify,
    context::CallContext,
    hooks::{AttemptEnd, AttemptStart, Hook, Hooks},
    idempotency::IdempotencyKey,
    propagation::TraceContext,
    request::{join_url, RequestSpec, Verb},
    retry::RetryPolicy,
    tls::TlsConfig,
    Error, Response, Result,
};
use arc_swap::ArcSwapOption;
use bytes::Bytes;
use futures::FutureExt;
use http::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{field, Instrument};
use url::Url;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header carrying the idempotency key.
///
/// The API documents it as `idempotencyKey`. Header names are case-insensitive
/// and the `http` crate stores them lowercased, so that is how it goes out.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotencykey";

/// Environment variable read by [`ClientBuilder::from_env`] for the base URL.
pub const ENV_BASE_URL: &str = "PIXBANK_BASE_URL";
/// Environment variable read by [`ClientBuilder::from_env`] for the API key.
pub const ENV_API_KEY: &str = "PIXBANK_API_KEY";
/// Environment variable read by [`ClientBuilder::from_env`] for the user agent.
pub const ENV_USER_AGENT: &str = "PIXBANK_USER_AGENT";
/// Environment variable read by [`ClientBuilder::from_env`] for the call timeout.
pub const ENV_TIMEOUT_SECS: &str = "PIXBANK_TIMEOUT_SECS";

const JSON: &str = "application/json";

/// A banking API client.
///
/// The client is cheap to clone and safe to share between tasks: all clones
/// use one connection pool and one immutable configuration. No per-call state
/// (idempotency key, attempt counter, deadline) lives on the client.
///
/// # Examples
///
/// ```no_run
/// use pixbank::{CallContext, Client, Verb};
/// use serde::{Deserialize, Serialize};
/// use std::time::Duration;
///
/// #[derive(Serialize)]
/// struct PixTransfer {
///     key: String,
///     amount: f64,
/// }
///
/// #[derive(Deserialize)]
/// struct Transfer {
///     end_to_end_id: String,
/// }
///
/// # async fn example() -> Result<(), pixbank::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com/banking")?
///     .api_key("secret")
///     .timeout(Duration::from_secs(30))
///     .build()?;
///
/// let transfer = PixTransfer { key: "alice@example.com".into(), amount: 12.5 };
/// let ctx = CallContext::new().with_idempotency_key("order-981");
///
/// let created = client
///     .execute::<_, Transfer>(Verb::Post, "/pix/payments", Some(&transfer), &ctx)
///     .await?;
/// println!("E2E id: {}", created.data.end_to_end_id);
///
/// client.shutdown();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: ArcSwapOption<reqwest::Client>,
    base_url: Url,
    default_headers: HeaderMap,
    retry_policy: RetryPolicy,
    hooks: Hooks,
    timeout: Option<Duration>,
    auto_idempotency: bool,
    trace_propagation: bool,
}

/// What the server sent back for one physical attempt.
struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

/// The result of one physical attempt, before it is folded into the call's outcome.
struct AttemptOutcome {
    /// `0` if no response was received.
    status: u16,
    elapsed: Duration,
    result: Result<RawResponse>,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Returns the hooks registered on this client.
    pub fn hooks(&self) -> &Hooks {
        &self.inner.hooks
    }

    /// Executes one logical call.
    ///
    /// The call makes up to [`RetryPolicy::max_attempts`] physical attempts for
    /// `verb`, all under the deadline and cancellation token of `ctx`, and
    /// produces exactly one terminal result. A panic anywhere inside the call,
    /// hooks included, is returned as [`Error::Fault`].
    ///
    /// Use [`serde::de::IgnoredAny`] as `Res` when the response body is not needed.
    /// An empty success body is read as JSON `null`.
    ///
    /// # Errors
    ///
    /// Returns the classified API error for statuses `>= 400`,
    /// [`Error::Network`] when no response arrived, [`Error::Timeout`] or
    /// [`Error::Cancelled`] when the context ends the call, and
    /// [`Error::Serialization`] / [`Error::Deserialization`] for payloads that
    /// cannot be converted.
    pub async fn execute<Req, Res>(
        &self,
        verb: Verb,
        path: &str,
        body: Option<&Req>,
        ctx: &CallContext,
    ) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let trace = self.inner.trace_propagation.then(TraceContext::new);
        let span = tracing::info_span!(
            "pixbank.call",
            method = %verb,
            path = %path,
            trace_id = field::Empty,
            status = field::Empty,
            attempts = field::Empty,
            error_kind = field::Empty,
        );
        if let Some(trace) = &trace {
            span.record("trace_id", trace.trace_id().as_str());
        }

        let attempts = AtomicUsize::new(0);
        let call = self.run::<Req, Res>(verb, path, body, ctx, trace.as_ref(), &attempts);
        let result = match AssertUnwindSafe(call)
            .catch_unwind()
            .instrument(span.clone())
            .await
        {
            Ok(result) => result,
            Err(payload) => span.in_scope(|| Err(Error::from_panic(payload))),
        };

        span.record("attempts", attempts.load(Ordering::Relaxed) as u64);
        match &result {
            Ok(response) => {
                span.record("status", response.status.as_u16());
            }
            Err(error) => {
                if let Some(status) = error.status() {
                    span.record("status", status.as_u16());
                }
                span.record("error_kind", error.kind().as_str());
            }
        }

        result
    }

    async fn run<Req, Res>(
        &self,
        verb: Verb,
        path: &str,
        body: Option<&Req>,
        ctx: &CallContext,
        trace: Option<&TraceContext>,
        attempts: &AtomicUsize,
    ) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let started = Instant::now();
        let http_client = self
            .inner
            .http_client
            .load_full()
            .ok_or_else(|| Error::Configuration("client has been shut down".to_string()))?;

        let spec = self.prepare(verb, path, body, ctx)?;
        let url = Url::parse(&join_url(self.inner.base_url.as_str(), &spec.path))?;
        let idempotency_header = spec
            .idempotency_key
            .as_ref()
            .map(|key| HeaderValue::from_str(key.as_str()))
            .transpose()
            .map_err(|e| Error::Configuration(format!("Invalid idempotency key: {}", e)))?;
        let deadline = ctx
            .deadline()
            .or_else(|| self.inner.timeout.map(|timeout| started + timeout));

        let mut attempt = 0;
        loop {
            attempt += 1;
            attempts.store(attempt, Ordering::Relaxed);
            check_live(ctx, deadline, started)?;

            let mut headers = self.inner.default_headers.clone();
            if spec.body.is_some() {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
            }
            if let Some(value) = &idempotency_header {
                headers.insert(IDEMPOTENCY_KEY_HEADER, value.clone());
            }
            if let Some(trace) = trace {
                trace.inject(&mut headers);
            }
            let mut request = http_client
                .request(verb.method(), url.clone())
                .headers(headers);
            if let Some(body) = &spec.body {
                request = request.body(body.clone());
            }

            let start = AttemptStart {
                verb,
                path,
                body: spec.body.as_deref(),
                attempt,
                idempotency_key: spec.idempotency_key.as_ref(),
            };
            if let Err(fault) = self.inner.hooks.before_attempt(&start) {
                // Hooks that already saw this attempt start still get to see it end
                let _ = self.inner.hooks.after_attempt(&AttemptEnd {
                    verb,
                    path,
                    attempt,
                    status: 0,
                    elapsed: Duration::ZERO,
                    error: Some(&fault),
                    idempotency_key: spec.idempotency_key.as_ref(),
                });
                return Err(fault);
            }

            tracing::debug!(
                method = %verb,
                url = %url,
                attempt = attempt,
                "Executing HTTP request"
            );

            let outcome = self.attempt(request, ctx, deadline, started).await;

            self.inner.hooks.after_attempt(&AttemptEnd {
                verb,
                path,
                attempt,
                status: outcome.status,
                elapsed: outcome.elapsed,
                error: outcome.result.as_ref().err(),
                idempotency_key: spec.idempotency_key.as_ref(),
            })?;

            match outcome.result {
                Ok(raw) => {
                    let latency = started.elapsed();
                    tracing::info!(
                        status = raw.status.as_u16(),
                        latency_ms = latency.as_millis() as u64,
                        attempts = attempt,
                        "Received HTTP response"
                    );
                    return decode(raw, latency, attempt, spec.idempotency_key);
                }
                Err(error @ (Error::Timeout { .. } | Error::Cancelled)) => return Err(error),
                Err(error) => {
                    tracing::warn!(
                        error = %error,
                        attempt = attempt,
                        method = %verb,
                        path = %path,
                        "Request failed"
                    );

                    if !self.inner.retry_policy.should_retry(verb, &error, attempt) {
                        return Err(error);
                    }

                    let delay = self.inner.retry_policy.delay_for_attempt(attempt);
                    tracing::info!(
                        delay_ms = delay.as_millis() as u64,
                        attempt = attempt,
                        "Retrying request after delay"
                    );
                    guard(ctx, deadline, started, tokio::time::sleep(delay)).await?;
                }
            }
        }
    }

    /// Serializes the body and resolves the idempotency key for one call.
    fn prepare<Req>(
        &self,
        verb: Verb,
        path: &str,
        body: Option<&Req>,
        ctx: &CallContext,
    ) -> Result<RequestSpec>
    where
        Req: Serialize + ?Sized,
    {
        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(Error::Serialization)?;

        let key = ctx.idempotency_key().cloned().or_else(|| {
            (verb.is_mutating() && self.inner.auto_idempotency).then(IdempotencyKey::generate)
        });

        let spec = RequestSpec::new(verb, path).with_idempotency_key(key);
        Ok(match body {
            Some(body) => spec.with_body(body),
            None => spec,
        })
    }

    /// Performs one physical attempt and classifies error statuses.
    async fn attempt(
        &self,
        request: reqwest::RequestBuilder,
        ctx: &CallContext,
        deadline: Option<Instant>,
        started: Instant,
    ) -> AttemptOutcome {
        let attempt_started = Instant::now();
        let result = guard(ctx, deadline, started, send(request))
            .await
            .and_then(|result| result);
        let elapsed = attempt_started.elapsed();

        match result {
            Ok(raw) if raw.status.as_u16() >= 400 => {
                log_error_status(raw.status, &raw.body);
                AttemptOutcome {
                    status: raw.status.as_u16(),
                    elapsed,
                    result: Err(classify(raw.status, &raw.body)),
                }
            }
            Ok(raw) => AttemptOutcome {
                status: raw.status.as_u16(),
                elapsed,
                result: Ok(raw),
            },
            Err(error) => AttemptOutcome {
                status: 0,
                elapsed,
                result: Err(error),
            },
        }
    }

    /// Releases the client's handle on the connection pool.
    ///
    /// Idle connections close once every in-flight call has finished; every
    /// later call on this client or its clones fails with
    /// [`Error::Configuration`]. Calling this more than once is harmless.
    pub fn shutdown(&self) {
        if self.inner.http_client.swap(None).is_some() {
            tracing::info!("Client shut down, connection pool released");
        }
    }

    /// Returns `true` after [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.inner.http_client.load().is_none()
    }

    /// Makes a GET request to the specified path.
    pub async fn get<Res>(&self, path: &str) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        self.execute::<(), Res>(Verb::Get, path, None, &CallContext::default())
            .await
    }

    /// Makes a POST request to the specified path with a JSON body.
    pub async fn post<Req, Res>(&self, path: &str, body: &Req) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.execute(Verb::Post, path, Some(body), &CallContext::default())
            .await
    }

    /// Makes a PUT request to the specified path with a JSON body.
    pub async fn put<Req, Res>(&self, path: &str, body: &Req) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.execute(Verb::Put, path, Some(body), &CallContext::default())
            .await
    }

    /// Makes a PATCH request to the specified path with a JSON body.
    pub async fn patch<Req, Res>(&self, path: &str, body: &Req) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.execute(Verb::Patch, path, Some(body), &CallContext::default())
            .await
    }

    /// Makes a DELETE request to the specified path.
    pub async fn delete<Res>(&self, path: &str) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        self.execute::<(), Res>(Verb::Delete, path, None, &CallContext::default())
            .await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url.as_str())
            .field("retry_policy", &self.inner.retry_policy)
            .field("hooks", &self.inner.hooks)
            .field("timeout", &self.inner.timeout)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

async fn send(request: reqwest::RequestBuilder) -> Result<RawResponse> {
    let response = request.send().await?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?;
    Ok(RawResponse {
        status,
        headers,
        body,
    })
}

/// Fails fast if the call was cancelled or its deadline has passed.
fn check_live(ctx: &CallContext, deadline: Option<Instant>, started: Instant) -> Result<()> {
    if ctx.is_cancelled() {
        return Err(Error::Cancelled);
    }
    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
        return Err(Error::Timeout {
            elapsed: started.elapsed(),
        });
    }
    Ok(())
}

/// Runs `fut` until it completes, the context is cancelled, or the deadline passes.
async fn guard<F>(
    ctx: &CallContext,
    deadline: Option<Instant>,
    started: Instant,
    fut: F,
) -> Result<F::Output>
where
    F: Future,
{
    let cancelled = async {
        match ctx.cancellation() {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    };
    let expired = async {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancelled => Err(Error::Cancelled),
        _ = expired => Err(Error::Timeout { elapsed: started.elapsed() }),
        output = fut => Ok(output),
    }
}

fn log_error_status(status: StatusCode, body: &[u8]) {
    let body = String::from_utf8_lossy(body);
    if status.is_client_error() {
        tracing::error!(status = status.as_u16(), response = %body, "Client error (4xx)");
    } else {
        tracing::warn!(status = status.as_u16(), response = %body, "Server error (5xx)");
    }
}

fn decode<Res>(
    raw: RawResponse,
    latency: Duration,
    attempts: usize,
    idempotency_key: Option<IdempotencyKey>,
) -> Result<Response<Res>>
where
    Res: DeserializeOwned,
{
    let payload: &[u8] = if raw.body.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        &raw.body
    };
    let raw_body = String::from_utf8_lossy(&raw.body).into_owned();

    match serde_json::from_slice::<Res>(payload) {
        Ok(data) => Ok(Response {
            data,
            raw_body,
            status: raw.status,
            headers: raw.headers,
            latency,
            attempts,
            idempotency_key,
        }),
        Err(e) => {
            tracing::error!(
                error = %e,
                raw_response = %raw_body,
                "Failed to deserialize response"
            );

            Err(Error::Deserialization {
                status: raw.status,
                raw_response: raw_body,
                source: e,
            })
        }
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use pixbank::{hooks::TracingHook, ClientBuilder, RetryPolicy};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), pixbank::Error> {
/// let client = ClientBuilder::new()
///     .base_url("https://api.example.com")?
///     .api_key("secret")
///     .user_agent("treasury-service/2.1")
///     .timeout(Duration::from_secs(20))
///     .retry_policy(RetryPolicy::new(3, Duration::from_millis(100)))
///     .hook(TracingHook)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    api_key: Option<SecretString>,
    user_agent: String,
    default_headers: HeaderMap,
    retry_policy: RetryPolicy,
    hooks: Vec<Arc<dyn Hook>>,
    timeout: Option<Duration>,
    connect_timeout: Duration,
    pool_max_idle_per_host: usize,
    auto_idempotency: bool,
    trace_propagation: bool,
    tls: TlsConfig,
    allow_plain_http: bool,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            api_key: None,
            user_agent: format!("pixbank/{}", env!("CARGO_PKG_VERSION")),
            default_headers: HeaderMap::new(),
            retry_policy: RetryPolicy::default(),
            hooks: Vec::new(),
            timeout: Some(Duration::from_secs(30)),
            connect_timeout: Duration::from_secs(10),
            pool_max_idle_per_host: 10,
            auto_idempotency: true,
            trace_propagation: false,
            tls: TlsConfig::default(),
            allow_plain_http: false,
        }
    }

    /// Creates a builder seeded from `PIXBANK_*` environment variables.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if `PIXBANK_BASE_URL` is not a valid URL or
    /// `PIXBANK_TIMEOUT_SECS` is not a whole number of seconds.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::new();
        if let Ok(url) = std::env::var(ENV_BASE_URL) {
            builder = builder.base_url(url)?;
        }
        if let Ok(key) = std::env::var(ENV_API_KEY) {
            builder = builder.api_key(key);
        }
        if let Ok(user_agent) = std::env::var(ENV_USER_AGENT) {
            builder = builder.user_agent(user_agent);
        }
        if let Ok(secs) = std::env::var(ENV_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|e| {
                Error::Configuration(format!("Invalid {}: {}", ENV_TIMEOUT_SECS, e))
            })?;
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(builder)
    }

    /// Sets the base URL for all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Sets the API key sent as `X-API-KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }

    /// Sets the `User-Agent` header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Appends a hook. Hooks run in the order they were added.
    pub fn hook(self, hook: impl Hook + 'static) -> Self {
        self.hook_arc(Arc::new(hook))
    }

    /// Appends a shared hook.
    pub fn hook_arc(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Sets the default deadline of a logical call, retries included.
    ///
    /// A deadline set on the [`CallContext`] takes precedence.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Removes the default deadline.
    pub fn no_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Sets the TCP/TLS connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the maximum number of idle pooled connections per host.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Enables or disables automatic idempotency keys for mutating verbs.
    pub fn auto_idempotency(mut self, enabled: bool) -> Self {
        self.auto_idempotency = enabled;
        self
    }

    /// Enables or disables the `traceparent` header.
    pub fn trace_propagation(mut self, enabled: bool) -> Self {
        self.trace_propagation = enabled;
        self
    }

    /// Sets the TLS configuration.
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    /// Allows a non-HTTPS base URL, for local sandboxes and tests.
    pub fn allow_plain_http(mut self, allow: bool) -> Self {
        self.allow_plain_http = allow;
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL or API key is missing, the base URL is
    /// not HTTPS (unless allowed), the TLS settings are invalid, or the HTTP
    /// client cannot be built.
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Configuration("Base URL is required".to_string()))?;
        if !self.allow_plain_http && base_url.scheme() != "https" {
            return Err(Error::Configuration(format!(
                "Base URL must use https, got {}",
                base_url.scheme()
            )));
        }
        let api_key = self
            .api_key
            .ok_or_else(|| Error::Configuration("API key is required".to_string()))?;

        let mut default_headers = self.default_headers;
        default_headers.insert(ACCEPT, HeaderValue::from_static(JSON));
        default_headers.insert(
            USER_AGENT,
            HeaderValue::try_from(self.user_agent.as_str())
                .map_err(|e| Error::Configuration(format!("Invalid user agent: {}", e)))?,
        );
        let mut api_key = HeaderValue::try_from(api_key.expose_secret())
            .map_err(|_| Error::Configuration("Invalid API key".to_string()))?;
        api_key.set_sensitive(true);
        default_headers.insert(API_KEY_HEADER, api_key);

        let builder = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .https_only(!self.allow_plain_http);
        let http_client = self.tls.apply(builder)?.build().map_err(|e| {
            Error::Configuration(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Client {
            inner: Arc::new(ClientInner {
                http_client: ArcSwapOption::from_pointee(http_client),
                base_url,
                default_headers,
                retry_policy: self.retry_policy,
                hooks: Hooks::new(self.hooks),
                timeout: self.timeout,
                auto_idempotency: self.auto_idempotency,
                trace_propagation: self.trace_propagation,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn builder() -> ClientBuilder {
        ClientBuilder::new()
            .base_url("https://api.example.com")
            .unwrap()
            .api_key("secret")
    }

    #[test]
    fn test_build_requires_base_url_and_api_key() {
        let err = ClientBuilder::new().api_key("k").build().unwrap_err();
        assert!(err.to_string().contains("Base URL is required"));

        let err = ClientBuilder::new()
            .base_url("https://api.example.com")
            .unwrap()
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("API key is required"));
    }

    #[test]
    fn test_plain_http_rejected_unless_allowed() {
        let err = ClientBuilder::new()
            .base_url("http://localhost:8080")
            .unwrap()
            .api_key("k")
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        assert!(ClientBuilder::new()
            .base_url("http://localhost:8080")
            .unwrap()
            .api_key("k")
            .allow_plain_http(true)
            .build()
            .is_ok());
    }

    #[test]
    fn test_default_headers() {
        let client = builder().user_agent("ua/1").build().unwrap();
        let headers = &client.inner.default_headers;
        assert_eq!(headers[ACCEPT], "application/json");
        assert_eq!(headers[USER_AGENT], "ua/1");
        assert_eq!(headers[API_KEY_HEADER], "secret");
        assert!(headers[API_KEY_HEADER].is_sensitive());
        assert!(!headers.contains_key(CONTENT_TYPE));
    }

    #[test]
    fn test_low_tls_version_fails_build() {
        let err = builder()
            .tls(TlsConfig::default().min_version(crate::tls::TlsVersion::Tls1_1))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("TLS 1.2"));
    }

    #[test]
    fn test_shutdown() {
        let client = builder().build().unwrap();
        let clone = client.clone();
        assert!(!client.is_shut_down());

        client.shutdown();
        client.shutdown();
        assert!(clone.is_shut_down());
    }

    #[test]
    fn test_from_env() {
        temp_env::with_vars(
            [
                (ENV_BASE_URL, Some("https://sandbox.example.com")),
                (ENV_API_KEY, Some("env-key")),
                (ENV_USER_AGENT, Some("env-agent/1")),
                (ENV_TIMEOUT_SECS, Some("7")),
            ],
            || {
                let builder = ClientBuilder::from_env().unwrap();
                assert_eq!(builder.timeout, Some(Duration::from_secs(7)));
                let client = builder.build().unwrap();
                assert_eq!(client.inner.base_url.as_str(), "https://sandbox.example.com/");
                assert_eq!(client.inner.default_headers[USER_AGENT], "env-agent/1");
            },
        );
    }

    #[test]
    fn test_from_env_rejects_bad_timeout() {
        temp_env::with_vars(
            [(ENV_BASE_URL, None), (ENV_TIMEOUT_SECS, Some("soon"))],
            || {
                let err = ClientBuilder::from_env().err().unwrap();
                assert!(err.to_string().contains(ENV_TIMEOUT_SECS));
            },
        );
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_call_span_records_attempts_on_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let client = ClientBuilder::new()
                    .base_url(format!("http://127.0.0.1:{}", port))
                    .unwrap()
                    .api_key("k")
                    .allow_plain_http(true)
                    .retry_policy(RetryPolicy::new(3, Duration::from_millis(1)))
                    .build()
                    .unwrap();
                let err = client.get::<serde_json::Value>("/balance").await.unwrap_err();
                assert_eq!(err.kind(), ErrorKind::Network);
            });
        });

        let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        let close = output
            .lines()
            .find(|line| line.contains("pixbank.call") && line.contains("close time.busy"))
            .expect("span close event");
        assert!(close.contains("attempts=3"), "{}", close);
    }
}
