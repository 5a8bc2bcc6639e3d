use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use reqwest::Url;
use serde_json::Value;

use crate::{
    request::prepare,
    retry::{classify, AttemptOutcome},
    ApiRequest, ApiResponse, BackoffPolicy, ClientOptions, MsoError, Platform, PreparedRequest,
    Result, RetryPredicate, SessionToken, Sleeper, TokioSleeper,
};

/// HTTP client for the Multi-Site Orchestrator REST API.
///
/// The client is `Send + Sync`; share one instance across tasks with `Arc`
/// or [`crate::ClientRegistry`].
pub struct MsoClient {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: Url,
    pub(crate) username: String,
    pub(crate) options: ClientOptions,
    pub(crate) backoff: BackoffPolicy,
    pub(crate) sleeper: Arc<dyn Sleeper>,
    pub(crate) session: RwLock<Option<SessionToken>>,
    pub(crate) auth_lock: tokio::sync::Mutex<()>,
    pub(crate) version: RwLock<Option<String>>,
}

impl fmt::Debug for MsoClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MsoClient")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("options", &self.options)
            .field("backoff", &self.backoff)
            .field("session", &*read_lock(&self.session))
            .finish()
    }
}

impl MsoClient {
    /// Creates a client for `base_url`, logging in as `username`.
    ///
    /// Fails with [`MsoError::Config`] when the base URL or proxy URL does
    /// not parse, or the transport cannot be built.
    pub fn new(
        base_url: impl AsRef<str>,
        username: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self> {
        let raw = base_url.as_ref().trim();
        let base_url = Url::parse(raw)
            .map_err(|err| MsoError::Config(format!("invalid base url '{raw}': {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(MsoError::Config(format!(
                "base url '{raw}' cannot resolve relative paths"
            )));
        }

        let http = build_transport(&options)?;
        let declared = options
            .api_version
            .as_deref()
            .map(str::trim)
            .filter(|version| !version.is_empty())
            .map(str::to_owned);

        Ok(Self {
            http,
            base_url,
            username: username.into(),
            backoff: BackoffPolicy::from_options(&options),
            options,
            sleeper: Arc::new(TokioSleeper),
            session: RwLock::new(None),
            auth_lock: tokio::sync::Mutex::new(()),
            version: RwLock::new(declared),
        })
    }

    /// Creates a client from environment variables.
    ///
    /// Reads `MSO_URL` and `MSO_USERNAME`, plus every option listed on
    /// [`ClientOptions::from_env`].
    pub fn from_env() -> Result<Self> {
        let url = required_env("MSO_URL")?;
        let username = required_env("MSO_USERNAME")?;
        Self::new(url, username, ClientOptions::from_env()?)
    }

    /// Replaces the sleeper used between retry attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn platform(&self) -> Platform {
        self.options.platform
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// Current session token, if a login has succeeded.
    pub fn session(&self) -> Option<SessionToken> {
        read_lock(&self.session).clone()
    }

    /// API version supplied through [`ClientOptions::api_version`].
    pub fn declared_version(&self) -> Option<&str> {
        self.options.api_version.as_deref()
    }

    /// Resolves `request` into a fully addressed request.
    ///
    /// Authenticated requests get the current session token; building one
    /// before the first successful [`MsoClient::authenticate`] fails with
    /// [`MsoError::NotAuthenticated`].
    pub fn build_request(&self, request: &ApiRequest) -> Result<PreparedRequest> {
        let mut prepared = prepare(&self.base_url, self.options.platform, request)?;
        if self.options.skip_logging_payload {
            prepared.suppress_payload_logging();
        }
        if request.authenticated {
            self.inject_auth(&mut prepared)?;
        }
        tracing::debug!(method = %prepared.method(), url = %prepared.url(), "built http request");
        Ok(prepared)
    }

    /// Builds and sends `request`.
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let prepared = self.build_request(request)?;
        self.send(&prepared, None).await
    }

    /// Builds and sends `request`, retrying 2xx responses for which
    /// `retry_when` returns `true`.
    ///
    /// Useful to poll until an object becomes visible. Each such retry
    /// consumes the same budget as transport and throttling retries.
    pub async fn execute_until<F>(&self, request: &ApiRequest, retry_when: F) -> Result<ApiResponse>
    where
        F: Fn(&Value) -> bool + Send + Sync,
    {
        let prepared = self.build_request(request)?;
        self.send(&prepared, Some(&retry_when)).await
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.execute(&ApiRequest::get(path)).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<ApiResponse> {
        self.execute(&ApiRequest::post(path, body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<ApiResponse> {
        self.execute(&ApiRequest::put(path, body)).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> Result<ApiResponse> {
        self.execute(&ApiRequest::patch(path, body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.execute(&ApiRequest::delete(path)).await
    }

    /// Sends a prepared request, retrying transient failures.
    ///
    /// Transport failures, 429, 503, 2xx bodies that are not JSON, and 2xx
    /// bodies rejected by `retry_when` are retried with backoff until the
    /// budget in [`ClientOptions::max_retries`] is spent. Every other status
    /// fails immediately with [`MsoError::Status`].
    pub async fn send(
        &self,
        request: &PreparedRequest,
        retry_when: Option<&RetryPredicate<'_>>,
    ) -> Result<ApiResponse> {
        let method = request.method();
        let url = request.url();
        let mut attempt: u32 = 1;

        loop {
            tracing::trace!(%method, %url, attempt, "sending http request");
            if request.log_payload() {
                if let Some(body) = request.body() {
                    tracing::trace!(body = %String::from_utf8_lossy(body), "http request body");
                }
            }

            let received = match request.to_reqwest(&self.http).send().await {
                Ok(response) => {
                    let status = response.status();
                    let headers = response.headers().clone();
                    response
                        .bytes()
                        .await
                        .map(|bytes| (status, headers, bytes))
                }
                Err(err) => Err(err),
            };

            let (status, headers, bytes) = match received {
                Ok(received) => received,
                Err(err) => {
                    tracing::warn!(%method, %url, attempt, error = %err, "http connection failed");
                    self.wait_before_retry(
                        attempt,
                        MsoError::Transport {
                            source: err,
                            attempts: attempt,
                        },
                    )
                    .await?;
                    attempt += 1;
                    continue;
                }
            };

            tracing::trace!(%method, %url, status = status.as_u16(), "received http response");
            if request.log_payload() {
                tracing::trace!(body = %String::from_utf8_lossy(&bytes), "http response body");
            }

            let last_error = match classify(status, &bytes, retry_when) {
                AttemptOutcome::Success(body) => {
                    return Ok(ApiResponse {
                        status,
                        headers,
                        attempts: attempt,
                        body: Some(body),
                    })
                }
                AttemptOutcome::NoContent => {
                    return Ok(ApiResponse {
                        status,
                        headers,
                        attempts: attempt,
                        body: None,
                    })
                }
                AttemptOutcome::Fatal(body) => {
                    tracing::debug!(%method, %url, status = status.as_u16(), "http request failed");
                    return Err(MsoError::Status {
                        status: status.as_u16(),
                        attempts: attempt,
                        body,
                    });
                }
                AttemptOutcome::RetryMalformed(err) => {
                    tracing::warn!(%method, %url, error = %err, "2xx response body is not valid JSON");
                    retry_exhausted(status, attempt, None)
                }
                AttemptOutcome::RetryRequested(body) => {
                    tracing::debug!(%method, %url, "retry predicate requested another attempt");
                    retry_exhausted(status, attempt, Some(body))
                }
                AttemptOutcome::RetryStatus => {
                    tracing::warn!(%method, %url, status = status.as_u16(), "http request throttled");
                    retry_exhausted(status, attempt, None)
                }
            };

            self.wait_before_retry(attempt, last_error).await?;
            attempt += 1;
        }
    }

    /// Sleeps before the next attempt, or returns `last_error` once the
    /// retry budget is spent.
    async fn wait_before_retry(&self, attempt: u32, last_error: MsoError) -> Result<()> {
        let Some(delay) = self.backoff.next_delay(attempt) else {
            tracing::error!(attempt, error = %last_error, "retries exhausted");
            return Err(last_error);
        };

        tracing::debug!(
            attempt,
            max_retries = self.backoff.max_retries(),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "retrying http request after backoff"
        );
        self.sleeper.sleep(delay).await;
        Ok(())
    }
}

fn retry_exhausted(status: reqwest::StatusCode, attempts: u32, body: Option<Value>) -> MsoError {
    MsoError::RetryExhausted {
        status: status.as_u16(),
        attempts,
        body,
    }
}

fn build_transport(options: &ClientOptions) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().danger_accept_invalid_certs(options.insecure);

    if let Some(proxy_url) = options
        .proxy_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
    {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|err| MsoError::Config(format!("invalid proxy url '{proxy_url}': {err}")))?;
        builder = builder.proxy(proxy);
    }

    if let Some(timeout) = options.request_timeout {
        builder = builder.timeout(timeout);
    }

    builder
        .build()
        .map_err(|err| MsoError::Config(format!("http transport could not be built: {err}")))
}

fn required_env(key: &str) -> Result<String> {
    let value = std::env::var(key)
        .map_err(|_| MsoError::Config(format!("missing {key} environment variable")))?;
    if value.trim().is_empty() {
        return Err(MsoError::Config(format!("{key} is set but empty")));
    }
    Ok(value)
}

pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
