use std::{fmt, time::Duration};

use crate::{MsoError, Platform, Result};

/// Default lower bound of the retry delay.
pub const DEFAULT_BACKOFF_MIN_DELAY: Duration = Duration::from_secs(4);
/// Default upper bound of the retry delay.
pub const DEFAULT_BACKOFF_MAX_DELAY: Duration = Duration::from_secs(60);
/// Default growth factor of the retry delay.
pub const DEFAULT_BACKOFF_DELAY_FACTOR: f64 = 3.0;

/// Connection, authentication and retry settings for [`crate::MsoClient`].
///
/// Setters may be chained; a later setter overrides an earlier one.
#[derive(Clone, PartialEq)]
pub struct ClientOptions {
    pub password: Option<String>,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    pub proxy_url: Option<String>,
    /// Login domain name (classic) or domain (gateway).
    pub domain: Option<String>,
    pub platform: Platform,
    /// Platform version declared by the caller. Seeds the version cache, so
    /// [`crate::MsoClient::compare_version`] skips the remote lookup.
    pub api_version: Option<String>,
    /// Suppress request/response bodies in trace logs.
    pub skip_logging_payload: bool,
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    pub backoff_min_delay: Duration,
    pub backoff_max_delay: Duration,
    pub backoff_delay_factor: f64,
    /// Per-request timeout. `None` keeps the transport default.
    pub request_timeout: Option<Duration>,
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("insecure", &self.insecure)
            .field("proxy_url", &self.proxy_url)
            .field("domain", &self.domain)
            .field("platform", &self.platform)
            .field("api_version", &self.api_version)
            .field("skip_logging_payload", &self.skip_logging_payload)
            .field("max_retries", &self.max_retries)
            .field("backoff_min_delay", &self.backoff_min_delay)
            .field("backoff_max_delay", &self.backoff_max_delay)
            .field("backoff_delay_factor", &self.backoff_delay_factor)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            password: None,
            insecure: false,
            proxy_url: None,
            domain: None,
            platform: Platform::Classic,
            api_version: None,
            skip_logging_payload: false,
            max_retries: 0,
            backoff_min_delay: DEFAULT_BACKOFF_MIN_DELAY,
            backoff_max_delay: DEFAULT_BACKOFF_MAX_DELAY,
            backoff_delay_factor: DEFAULT_BACKOFF_DELAY_FACTOR,
            request_timeout: None,
        }
    }
}

impl ClientOptions {
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn with_proxy_url(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = Some(proxy_url.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    pub fn with_skip_logging_payload(mut self, skip: bool) -> Self {
        self.skip_logging_payload = skip;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff_min_delay(mut self, delay: Duration) -> Self {
        self.backoff_min_delay = delay;
        self
    }

    pub fn with_backoff_max_delay(mut self, delay: Duration) -> Self {
        self.backoff_max_delay = delay;
        self
    }

    pub fn with_backoff_delay_factor(mut self, factor: f64) -> Self {
        self.backoff_delay_factor = factor;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Reads options from `MSO_*` environment variables.
    ///
    /// Reads (all optional):
    /// - `MSO_PASSWORD`, `MSO_DOMAIN`, `MSO_PROXY_URL`, `MSO_API_VERSION`
    /// - `MSO_PLATFORM` : `mso` or `nd`
    /// - `MSO_INSECURE`, `MSO_SKIP_LOGGING_PAYLOAD` : `true`/`false`
    /// - `MSO_MAX_RETRIES`
    /// - `MSO_BACKOFF_MIN_DELAY`, `MSO_BACKOFF_MAX_DELAY` : whole seconds
    /// - `MSO_BACKOFF_DELAY_FACTOR`
    ///
    /// Variables that are set but unparsable yield [`MsoError::Config`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut options = Self::default();

        if let Some(password) = get("MSO_PASSWORD") {
            options.password = Some(password);
        }
        if let Some(domain) = get("MSO_DOMAIN") {
            options.domain = Some(domain);
        }
        if let Some(proxy_url) = get("MSO_PROXY_URL") {
            options.proxy_url = Some(proxy_url);
        }
        if let Some(version) = get("MSO_API_VERSION") {
            options.api_version = Some(version);
        }
        if let Some(platform) = get("MSO_PLATFORM") {
            options.platform = platform.parse()?;
        }
        if let Some(insecure) = get("MSO_INSECURE") {
            options.insecure = parse_env("MSO_INSECURE", &insecure)?;
        }
        if let Some(skip) = get("MSO_SKIP_LOGGING_PAYLOAD") {
            options.skip_logging_payload = parse_env("MSO_SKIP_LOGGING_PAYLOAD", &skip)?;
        }
        if let Some(retries) = get("MSO_MAX_RETRIES") {
            options.max_retries = parse_env("MSO_MAX_RETRIES", &retries)?;
        }
        if let Some(secs) = get("MSO_BACKOFF_MIN_DELAY") {
            options.backoff_min_delay =
                Duration::from_secs(parse_env("MSO_BACKOFF_MIN_DELAY", &secs)?);
        }
        if let Some(secs) = get("MSO_BACKOFF_MAX_DELAY") {
            options.backoff_max_delay =
                Duration::from_secs(parse_env("MSO_BACKOFF_MAX_DELAY", &secs)?);
        }
        if let Some(factor) = get("MSO_BACKOFF_DELAY_FACTOR") {
            options.backoff_delay_factor = parse_env("MSO_BACKOFF_DELAY_FACTOR", &factor)?;
        }

        Ok(options)
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|err| MsoError::Config(format!("{key} has invalid value '{value}': {err}")))
}
