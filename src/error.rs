use serde_json::Value;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum MsoError {
    /// Unusable base URL, proxy URL or option value. Raised at construction.
    #[error("configuration error: {0}")]
    Config(String),
    /// Login handshake failed.
    #[error("authentication failed: {reason}")]
    Auth {
        reason: String,
        #[source]
        source: Option<Box<MsoError>>,
    },
    /// Login domain name has no match in the login-domains listing.
    #[error("unable to find domain id for domain {domain}")]
    NotFound { domain: String },
    /// Response listing or version string could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),
    /// Network or request execution error from `reqwest`, after retries.
    #[error("transport error after {attempts} attempts: {source}")]
    Transport {
        #[source]
        source: reqwest::Error,
        attempts: u32,
    },
    /// Non-retryable HTTP status. `body` holds the decoded response, if any.
    #[error("http request failed with status code {status} after {attempts} attempts")]
    Status {
        status: u16,
        attempts: u32,
        body: Option<Value>,
    },
    /// A retryable condition persisted past the configured retry budget.
    #[error("http request failed with status code {status} after {attempts} attempts, retries exhausted")]
    RetryExhausted {
        status: u16,
        attempts: u32,
        body: Option<Value>,
    },
    /// An authenticated request was built before any successful login.
    #[error("not authenticated: call authenticate() before issuing authenticated requests")]
    NotAuthenticated,
    /// The platform version endpoint returned no usable version.
    #[error("unable to identify platform version")]
    VersionUnavailable,
}

impl MsoError {
    pub(crate) fn auth(reason: impl Into<String>) -> Self {
        Self::Auth {
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn auth_caused_by(reason: impl Into<String>, source: MsoError) -> Self {
        Self::Auth {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// HTTP status carried by the error, if the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } | Self::RetryExhausted { status, .. } => Some(*status),
            Self::Transport { source, .. } => source.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    /// Number of attempts made before the error surfaced, if any were made.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::Status { attempts, .. }
            | Self::RetryExhausted { attempts, .. }
            | Self::Transport { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MsoError;

    #[test]
    fn retry_exhausted_message_reports_status_and_attempts() {
        let err = MsoError::RetryExhausted {
            status: 503,
            attempts: 4,
            body: None,
        };
        let message = err.to_string();
        assert!(message.contains("503"));
        assert!(message.contains("4 attempts"));
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.attempts(), Some(4));
    }

    #[test]
    fn not_found_message_names_domain() {
        let err = MsoError::NotFound {
            domain: "radius".to_owned(),
        };
        assert!(err.to_string().contains("radius"));
        assert_eq!(err.attempts(), None);
    }
}
