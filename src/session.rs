use std::{
    fmt,
    time::{Duration, Instant},
};

/// How long a freshly issued session token is considered valid.
pub const TOKEN_VALIDITY: Duration = Duration::from_secs(1200);

/// Session credential returned by the login endpoint.
#[derive(Clone, Eq, PartialEq)]
pub struct SessionToken {
    token: String,
    expires_at: Instant,
}

impl SessionToken {
    /// Token issued now, valid for [`TOKEN_VALIDITY`].
    pub fn issue(token: impl Into<String>) -> Self {
        Self::issued_at(token, Instant::now())
    }

    pub(crate) fn issued_at(token: impl Into<String>, issued: Instant) -> Self {
        Self {
            token: token.into(),
            expires_at: issued + TOKEN_VALIDITY,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Instant::now())
    }

    pub(crate) fn is_valid_at(&self, now: Instant) -> bool {
        !self.token.is_empty() && now < self.expires_at
    }

    pub(crate) fn authorization(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::{SessionToken, TOKEN_VALIDITY};

    #[test]
    fn token_expires_after_validity_window() {
        let issued = Instant::now();
        let token = SessionToken::issued_at("abc", issued);
        assert!(token.is_valid_at(issued + Duration::from_secs(1199)));
        assert!(!token.is_valid_at(issued + TOKEN_VALIDITY));
    }

    #[test]
    fn empty_token_is_never_valid() {
        assert!(!SessionToken::issue("").is_valid());
    }

    #[test]
    fn authorization_uses_bearer_scheme() {
        assert_eq!(SessionToken::issue("abc").authorization(), "Bearer abc");
    }

    #[test]
    fn debug_redacts_token() {
        let debug = format!("{:?}", SessionToken::issue("secret-token"));
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret-token"));
    }
}
