use crate::{
    client::{read_lock, write_lock},
    wire::{scalar_text, ClassicLogin, GatewayLogin, LoginDomains},
    ApiRequest, MsoClient, MsoError, Platform, PreparedRequest, Result, SessionToken,
};

const LOGIN_DOMAINS_PATH: &str = "/api/v1/auth/login-domains";

impl MsoClient {
    /// Logs in and stores a fresh session token.
    ///
    /// On classic platforms a configured login domain is first translated to
    /// its id via [`MsoClient::resolve_domain_id`]; gateways receive the
    /// domain name directly (`DefaultAuth` when none is configured). The
    /// previous token is kept when login fails.
    pub async fn authenticate(&self) -> Result<()> {
        let _guard = self.auth_lock.lock().await;
        self.login().await
    }

    /// Logs in when no session exists or the current token has expired.
    ///
    /// Callers racing here log in once; the rest reuse the token stored by
    /// the first.
    pub async fn ensure_authenticated(&self) -> Result<()> {
        if self.has_valid_session() {
            return Ok(());
        }
        let _guard = self.auth_lock.lock().await;
        if self.has_valid_session() {
            return Ok(());
        }
        self.login().await
    }

    fn has_valid_session(&self) -> bool {
        read_lock(&self.session)
            .as_ref()
            .is_some_and(SessionToken::is_valid)
    }

    // Caller holds `auth_lock`.
    async fn login(&self) -> Result<()> {
        let platform = self.options.platform;
        let profile = platform.profile();
        let password = self.options.password.as_deref().unwrap_or_default();
        let domain = self
            .options
            .domain
            .as_deref()
            .filter(|domain| !domain.is_empty());

        let payload = match platform {
            Platform::Classic => {
                let domain_id = match domain {
                    Some(domain) if profile.resolves_domain_id => {
                        Some(self.resolve_domain_id(domain).await?)
                    }
                    _ => None,
                };
                serde_json::to_value(ClassicLogin {
                    username: &self.username,
                    password,
                    domain_id,
                })
            }
            Platform::Gateway => serde_json::to_value(GatewayLogin {
                user_name: &self.username,
                user_passwd: password,
                domain: domain.or(profile.default_domain).unwrap_or_default(),
            }),
        }
        .map_err(|err| MsoError::auth(format!("login payload could not be built: {err}")))?;

        let request = ApiRequest::post(profile.login_path, payload)
            .unauthenticated()
            .without_payload_logging();
        let prepared = self
            .build_request(&request)
            .map_err(|err| MsoError::auth_caused_by("login request could not be built", err))?;
        let response = self
            .send(&prepared, None)
            .await
            .map_err(|err| MsoError::auth_caused_by("login request failed", err))?;

        let body = response
            .body
            .ok_or_else(|| MsoError::auth("empty login response"))?;
        let token = body.get("token").and_then(scalar_text).unwrap_or_default();
        if token.is_empty() || token == "{}" {
            return Err(MsoError::auth("invalid username or password"));
        }

        *write_lock(&self.session) = Some(SessionToken::issue(token));
        tracing::debug!(%platform, username = %self.username, "session token refreshed");
        Ok(())
    }

    /// Looks up the id of login domain `domain` (exact, case-sensitive match).
    pub async fn resolve_domain_id(&self, domain: &str) -> Result<String> {
        let request = ApiRequest::get(LOGIN_DOMAINS_PATH).unauthenticated();
        let response = self.execute(&request).await?;
        let body = response
            .body
            .ok_or_else(|| MsoError::Parse("empty login-domains response".to_owned()))?;
        let listing: LoginDomains = serde_json::from_value(body).map_err(|err| {
            MsoError::Parse(format!("login-domains listing could not be decoded: {err}"))
        })?;

        let entry = listing
            .domains
            .iter()
            .find(|entry| scalar_text(&entry.name).as_deref() == Some(domain))
            .ok_or_else(|| MsoError::NotFound {
                domain: domain.to_owned(),
            })?;

        scalar_text(&entry.id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| MsoError::Parse(format!("login domain {domain} has no id")))
    }

    /// Attaches the current session token to `request`.
    pub(crate) fn inject_auth(&self, request: &mut PreparedRequest) -> Result<()> {
        let session = read_lock(&self.session);
        let token = session.as_ref().ok_or(MsoError::NotAuthenticated)?;
        request.set_authorization(&token.authorization())
    }
}
