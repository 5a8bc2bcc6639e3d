use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    Method, Url,
};
use serde_json::Value;

use crate::{MsoError, Platform, Result};

/// A call against the orchestrator REST surface, before URL resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the base URL, e.g. `/api/v1/schemas`.
    pub path: String,
    pub body: Option<Value>,
    /// Attach the session token.
    pub authenticated: bool,
    /// Log request/response bodies for this call.
    pub log_payload: bool,
}

impl ApiRequest {
    /// Authenticated request without a body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            authenticated: true,
            log_payload: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PATCH, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn unauthenticated(mut self) -> Self {
        self.authenticated = false;
        self
    }

    pub fn without_payload_logging(mut self) -> Self {
        self.log_payload = false;
        self
    }
}

/// A fully addressed request. Retries resend exactly these bytes.
#[derive(Clone, Debug)]
pub struct PreparedRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
    log_payload: bool,
}

impl PreparedRequest {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn log_payload(&self) -> bool {
        self.log_payload
    }

    pub(crate) fn suppress_payload_logging(&mut self) {
        self.log_payload = false;
    }

    pub(crate) fn set_authorization(&mut self, value: &str) -> Result<()> {
        let value = HeaderValue::from_str(value)
            .map_err(|_| MsoError::auth("session token is not a valid header value"))?;
        self.headers.insert(header::AUTHORIZATION, value);
        Ok(())
    }

    pub(crate) fn to_reqwest(&self, http: &reqwest::Client) -> reqwest::RequestBuilder {
        let builder = http
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone());
        match &self.body {
            Some(body) => builder.body(body.clone()),
            None => builder,
        }
    }
}

/// Resolves `request` against `base` without touching authentication.
pub(crate) fn prepare(base: &Url, platform: Platform, request: &ApiRequest) -> Result<PreparedRequest> {
    let url = resolve_url(base, platform, &request.method, &request.path)?;

    let body = if request.method == Method::GET || request.method == Method::DELETE {
        None
    } else {
        request
            .body
            .as_ref()
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|err| MsoError::Parse(format!("request body could not be encoded: {err}")))?
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );

    Ok(PreparedRequest {
        method: request.method.clone(),
        url,
        headers,
        body,
        log_payload: request.log_payload,
    })
}

fn resolve_url(base: &Url, platform: Platform, method: &Method, path: &str) -> Result<Url> {
    let routed = platform.route(path);
    let mut url = base
        .join(&routed)
        .map_err(|err| MsoError::Parse(format!("invalid request path '{path}': {err}")))?;

    // Schema validation is always disabled for PATCH.
    if *method == Method::PATCH {
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != "validate")
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(pairs)
            .append_pair("validate", "false");
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use reqwest::{header, Method, Url};
    use serde_json::json;

    use super::{prepare, ApiRequest};
    use crate::Platform;

    fn base() -> Url {
        Url::parse("https://mso.example.com:8443").unwrap()
    }

    #[test]
    fn classic_path_resolves_against_base() {
        let prepared = prepare(&base(), Platform::Classic, &ApiRequest::get("/api/v1/schemas"))
            .unwrap();
        assert_eq!(
            prepared.url().as_str(),
            "https://mso.example.com:8443/api/v1/schemas"
        );
        assert!(prepared.body().is_none());
    }

    #[test]
    fn gateway_path_is_prefixed() {
        let prepared =
            prepare(&base(), Platform::Gateway, &ApiRequest::get("/api/v1/schemas")).unwrap();
        assert_eq!(
            prepared.url().as_str(),
            "https://mso.example.com:8443/mso/api/v1/schemas"
        );
    }

    #[test]
    fn gateway_login_is_not_prefixed() {
        let request = ApiRequest::post("/login", json!({})).unauthenticated();
        let prepared = prepare(&base(), Platform::Gateway, &request).unwrap();
        assert_eq!(prepared.url().path(), "/login");
    }

    #[test]
    fn patch_forces_validate_false() {
        let request = ApiRequest::patch("/api/v1/schemas/1?validate=true&x=1", json!([]));
        let prepared = prepare(&base(), Platform::Classic, &request).unwrap();
        let query: Vec<(String, String)> = prepared
            .url()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            query,
            vec![
                ("x".to_owned(), "1".to_owned()),
                ("validate".to_owned(), "false".to_owned())
            ]
        );
    }

    #[test]
    fn delete_drops_body_and_post_encodes_it() {
        let delete = ApiRequest::delete("/api/v1/sites/1").with_body(json!({"a": 1}));
        assert!(prepare(&base(), Platform::Classic, &delete)
            .unwrap()
            .body()
            .is_none());

        let post = ApiRequest::post("/api/v1/sites", json!({"name": "s1"}));
        let prepared = prepare(&base(), Platform::Classic, &post).unwrap();
        assert_eq!(prepared.body(), Some(br#"{"name":"s1"}"#.as_slice()));
        assert_eq!(
            prepared.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(prepared.method(), &Method::POST);
    }
}
