use reqwest::{header::HeaderMap, StatusCode};
use serde_json::Value;

/// Caller check on a decoded 2xx body; returning `true` requests another attempt.
pub type RetryPredicate<'a> = dyn Fn(&Value) -> bool + Send + Sync + 'a;

/// Payload and response metadata of a successful call.
#[derive(Clone, Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Attempts consumed, starting at 1.
    pub attempts: u32,
    /// Decoded body; `None` for 204 No Content.
    pub body: Option<Value>,
}

/// Classification of one received response.
#[derive(Debug)]
pub(crate) enum AttemptOutcome {
    Success(Value),
    NoContent,
    RetryStatus,
    RetryMalformed(serde_json::Error),
    RetryRequested(Value),
    Fatal(Option<Value>),
}

pub(crate) fn classify(
    status: StatusCode,
    body: &[u8],
    retry_when: Option<&RetryPredicate<'_>>,
) -> AttemptOutcome {
    if status == StatusCode::NO_CONTENT {
        return AttemptOutcome::NoContent;
    }

    if status.is_success() {
        // A 2xx with an unparsable body is treated as corrupted in transit.
        return match serde_json::from_slice::<Value>(body) {
            Err(err) => AttemptOutcome::RetryMalformed(err),
            Ok(value) if retry_when.is_some_and(|predicate| predicate(&value)) => {
                AttemptOutcome::RetryRequested(value)
            }
            Ok(value) => AttemptOutcome::Success(value),
        };
    }

    if matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
    ) {
        return AttemptOutcome::RetryStatus;
    }

    AttemptOutcome::Fatal(serde_json::from_slice(body).ok())
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use serde_json::{json, Value};

    use super::{classify, AttemptOutcome};

    #[test]
    fn ok_with_json_body_is_success() {
        let outcome = classify(StatusCode::OK, br#"{"id":"1"}"#, None);
        assert!(matches!(outcome, AttemptOutcome::Success(body) if body == json!({"id": "1"})));
    }

    #[test]
    fn no_content_short_circuits() {
        assert!(matches!(
            classify(StatusCode::NO_CONTENT, b"", None),
            AttemptOutcome::NoContent
        ));
    }

    #[test]
    fn malformed_success_body_is_retryable() {
        let outcome = classify(StatusCode::CREATED, b"{\"truncated", None);
        assert!(matches!(outcome, AttemptOutcome::RetryMalformed(_)));
    }

    #[test]
    fn predicate_can_request_retry() {
        let pending = |body: &Value| body["status"] == "pending";
        let outcome = classify(StatusCode::OK, br#"{"status":"pending"}"#, Some(&pending));
        assert!(matches!(outcome, AttemptOutcome::RetryRequested(_)));

        let outcome = classify(StatusCode::OK, br#"{"status":"done"}"#, Some(&pending));
        assert!(matches!(outcome, AttemptOutcome::Success(_)));
    }

    #[test]
    fn throttling_and_unavailable_are_retryable() {
        for status in [StatusCode::TOO_MANY_REQUESTS, StatusCode::SERVICE_UNAVAILABLE] {
            assert!(matches!(
                classify(status, b"{}", None),
                AttemptOutcome::RetryStatus
            ));
        }
    }

    #[test]
    fn other_errors_are_fatal_and_keep_body() {
        let outcome = classify(StatusCode::NOT_FOUND, br#"{"code":404}"#, None);
        assert!(matches!(outcome, AttemptOutcome::Fatal(Some(body)) if body == json!({"code": 404})));

        let outcome = classify(StatusCode::INTERNAL_SERVER_ERROR, b"<html>", None);
        assert!(matches!(outcome, AttemptOutcome::Fatal(None)));
    }
}
