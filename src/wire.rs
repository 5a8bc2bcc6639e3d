use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Login body for a standalone orchestrator.
#[derive(Debug, Serialize)]
pub struct ClassicLogin<'a> {
    pub username: &'a str,
    pub password: &'a str,
    #[serde(rename = "domainId", skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,
}

/// Login body for a Nexus Dashboard gateway.
#[derive(Debug, Serialize)]
pub struct GatewayLogin<'a> {
    #[serde(rename = "userName")]
    pub user_name: &'a str,
    #[serde(rename = "userPasswd")]
    pub user_passwd: &'a str,
    pub domain: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginDomains {
    pub domains: Vec<LoginDomain>,
}

#[derive(Debug, Deserialize)]
pub struct LoginDomain {
    #[serde(default)]
    pub name: Value,
    #[serde(default)]
    pub id: Value,
}

/// Renders a scalar JSON field as text, without surrounding quotes.
///
/// Returns `None` for `null`, arrays and objects.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(strip_quotes(text).to_owned()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Removes one pair of surrounding double quotes, if present.
pub fn strip_quotes(word: &str) -> &str {
    word.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(word)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{scalar_text, strip_quotes, ClassicLogin, GatewayLogin};

    #[test]
    fn classic_login_omits_missing_domain_id() {
        let body = serde_json::to_value(ClassicLogin {
            username: "admin",
            password: "pw",
            domain_id: None,
        })
        .unwrap();
        assert_eq!(body, json!({"username": "admin", "password": "pw"}));
    }

    #[test]
    fn gateway_login_uses_nd_field_names() {
        let body = serde_json::to_value(GatewayLogin {
            user_name: "admin",
            user_passwd: "pw",
            domain: "DefaultAuth",
        })
        .unwrap();
        assert_eq!(
            body,
            json!({"userName": "admin", "userPasswd": "pw", "domain": "DefaultAuth"})
        );
    }

    #[test]
    fn strips_quote_artifacts() {
        assert_eq!(strip_quotes("\"3.7.1g\""), "3.7.1g");
        assert_eq!(strip_quotes("\"unbalanced"), "\"unbalanced");
        assert_eq!(scalar_text(&json!("\"abc\"")), Some("abc".to_owned()));
        assert_eq!(scalar_text(&json!(42)), Some("42".to_owned()));
        assert_eq!(scalar_text(&json!({})), None);
    }
}
