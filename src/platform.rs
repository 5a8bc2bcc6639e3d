use std::{fmt, str::FromStr};

use crate::MsoError;

/// Deployment flavour of the orchestrator.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Platform {
    /// Standalone orchestrator exposing `/api/v1/...` directly.
    #[default]
    Classic,
    /// Orchestrator hosted on Nexus Dashboard; API calls are proxied under `/mso/`.
    Gateway,
}

/// Per-platform differences in login contract and path routing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct PlatformProfile {
    pub login_path: &'static str,
    /// Segment every non-login path is routed under, if any.
    pub path_prefix: Option<&'static str>,
    /// Domain used when none is configured.
    pub default_domain: Option<&'static str>,
    /// Whether the login domain must be translated to an id before login.
    pub resolves_domain_id: bool,
}

const CLASSIC: PlatformProfile = PlatformProfile {
    login_path: "/api/v1/auth/login",
    path_prefix: None,
    default_domain: None,
    resolves_domain_id: true,
};

const GATEWAY: PlatformProfile = PlatformProfile {
    login_path: "/login",
    path_prefix: Some("mso/"),
    default_domain: Some("DefaultAuth"),
    resolves_domain_id: false,
};

impl Platform {
    pub(crate) fn profile(self) -> &'static PlatformProfile {
        match self {
            Self::Classic => &CLASSIC,
            Self::Gateway => &GATEWAY,
        }
    }

    /// Routes `path` through the platform's proxy namespace.
    ///
    /// The login path is never rewritten.
    pub(crate) fn route(self, path: &str) -> String {
        let profile = self.profile();
        match profile.path_prefix {
            Some(prefix) if path != profile.login_path => {
                let relative = path.strip_prefix('/').unwrap_or(path);
                format!("{prefix}{relative}")
            }
            _ => path.to_owned(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classic => f.write_str("mso"),
            Self::Gateway => f.write_str("nd"),
        }
    }
}

impl FromStr for Platform {
    type Err = MsoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "mso" | "classic" => Ok(Self::Classic),
            "nd" | "gateway" => Ok(Self::Gateway),
            other => Err(MsoError::Config(format!("unknown platform '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Platform;

    #[test]
    fn gateway_routes_api_paths_under_mso_segment() {
        assert_eq!(
            Platform::Gateway.route("/api/v1/schemas"),
            "mso/api/v1/schemas"
        );
        assert_eq!(Platform::Gateway.route("api/v1/sites"), "mso/api/v1/sites");
    }

    #[test]
    fn gateway_keeps_login_path() {
        assert_eq!(Platform::Gateway.route("/login"), "/login");
    }

    #[test]
    fn classic_leaves_paths_untouched() {
        assert_eq!(
            Platform::Classic.route("/api/v1/schemas"),
            "/api/v1/schemas"
        );
    }

    #[test]
    fn parses_platform_names() {
        assert_eq!("nd".parse::<Platform>().unwrap(), Platform::Gateway);
        assert_eq!("MSO".parse::<Platform>().unwrap(), Platform::Classic);
        assert_eq!("".parse::<Platform>().unwrap(), Platform::Classic);
        assert!("apic".parse::<Platform>().is_err());
    }
}
