use std::{cmp::Ordering, fmt, str::FromStr};

use crate::{
    client::{read_lock, write_lock},
    wire::{scalar_text, strip_quotes},
    ApiRequest, MsoClient, MsoError, Result,
};

const VERSION_PATH: &str = "/api/v1/platform/version";

/// Orchestrator release number such as `3.7.1g` or `4.2.3-rc1`.
///
/// Numeric segments compare numerically with missing segments read as zero,
/// so `4.0` equals `4.0.0`. A pre-release suffix sorts before the bare
/// release; `+build` metadata is ignored.
#[derive(Clone, Debug)]
pub struct PlatformVersion {
    segments: Vec<u64>,
    pre_release: Option<String>,
}

impl PlatformVersion {
    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    pub fn pre_release(&self) -> Option<&str> {
        self.pre_release.as_deref()
    }
}

impl FromStr for PlatformVersion {
    type Err = MsoError;

    fn from_str(input: &str) -> Result<Self> {
        let invalid = || MsoError::Parse(format!("malformed version string '{input}'"));

        let trimmed = strip_quotes(input.trim()).trim();
        let raw = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let raw = raw.split_once('+').map_or(raw, |(core, _)| core);

        let split = raw
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(raw.len());
        let (numeric, suffix) = raw.split_at(split);

        let segments = numeric
            .split('.')
            .map(|segment| segment.parse::<u64>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>>>()?;

        let pre_release = suffix.strip_prefix('-').unwrap_or(suffix);
        let valid_suffix = pre_release
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '~'));
        if !valid_suffix || (!suffix.is_empty() && pre_release.is_empty()) {
            return Err(invalid());
        }

        Ok(Self {
            segments,
            pre_release: (!pre_release.is_empty()).then(|| pre_release.to_owned()),
        })
    }
}

impl fmt::Display for PlatformVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
            first = false;
        }
        match &self.pre_release {
            Some(pre) => write!(f, "-{pre}"),
            None => Ok(()),
        }
    }
}

impl Ord for PlatformVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for index in 0..len {
            let left = self.segments.get(index).copied().unwrap_or(0);
            let right = other.segments.get(index).copied().unwrap_or(0);
            match left.cmp(&right) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }

        match (&self.pre_release, &other.pre_release) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(left), Some(right)) => compare_pre_release(left, right),
        }
    }
}

impl PartialOrd for PlatformVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PlatformVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PlatformVersion {}

fn compare_pre_release(left: &str, right: &str) -> Ordering {
    let mut left_parts = left.split('.');
    let mut right_parts = right.split('.');
    loop {
        match (left_parts.next(), right_parts.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => l.cmp(r),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

impl MsoClient {
    /// Fetches the platform version and caches it on the client.
    pub async fn version(&self) -> Result<String> {
        let response = self.execute(&ApiRequest::get(VERSION_PATH)).await?;
        let version = response
            .body
            .as_ref()
            .and_then(|body| body.get("version"))
            .and_then(scalar_text)
            .map(|version| version.trim().to_owned())
            .filter(|version| !version.is_empty())
            .ok_or(MsoError::VersionUnavailable)?;

        tracing::debug!(%version, "platform version retrieved");
        *write_lock(&self.version) = Some(version.clone());
        Ok(version)
    }

    /// Version cached by the last successful [`MsoClient::version`] call, or
    /// the one declared through [`crate::ClientOptions::api_version`].
    pub fn cached_version(&self) -> Option<String> {
        read_lock(&self.version).clone()
    }

    /// Compares `target` with the platform version.
    ///
    /// Returns `Greater` when `target` is newer than the platform. The
    /// platform version is fetched first if nothing is cached or declared.
    pub async fn compare_version(&self, target: &str) -> Result<Ordering> {
        let current = match self.cached_version() {
            Some(version) => version,
            None => self.version().await?,
        };

        let current: PlatformVersion = current.parse().map_err(|_| {
            MsoError::Parse(format!("could not parse platform version '{current}'"))
        })?;
        let target: PlatformVersion = target.parse()?;
        Ok(target.cmp(&current))
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use super::PlatformVersion;
    use crate::MsoError;

    fn v(input: &str) -> PlatformVersion {
        input.parse().expect("version must parse")
    }

    #[test]
    fn parses_orchestrator_release_strings() {
        let version = v("3.7.1g");
        assert_eq!(version.segments(), &[3, 7, 1]);
        assert_eq!(version.pre_release(), Some("g"));

        let version = v("\"v4.2.3-rc.1+build7\"");
        assert_eq!(version.segments(), &[4, 2, 3]);
        assert_eq!(version.pre_release(), Some("rc.1"));
        assert_eq!(version.to_string(), "4.2.3-rc.1");
    }

    #[test]
    fn rejects_malformed_strings() {
        for input in ["", "unknown", "3..1", "3.7.", "4.0(1a)", "3.1-"] {
            assert!(
                matches!(input.parse::<PlatformVersion>(), Err(MsoError::Parse(_))),
                "{input} must be rejected"
            );
        }
    }

    #[test]
    fn missing_segments_compare_as_zero() {
        assert_eq!(v("4.0"), v("4.0.0"));
        assert_eq!(v("4.0").cmp(&v("4.0.0")), Ordering::Equal);
    }

    #[test]
    fn orders_numerically() {
        assert!(v("3.10.0") > v("3.9.9"));
        assert!(v("4.0.0") > v("3.7.1"));
    }

    #[test]
    fn pre_release_sorts_before_release() {
        assert!(v("3.7.1g") < v("3.7.1"));
        assert!(v("3.7.1g") > v("3.7.1e"));
        assert!(v("1.0.0-rc.2") < v("1.0.0-rc.10"));
        assert!(v("1.0.0-1") < v("1.0.0-alpha"));
    }
}
