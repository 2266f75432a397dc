//! `Version`: `{major, minor, patch, suffix}`, total-ordered.
//!
//! Parsed from strings matching `N.N[.N][-suffix]`; a leading `v` is
//! stripped. Any non-empty suffix orders strictly before the empty suffix
//! at the same `(major, minor, patch)` — this is the opposite convention
//! from treating a missing suffix as "smaller", so the `Ord` impl is
//! hand-written rather than derived.

use crate::error::{Error, ErrorCode, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub suffix: Option<String>,
}

fn version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^v?(\d+)\.(\d+)(?:\.(\d+))?(?:-(.+))?$").expect("valid version regex")
    })
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64, suffix: Option<String>) -> Self {
        Version {
            major,
            minor,
            patch,
            suffix,
        }
    }

    pub fn parse(raw: &str) -> Result<Version> {
        let caps = version_re().captures(raw.trim()).ok_or_else(|| {
            Error::parse(
                ErrorCode::ConfigParse,
                format!("'{raw}' is not a valid version string"),
            )
        })?;

        let major = caps[1].parse().expect("digits matched by regex");
        let minor = caps[2].parse().expect("digits matched by regex");
        let patch = caps
            .get(3)
            .map(|m| m.as_str().parse().expect("digits matched by regex"))
            .unwrap_or(0);
        let suffix = caps.get(4).map(|m| m.as_str().to_owned());

        Ok(Version {
            major,
            minor,
            patch,
            suffix,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(suffix) = &self.suffix {
            write!(f, "-{suffix}")?;
        }
        Ok(())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.suffix, &other.suffix) {
                (None, None) => Ordering::Equal,
                // A non-empty suffix sorts strictly before no suffix.
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_version() {
        let v = Version::parse("12.4.10").unwrap();
        assert_eq!(v, Version::new(12, 4, 10, None));
    }

    #[test]
    fn strips_leading_v_and_defaults_patch() {
        let v = Version::parse("v9.0").unwrap();
        assert_eq!(v, Version::new(9, 0, 0, None));
    }

    #[test]
    fn parses_suffix() {
        let v = Version::parse("12.4.10-dev").unwrap();
        assert_eq!(v.suffix.as_deref(), Some("dev"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(Version::parse("not-a-version").is_err());
    }

    #[test]
    fn round_trip_through_display() {
        for raw in ["1.2.3", "1.2.3-beta", "0.1.0"] {
            let v = Version::parse(raw).unwrap();
            let reparsed = Version::parse(&v.to_string()).unwrap();
            assert_eq!(v, reparsed);
        }
    }

    #[test]
    fn suffix_sorts_before_release_at_same_triple() {
        let pre = Version::new(12, 4, 0, Some("dev".into()));
        let release = Version::new(12, 4, 0, None);
        assert!(pre < release);
    }

    #[test]
    fn numeric_components_dominate_suffix() {
        let older = Version::new(12, 3, 9, None);
        let newer_pre = Version::new(12, 4, 0, Some("dev".into()));
        assert!(older < newer_pre);
    }

    #[test]
    fn total_order_is_transitive_sample() {
        let mut versions = vec![
            Version::parse("12.4.10").unwrap(),
            Version::parse("12.4.10-dev").unwrap(),
            Version::parse("9.0.0").unwrap(),
            Version::parse("12.4.9").unwrap(),
        ];
        versions.sort();
        let expected = vec![
            Version::parse("9.0.0").unwrap(),
            Version::parse("12.4.9").unwrap(),
            Version::parse("12.4.10-dev").unwrap(),
            Version::parse("12.4.10").unwrap(),
        ];
        assert_eq!(versions, expected);
    }
}
