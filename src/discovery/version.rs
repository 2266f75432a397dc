//! Version-extraction strategies (§4.2 sub-stage 3), tried in descending
//! reliability: lock file (exact installed version) first, then manifest
//! constraint, then source-file inspection, then legacy fallback.

use crate::error::Result;
use crate::version::Version;
use serde_json::Value;
use std::path::Path;

pub struct VersionEvidence {
    pub version: Version,
}

pub trait VersionStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Reliability in `[0,1]`; the highest-reliability strategy whose
    /// `extract` succeeds wins.
    fn reliability(&self) -> f64;

    fn extract(&self, installation_path: &Path) -> Result<Option<VersionEvidence>>;
}

pub fn default_version_strategies() -> Vec<Box<dyn VersionStrategy>> {
    vec![
        Box::new(ComposerLockStrategy),
        Box::new(ComposerManifestStrategy),
        Box::new(LegacySourceConstantStrategy),
    ]
}

/// `composer.lock`'s pinned version for `typo3/cms-core` — exact, so
/// highest reliability (§8 S1).
struct ComposerLockStrategy;

impl VersionStrategy for ComposerLockStrategy {
    fn name(&self) -> &str {
        "composer-lock"
    }

    fn reliability(&self) -> f64 {
        1.0
    }

    fn extract(&self, installation_path: &Path) -> Result<Option<VersionEvidence>> {
        let Ok(contents) = std::fs::read_to_string(installation_path.join("composer.lock")) else {
            return Ok(None);
        };
        let Ok(parsed) = serde_json::from_str::<Value>(&contents) else {
            return Ok(None);
        };

        let Some(packages) = parsed.get("packages").and_then(|p| p.as_array()) else {
            return Ok(None);
        };

        for package in packages {
            if package.get("name").and_then(|n| n.as_str()) == Some("typo3/cms-core") {
                if let Some(version) = package.get("version").and_then(|v| v.as_str()) {
                    if let Ok(parsed_version) = Version::parse(version) {
                        return Ok(Some(VersionEvidence {
                            version: parsed_version,
                        }));
                    }
                }
            }
        }
        Ok(None)
    }
}

/// `composer.json`'s declared constraint — a range, not an exact
/// version, so a weaker signal than the lock file. The lowest bound of
/// the constraint's numeric prefix is taken as the best-effort version.
struct ComposerManifestStrategy;

impl VersionStrategy for ComposerManifestStrategy {
    fn name(&self) -> &str {
        "composer-manifest"
    }

    fn reliability(&self) -> f64 {
        0.6
    }

    fn extract(&self, installation_path: &Path) -> Result<Option<VersionEvidence>> {
        let Ok(contents) = std::fs::read_to_string(installation_path.join("composer.json")) else {
            return Ok(None);
        };
        let Ok(parsed) = serde_json::from_str::<Value>(&contents) else {
            return Ok(None);
        };

        let Some(constraint) = parsed
            .pointer("/require/typo3~1cms-core")
            .and_then(|v| v.as_str())
        else {
            return Ok(None);
        };

        let numeric_prefix: String = constraint
            .trim_start_matches(['^', '~', '>', '=', ' '])
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        if numeric_prefix.is_empty() {
            return Ok(None);
        }

        Version::parse(&numeric_prefix)
            .map(|version| Some(VersionEvidence { version }))
    }
}

/// Legacy layouts without composer carry the version in a source
/// constant file; read without executing it.
struct LegacySourceConstantStrategy;

impl VersionStrategy for LegacySourceConstantStrategy {
    fn name(&self) -> &str {
        "legacy-source-constant"
    }

    fn reliability(&self) -> f64 {
        0.3
    }

    fn extract(&self, installation_path: &Path) -> Result<Option<VersionEvidence>> {
        let candidates = [
            installation_path.join("typo3/sysext/core/Classes/Information/Typo3Version.php"),
            installation_path.join("ChangeLog.txt"),
        ];

        for candidate in candidates {
            let Ok(contents) = std::fs::read_to_string(&candidate) else {
                continue;
            };
            if let Some(version) = extract_version_literal(&contents) {
                if let Ok(parsed) = Version::parse(&version) {
                    return Ok(Some(VersionEvidence { version: parsed }));
                }
            }
        }
        Ok(None)
    }
}

/// Pulls the first `N.N.N` literal out of free-form source text, without
/// parsing it as PHP.
fn extract_version_literal(text: &str) -> Option<String> {
    let re = regex::Regex::new(r"\b(\d+\.\d+\.\d+)\b").ok()?;
    re.find(text).map(|m| m.as_str().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_file_wins_over_manifest_constraint() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("composer.json"),
            r#"{"require": {"typo3/cms-core": "^12.4"}}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("composer.lock"),
            r#"{"packages": [{"name": "typo3/cms-core", "version": "12.4.10"}]}"#,
        )
        .unwrap();

        let lock = ComposerLockStrategy.extract(dir.path()).unwrap().unwrap();
        assert_eq!(lock.version.to_string(), "12.4.10");

        let manifest = ComposerManifestStrategy
            .extract(dir.path())
            .unwrap()
            .unwrap();
        assert_eq!(manifest.version.to_string(), "12.4.0");
        assert!(ComposerLockStrategy.reliability() > ComposerManifestStrategy.reliability());
    }

    #[test]
    fn missing_lock_file_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ComposerLockStrategy.extract(dir.path()).unwrap().is_none());
    }
}
