//! Installation detection strategies (§4.2 sub-stage 1–2).
//!
//! The source carried two overlapping composer-installation detectors,
//! one of which was dead code; only the authoritative
//! path-resolver-backed shape is implemented here.

use crate::error::Result;
use crate::model::{Installation, InstallationMetadata, InstallationMode};
use crate::version::Version;
use serde_json::Value;
use std::path::Path;

/// A pluggable procedure that decides whether `path` is an installation
/// of a particular layout family.
pub trait DetectionStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn priority(&self) -> u32;

    /// Required indicator files; strategies failing this pre-check are
    /// skipped without `detect` ever being invoked.
    fn indicators_present(&self, path: &Path) -> bool;

    fn detect(&self, path: &Path) -> Result<Option<Installation>>;
}

pub fn default_detection_strategies() -> Vec<Box<dyn DetectionStrategy>> {
    vec![
        Box::new(ComposerDetectionStrategy),
        Box::new(LegacyDetectionStrategy),
        Box::new(DockerDetectionStrategy),
    ]
}

fn read_composer_json(path: &Path) -> Option<Value> {
    let contents = std::fs::read_to_string(path.join("composer.json")).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Composer-standard and composer-custom share one indicator
/// (`composer.json` requiring a core package); the custom variant is
/// distinguished by an `extra."typo3/cms"."web-dir"` override (§8 S2).
struct ComposerDetectionStrategy;

impl DetectionStrategy for ComposerDetectionStrategy {
    fn name(&self) -> &str {
        "composer-detection"
    }

    fn priority(&self) -> u32 {
        100
    }

    fn indicators_present(&self, path: &Path) -> bool {
        path.join("composer.json").is_file()
    }

    fn detect(&self, path: &Path) -> Result<Option<Installation>> {
        let Some(manifest) = read_composer_json(path) else {
            return Ok(None);
        };

        let requires_core = manifest
            .get("require")
            .and_then(|r| r.as_object())
            .map(|r| r.keys().any(|k| k == "typo3/cms-core"))
            .unwrap_or(false);
        if !requires_core {
            return Ok(None);
        }

        let custom_web_dir = manifest
            .pointer("/extra/typo3~1cms/web-dir")
            .and_then(|v| v.as_str())
            .map(str::to_owned);

        let mode = if custom_web_dir.is_some() {
            InstallationMode::ComposerCustom
        } else {
            InstallationMode::ComposerStandard
        };

        let mut custom_paths = std::collections::HashMap::new();
        if let Some(web_dir) = custom_web_dir {
            custom_paths.insert(crate::model::PathType::WebDir, web_dir);
        }

        let mut installation = Installation::new(path.to_path_buf(), Version::new(0, 0, 0, None), mode);
        installation.custom_paths = custom_paths;
        installation.metadata = InstallationMetadata::default();
        Ok(Some(installation))
    }
}

/// Legacy layouts carry `typo3conf/PackageStates.php` directly at the
/// installation root with no composer manifest.
struct LegacyDetectionStrategy;

impl DetectionStrategy for LegacyDetectionStrategy {
    fn name(&self) -> &str {
        "legacy-detection"
    }

    fn priority(&self) -> u32 {
        50
    }

    fn indicators_present(&self, path: &Path) -> bool {
        path.join("typo3conf").is_dir() && !path.join("composer.json").is_file()
    }

    fn detect(&self, path: &Path) -> Result<Option<Installation>> {
        Ok(Some(Installation::new(
            path.to_path_buf(),
            Version::new(0, 0, 0, None),
            InstallationMode::Legacy,
        )))
    }
}

/// Docker-packaged installations ship a `Dockerfile` alongside a
/// composer manifest; detected separately so the mode is reported
/// accurately even though path resolution mostly mirrors composer-standard.
struct DockerDetectionStrategy;

impl DetectionStrategy for DockerDetectionStrategy {
    fn name(&self) -> &str {
        "docker-detection"
    }

    fn priority(&self) -> u32 {
        // Strictly above `ComposerDetectionStrategy`'s 100: Docker's own
        // indicator (`Dockerfile` + `composer.json`) is a strict subset of
        // Composer's (`composer.json` alone), so it must be tried first or
        // it would never win.
        150
    }

    fn indicators_present(&self, path: &Path) -> bool {
        path.join("Dockerfile").is_file() && path.join("composer.json").is_file()
    }

    fn detect(&self, path: &Path) -> Result<Option<Installation>> {
        if read_composer_json(path).is_none() {
            return Ok(None);
        }
        Ok(Some(Installation::new(
            path.to_path_buf(),
            Version::new(0, 0, 0, None),
            InstallationMode::Docker,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn composer_custom_detected_from_web_dir_override() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("composer.json"),
            r#"{"require": {"typo3/cms-core": "^12.4"}, "extra": {"typo3/cms": {"web-dir": "web"}}}"#,
        )
        .unwrap();

        let strategy = ComposerDetectionStrategy;
        let installation = strategy.detect(dir.path()).unwrap().unwrap();
        assert_eq!(installation.mode, InstallationMode::ComposerCustom);
        assert_eq!(
            installation.custom_paths.get(&crate::model::PathType::WebDir),
            Some(&"web".to_owned())
        );
    }

    #[test]
    fn composer_without_core_requirement_does_not_match() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("composer.json"), r#"{"require": {}}"#).unwrap();

        let strategy = ComposerDetectionStrategy;
        assert!(strategy.detect(dir.path()).unwrap().is_none());
    }
}
