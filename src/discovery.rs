//! DiscoveryPipeline (§4.2): detects an installation's layout, extracts
//! its version, optionally parses its core configuration and runs
//! validation rules, then enumerates its extensions.
//!
//! Mirrors the registry shape already used by `path`: an explicit,
//! priority-ordered `Vec<Box<dyn ...>>` populated at construction rather
//! than discovered by tag.

mod extensions;
mod strategies;
mod version;

pub use extensions::{default_extension_sources, ExtensionSource};
pub use strategies::{default_detection_strategies, DetectionStrategy};
pub use version::{default_version_strategies, VersionEvidence, VersionStrategy};

use crate::cache::{CacheType, FileCacheStore};
use crate::configparser::ConfigParser;
use crate::error::{Error, ErrorCode, Result};
use crate::model::{Extension, Installation, InstallationMode, ValidationIssue};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A pluggable rule applied once an `Installation` skeleton exists.
///
/// `check` returns `Result` rather than panicking on internal failure; the
/// pipeline turns an `Err` into a single Error-severity issue named after
/// the rule rather than letting it abort discovery (§4.2).
pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &str;
    fn applies_to(&self, installation: &Installation) -> bool;
    fn check(&self, installation: &Installation) -> Result<Vec<ValidationIssue>>;
}

/// Per-strategy bookkeeping surfaced when discovery fails entirely, so a
/// caller can see which strategies were even tried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyAttempt {
    pub strategy_name: String,
    pub supported: bool,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallationDiscoveryResult {
    pub successful: bool,
    pub installation: Option<Installation>,
    pub attempts: Vec<StrategyAttempt>,
    pub was_from_cache: bool,
}

pub struct DiscoveryPipeline {
    detection_strategies: Vec<Box<dyn DetectionStrategy>>,
    version_strategies: Vec<Box<dyn VersionStrategy>>,
    extension_sources: Vec<Box<dyn ExtensionSource>>,
    validation_rules: Vec<Box<dyn ValidationRule>>,
    config_parser: Option<ConfigParser>,
    cache: DashMap<String, InstallationDiscoveryResult>,
    persistent_cache: Option<Arc<FileCacheStore>>,
    skip_extensions: HashSet<String>,
}

impl DiscoveryPipeline {
    pub fn with_defaults() -> Self {
        DiscoveryPipeline {
            detection_strategies: default_detection_strategies(),
            version_strategies: default_version_strategies(),
            extension_sources: default_extension_sources(),
            validation_rules: Vec::new(),
            config_parser: None,
            cache: DashMap::new(),
            persistent_cache: None,
            skip_extensions: HashSet::new(),
        }
    }

    pub fn with_config_parser(mut self, parser: ConfigParser) -> Self {
        self.config_parser = Some(parser);
        self
    }

    /// Extension keys to exclude from enumeration output (§4.2's skip list).
    pub fn with_skip_extensions(mut self, skip: HashSet<String>) -> Self {
        self.skip_extensions = skip;
        self
    }

    pub fn with_validation_rules(mut self, rules: Vec<Box<dyn ValidationRule>>) -> Self {
        self.validation_rules = rules;
        self
    }

    pub fn with_persistent_cache(mut self, store: Arc<FileCacheStore>) -> Self {
        self.persistent_cache = Some(store);
        self
    }

    fn cache_key(path: &Path, validate: bool) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update(&[validate as u8]);
        hasher.finalize().to_hex().to_string()
    }

    /// Runs the full pipeline for `path`. Path-not-a-directory is an
    /// immediate `Fatal` failure with no strategies invoked (§4.2).
    pub fn discover(&self, path: &Path, validate: bool) -> Result<InstallationDiscoveryResult> {
        if !path.is_dir() {
            return Err(Error::fatal(
                ErrorCode::PathNotFound,
                format!("{} is not a directory", path.display()),
            ));
        }

        let canonical = path
            .canonicalize()
            .map_err(|e| Error::fatal(ErrorCode::PathNotFound, format!("canonicalize: {e}")))?;

        let key = Self::cache_key(&canonical, validate);
        if let Some(mut cached) = self.cache.get(&key).map(|r| r.clone()) {
            cached.was_from_cache = true;
            return Ok(cached);
        }
        if let Some(store) = &self.persistent_cache {
            if let Some(mut cached) =
                store.get::<InstallationDiscoveryResult>(CacheType::InstallationDiscovery, &key)
            {
                cached.was_from_cache = true;
                self.cache.insert(key.clone(), cached.clone());
                return Ok(cached);
            }
        }

        let mut attempts = Vec::new();
        let mut ordered: Vec<&Box<dyn DetectionStrategy>> = self.detection_strategies.iter().collect();
        ordered.sort_by(|a, b| b.priority().cmp(&a.priority()));

        let mut installation = None;
        for strategy in ordered {
            if !strategy.indicators_present(&canonical) {
                attempts.push(StrategyAttempt {
                    strategy_name: strategy.name().to_owned(),
                    supported: false,
                    failure_reason: None,
                });
                continue;
            }

            match strategy.detect(&canonical) {
                Ok(Some(outcome)) => {
                    attempts.push(StrategyAttempt {
                        strategy_name: strategy.name().to_owned(),
                        supported: true,
                        failure_reason: None,
                    });
                    installation = Some(outcome);
                    break;
                }
                Ok(None) => {
                    attempts.push(StrategyAttempt {
                        strategy_name: strategy.name().to_owned(),
                        supported: true,
                        failure_reason: Some("did not match".to_owned()),
                    });
                }
                Err(e) => {
                    attempts.push(StrategyAttempt {
                        strategy_name: strategy.name().to_owned(),
                        supported: true,
                        failure_reason: Some(e.to_string()),
                    });
                }
            }
        }

        let mut installation = match installation {
            Some(install) => install,
            None => {
                return Ok(InstallationDiscoveryResult {
                    successful: false,
                    installation: None,
                    attempts,
                    was_from_cache: false,
                });
            }
        };

        self.extract_version(&mut installation);

        if let Some(parser) = &self.config_parser {
            let _ = self.discover_configuration(&mut installation, parser);
        }

        for rule in &self.validation_rules {
            if !rule.applies_to(&installation) {
                continue;
            }
            match rule.check(&installation) {
                Ok(issues) => installation.validation_issues.extend(issues),
                Err(e) => installation.validation_issues.push(ValidationIssue {
                    rule_name: rule.name().to_owned(),
                    severity: crate::model::IssueSeverity::Error,
                    message: e.to_string(),
                    category: "validation".to_owned(),
                    context: Default::default(),
                    affected_paths: Vec::new(),
                    recommendations: Vec::new(),
                }),
            }
        }

        let extensions = self.enumerate_extensions(&installation, &self.skip_extensions);
        for extension in extensions {
            let _ = installation.add_extension(extension);
        }

        let result = InstallationDiscoveryResult {
            successful: true,
            installation: Some(installation),
            attempts,
            was_from_cache: false,
        };

        self.cache.insert(key.clone(), result.clone());
        if let Some(store) = &self.persistent_cache {
            let _ = store.put(CacheType::InstallationDiscovery, &key, 3600, &result);
        }

        Ok(result)
    }

    fn extract_version(&self, installation: &mut Installation) {
        let mut ordered: Vec<&Box<dyn VersionStrategy>> = self.version_strategies.iter().collect();
        ordered.sort_by(|a, b| {
            b.reliability()
                .partial_cmp(&a.reliability())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for strategy in ordered {
            if let Ok(Some(evidence)) = strategy.extract(&installation.path) {
                installation.version = evidence.version;
                return;
            }
        }
    }

    fn discover_configuration(
        &self,
        installation: &mut Installation,
        parser: &ConfigParser,
    ) -> Result<()> {
        let candidates = [
            installation.path.join("typo3conf/LocalConfiguration.php"),
            installation.path.join("public/typo3conf/LocalConfiguration.php"),
            installation.path.join("config/system/settings.php"),
        ];

        for candidate in candidates {
            if !candidate.exists() {
                continue;
            }
            match parser.parse_file(&candidate) {
                Ok(parsed) => {
                    installation
                        .configuration
                        .insert("core".to_owned(), serde_json::to_value(parsed.data)?);
                    return Ok(());
                }
                Err(e) => {
                    installation.validation_issues.push(ValidationIssue {
                        rule_name: "configuration-discovery".to_owned(),
                        severity: crate::model::IssueSeverity::Warning,
                        message: e.to_string(),
                        category: "configuration".to_owned(),
                        context: Default::default(),
                        affected_paths: vec![candidate],
                        recommendations: Vec::new(),
                    });
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn enumerate_extensions(
        &self,
        installation: &Installation,
        skip: &HashSet<String>,
    ) -> Vec<Extension> {
        // Higher-authority sources run first and their records win ties;
        // lower-authority sources only fill in missing attributes.
        let mut ordered: Vec<&Box<dyn ExtensionSource>> = self.extension_sources.iter().collect();
        ordered.sort_by(|a, b| a.authority().cmp(&b.authority()));

        let mut by_key: std::collections::HashMap<String, Extension> = std::collections::HashMap::new();
        let mut seen_in_first_source: HashSet<String> = HashSet::new();

        for (idx, source) in ordered.iter().enumerate() {
            let found = source.discover(installation);
            let mut local_seen = HashSet::new();
            for extension in found {
                if skip.contains(&extension.key) {
                    continue;
                }
                if !local_seen.insert(extension.key.clone()) {
                    // Duplicate within a single source: first occurrence wins.
                    continue;
                }
                if idx == 0 {
                    seen_in_first_source.insert(extension.key.clone());
                }
                by_key
                    .entry(extension.key.clone())
                    .and_modify(|existing| merge_lower_authority(existing, &extension, source.name()))
                    .or_insert(extension);
            }
        }

        let mut extensions: Vec<Extension> = by_key.into_values().collect();
        extensions.sort_by(|a, b| a.key.cmp(&b.key));
        extensions
    }

    pub fn default_mode_for(&self, _path: &Path) -> InstallationMode {
        InstallationMode::Custom
    }
}

/// Fills gaps in `existing` (the higher-authority record already present)
/// from `lower`, without overwriting anything `existing` already set —
/// except `isActive`, which §4.2 says comes from the package-state file
/// specifically whenever that source has a record, regardless of which
/// source otherwise won the merge.
fn merge_lower_authority(existing: &mut Extension, lower: &Extension, lower_source_name: &str) {
    if existing.title.is_empty() {
        existing.title = lower.title.clone();
    }
    if existing.package.is_none() {
        existing.package = lower.package.clone();
    }
    if lower_source_name == "package-states" {
        existing.is_active = lower.is_active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn composer_std_fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("composer.json"),
            r#"{"require": {"typo3/cms-core": "^12.4"}}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("composer.lock"),
            r#"{"packages": [{"name": "typo3/cms-core", "version": "12.4.10"}]}"#,
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("public/typo3conf")).unwrap();
        dir
    }

    #[test]
    fn discovers_composer_standard_installation() {
        let dir = composer_std_fixture();
        let pipeline = DiscoveryPipeline::with_defaults();
        let result = pipeline.discover(dir.path(), false).unwrap();
        assert!(result.successful);
        let installation = result.installation.unwrap();
        assert_eq!(installation.mode, InstallationMode::ComposerStandard);
        assert_eq!(installation.version.to_string(), "12.4.10");
    }

    #[test]
    fn docker_mode_wins_over_composer_when_both_indicators_present() {
        let dir = composer_std_fixture();
        fs::write(dir.path().join("Dockerfile"), "FROM php:8.2-fpm\n").unwrap();

        let pipeline = DiscoveryPipeline::with_defaults();
        let result = pipeline.discover(dir.path(), false).unwrap();
        assert!(result.successful);
        let installation = result.installation.unwrap();
        assert_eq!(installation.mode, InstallationMode::Docker);
    }

    #[test]
    fn non_directory_path_fails_immediately() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let pipeline = DiscoveryPipeline::with_defaults();
        let err = pipeline.discover(file.path(), false).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PathNotFound);
    }

    #[test]
    fn empty_directory_reports_every_attempted_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = DiscoveryPipeline::with_defaults();
        let result = pipeline.discover(dir.path(), false).unwrap();
        assert!(!result.successful);
        assert!(!result.attempts.is_empty());
    }

    #[test]
    fn is_active_comes_from_package_states_even_though_lock_file_outranks_it() {
        let dir = composer_std_fixture();
        fs::write(
            dir.path().join("composer.lock"),
            r#"{"packages": [{"name": "georgringer/news", "type": "typo3-cms-extension", "version": "9.0.0"}]}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("public/typo3conf/PackageStates.php"),
            r#"'packages' => array('news' => array('state' => 'inactive'),),"#,
        )
        .unwrap();

        let pipeline = DiscoveryPipeline::with_defaults();
        let result = pipeline.discover(dir.path(), false).unwrap();
        let installation = result.installation.unwrap();
        let news = installation
            .extensions
            .iter()
            .find(|e| e.key == "news")
            .expect("news extension discovered from lock file");
        // The lock file (authority 0) wins `version`/`package`, but
        // `isActive` must still come from the state file (authority 1).
        assert!(!news.is_active);
        assert_eq!(news.version.as_ref().map(|v| v.to_string()), Some("9.0.0".to_owned()));
    }
}
