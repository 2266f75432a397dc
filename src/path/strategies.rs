//! Concrete path strategies, one module-level constructor per role,
//! explicitly registered by `default_strategies()` as a typed list in
//! place of tag-based discovery.

use super::{PathStrategy, StrategyOutcome};
use crate::error::Result;
use crate::model::{InstallationType, PathResolutionRequest, PathType};
use pathbuf::pathbuf;
use std::path::PathBuf;

pub fn default_strategies() -> Vec<Box<dyn PathStrategy>> {
    vec![
        Box::new(ConfiguredPathStrategy::new(
            "configured-path-override",
            100,
            &[
                PathType::WebDir,
                PathType::VendorDir,
                PathType::ConfigDir,
                PathType::ExtensionDir,
                PathType::Typo3confDir,
            ],
            &[
                InstallationType::ComposerStandard,
                InstallationType::ComposerCustom,
                InstallationType::Legacy,
                InstallationType::Docker,
                InstallationType::Custom,
            ],
        )),
        Box::new(FixedCandidateStrategy::new(
            "composer-standard-web-dir",
            75,
            PathType::WebDir,
            InstallationType::ComposerStandard,
            &["public"],
        )),
        Box::new(FixedCandidateStrategy::new(
            "docker-web-dir",
            50,
            PathType::WebDir,
            InstallationType::Docker,
            &["public", "html"],
        )),
        Box::new(FixedCandidateStrategy::new(
            "legacy-web-dir",
            25,
            PathType::WebDir,
            InstallationType::Legacy,
            &[".", "htdocs"],
        )),
        Box::new(FixedCandidateStrategy::new(
            "custom-web-dir-fallback",
            10,
            PathType::WebDir,
            InstallationType::Custom,
            &["public", "web", "htdocs"],
        )),
        Box::new(FixedCandidateStrategy::new(
            "composer-vendor-dir",
            75,
            PathType::VendorDir,
            InstallationType::ComposerStandard,
            &["vendor"],
        )),
        Box::new(FixedCandidateStrategy::new(
            "composer-custom-vendor-dir",
            75,
            PathType::VendorDir,
            InstallationType::ComposerCustom,
            &["vendor"],
        )),
        Box::new(FixedCandidateStrategy::new(
            "docker-vendor-dir",
            50,
            PathType::VendorDir,
            InstallationType::Docker,
            &["vendor"],
        )),
        Box::new(FixedCandidateStrategy::new(
            "custom-vendor-dir",
            25,
            PathType::VendorDir,
            InstallationType::Custom,
            &["vendor"],
        )),
        Box::new(FixedCandidateStrategy::new(
            "composer-installed-json",
            75,
            PathType::ComposerInstalled,
            InstallationType::ComposerStandard,
            &["vendor/composer/installed.json"],
        )),
        Box::new(FixedCandidateStrategy::new(
            "composer-installed-json-custom",
            75,
            PathType::ComposerInstalled,
            InstallationType::ComposerCustom,
            &["vendor/composer/installed.json"],
        )),
        Box::new(FixedCandidateStrategy::new(
            "composer-installed-json-docker",
            50,
            PathType::ComposerInstalled,
            InstallationType::Docker,
            &["vendor/composer/installed.json"],
        )),
        Box::new(WebRelativeStrategy::new(
            "typo3conf-under-web-dir",
            75,
            PathType::Typo3confDir,
            &[
                InstallationType::ComposerStandard,
                InstallationType::ComposerCustom,
                InstallationType::Docker,
            ],
            "typo3conf",
        )),
        Box::new(FixedCandidateStrategy::new(
            "legacy-typo3conf-dir",
            75,
            PathType::Typo3confDir,
            InstallationType::Legacy,
            &["typo3conf"],
        )),
        Box::new(FixedCandidateStrategy::new(
            "custom-typo3conf-dir",
            10,
            PathType::Typo3confDir,
            InstallationType::Custom,
            &["typo3conf", "public/typo3conf"],
        )),
        Box::new(WebRelativeStrategy::new(
            "extension-dir-under-web-dir",
            75,
            PathType::ExtensionDir,
            &[
                InstallationType::ComposerStandard,
                InstallationType::ComposerCustom,
                InstallationType::Docker,
            ],
            "typo3conf/ext",
        )),
        Box::new(FixedCandidateStrategy::new(
            "legacy-extension-dir",
            75,
            PathType::ExtensionDir,
            InstallationType::Legacy,
            &["typo3conf/ext"],
        )),
        Box::new(FixedCandidateStrategy::new(
            "custom-extension-dir",
            10,
            PathType::ExtensionDir,
            InstallationType::Custom,
            &["typo3conf/ext"],
        )),
        Box::new(WebRelativeStrategy::new(
            "system-extension-dir",
            50,
            PathType::SystemExtension,
            &[
                InstallationType::ComposerStandard,
                InstallationType::ComposerCustom,
            ],
            "typo3/sysext",
        )),
        Box::new(FixedCandidateStrategy::new(
            "legacy-system-extension-dir",
            50,
            PathType::SystemExtension,
            InstallationType::Legacy,
            &["typo3/sysext"],
        )),
        Box::new(FixedCandidateStrategy::new(
            "custom-system-extension-dir",
            10,
            PathType::SystemExtension,
            InstallationType::Custom,
            &["typo3/sysext"],
        )),
        Box::new(SingleExtensionStrategy::new(75)),
        Box::new(FixedCandidateStrategy::new(
            "config-dir-composer",
            75,
            PathType::ConfigDir,
            InstallationType::ComposerStandard,
            &["config/system"],
        )),
        Box::new(FixedCandidateStrategy::new(
            "config-dir-composer-custom",
            75,
            PathType::ConfigDir,
            InstallationType::ComposerCustom,
            &["config/system"],
        )),
        Box::new(FixedCandidateStrategy::new(
            "config-dir-legacy",
            75,
            PathType::ConfigDir,
            InstallationType::Legacy,
            &["typo3conf"],
        )),
        Box::new(FixedCandidateStrategy::new(
            "config-dir-docker",
            50,
            PathType::ConfigDir,
            InstallationType::Docker,
            &["config/system"],
        )),
        Box::new(FixedCandidateStrategy::new(
            "config-dir-custom",
            10,
            PathType::ConfigDir,
            InstallationType::Custom,
            &["config/system", "typo3conf"],
        )),
    ]
}

fn probe_candidates(root: &std::path::Path, relatives: &[String]) -> StrategyOutcome {
    let attempted: Vec<PathBuf> = relatives.iter().map(|r| pathbuf![root, r]).collect();
    let existing: Vec<PathBuf> = attempted.iter().filter(|p| p.exists()).cloned().collect();
    let mut iter = existing.into_iter();
    let resolved = iter.next();
    let alternatives = iter.collect();
    StrategyOutcome {
        resolved,
        alternatives,
        attempted,
    }
}

/// Honors an explicit override in the request's `pathConfiguration` before
/// any layout-specific strategy runs; this is what makes `composer-custom`
/// mode (§8 S2) resolve `web-dir` to a non-default directory.
struct ConfiguredPathStrategy {
    name: &'static str,
    pairs: Vec<(PathType, InstallationType, u32)>,
}

impl ConfiguredPathStrategy {
    // Incompatible (pathType, installationType) pairs already fail at
    // `PathResolutionRequestBuilder::build()`, so this registers every
    // combination unconditionally; resolve() never sees the rejected ones.
    fn new(
        name: &'static str,
        priority: u32,
        path_types: &[PathType],
        installation_types: &[InstallationType],
    ) -> Self {
        let mut pairs = Vec::new();
        for &pt in path_types {
            for &it in installation_types {
                pairs.push((pt, it, priority));
            }
        }
        ConfiguredPathStrategy { name, pairs }
    }
}

impl PathStrategy for ConfiguredPathStrategy {
    fn name(&self) -> &str {
        self.name
    }

    fn supports(&self) -> &[(PathType, InstallationType, u32)] {
        &self.pairs
    }

    fn resolve(&self, request: &PathResolutionRequest) -> Result<StrategyOutcome> {
        match request.path_configuration.get(&request.path_type) {
            Some(relative) => Ok(probe_candidates(
                &request.installation_path,
                std::slice::from_ref(relative),
            )),
            None => Ok(StrategyOutcome {
                resolved: None,
                alternatives: Vec::new(),
                attempted: Vec::new(),
            }),
        }
    }
}

/// Tries a fixed list of relative candidates under the installation root,
/// for one `(pathType, installationType)` pair.
struct FixedCandidateStrategy {
    name: &'static str,
    pair: (PathType, InstallationType, u32),
    candidates: Vec<String>,
}

impl FixedCandidateStrategy {
    fn new(
        name: &'static str,
        priority: u32,
        path_type: PathType,
        installation_type: InstallationType,
        candidates: &[&str],
    ) -> Self {
        FixedCandidateStrategy {
            name,
            pair: (path_type, installation_type, priority),
            candidates: candidates.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl PathStrategy for FixedCandidateStrategy {
    fn name(&self) -> &str {
        self.name
    }

    fn supports(&self) -> &[(PathType, InstallationType, u32)] {
        std::slice::from_ref(&self.pair)
    }

    fn resolve(&self, request: &PathResolutionRequest) -> Result<StrategyOutcome> {
        Ok(probe_candidates(&request.installation_path, &self.candidates))
    }
}

/// Resolves a path relative to the already-resolved web directory rather
/// than the installation root directly (e.g. `typo3conf` lives under
/// `public/` for composer layouts).
struct WebRelativeStrategy {
    name: &'static str,
    pairs: Vec<(PathType, InstallationType, u32)>,
    relative: &'static str,
}

impl WebRelativeStrategy {
    fn new(
        name: &'static str,
        priority: u32,
        path_type: PathType,
        installation_types: &[InstallationType],
        relative: &'static str,
    ) -> Self {
        WebRelativeStrategy {
            name,
            pairs: installation_types
                .iter()
                .map(|&it| (path_type, it, priority))
                .collect(),
            relative,
        }
    }

    fn web_dir_default() -> &'static str {
        "public"
    }
}

impl PathStrategy for WebRelativeStrategy {
    fn name(&self) -> &str {
        self.name
    }

    fn supports(&self) -> &[(PathType, InstallationType, u32)] {
        &self.pairs
    }

    fn resolve(&self, request: &PathResolutionRequest) -> Result<StrategyOutcome> {
        let web_dir = request
            .path_configuration
            .get(&PathType::WebDir)
            .map(|s| s.as_str())
            .unwrap_or_else(Self::web_dir_default);
        let relative = format!("{web_dir}/{}", self.relative);
        Ok(probe_candidates(
            &request.installation_path,
            std::slice::from_ref(&relative),
        ))
    }
}

/// Resolves a single extension's directory under the active extension
/// directories, using the request's `extensionIdentifier`. Per §4.3's
/// compatibility table `extension` has no incompatible installation
/// type, so this registers for all five rather than composer-standard
/// alone.
struct SingleExtensionStrategy {
    pairs: Vec<(PathType, InstallationType, u32)>,
}

impl SingleExtensionStrategy {
    fn new(priority: u32) -> Self {
        SingleExtensionStrategy {
            pairs: [
                InstallationType::ComposerStandard,
                InstallationType::ComposerCustom,
                InstallationType::Legacy,
                InstallationType::Docker,
                InstallationType::Custom,
            ]
            .iter()
            .map(|&it| (PathType::Extension, it, priority))
            .collect(),
        }
    }
}

impl PathStrategy for SingleExtensionStrategy {
    fn name(&self) -> &str {
        "single-extension-dir"
    }

    fn supports(&self) -> &[(PathType, InstallationType, u32)] {
        &self.pairs
    }

    fn resolve(&self, request: &PathResolutionRequest) -> Result<StrategyOutcome> {
        let Some(key) = &request.extension_identifier else {
            return Ok(StrategyOutcome {
                resolved: None,
                alternatives: Vec::new(),
                attempted: Vec::new(),
            });
        };
        let web_dir = request
            .path_configuration
            .get(&PathType::WebDir)
            .map(|s| s.as_str())
            .unwrap_or("public");
        let candidates = match request.installation_type {
            InstallationType::Legacy => vec![format!("typo3conf/ext/{key}")],
            InstallationType::ComposerStandard | InstallationType::ComposerCustom | InstallationType::Docker => {
                vec![format!("{web_dir}/typo3conf/ext/{key}"), format!("vendor/{key}")]
            }
            InstallationType::Custom => vec![
                format!("{web_dir}/typo3conf/ext/{key}"),
                format!("typo3conf/ext/{key}"),
                format!("vendor/{key}"),
            ],
        };
        Ok(probe_candidates(&request.installation_path, &candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_strategies_cover_every_path_type() {
        let strategies = default_strategies();
        for path_type in [
            PathType::WebDir,
            PathType::VendorDir,
            PathType::ComposerInstalled,
            PathType::ConfigDir,
            PathType::ExtensionDir,
            PathType::Typo3confDir,
            PathType::SystemExtension,
            PathType::Extension,
        ] {
            let covered = strategies
                .iter()
                .any(|s| s.supports().iter().any(|(pt, _, _)| *pt == path_type));
            assert!(covered, "no strategy registered for {path_type:?}");
        }
    }

    #[test]
    fn extension_path_type_is_registered_for_every_installation_type() {
        let strategies = default_strategies();
        for install_type in [
            InstallationType::ComposerStandard,
            InstallationType::ComposerCustom,
            InstallationType::Legacy,
            InstallationType::Docker,
            InstallationType::Custom,
        ] {
            let covered = strategies.iter().any(|s| {
                s.supports()
                    .iter()
                    .any(|(pt, it, _)| *pt == PathType::Extension && *it == install_type)
            });
            assert!(covered, "no strategy registered for (Extension, {install_type:?})");
        }
    }

    #[test]
    fn single_extension_strategy_resolves_under_legacy_layout() {
        use crate::model::PathResolutionRequest as Req;

        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("typo3conf/ext/news")).unwrap();

        let strategies = default_strategies();
        let strategy = strategies
            .iter()
            .find(|s| {
                s.supports()
                    .iter()
                    .any(|(pt, it, _)| *pt == PathType::Extension && *it == InstallationType::Legacy)
            })
            .expect("an extension strategy registered for Legacy");

        let request = Req::builder(PathType::Extension, dir.path(), InstallationType::Legacy)
            .extension_identifier("news")
            .build()
            .unwrap();
        let outcome = strategy.resolve(&request).unwrap();
        assert_eq!(outcome.resolved, Some(dir.path().join("typo3conf/ext/news")));
    }
}
