//! Extension enumeration sources (§4.2), tried in descending authority:
//! lock file > package-state file > directory scan. Each source's
//! records are merged by `discover.rs`, with lower-authority sources only
//! filling gaps the higher-authority source left.

use crate::model::{Extension, ExtensionType, Installation};
use serde_json::Value;
use std::path::Path;

pub trait ExtensionSource: Send + Sync {
    fn name(&self) -> &str;

    /// Lower numbers win ties during merge; 0 is the lock file.
    fn authority(&self) -> u32;

    fn discover(&self, installation: &Installation) -> Vec<Extension>;
}

pub fn default_extension_sources() -> Vec<Box<dyn ExtensionSource>> {
    vec![
        Box::new(LockFileSource),
        Box::new(PackageStateSource),
        Box::new(DirectoryScanSource),
    ]
}

const CORE_NAMESPACE_PREFIX: &str = "typo3/cms-";
const EXTENSION_PACKAGE_TYPE: &str = "typo3-cms-extension";

/// `composer.lock`: the authoritative source for third-party extensions.
struct LockFileSource;

impl ExtensionSource for LockFileSource {
    fn name(&self) -> &str {
        "composer-lock"
    }

    fn authority(&self) -> u32 {
        0
    }

    fn discover(&self, installation: &Installation) -> Vec<Extension> {
        let Ok(contents) = std::fs::read_to_string(installation.path.join("composer.lock")) else {
            return Vec::new();
        };
        let Ok(parsed) = serde_json::from_str::<Value>(&contents) else {
            return Vec::new();
        };
        let Some(packages) = parsed.get("packages").and_then(|p| p.as_array()) else {
            return Vec::new();
        };

        packages
            .iter()
            .filter_map(|package| {
                let name = package.get("name")?.as_str()?;
                let package_type = package.get("type").and_then(|t| t.as_str()).unwrap_or("");

                let is_extension =
                    package_type == EXTENSION_PACKAGE_TYPE || name.starts_with(CORE_NAMESPACE_PREFIX);
                if !is_extension {
                    return None;
                }

                let key = name
                    .rsplit('/')
                    .next()
                    .unwrap_or(name)
                    .trim_start_matches("cms-")
                    .to_owned();
                let version = package
                    .get("version")
                    .and_then(|v| v.as_str())
                    .and_then(|v| crate::version::Version::parse(v).ok());

                Some(Extension {
                    key,
                    title: String::new(),
                    version,
                    kind: ExtensionType::ThirdParty,
                    package: Some(name.to_owned()),
                    path: installation.path.join("vendor").join(name),
                    is_active: true,
                    em_configuration: Default::default(),
                })
            })
            .collect()
    }
}

/// Legacy `typo3conf/PackageStates.php`: enumerates locally activated
/// extensions. Contributes `isActive`; never loaded as executable PHP —
/// extension keys are lifted from the serialized-array literal keys.
struct PackageStateSource;

impl ExtensionSource for PackageStateSource {
    fn name(&self) -> &str {
        "package-states"
    }

    fn authority(&self) -> u32 {
        1
    }

    fn discover(&self, installation: &Installation) -> Vec<Extension> {
        let candidates = [
            installation.path.join("typo3conf/PackageStates.php"),
            installation.path.join("public/typo3conf/PackageStates.php"),
        ];

        for candidate in candidates {
            let Ok(contents) = std::fs::read_to_string(&candidate) else {
                continue;
            };
            return parse_package_states(&contents, &installation.path);
        }
        Vec::new()
    }
}

/// Extracts `'packages' => array('<key>' => array('state' => 'active', ...`
/// entries by regex rather than PHP evaluation (§4.3's safety rule
/// applies here too: never interpret the source file).
fn parse_package_states(contents: &str, installation_path: &Path) -> Vec<Extension> {
    let Ok(entry_re) = regex::Regex::new(r#"'([A-Za-z0-9_\-]+)'\s*=>\s*array\s*\(\s*'state'\s*=>\s*'(active|inactive)'"#) else {
        return Vec::new();
    };

    entry_re
        .captures_iter(contents)
        .filter(|caps| &caps[1] != "packages")
        .map(|caps| Extension {
            key: caps[1].to_owned(),
            title: String::new(),
            version: None,
            kind: ExtensionType::Local,
            package: None,
            path: installation_path.join("typo3conf/ext").join(&caps[1]),
            is_active: &caps[2] == "active",
            em_configuration: Default::default(),
        })
        .collect()
}

/// Directory scans under the installation's extension directories
/// (system, local, vendor-managed), the lowest-authority, always-present
/// fallback source.
struct DirectoryScanSource;

impl ExtensionSource for DirectoryScanSource {
    fn name(&self) -> &str {
        "directory-scan"
    }

    fn authority(&self) -> u32 {
        2
    }

    fn discover(&self, installation: &Installation) -> Vec<Extension> {
        let mut found = Vec::new();
        for (dir_name, kind) in [
            ("typo3conf/ext", ExtensionType::Local),
            ("public/typo3conf/ext", ExtensionType::Local),
            ("typo3/sysext", ExtensionType::System),
        ] {
            let dir = installation.path.join(dir_name);
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                if !entry.path().is_dir() {
                    continue;
                }
                let Some(key) = entry.file_name().to_str().map(str::to_owned) else {
                    continue;
                };
                found.push(Extension {
                    key,
                    title: String::new(),
                    version: None,
                    kind,
                    package: None,
                    path: entry.path(),
                    is_active: true,
                    em_configuration: Default::default(),
                });
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InstallationMode;

    #[test]
    fn lock_file_source_extracts_cms_core_namespace_packages() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("composer.lock"),
            r#"{"packages": [
                {"name": "georgringer/news", "type": "typo3-cms-extension", "version": "9.0.0"},
                {"name": "symfony/console", "type": "library", "version": "6.0.0"}
            ]}"#,
        )
        .unwrap();

        let installation = Installation::new(
            dir.path().to_path_buf(),
            crate::version::Version::new(12, 4, 10, None),
            InstallationMode::ComposerStandard,
        );
        let extensions = LockFileSource.discover(&installation);
        assert_eq!(extensions.len(), 1);
        assert_eq!(extensions[0].key, "news");
    }

    #[test]
    fn directory_scan_finds_local_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("typo3conf/ext/my_ext")).unwrap();

        let installation = Installation::new(
            dir.path().to_path_buf(),
            crate::version::Version::new(9, 5, 0, None),
            InstallationMode::Legacy,
        );
        let extensions = DirectoryScanSource.discover(&installation);
        assert_eq!(extensions.len(), 1);
        assert_eq!(extensions[0].key, "my_ext");
    }
}
