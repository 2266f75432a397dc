//! `PathResolutionRequest`: immutable, constructed via a validating builder.
//!
//! Exposed as an explicit builder returning a validated immutable record,
//! with the incompatible-pair check happening in `build`.

use super::{InstallationType, PathType};
use crate::error::{Error, ErrorCode, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Static `pathType` <-> `installationType` incompatibility table (§4.1).
fn incompatible(path_type: PathType, installation_type: InstallationType) -> bool {
    matches!(
        (path_type, installation_type),
        (PathType::VendorDir, InstallationType::Legacy)
            | (PathType::ComposerInstalled, InstallationType::Legacy)
            | (PathType::SystemExtension, InstallationType::Docker)
    )
}

#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    pub enabled: bool,
    pub ttl: Option<Duration>,
    pub invalidate: bool,
}

#[derive(Debug, Clone)]
pub struct PathResolutionRequest {
    pub path_type: PathType,
    pub installation_path: PathBuf,
    pub installation_type: InstallationType,
    pub path_configuration: HashMap<PathType, String>,
    pub extension_identifier: Option<String>,
    pub validation_rules: Vec<String>,
    pub fallback_strategies: Vec<String>,
    pub cache_options: CacheOptions,
}

impl PathResolutionRequest {
    pub fn builder(
        path_type: PathType,
        installation_path: impl Into<PathBuf>,
        installation_type: InstallationType,
    ) -> PathResolutionRequestBuilder {
        PathResolutionRequestBuilder {
            path_type,
            installation_path: installation_path.into(),
            installation_type,
            path_configuration: HashMap::new(),
            extension_identifier: None,
            validation_rules: Vec::new(),
            fallback_strategies: Vec::new(),
            cache_options: CacheOptions::default(),
        }
    }

    /// A stable hash of everything that distinguishes a resolution's
    /// result, used as the cache key (§4.1).
    pub fn cache_key(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.path_type.to_string().as_bytes());
        hasher.update(self.installation_type.to_string().as_bytes());
        hasher.update(self.installation_path.to_string_lossy().as_bytes());
        let mut config_entries: Vec<_> = self.path_configuration.iter().collect();
        config_entries.sort_by_key(|(k, _)| k.to_string());
        for (k, v) in config_entries {
            hasher.update(k.to_string().as_bytes());
            hasher.update(v.as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

pub struct PathResolutionRequestBuilder {
    path_type: PathType,
    installation_path: PathBuf,
    installation_type: InstallationType,
    path_configuration: HashMap<PathType, String>,
    extension_identifier: Option<String>,
    validation_rules: Vec<String>,
    fallback_strategies: Vec<String>,
    cache_options: CacheOptions,
}

impl PathResolutionRequestBuilder {
    pub fn path_configuration(mut self, config: HashMap<PathType, String>) -> Self {
        self.path_configuration = config;
        self
    }

    pub fn extension_identifier(mut self, id: impl Into<String>) -> Self {
        self.extension_identifier = Some(id.into());
        self
    }

    pub fn validation_rules(mut self, rules: Vec<String>) -> Self {
        self.validation_rules = rules;
        self
    }

    pub fn fallback_strategies(mut self, strategies: Vec<String>) -> Self {
        self.fallback_strategies = strategies;
        self
    }

    pub fn cache_options(mut self, options: CacheOptions) -> Self {
        self.cache_options = options;
        self
    }

    /// Validates the request, including the incompatible-pair check, and
    /// returns an immutable `PathResolutionRequest`.
    ///
    /// Incompatible requests fail here, before any strategy is invoked
    /// (`NoCompatibleStrategy`, caught by the caller as a validation error
    /// rather than reaching the registry).
    pub fn build(self) -> Result<PathResolutionRequest> {
        if self.installation_path.as_os_str().is_empty() {
            return Err(Error::validation(
                ErrorCode::InvalidRequest,
                "installation_path is required",
            ));
        }

        if incompatible(self.path_type, self.installation_type) {
            return Err(Error::validation(
                ErrorCode::NoCompatibleStrategy,
                format!(
                    "path type {:?} is incompatible with installation type {:?}",
                    self.path_type, self.installation_type
                ),
            ));
        }

        Ok(PathResolutionRequest {
            path_type: self.path_type,
            installation_path: self.installation_path,
            installation_type: self.installation_type,
            path_configuration: self.path_configuration,
            extension_identifier: self.extension_identifier,
            validation_rules: self.validation_rules,
            fallback_strategies: self.fallback_strategies,
            cache_options: self.cache_options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_incompatible_pair_at_build() {
        let result = PathResolutionRequest::builder(
            PathType::VendorDir,
            "/fx/legacy",
            InstallationType::Legacy,
        )
        .build();
        let err = result.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoCompatibleStrategy);
    }

    #[test]
    fn accepts_compatible_pair() {
        let request = PathResolutionRequest::builder(
            PathType::WebDir,
            "/fx/std",
            InstallationType::ComposerStandard,
        )
        .build()
        .unwrap();
        assert_eq!(request.path_type, PathType::WebDir);
    }

    #[test]
    fn cache_key_is_stable_for_identical_inputs() {
        let a = PathResolutionRequest::builder(
            PathType::WebDir,
            "/fx/std",
            InstallationType::ComposerStandard,
        )
        .build()
        .unwrap();
        let b = PathResolutionRequest::builder(
            PathType::WebDir,
            "/fx/std",
            InstallationType::ComposerStandard,
        )
        .build()
        .unwrap();
        assert_eq!(a.cache_key(), b.cache_key());
    }
}
