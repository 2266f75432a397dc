//! The core data model: `Installation`, `Extension`, `ValidationIssue`, and
//! the path-resolution request/response types.
//!
//! Installation exclusively owns its `Extension`s; everything else refers
//! back by non-owning key/path references, matching §3's ownership rules.

mod path_request;

pub use path_request::{PathResolutionRequest, PathResolutionRequestBuilder};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::version::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum InstallationMode {
    ComposerStandard,
    ComposerCustom,
    Legacy,
    Docker,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum PathType {
    WebDir,
    VendorDir,
    ComposerInstalled,
    ConfigDir,
    ExtensionDir,
    Typo3confDir,
    SystemExtension,
    Extension,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum InstallationType {
    ComposerStandard,
    ComposerCustom,
    Legacy,
    Docker,
    Custom,
}

impl From<InstallationMode> for InstallationType {
    fn from(mode: InstallationMode) -> Self {
        match mode {
            InstallationMode::ComposerStandard => InstallationType::ComposerStandard,
            InstallationMode::ComposerCustom => InstallationType::ComposerCustom,
            InstallationMode::Legacy => InstallationType::Legacy,
            InstallationMode::Docker => InstallationType::Docker,
            InstallationMode::Custom => InstallationType::Custom,
        }
    }
}

/// Runtime-constraint and feature-flag evidence gathered during discovery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallationMetadata {
    pub php_constraint: Option<String>,
    pub database_evidence: Vec<String>,
    pub feature_flags: HashMap<String, bool>,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IssueSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub rule_name: String,
    pub severity: IssueSeverity,
    pub message: String,
    pub category: String,
    pub context: HashMap<String, String>,
    pub affected_paths: Vec<PathBuf>,
    pub recommendations: Vec<String>,
}

impl ValidationIssue {
    /// An issue is blocking iff its severity is Error or Critical.
    pub fn is_blocking(&self) -> bool {
        matches!(self.severity, IssueSeverity::Error | IssueSeverity::Critical)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "kebab-case")]
pub enum ExtensionType {
    Local,
    System,
    ThirdParty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extension {
    pub key: String,
    pub title: String,
    pub version: Option<Version>,
    pub kind: ExtensionType,
    /// e.g. `vendor/name`, when sourced from a package manager.
    pub package: Option<String>,
    pub path: PathBuf,
    pub is_active: bool,
    pub em_configuration: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installation {
    pub path: PathBuf,
    pub version: Version,
    pub mode: InstallationMode,
    pub custom_paths: HashMap<PathType, String>,
    pub metadata: InstallationMetadata,
    pub validation_issues: Vec<ValidationIssue>,
    pub extensions: Vec<Extension>,
    /// Keyed configuration data attached by the `ConfigParser` stage.
    pub configuration: HashMap<String, serde_json::Value>,
}

impl Installation {
    pub fn new(path: PathBuf, version: Version, mode: InstallationMode) -> Self {
        Installation {
            path,
            version,
            mode,
            custom_paths: HashMap::new(),
            metadata: InstallationMetadata::default(),
            validation_issues: Vec::new(),
            extensions: Vec::new(),
            configuration: HashMap::new(),
        }
    }

    /// Installation exclusively owns its extensions; callers should route
    /// additions through this method so the key-uniqueness invariant
    /// (§3) holds by construction.
    pub fn add_extension(&mut self, extension: Extension) -> crate::error::Result<()> {
        if self.extensions.iter().any(|e| e.key == extension.key) {
            return Err(crate::error::Error::validation(
                crate::error::ErrorCode::InvalidRequest,
                format!("extension key '{}' is not unique", extension.key),
            ));
        }
        self.extensions.push(extension);
        Ok(())
    }

    pub fn blocking_issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.validation_issues.iter().filter(|i| i.is_blocking())
    }

    pub fn installation_type(&self) -> InstallationType {
        self.mode.into()
    }
}
