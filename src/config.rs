//! The configuration file format (§6): the closed set of recognized keys
//! under `analyzers.<name>`, `reporting`, `cache`, `git`, and `rector`.
//! Unrecognized keys are ignored with a warning rather than rejected,
//! via the same `#[serde(default)]`-driven layout throughout.

use crate::error::{Error, ErrorCode, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub enabled: bool,
    pub cache_ttl: u64,
    #[serde(default)]
    pub options: HashMap<String, toml::Value>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            enabled: true,
            cache_ttl: 86_400,
            options: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportingConfig {
    pub formats: Vec<String>,
    pub output_dir: PathBuf,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        ReportingConfig {
            formats: vec!["json".to_owned()],
            output_dir: PathBuf::from("ura-report"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            enabled: true,
            dir: default_cache_dir(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("upgrade-readiness")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct GithubConfig {
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GitConfig {
    pub github: GithubConfig,
    pub timeout_seconds: u64,
}

impl Default for GitConfig {
    fn default() -> Self {
        GitConfig {
            github: GithubConfig::default(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RectorConfig {
    pub binary_path: PathBuf,
    pub timeout_seconds: u64,
}

impl Default for RectorConfig {
    fn default() -> Self {
        RectorConfig {
            binary_path: PathBuf::from("rector"),
            timeout_seconds: 300,
        }
    }
}

/// The second source-transformation tool (§4.4): a separate external
/// binary with the same output contract as `rector`, configured
/// independently so either can be pointed at a different installed path
/// or disabled without touching the other.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeprecationScannerConfig {
    pub binary_path: PathBuf,
    pub timeout_seconds: u64,
}

impl Default for DeprecationScannerConfig {
    fn default() -> Self {
        DeprecationScannerConfig {
            binary_path: PathBuf::from("typo3-deprecation-scanner"),
            timeout_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    #[serde(default)]
    pub analyzers: HashMap<String, AnalyzerConfig>,
    #[serde(default)]
    pub reporting: ReportingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub rector: RectorConfig,
    #[serde(default)]
    pub deprecation_scanner: DeprecationScannerConfig,
}

/// The closed set of recognized top-level sections (§6). A table key
/// outside this set is a warning, not a parse failure — the keyspace is
/// closed by contract, not by `#[serde(deny_unknown_fields)]`.
const KNOWN_TOP_LEVEL_KEYS: &[&str] = &[
    "analyzers",
    "reporting",
    "cache",
    "git",
    "rector",
    "deprecation_scanner",
];

impl Config {
    /// Parses `contents` as TOML, returning `ConfigInvalid` on a syntax
    /// error. Unrecognized top-level keys produce a `log::warn!` and are
    /// otherwise ignored (§6), rather than failing the parse — `serde`'s
    /// own default (silently dropping unknown fields) satisfies "ignored"
    /// but not "produce a warning", so the unrecognized-key check runs as
    /// an explicit pass over the raw table before deserializing.
    pub fn parse(contents: &str) -> Result<Config> {
        let table: toml::Table = contents
            .parse()
            .map_err(|e| Error::parse(ErrorCode::ConfigInvalid, format!("config: {e}")))?;

        for key in table.keys() {
            if !KNOWN_TOP_LEVEL_KEYS.contains(&key.as_str()) {
                log::warn!("unrecognized configuration key '{key}', ignoring");
            }
        }

        toml::from_str(contents)
            .map_err(|e| Error::parse(ErrorCode::ConfigInvalid, format!("config: {e}")))
    }

    pub fn load_from(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Config::parse(&contents)
    }

    pub fn analyzer(&self, name: &str) -> AnalyzerConfig {
        self.analyzers.get(name).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert!(config.cache.enabled);
        assert_eq!(config.reporting.formats, vec!["json".to_owned()]);
    }

    #[test]
    fn unrecognized_top_level_key_is_ignored_rather_than_rejected() {
        let toml_src = r#"
            [nonsense]
            whatever = true

            [cache]
            enabled = false
        "#;
        let config = Config::parse(toml_src).unwrap();
        assert!(!config.cache.enabled);
    }

    #[test]
    fn parses_analyzer_table() {
        let toml_src = r#"
            [analyzers.availability]
            enabled = false
            cache_ttl = 3600
        "#;
        let config = Config::parse(toml_src).unwrap();
        let analyzer = config.analyzer("availability");
        assert!(!analyzer.enabled);
        assert_eq!(analyzer.cache_ttl, 3600);
    }

    #[test]
    fn missing_analyzer_falls_back_to_default() {
        let config = Config::default();
        let analyzer = config.analyzer("codesize");
        assert!(analyzer.enabled);
    }
}
