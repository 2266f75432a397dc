//! AnalyzerRegistry and Cache (§4.4): computes one `AnalysisResult` per
//! `(analyzer, extension)` pair, fans out across extensions with
//! `rayon`, and caches each computed result.
//!
//! Caching is a decorator over a minimal `Analyzer` interface, composed
//! externally (§9's design note), not baked into a shared base class —
//! `CachingAnalyzer<A>` wraps any `Analyzer` and is the only thing the
//! registry actually invokes.

mod analyzers;
mod cache;

pub use analyzers::{
    AvailabilityAnalyzer, CodeSizeAnalyzer, DeprecationScanAnalyzer, RectorTransformationAnalyzer,
};
pub use cache::CachingAnalyzer;

use crate::clients::ExternalClients;
use crate::config::Config;
use crate::model::{Extension, Installation};
use crate::score::RiskLevel;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared, read-only context every analyzer invocation receives.
pub struct AnalysisContext<'a> {
    pub installation: &'a Installation,
    pub target_version: &'a crate::version::Version,
    pub clients: &'a ExternalClients,
    pub config: &'a Config,
}

/// The result the registry collects per `(analyzerName, extensionKey)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analyzer_name: String,
    pub extension_key: String,
    pub successful: bool,
    pub error_message: Option<String>,
    pub score: f64,
    pub risk_level: RiskLevel,
    pub metrics: serde_json::Value,
    pub recommendations: Vec<String>,
}

impl AnalysisResult {
    pub fn failed(analyzer_name: &str, extension_key: &str, message: impl Into<String>) -> Self {
        AnalysisResult {
            analyzer_name: analyzer_name.to_owned(),
            extension_key: extension_key.to_owned(),
            successful: false,
            error_message: Some(message.into()),
            score: 0.0,
            risk_level: RiskLevel::Critical,
            metrics: serde_json::Value::Null,
            recommendations: Vec::new(),
        }
    }
}

/// An analyzer declares its name, which extensions it applies to, and
/// which external tools it needs, with caching composed externally
/// rather than built in.
pub trait Analyzer: Send + Sync {
    fn name(&self) -> &str;
    fn supports(&self, extension: &Extension) -> bool;
    fn required_external_tools(&self) -> Vec<&str> {
        Vec::new()
    }
    fn has_required_tools(&self) -> bool {
        self.required_external_tools()
            .iter()
            .all(|tool| which::which(tool).is_ok())
    }

    /// MUST be a pure function of `extension` and `ctx` given a stable
    /// state of whatever external resource it queries. Failures (tool
    /// missing, non-zero exit, network error) are captured as
    /// `successful = false` results, never propagated as `Err` — a
    /// single analyzer's failure must not halt the registry.
    fn analyze(&self, extension: &Extension, ctx: &AnalysisContext<'_>) -> AnalysisResult;
}

/// The configured, ordered set of analyzers the orchestrator runs.
pub struct AnalyzerRegistry {
    analyzers: Vec<Arc<dyn Analyzer>>,
}

impl AnalyzerRegistry {
    pub fn new(analyzers: Vec<Arc<dyn Analyzer>>) -> Self {
        AnalyzerRegistry { analyzers }
    }

    /// For each analyzer, for each extension it supports, computes (or
    /// retrieves a cached) `AnalysisResult`. Extension fan-out within an
    /// analyzer runs in parallel via `rayon`; analyzers themselves run
    /// sequentially since they may share the same underlying file cache
    /// directory and there is no benefit pipelining them relative to the
    /// per-extension parallelism already available.
    pub fn run(&self, ctx: &AnalysisContext<'_>) -> Vec<AnalysisResult> {
        let mut results = Vec::new();
        for analyzer in &self.analyzers {
            let supported: Vec<&Extension> = ctx
                .installation
                .extensions
                .iter()
                .filter(|ext| analyzer.supports(ext))
                .collect();

            let mut batch: Vec<AnalysisResult> = supported
                .par_iter()
                .map(|ext| {
                    if !analyzer.has_required_tools() {
                        return AnalysisResult::failed(
                            analyzer.name(),
                            &ext.key,
                            format!(
                                "required external tool(s) not found: {}",
                                analyzer.required_external_tools().join(", ")
                            ),
                        );
                    }
                    analyzer.analyze(ext, ctx)
                })
                .collect();
            results.append(&mut batch);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Extension, ExtensionType};
    use std::path::PathBuf;

    struct AlwaysFails;
    impl Analyzer for AlwaysFails {
        fn name(&self) -> &str {
            "always-fails"
        }
        fn supports(&self, _: &Extension) -> bool {
            true
        }
        fn required_external_tools(&self) -> Vec<&str> {
            vec!["definitely-not-a-real-binary-xyz"]
        }
        fn analyze(&self, ext: &Extension, _: &AnalysisContext<'_>) -> AnalysisResult {
            AnalysisResult::failed(self.name(), &ext.key, "unreachable")
        }
    }

    #[test]
    fn missing_tool_produces_failed_result_without_invoking_analyze() {
        let registry = AnalyzerRegistry::new(vec![Arc::new(AlwaysFails)]);
        let installation = crate::model::Installation::new(
            PathBuf::from("/fx"),
            crate::version::Version::new(12, 4, 10, None),
            crate::model::InstallationMode::ComposerStandard,
        );
        let mut installation = installation;
        installation
            .add_extension(Extension {
                key: "news".into(),
                title: "News".into(),
                version: None,
                kind: ExtensionType::ThirdParty,
                package: None,
                path: PathBuf::from("/fx/news"),
                is_active: true,
                em_configuration: Default::default(),
            })
            .unwrap();

        let config = Config::default();
        let clients = ExternalClients::from_config(&config);
        let ctx = AnalysisContext {
            installation: &installation,
            target_version: &crate::version::Version::new(13, 0, 0, None),
            clients: &clients,
            config: &config,
        };

        let results = registry.run(&ctx);
        assert_eq!(results.len(), 1);
        assert!(!results[0].successful);
        assert!(results[0].error_message.as_ref().unwrap().contains("tool"));
    }
}
