//! `CachingAnalyzer<A>`: wraps any `Analyzer` with a content-addressed
//! on-disk cache and the at-most-one-concurrent-compute-per-key
//! invariant (§4.4), without the wrapped analyzer needing to know
//! caching exists.

use super::{AnalysisContext, AnalysisResult, Analyzer};
use crate::cache::{CacheType, FileCacheStore};
use crate::model::Extension;
use dashmap::DashMap;
use std::sync::{Arc, OnceLock};

pub struct CachingAnalyzer<A: Analyzer> {
    inner: A,
    store: Arc<FileCacheStore>,
    ttl_seconds: u64,
    in_flight: DashMap<String, Arc<OnceLock<AnalysisResult>>>,
}

impl<A: Analyzer> CachingAnalyzer<A> {
    pub fn new(inner: A, store: Arc<FileCacheStore>, ttl_seconds: u64) -> Self {
        CachingAnalyzer {
            inner,
            store,
            ttl_seconds,
            in_flight: DashMap::new(),
        }
    }

    /// `H(analyzerName || extensionKey || extensionVersion ||
    /// contextHash)`, where `contextHash` covers the current/target
    /// version pair (§4.4).
    fn cache_key(&self, extension: &Extension, ctx: &AnalysisContext<'_>) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.inner.name().as_bytes());
        hasher.update(extension.key.as_bytes());
        if let Some(version) = &extension.version {
            hasher.update(version.to_string().as_bytes());
        }
        hasher.update(ctx.installation.version.to_string().as_bytes());
        hasher.update(ctx.target_version.to_string().as_bytes());
        hasher.finalize().to_hex().to_string()
    }
}

impl<A: Analyzer> Analyzer for CachingAnalyzer<A> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn supports(&self, extension: &Extension) -> bool {
        self.inner.supports(extension)
    }

    fn required_external_tools(&self) -> Vec<&str> {
        self.inner.required_external_tools()
    }

    fn analyze(&self, extension: &Extension, ctx: &AnalysisContext<'_>) -> AnalysisResult {
        let key = self.cache_key(extension, ctx);

        if let Some(cached) = self.store.get::<AnalysisResult>(CacheType::Analysis, &key) {
            return cached;
        }

        // A second concurrent request for the same key waits on the
        // first's `OnceLock` rather than recomputing.
        let slot = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceLock::new()))
            .clone();

        if let Some(result) = slot.get() {
            return result.clone();
        }

        let result = slot.get_or_init(|| self.inner.analyze(extension, ctx)).clone();

        let _ = self
            .store
            .put(CacheType::Analysis, &key, self.ttl_seconds, &result);
        self.in_flight.remove(&key);

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::{Extension, ExtensionType, Installation, InstallationMode};
    use crate::score::RiskLevel;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAnalyzer(AtomicUsize);
    impl Analyzer for CountingAnalyzer {
        fn name(&self) -> &str {
            "counting"
        }
        fn supports(&self, _: &Extension) -> bool {
            true
        }
        fn analyze(&self, ext: &Extension, _: &AnalysisContext<'_>) -> AnalysisResult {
            self.0.fetch_add(1, Ordering::SeqCst);
            AnalysisResult {
                analyzer_name: "counting".into(),
                extension_key: ext.key.clone(),
                successful: true,
                error_message: None,
                score: 1.0,
                risk_level: RiskLevel::Low,
                metrics: serde_json::Value::Null,
                recommendations: vec![],
            }
        }
    }

    fn fixture_ext() -> Extension {
        Extension {
            key: "news".into(),
            title: "News".into(),
            version: None,
            kind: ExtensionType::ThirdParty,
            package: None,
            path: PathBuf::from("/fx/news"),
            is_active: true,
            em_configuration: Default::default(),
        }
    }

    #[test]
    fn repeated_calls_for_the_same_key_hit_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileCacheStore::new(dir.path()));
        let analyzer = CachingAnalyzer::new(CountingAnalyzer(AtomicUsize::new(0)), store, 3600);

        let installation = Installation::new(
            PathBuf::from("/fx"),
            crate::version::Version::new(12, 4, 10, None),
            InstallationMode::ComposerStandard,
        );
        let config = Config::default();
        let clients = crate::clients::ExternalClients::from_config(&config);
        let ctx = AnalysisContext {
            installation: &installation,
            target_version: &crate::version::Version::new(13, 0, 0, None),
            clients: &clients,
            config: &config,
        };

        let ext = fixture_ext();
        let first = analyzer.analyze(&ext, &ctx);
        let second = analyzer.analyze(&ext, &ctx);
        assert_eq!(first.score, second.score);
        assert_eq!(analyzer.inner.0.load(Ordering::SeqCst), 1);
    }
}
