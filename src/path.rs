//! PathResolver: maps abstract path roles to concrete filesystem
//! locations, with a priority-ordered strategy registry, a two-layer
//! cache, and batch reuse of partial state (§4.1).

mod strategies;

pub use strategies::default_strategies;

use crate::cache::{CacheType, FileCacheStore};
use crate::error::{Error, ErrorCode, Result};
use crate::model::{InstallationType, PathResolutionRequest, PathType};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionStatus {
    Success,
    NotFound,
    Error,
    Partial,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionMetadata {
    pub was_from_cache: bool,
    pub cache_hit_ratio: f64,
    pub strategy_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathResolutionResponse {
    pub status: ResolutionStatus,
    pub path_type: PathType,
    pub resolved_path: Option<PathBuf>,
    pub metadata: ResolutionMetadata,
    pub alternative_paths: Vec<PathBuf>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub cache_key: Option<String>,
    #[serde(skip)]
    pub resolution_time: Option<std::time::Duration>,
}

impl PathResolutionResponse {
    fn not_found(path_type: PathType, attempted: Vec<PathBuf>) -> Self {
        PathResolutionResponse {
            status: ResolutionStatus::NotFound,
            path_type,
            resolved_path: None,
            metadata: ResolutionMetadata::default(),
            alternative_paths: Vec::new(),
            warnings: Vec::new(),
            errors: attempted
                .iter()
                .map(|p| format!("not found: {}", p.display()))
                .collect(),
            cache_key: None,
            resolution_time: None,
        }
    }

    fn error(path_type: PathType, code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        PathResolutionResponse {
            status: ResolutionStatus::Error,
            path_type,
            resolved_path: None,
            metadata: ResolutionMetadata::default(),
            alternative_paths: Vec::new(),
            warnings: Vec::new(),
            errors: vec![format!("[{code}] {message}")],
            cache_key: None,
            resolution_time: None,
        }
    }
}

/// What a single candidate probe found.
pub struct StrategyOutcome {
    pub resolved: Option<PathBuf>,
    pub alternatives: Vec<PathBuf>,
    pub attempted: Vec<PathBuf>,
}

/// A pluggable procedure for resolving one `(pathType, installationType)`
/// family of requests.
pub trait PathStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// The `(pathType, installationType)` pairs this strategy supports,
    /// each with its priority band (10/25/50/75/100).
    fn supports(&self) -> &[(PathType, InstallationType, u32)];

    fn resolve(&self, request: &PathResolutionRequest) -> Result<StrategyOutcome>;
}

/// Priority-ordered strategy registry plus the two-layer cache.
pub struct PathResolver {
    strategies: Vec<Box<dyn PathStrategy>>,
    memory_cache: DashMap<String, PathResolutionResponse>,
    persistent_cache: Option<Arc<FileCacheStore>>,
    follow_symlinks: bool,
}

impl PathResolver {
    /// Construct a resolver with the default, explicitly-registered
    /// strategy list (§9's Design Notes: a typed list appended to at
    /// startup, not framework-discovered tags).
    pub fn with_default_strategies(follow_symlinks: bool) -> Result<Self> {
        let mut resolver = PathResolver {
            strategies: Vec::new(),
            memory_cache: DashMap::new(),
            persistent_cache: None,
            follow_symlinks,
        };
        for strategy in default_strategies() {
            resolver.register(strategy)?;
        }
        Ok(resolver)
    }

    pub fn with_persistent_cache(mut self, store: Arc<FileCacheStore>) -> Self {
        self.persistent_cache = Some(store);
        self
    }

    /// Registers a strategy, detecting deadlocked priority ties (same
    /// priority, same pair, as a different strategy) as a startup
    /// configuration error.
    pub fn register(&mut self, strategy: Box<dyn PathStrategy>) -> Result<()> {
        for existing in &self.strategies {
            for &(pt, it, prio) in existing.supports() {
                for &(other_pt, other_it, other_prio) in strategy.supports() {
                    if pt == other_pt
                        && it == other_it
                        && prio == other_prio
                        && existing.name() != strategy.name()
                    {
                        return Err(Error::fatal(
                            ErrorCode::StrategyConflict,
                            format!(
                                "strategies '{}' and '{}' both claim priority {} for ({:?}, {:?})",
                                existing.name(),
                                strategy.name(),
                                prio,
                                pt,
                                it
                            ),
                        ));
                    }
                }
            }
        }
        self.strategies.push(strategy);
        Ok(())
    }

    pub fn supports_path_type(&self, path_type: PathType) -> bool {
        self.strategies
            .iter()
            .any(|s| s.supports().iter().any(|(pt, _, _)| *pt == path_type))
    }

    pub fn available_path_types_for(&self, install_type: InstallationType) -> Vec<PathType> {
        let mut types: Vec<PathType> = self
            .strategies
            .iter()
            .flat_map(|s| s.supports().iter())
            .filter(|(_, it, _)| *it == install_type)
            .map(|(pt, _, _)| *pt)
            .collect();
        types.sort_by_key(|pt| pt.to_string());
        types.dedup();
        types
    }

    fn ordered_strategies(
        &self,
        path_type: PathType,
        install_type: InstallationType,
    ) -> Vec<(&Box<dyn PathStrategy>, u32)> {
        let mut matches: Vec<(&Box<dyn PathStrategy>, u32, usize)> = self
            .strategies
            .iter()
            .enumerate()
            .filter_map(|(idx, s)| {
                s.supports()
                    .iter()
                    .find(|(pt, it, _)| *pt == path_type && *it == install_type)
                    .map(|&(_, _, prio)| (s, prio, idx))
            })
            .collect();
        // Descending priority; stable ties broken by registration order.
        matches.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        matches.into_iter().map(|(s, p, _)| (s, p)).collect()
    }

    pub fn resolve(&self, request: &PathResolutionRequest) -> PathResolutionResponse {
        let start = Instant::now();
        let cache_key = request.cache_key();

        if request.cache_options.enabled && !request.cache_options.invalidate {
            if let Some(mut cached) = self.memory_cache.get(&cache_key).map(|r| r.clone()) {
                cached.metadata.was_from_cache = true;
                cached.metadata.cache_hit_ratio = 1.0;
                return cached;
            }
            if let Some(store) = &self.persistent_cache {
                if let Some(mut cached) =
                    store.get::<PathResolutionResponse>(CacheType::PathResolution, &cache_key)
                {
                    cached.metadata.was_from_cache = true;
                    cached.metadata.cache_hit_ratio = 1.0;
                    self.memory_cache.insert(cache_key.clone(), cached.clone());
                    return cached;
                }
            }
        }

        let candidates = self.ordered_strategies(request.path_type, request.installation_type);

        let mut response = if candidates.is_empty() {
            PathResolutionResponse::error(
                request.path_type,
                ErrorCode::NoCompatibleStrategy,
                "no strategy is registered for this (path type, installation type) pair",
            )
        } else {
            let mut last_attempted = Vec::new();
            let mut chosen = None;
            for (strategy, _priority) in &candidates {
                match strategy.resolve(request) {
                    Ok(outcome) => {
                        last_attempted.extend(outcome.attempted.clone());
                        if outcome.resolved.is_some() {
                            chosen = Some((strategy.name().to_owned(), outcome));
                            break;
                        }
                        // NotFound from this strategy: try the next one.
                    }
                    Err(e) => {
                        // Strategy exceptions are caught; resolution
                        // continues with the next strategy.
                        last_attempted.push(PathBuf::from(format!("<{}>: {}", strategy.name(), e)));
                    }
                }
            }

            match chosen {
                Some((name, outcome)) => {
                    let resolved = outcome.resolved.clone();
                    let exists = resolved
                        .as_ref()
                        .map(|p| self.path_is_usable(p))
                        .unwrap_or(false);
                    if exists {
                        PathResolutionResponse {
                            status: ResolutionStatus::Success,
                            path_type: request.path_type,
                            resolved_path: resolved,
                            metadata: ResolutionMetadata {
                                was_from_cache: false,
                                cache_hit_ratio: 0.0,
                                strategy_name: Some(name),
                            },
                            alternative_paths: outcome.alternatives,
                            warnings: Vec::new(),
                            errors: Vec::new(),
                            cache_key: Some(cache_key.clone()),
                            resolution_time: Some(start.elapsed()),
                        }
                    } else {
                        PathResolutionResponse::not_found(request.path_type, outcome.attempted)
                    }
                }
                None => PathResolutionResponse::not_found(request.path_type, last_attempted),
            }
        };

        response.resolution_time.get_or_insert(start.elapsed());

        if request.cache_options.enabled && response.status == ResolutionStatus::Success {
            self.memory_cache.insert(cache_key.clone(), response.clone());
            if let Some(store) = &self.persistent_cache {
                let ttl = request
                    .cache_options
                    .ttl
                    .map(|d| d.as_secs())
                    .unwrap_or(3600);
                let _ = store.put(CacheType::PathResolution, &cache_key, ttl, &response);
            }
        }

        response
    }

    /// Resolves every request, reusing cache hits/strategy selection
    /// across siblings via the shared caches `resolve` already consults,
    /// then stamps every response's `cache_hit_ratio` with the fraction
    /// of this batch that was served from cache (§4.1).
    pub fn resolve_many(&self, requests: &[PathResolutionRequest]) -> Vec<PathResolutionResponse> {
        let mut responses: Vec<PathResolutionResponse> = requests.iter().map(|r| self.resolve(r)).collect();
        if !responses.is_empty() {
            let hits = responses.iter().filter(|r| r.metadata.was_from_cache).count();
            let ratio = hits as f64 / responses.len() as f64;
            for response in &mut responses {
                response.metadata.cache_hit_ratio = ratio;
            }
        }
        responses
    }

    fn path_is_usable(&self, path: &Path) -> bool {
        if self.follow_symlinks {
            path.exists()
        } else {
            path.symlink_metadata().is_ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PathResolutionRequest as Req;

    #[test]
    fn incompatible_pair_never_reaches_strategies() {
        // Caught at request-build time; the resolver never sees it.
        let built = Req::builder(
            PathType::VendorDir,
            "/fx/legacy",
            InstallationType::Legacy,
        )
        .build();
        assert!(built.is_err());
    }

    #[test]
    fn resolve_returns_not_found_for_missing_web_dir() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = PathResolver::with_default_strategies(true).unwrap();
        let request = Req::builder(
            PathType::WebDir,
            dir.path(),
            InstallationType::ComposerStandard,
        )
        .build()
        .unwrap();
        let response = resolver.resolve(&request);
        assert_eq!(response.status, ResolutionStatus::NotFound);
    }

    #[test]
    fn resolve_finds_existing_public_web_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("public")).unwrap();
        let resolver = PathResolver::with_default_strategies(true).unwrap();
        let request = Req::builder(
            PathType::WebDir,
            dir.path(),
            InstallationType::ComposerStandard,
        )
        .build()
        .unwrap();
        let response = resolver.resolve(&request);
        assert_eq!(response.status, ResolutionStatus::Success);
        assert_eq!(
            response.resolved_path,
            Some(dir.path().join("public"))
        );
    }

    #[test]
    fn resolve_many_computes_batch_cache_hit_ratio() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("public")).unwrap();
        let resolver = PathResolver::with_default_strategies(true).unwrap();
        let request = Req::builder(PathType::WebDir, dir.path(), InstallationType::ComposerStandard)
            .build()
            .unwrap();

        // First call across a two-item batch: neither is cached yet.
        let first_batch = resolver.resolve_many(&[request.clone(), request.clone()]);
        assert_eq!(first_batch[0].metadata.cache_hit_ratio, 0.0);
        assert_eq!(first_batch[1].metadata.cache_hit_ratio, 0.0);

        // Second call: both are now served from cache, ratio is 1.0.
        let second_batch = resolver.resolve_many(&[request.clone(), request]);
        assert!(second_batch.iter().all(|r| r.metadata.was_from_cache));
        assert_eq!(second_batch[0].metadata.cache_hit_ratio, 1.0);
        assert_eq!(second_batch[1].metadata.cache_hit_ratio, 1.0);
    }

    #[test]
    fn custom_web_dir_from_path_configuration_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("web")).unwrap();
        std::fs::create_dir_all(dir.path().join("public")).unwrap();
        let resolver = PathResolver::with_default_strategies(true).unwrap();
        let mut config = std::collections::HashMap::new();
        config.insert(PathType::WebDir, "web".to_owned());
        let request = Req::builder(
            PathType::WebDir,
            dir.path(),
            InstallationType::ComposerCustom,
        )
        .path_configuration(config)
        .build()
        .unwrap();
        let response = resolver.resolve(&request);
        assert_eq!(response.status, ResolutionStatus::Success);
        assert_eq!(response.resolved_path, Some(dir.path().join("web")));
    }
}
