mod cli;
mod progress;

use clap::Parser;
use cli::{AnalyzeArgs, CacheClearArgs, Commands};
use console::style;
use env_logger::Env;
use itertools::Itertools;
use progress::Phase;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tabled::{Table, Tabled};
use upgrade_readiness::cache::{CacheType, FileCacheStore};
use upgrade_readiness::clients::ExternalClients;
use upgrade_readiness::config::Config;
use upgrade_readiness::configparser::ConfigParser;
use upgrade_readiness::discovery::DiscoveryPipeline;
use upgrade_readiness::model::{InstallationType, PathType};
use upgrade_readiness::path::PathResolver;
use upgrade_readiness::report::{renderers_for, ReportBuilder, ReportFileManager};
use upgrade_readiness::version::Version;

const EXIT_OK: u8 = 0;
const EXIT_ANALYZER_ERRORS: u8 = 1;
const EXIT_BLOCKING_ISSUES: u8 = 2;
const EXIT_INVALID_INVOCATION: u8 = 64;

fn init_logging(verbosity: u8, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else {
        match verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();
}

fn main() -> ExitCode {
    let args = cli::Args::parse();
    init_logging(args.verbose, args.quiet);

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            log::error!("configuration error: {e}");
            return ExitCode::from(EXIT_INVALID_INVOCATION);
        }
    };

    let code = match args.command {
        Commands::Analyze(analyze_args) => run_analyze(&config, &analyze_args, args.quiet),
        Commands::Cache(cache_args) => match cache_args.command {
            cli::CacheCommand::Clear(clear_args) => run_cache_clear(&config, &clear_args),
        },
    };
    ExitCode::from(code)
}

fn load_config(path: Option<&std::path::Path>) -> upgrade_readiness::error::Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => {
            let default_path = PathBuf::from("ura.toml");
            Config::load_from(&default_path)
        }
    }
}

fn cache_store(config: &Config) -> Option<Arc<FileCacheStore>> {
    config
        .cache
        .enabled
        .then(|| Arc::new(FileCacheStore::new(config.cache.dir.clone())))
}

fn run_analyze(config: &Config, args: &AnalyzeArgs, quiet: bool) -> u8 {
    let target_version = match Version::parse(&args.target) {
        Ok(version) => version,
        Err(e) => {
            log::error!("invalid target version '{}': {e}", args.target);
            return EXIT_INVALID_INVOCATION;
        }
    };

    let store = cache_store(config);
    let config_parser = ConfigParser::with_defaults();

    let mut pipeline = DiscoveryPipeline::with_defaults().with_config_parser(config_parser);
    if let Some(store) = &store {
        pipeline = pipeline.with_persistent_cache(store.clone());
    }

    let discovery_phase = Phase::start("discovering installation", quiet);
    let discovery_result = match pipeline.discover(&args.path, true) {
        Ok(result) => result,
        Err(e) => {
            discovery_phase.fail(&e.to_string());
            log::error!("discovery failed: {e}");
            return EXIT_INVALID_INVOCATION;
        }
    };

    if !discovery_result.successful {
        discovery_phase.fail("no detection strategy matched");
        log::error!(
            "no detection strategy matched '{}'; attempts: {}",
            args.path.display(),
            discovery_result.attempts.len()
        );
        return EXIT_BLOCKING_ISSUES;
    }
    discovery_phase.finish();

    let mut installation = discovery_result.installation.expect("successful discovery carries an installation");

    let resolver = match PathResolver::with_default_strategies(true) {
        Ok(resolver) => resolver,
        Err(e) => {
            log::error!("path resolver strategy conflict: {e}");
            return EXIT_INVALID_INVOCATION;
        }
    };
    let install_type: InstallationType = installation.mode.into();
    if let Ok(request) =
        upgrade_readiness::model::PathResolutionRequest::builder(PathType::WebDir, &installation.path, install_type)
            .path_configuration(installation.custom_paths.clone())
            .build()
    {
        let response = resolver.resolve(&request);
        if let Some(resolved) = response.resolved_path {
            installation
                .custom_paths
                .insert(PathType::WebDir, resolved.to_string_lossy().into_owned());
        }
    }

    let clients = ExternalClients::from_config(config);
    let analysis_ctx = upgrade_readiness::analysis::AnalysisContext {
        installation: &installation,
        target_version: &target_version,
        clients: &clients,
        config,
    };

    let analysis_phase = Phase::start(
        format!("running analyzers over {} extensions", installation.extensions.len()),
        quiet,
    );
    let registry = build_registry(config, store.clone());
    let results = registry.run(&analysis_ctx);
    let has_analyzer_errors = results.iter().any(|r| !r.successful);
    analysis_phase.finish();

    let report_ctx = ReportBuilder::build(&installation, &target_version, &results);

    let formats = if args.format.is_empty() {
        config.reporting.formats.clone()
    } else {
        args.format.clone()
    };
    let renderers = renderers_for(&formats);
    let output_dir = args.output.clone().unwrap_or_else(|| config.reporting.output_dir.clone());

    let report_phase = Phase::start(format!("writing report to {}", output_dir.display()), quiet);
    if let Err(e) = ReportFileManager::write_all(&output_dir, &report_ctx, &renderers) {
        report_phase.fail(&e.to_string());
        log::error!("writing report: {e}");
        return EXIT_ANALYZER_ERRORS;
    }
    report_phase.finish();

    if !quiet {
        print_summary_table(&report_ctx);
    }

    let has_blocking_issues = installation.blocking_issues().next().is_some();
    if has_blocking_issues {
        EXIT_BLOCKING_ISSUES
    } else if has_analyzer_errors {
        EXIT_ANALYZER_ERRORS
    } else {
        EXIT_OK
    }
}

#[derive(Tabled)]
struct ExtensionSummaryRow {
    #[tabled(rename = "extension")]
    key: String,
    #[tabled(rename = "risk")]
    risk_level: String,
    #[tabled(rename = "score")]
    overall_risk: String,
    #[tabled(rename = "analyzers")]
    analyzer_names: String,
}

/// Prints a one-row-per-extension summary table to stdout, colored by
/// risk level, after a successful analyze run.
fn print_summary_table(ctx: &upgrade_readiness::report::ReportContext) {
    let rows: Vec<ExtensionSummaryRow> = ctx
        .extensions
        .iter()
        .map(|extension| {
            let risk_level = extension.risk_level.to_string();
            let styled_risk = match extension.risk_level {
                upgrade_readiness::score::RiskLevel::Critical => style(risk_level.clone()).red().to_string(),
                upgrade_readiness::score::RiskLevel::High => style(risk_level.clone()).red().to_string(),
                upgrade_readiness::score::RiskLevel::Medium => style(risk_level.clone()).yellow().to_string(),
                upgrade_readiness::score::RiskLevel::Low => style(risk_level.clone()).green().to_string(),
            };
            ExtensionSummaryRow {
                key: extension.extension.key.clone(),
                risk_level: styled_risk,
                overall_risk: format!("{:.1}", extension.overall_risk),
                analyzer_names: extension.analyzers.iter().map(|a| a.analyzer_name.as_str()).join(", "),
            }
        })
        .collect();

    println!("{}", Table::new(rows));
    println!(
        "{} extensions, {} analyzer errors",
        ctx.summary.total_extensions,
        ctx.summary.total_analyzer_errors
    );
}

fn build_registry(
    config: &Config,
    store: Option<Arc<FileCacheStore>>,
) -> upgrade_readiness::analysis::AnalyzerRegistry {
    use upgrade_readiness::analysis::{
        AnalyzerRegistry, AvailabilityAnalyzer, CachingAnalyzer, CodeSizeAnalyzer, DeprecationScanAnalyzer,
        RectorTransformationAnalyzer,
    };
    use std::time::Duration;

    let store = store.unwrap_or_else(|| Arc::new(FileCacheStore::new(config.cache.dir.clone())));

    let mut analyzers: Vec<Arc<dyn upgrade_readiness::analysis::Analyzer>> = Vec::new();

    if config.analyzer("availability").enabled {
        let ttl = config.analyzer("availability").cache_ttl;
        analyzers.push(Arc::new(CachingAnalyzer::new(AvailabilityAnalyzer, store.clone(), ttl)));
    }
    if config.analyzer("rector-transformation").enabled {
        let analyzer_config = config.analyzer("rector-transformation");
        analyzers.push(Arc::new(CachingAnalyzer::new(
            RectorTransformationAnalyzer {
                binary_path: config.rector.binary_path.clone(),
                timeout: Duration::from_secs(config.rector.timeout_seconds),
            },
            store.clone(),
            analyzer_config.cache_ttl,
        )));
    }
    if config.analyzer("deprecation-scan").enabled {
        let analyzer_config = config.analyzer("deprecation-scan");
        analyzers.push(Arc::new(CachingAnalyzer::new(
            DeprecationScanAnalyzer {
                binary_path: config.deprecation_scanner.binary_path.clone(),
                timeout: Duration::from_secs(config.deprecation_scanner.timeout_seconds),
            },
            store.clone(),
            analyzer_config.cache_ttl,
        )));
    }
    if config.analyzer("code-size").enabled {
        let ttl = config.analyzer("code-size").cache_ttl;
        analyzers.push(Arc::new(CachingAnalyzer::new(CodeSizeAnalyzer, store.clone(), ttl)));
    }

    AnalyzerRegistry::new(analyzers)
}

/// `cache clear`'s own exit codes (§6): distinct from `analyze`'s.
const CACHE_CLEAR_OK: u8 = 0;
const CACHE_CLEAR_FAILED: u8 = 1;
const CACHE_CLEAR_INVALID_TYPE: u8 = 2;

fn run_cache_clear(config: &Config, args: &CacheClearArgs) -> u8 {
    let requested: Vec<CacheType> = if args.cache_type.is_empty() {
        CacheType::ALL.to_vec()
    } else {
        let mut types = Vec::with_capacity(args.cache_type.len());
        for raw in &args.cache_type {
            match raw.parse::<CacheType>() {
                Ok(ty) => types.push(ty),
                Err(_) => {
                    log::error!("unknown cache type '{raw}'");
                    return CACHE_CLEAR_INVALID_TYPE;
                }
            }
        }
        types
    };

    let store = FileCacheStore::new(config.cache.dir.clone());
    let mut any_failed = false;
    for cache_type in requested {
        match store.clear(cache_type, args.dry_run) {
            Ok((count, bytes)) => {
                let verb = if args.dry_run { "would clear" } else { "cleared" };
                log::info!("{verb} {count} entries ({bytes} bytes) from '{cache_type}'");
            }
            Err(e) => {
                log::error!("failed to clear '{cache_type}': {e}");
                any_failed = true;
                if !args.force {
                    return CACHE_CLEAR_FAILED;
                }
            }
        }
    }

    if any_failed {
        CACHE_CLEAR_FAILED
    } else {
        CACHE_CLEAR_OK
    }
}
