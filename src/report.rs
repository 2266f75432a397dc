//! ReportBuilder (§4.5) and the on-disk report layout (§6): turns the
//! flat `AnalysisResult` list the registry produced into a serializable
//! `ReportContext`, then hands it to one `Renderer` per configured
//! format and writes the resulting `main`/`extensions/`/
//! `findings-detail/` tree.

mod render;

pub use render::{Html, Json, Markdown, Renderer};

use crate::analysis::AnalysisResult;
use crate::clients::ChangedFile;
use crate::error::Result;
use crate::model::{Extension, Installation, InstallationMode};
use crate::score::RiskLevel;
use crate::version::Version;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FindingsBySeverity {
    pub critical: u64,
    pub warning: u64,
    pub info: u64,
    pub suggestion: u64,
}

/// One analyzer's contribution to an extension's report entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerMetricBlock {
    pub analyzer_name: String,
    pub successful: bool,
    pub error_message: Option<String>,
    pub score: f64,
    pub risk_level: RiskLevel,
    pub metrics: serde_json::Value,
    pub recommendations: Vec<String>,
    /// Populated for the source-transformation analyzers, whose metrics
    /// carry `critical`/`warnings` counts (§8 S5).
    pub findings_by_severity: Option<FindingsBySeverity>,
    pub has_breaking_changes: bool,
    pub has_deprecations: bool,
}

/// Raw per-file findings for the detail pages, carried separately from
/// the summary metric block so JSON output can embed it inline while
/// html/markdown route it to `findings-detail/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtensionDetail {
    pub changed_files: Vec<ChangedFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionReport {
    pub extension: Extension,
    pub analyzers: Vec<AnalyzerMetricBlock>,
    pub overall_risk: f64,
    pub max_risk: f64,
    pub risk_level: RiskLevel,
    pub detail: Option<ExtensionDetail>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailabilityStats {
    pub available_count: usize,
    pub unavailable_count: usize,
    pub mean_availability_score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallationSummary {
    pub total_extensions: usize,
    pub total_analyzer_errors: usize,
    /// Count of extensions per `RiskLevel`, keyed by its lowercase name.
    pub risk_distribution: HashMap<String, usize>,
    pub availability: AvailabilityStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportContext {
    pub installation_path: PathBuf,
    pub installation_version: String,
    pub target_version: String,
    pub installation_mode: InstallationMode,
    pub extensions: Vec<ExtensionReport>,
    pub summary: InstallationSummary,
}

pub struct ReportBuilder;

impl ReportBuilder {
    /// Builds a `ReportContext` from `installation` and the flat result
    /// list the registry produced. Extensions are sorted by key and each
    /// extension's analyzer blocks keep the order `results` arrived in
    /// (registration order), per §5's determinism requirement.
    pub fn build(
        installation: &Installation,
        target_version: &Version,
        results: &[AnalysisResult],
    ) -> ReportContext {
        let by_extension: HashMap<&str, Vec<&AnalysisResult>> =
            results.iter().into_group_map_by(|r| r.extension_key.as_str());

        let mut extensions: Vec<&Extension> = installation.extensions.iter().collect();
        extensions.sort_by(|a, b| a.key.cmp(&b.key));

        let mut reports = Vec::with_capacity(extensions.len());
        let mut risk_distribution: HashMap<String, usize> = HashMap::new();
        let mut total_analyzer_errors = 0usize;
        let mut availability = AvailabilityStats::default();
        let mut availability_scores = Vec::new();

        for extension in extensions {
            let own_results = by_extension.get(extension.key.as_str()).cloned().unwrap_or_default();

            let mut blocks = Vec::with_capacity(own_results.len());
            let mut detail = ExtensionDetail::default();
            let mut successful_scores = Vec::new();
            let mut any_failed = false;

            for result in &own_results {
                if !result.successful {
                    any_failed = true;
                    total_analyzer_errors += 1;
                } else {
                    successful_scores.push(result.score);
                }

                if result.analyzer_name == "availability" {
                    availability_scores.push(result.score);
                    let available = result
                        .metrics
                        .get("ter_available")
                        .and_then(serde_json::Value::as_bool)
                        .unwrap_or(false)
                        || result
                            .metrics
                            .get("packagist_available")
                            .and_then(serde_json::Value::as_bool)
                            .unwrap_or(false)
                        || result
                            .metrics
                            .get("git_available")
                            .and_then(serde_json::Value::as_bool)
                            .unwrap_or(false);
                    if available {
                        availability.available_count += 1;
                    } else {
                        availability.unavailable_count += 1;
                    }
                }

                let findings_by_severity = match (
                    result.metrics.get("critical").and_then(serde_json::Value::as_u64),
                    result.metrics.get("warnings").and_then(serde_json::Value::as_u64),
                ) {
                    (Some(critical), Some(warning)) => Some(FindingsBySeverity {
                        critical,
                        warning,
                        info: result.metrics.get("info").and_then(serde_json::Value::as_u64).unwrap_or(0),
                        suggestion: result
                            .metrics
                            .get("suggestions")
                            .and_then(serde_json::Value::as_u64)
                            .unwrap_or(0),
                    }),
                    _ => None,
                };

                if let Some(changed_files) = result
                    .metrics
                    .get("changed_files")
                    .and_then(|v| serde_json::from_value::<Vec<ChangedFile>>(v.clone()).ok())
                {
                    detail.changed_files.extend(changed_files);
                }

                blocks.push(AnalyzerMetricBlock {
                    analyzer_name: result.analyzer_name.clone(),
                    successful: result.successful,
                    error_message: result.error_message.clone(),
                    score: result.score,
                    risk_level: result.risk_level,
                    metrics: result.metrics.clone(),
                    recommendations: result.recommendations.clone(),
                    has_breaking_changes: findings_by_severity.map(|f| f.critical > 0).unwrap_or(false),
                    has_deprecations: findings_by_severity.map(|f| f.warning > 0).unwrap_or(false),
                    findings_by_severity,
                });
            }

            let (overall_risk, max_risk, risk_level) =
                crate::score::aggregate_extension_risk(&successful_scores, any_failed);

            *risk_distribution.entry(risk_level.to_string()).or_insert(0) += 1;

            reports.push(ExtensionReport {
                extension: extension.clone(),
                analyzers: blocks,
                overall_risk,
                max_risk,
                risk_level,
                detail: (!detail.changed_files.is_empty()).then_some(detail),
            });
        }

        if !availability_scores.is_empty() {
            availability.mean_availability_score =
                availability_scores.iter().sum::<f64>() / availability_scores.len() as f64;
        }

        ReportContext {
            installation_path: installation.path.clone(),
            installation_version: installation.version.to_string(),
            target_version: target_version.to_string(),
            installation_mode: installation.mode,
            extensions: reports,
            summary: InstallationSummary {
                total_extensions: installation.extensions.len(),
                total_analyzer_errors,
                risk_distribution,
                availability,
            },
        }
    }
}

/// Writes one `main`/`extensions/`/`findings-detail/` tree per renderer
/// under `output_dir`, per §6's report output layout.
pub struct ReportFileManager;

impl ReportFileManager {
    pub fn write_all(
        output_dir: &Path,
        ctx: &ReportContext,
        renderers: &[Box<dyn Renderer>],
    ) -> Result<()> {
        for renderer in renderers {
            let format_dir = output_dir.join(renderer.format_name());
            let extensions_dir = format_dir.join("extensions");
            fs::create_dir_all(&extensions_dir)?;

            let main_bytes = renderer.render_main(ctx)?;
            fs::write(
                format_dir.join(format!("main.{}", renderer.file_extension())),
                main_bytes,
            )?;

            for extension in &ctx.extensions {
                let ext_bytes = renderer.render_extension(ctx, extension)?;
                fs::write(
                    extensions_dir.join(format!(
                        "{}.{}",
                        extension.extension.key,
                        renderer.file_extension()
                    )),
                    ext_bytes,
                )?;

                if renderer.emits_detail_pages() && extension.detail.is_some() {
                    let detail_dir = format_dir.join("findings-detail");
                    fs::create_dir_all(&detail_dir)?;
                    if let Some(bytes) = renderer.render_detail(ctx, extension) {
                        fs::write(
                            detail_dir.join(format!(
                                "{}.{}",
                                extension.extension.key,
                                renderer.file_extension()
                            )),
                            bytes?,
                        )?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Maps `reporting.formats` entries to renderers, warning on and
/// skipping any name outside the closed `{json, html, markdown}` set.
pub fn renderers_for(formats: &[String]) -> Vec<Box<dyn Renderer>> {
    let mut renderers: Vec<Box<dyn Renderer>> = Vec::new();
    for format in formats {
        match format.as_str() {
            "json" => renderers.push(Box::new(Json)),
            "html" => renderers.push(Box::new(Html::new())),
            "markdown" => renderers.push(Box::new(Markdown::new())),
            other => log::warn!("unrecognized reporting format '{other}', ignoring"),
        }
    }
    renderers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExtensionType, InstallationMode};
    use crate::score::RiskLevel;
    use std::path::PathBuf;

    fn installation_with_one_extension() -> Installation {
        let mut installation = Installation::new(
            PathBuf::from("/fx"),
            Version::new(12, 4, 10, None),
            InstallationMode::ComposerStandard,
        );
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
        installation
    }

    #[test]
    fn empty_results_yield_zero_valued_aggregates() {
        let installation = installation_with_one_extension();
        let ctx = ReportBuilder::build(&installation, &Version::new(13, 0, 0, None), &[]);
        assert_eq!(ctx.extensions.len(), 1);
        assert_eq!(ctx.extensions[0].overall_risk, 0.0);
        assert_eq!(ctx.extensions[0].risk_level, RiskLevel::Low);
        assert_eq!(ctx.summary.total_analyzer_errors, 0);
    }

    #[test]
    fn all_analyzers_failing_is_critical_per_extension() {
        let installation = installation_with_one_extension();
        let results = vec![AnalysisResult::failed("availability", "news", "boom")];
        let ctx = ReportBuilder::build(&installation, &Version::new(13, 0, 0, None), &results);
        assert_eq!(ctx.extensions[0].overall_risk, 10.0);
        assert_eq!(ctx.extensions[0].risk_level, RiskLevel::Critical);
        assert_eq!(ctx.summary.total_analyzer_errors, 1);
    }

    #[test]
    fn transformation_metrics_populate_detail_and_severity_counts() {
        let installation = installation_with_one_extension();
        let results = vec![AnalysisResult {
            analyzer_name: "rector-transformation".into(),
            extension_key: "news".into(),
            successful: true,
            error_message: None,
            score: 2.0,
            risk_level: RiskLevel::Low,
            metrics: serde_json::json!({
                "critical": 0,
                "warnings": 1,
                "affected_files": 1,
                "total_files": 4,
                "changed_files": [
                    {"file": "Classes/Foo.php", "applied_rectors": [
                        {
                            "class": "DeprecatedCallRector",
                            "line": 12,
                            "message": "m",
                            "old": null,
                            "new": null,
                            "severity": "warning",
                            "change_type": "deprecation",
                        }
                    ]}
                ],
            }),
            recommendations: vec![],
        }];
        let ctx = ReportBuilder::build(&installation, &Version::new(13, 0, 0, None), &results);
        let extension = &ctx.extensions[0];
        assert!(extension.detail.is_some());
        let block = &extension.analyzers[0];
        assert!(!block.has_breaking_changes);
        assert!(block.has_deprecations);
        assert_eq!(block.findings_by_severity.unwrap().warning, 1);
    }
}
