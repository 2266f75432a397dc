//! Concrete analyzer classes (§4.4): availability lookup, two
//! source-transformation counters targeting different external tools,
//! and a code-size counter.

use super::{AnalysisContext, AnalysisResult, Analyzer};
use crate::model::{Extension, ExtensionType};
use crate::score::{
    self, availability_risk, code_size_risk, transformation_risk, AvailabilityEvidence,
    TransformationCounts,
};
use serde_json::json;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Queries TER, Packagist, and (best-effort, via the package name as
/// `owner/repo`) GitHub, then scores availability per §4.5.
pub struct AvailabilityAnalyzer;

impl Analyzer for AvailabilityAnalyzer {
    fn name(&self) -> &str {
        "availability"
    }

    fn supports(&self, _extension: &Extension) -> bool {
        true
    }

    fn analyze(&self, extension: &Extension, ctx: &AnalysisContext<'_>) -> AnalysisResult {
        if extension.kind == ExtensionType::System {
            let evidence = AvailabilityEvidence {
                is_system_extension: true,
                ..Default::default()
            };
            return self.result_from(extension, evidence, &["ships with core; no action needed"]);
        }

        let ter_available = ctx
            .clients
            .ter
            .versions(&extension.key)
            .map(|v| !v.is_empty())
            .unwrap_or(false);

        let packagist_available = extension
            .package
            .as_deref()
            .and_then(|pkg| ctx.clients.packagist.versions(pkg, "typo3/cms-core").ok())
            .map(|v| !v.is_empty())
            .unwrap_or(false);

        let (git_available, git_repository_health) = extension
            .package
            .as_deref()
            .filter(|pkg| pkg.contains('/'))
            .and_then(|pkg| {
                let (owner, repo) = pkg.split_once('/')?;
                ctx.clients.github.repository_health(owner, repo).ok()?
            })
            .map(|report| (true, Some(crate::clients::health_score(&report, now_unix()))))
            .unwrap_or((false, None));

        let evidence = AvailabilityEvidence {
            is_system_extension: false,
            ter_available,
            packagist_available,
            git_available,
            git_repository_health,
        };

        let mut recommendations = Vec::new();
        if !ter_available && !packagist_available && !git_available {
            recommendations.push("no known source; plan a manual rewrite or removal".to_owned());
        } else if !ter_available && !packagist_available {
            recommendations.push("only a source repository was found; verify it is maintained".to_owned());
        }
        self.result_from(extension, evidence, &recommendations.iter().map(String::as_str).collect::<Vec<_>>())
    }
}

impl AvailabilityAnalyzer {
    fn result_from(
        &self,
        extension: &Extension,
        evidence: AvailabilityEvidence,
        recommendations: &[&str],
    ) -> AnalysisResult {
        let score = availability_risk(&evidence);
        AnalysisResult {
            analyzer_name: self.name().to_owned(),
            extension_key: extension.key.clone(),
            successful: true,
            error_message: None,
            score,
            risk_level: score::risk_level(score),
            metrics: json!({
                "ter_available": evidence.ter_available,
                "packagist_available": evidence.packagist_available,
                "git_available": evidence.git_available,
                "git_repository_health": evidence.git_repository_health,
            }),
            recommendations: recommendations.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Shared plumbing for the two source-transformation counters: generate
/// a minimal tool config, invoke the binary, fold its findings into
/// `TransformationCounts`, and score per §4.5.
fn run_transformation_counter(
    analyzer_name: &str,
    binary_path: &Path,
    timeout: std::time::Duration,
    extension: &Extension,
) -> AnalysisResult {
    let Ok(workdir) = tempfile::tempdir() else {
        return AnalysisResult::failed(analyzer_name, &extension.key, "could not create scratch directory");
    };
    let config_path = workdir.path().join("config.json");
    if std::fs::write(&config_path, b"{}").is_err() {
        return AnalysisResult::failed(analyzer_name, &extension.key, "could not write tool config");
    }

    let total_files = WalkDir::new(&extension.path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && e.path().extension().and_then(|x| x.to_str()) == Some("php"))
        .count() as u64;

    match crate::clients::run_transformation_tool(
        binary_path,
        &config_path,
        &extension.path,
        workdir.path(),
        &[],
        timeout,
    ) {
        Ok(output) => {
            let counts = TransformationCounts::from_changed_files(&output.changed_files, total_files);
            let score = transformation_risk(&counts);
            AnalysisResult {
                analyzer_name: analyzer_name.to_owned(),
                extension_key: extension.key.clone(),
                successful: true,
                error_message: None,
                score,
                risk_level: score::risk_level(score),
                metrics: json!({
                    "critical": counts.critical,
                    "warnings": counts.warnings,
                    "info": counts.info,
                    "suggestions": counts.suggestions,
                    "affected_files": counts.affected_files,
                    "total_files": counts.total_files,
                    "change_type_counts": counts.change_type_counts,
                    "top_files": counts.top_files,
                    "top_rules": counts.top_rules,
                    "complexity": counts.complexity,
                    "estimated_fix_minutes": counts.estimated_fix_minutes,
                    // Raw per-file findings, consumed by the report
                    "changed_files": output.changed_files,
                }),
                recommendations: if counts.critical > 0 {
                    vec!["review breaking-change findings before upgrading".to_owned()]
                } else {
                    Vec::new()
                },
            }
        }
        Err(e) => AnalysisResult::failed(analyzer_name, &extension.key, e.to_string()),
    }
}

/// The primary source-transformation counter, targeting the configured
/// `rector`-family binary.
pub struct RectorTransformationAnalyzer {
    pub binary_path: std::path::PathBuf,
    pub timeout: std::time::Duration,
}

impl Analyzer for RectorTransformationAnalyzer {
    fn name(&self) -> &str {
        "rector-transformation"
    }

    fn supports(&self, extension: &Extension) -> bool {
        extension.kind != ExtensionType::System
    }

    fn required_external_tools(&self) -> Vec<&str> {
        vec![self.binary_path.to_str().unwrap_or("rector")]
    }

    fn analyze(&self, extension: &Extension, _ctx: &AnalysisContext<'_>) -> AnalysisResult {
        run_transformation_counter(self.name(), &self.binary_path, self.timeout, extension)
    }
}

/// The second source-transformation counter, targeting a different
/// configured tool with the same output contract (§4.4).
pub struct DeprecationScanAnalyzer {
    pub binary_path: std::path::PathBuf,
    pub timeout: std::time::Duration,
}

impl Analyzer for DeprecationScanAnalyzer {
    fn name(&self) -> &str {
        "deprecation-scan"
    }

    fn supports(&self, extension: &Extension) -> bool {
        extension.kind != ExtensionType::System
    }

    fn required_external_tools(&self) -> Vec<&str> {
        vec![self.binary_path.to_str().unwrap_or("typo3-deprecation-scanner")]
    }

    fn analyze(&self, extension: &Extension, _ctx: &AnalysisContext<'_>) -> AnalysisResult {
        run_transformation_counter(self.name(), &self.binary_path, self.timeout, extension)
    }
}

/// Walks an extension's source tree, counting lines of code and the
/// largest-file metrics (§4.4).
pub struct CodeSizeAnalyzer;

#[derive(Default)]
struct LineCounts {
    total: u64,
    code: u64,
    comment: u64,
    blank: u64,
}

fn count_lines(contents: &str) -> LineCounts {
    let mut counts = LineCounts::default();
    let mut in_block_comment = false;
    for line in contents.lines() {
        counts.total += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            counts.blank += 1;
        } else if in_block_comment {
            counts.comment += 1;
            if trimmed.contains("*/") {
                in_block_comment = false;
            }
        } else if trimmed.starts_with("//") || trimmed.starts_with('#') {
            counts.comment += 1;
        } else if trimmed.starts_with("/*") {
            counts.comment += 1;
            if !trimmed.contains("*/") {
                in_block_comment = true;
            }
        } else {
            counts.code += 1;
        }
    }
    counts
}

impl Analyzer for CodeSizeAnalyzer {
    fn name(&self) -> &str {
        "code-size"
    }

    fn supports(&self, _extension: &Extension) -> bool {
        true
    }

    fn analyze(&self, extension: &Extension, _ctx: &AnalysisContext<'_>) -> AnalysisResult {
        let mut total = LineCounts::default();
        let mut file_count = 0u64;
        let mut class_count = 0u64;
        let mut method_count = 0u64;
        let mut largest_file: Option<(String, u64)> = None;

        for entry in WalkDir::new(&extension.path).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension().and_then(|x| x.to_str()) != Some("php") {
                continue;
            }
            let Ok(contents) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            let counts = count_lines(&contents);
            file_count += 1;
            class_count += contents.matches("class ").count() as u64;
            method_count += contents.matches("function ").count() as u64;

            let is_largest = largest_file
                .as_ref()
                .map(|(_, lines)| counts.total > *lines)
                .unwrap_or(true);
            if is_largest {
                largest_file = Some((entry.path().display().to_string(), counts.total));
            }

            total.total += counts.total;
            total.code += counts.code;
            total.comment += counts.comment;
            total.blank += counts.blank;
        }

        let score = code_size_risk(total.total);
        AnalysisResult {
            analyzer_name: self.name().to_owned(),
            extension_key: extension.key.clone(),
            successful: true,
            error_message: None,
            score,
            risk_level: score::risk_level(score),
            metrics: json!({
                "total_lines": total.total,
                "code_lines": total.code,
                "comment_lines": total.comment,
                "blank_lines": total.blank,
                "file_count": file_count,
                "class_count": class_count,
                "method_count": method_count,
                "largest_file": largest_file.map(|(path, lines)| json!({"path": path, "lines": lines})),
            }),
            recommendations: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_lines_by_kind() {
        let source = "<?php\n// a comment\n\nclass Foo {\n    function bar() {}\n}\n";
        let counts = count_lines(source);
        assert_eq!(counts.total, 6);
        assert_eq!(counts.blank, 1);
        assert_eq!(counts.comment, 1);
        assert_eq!(counts.code, 4);
    }

    #[test]
    fn code_size_analyzer_walks_extension_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Foo.php"),
            "<?php\nclass Foo {\n    function bar() {}\n}\n",
        )
        .unwrap();

        let extension = Extension {
            key: "news".into(),
            title: "News".into(),
            version: None,
            kind: ExtensionType::ThirdParty,
            package: None,
            path: dir.path().to_path_buf(),
            is_active: true,
            em_configuration: Default::default(),
        };

        let config = crate::config::Config::default();
        let clients = crate::clients::ExternalClients::from_config(&config);
        let installation = crate::model::Installation::new(
            dir.path().to_path_buf(),
            crate::version::Version::new(12, 4, 10, None),
            crate::model::InstallationMode::Legacy,
        );
        let ctx = AnalysisContext {
            installation: &installation,
            target_version: &crate::version::Version::new(13, 0, 0, None),
            clients: &clients,
            config: &config,
        };

        let analyzer = CodeSizeAnalyzer;
        let result = analyzer.analyze(&extension, &ctx);
        assert!(result.successful);
        assert_eq!(result.metrics["file_count"], 1);
        assert_eq!(result.metrics["class_count"], 1);
    }

    #[test]
    fn system_extensions_are_always_low_availability_risk() {
        let extension = Extension {
            key: "core".into(),
            title: "Core".into(),
            version: None,
            kind: ExtensionType::System,
            package: None,
            path: std::path::PathBuf::from("/fx/core"),
            is_active: true,
            em_configuration: Default::default(),
        };

        let config = crate::config::Config::default();
        let clients = crate::clients::ExternalClients::from_config(&config);
        let installation = crate::model::Installation::new(
            std::path::PathBuf::from("/fx"),
            crate::version::Version::new(12, 4, 10, None),
            crate::model::InstallationMode::Legacy,
        );
        let ctx = AnalysisContext {
            installation: &installation,
            target_version: &crate::version::Version::new(13, 0, 0, None),
            clients: &clients,
            config: &config,
        };

        let analyzer = AvailabilityAnalyzer;
        let result = analyzer.analyze(&extension, &ctx);
        assert_eq!(result.score, 1.0);
    }
}
