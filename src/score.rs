//! Risk scoring formulas (§4.5). Pure functions over already-gathered
//! evidence; no I/O, no caching — analyzers call these after collecting
//! their metrics.

use crate::clients::{ChangedFile, FindingSeverity};
use std::collections::HashMap;

/// `riskLevel` bands, a closed set keyed off `[0,2] low, (2,5] medium,
/// (5,8] high, (8,10] critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display, serde::Serialize, serde::Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

pub fn risk_level(score: f64) -> RiskLevel {
    if score <= 2.0 {
        RiskLevel::Low
    } else if score <= 5.0 {
        RiskLevel::Medium
    } else if score <= 8.0 {
        RiskLevel::High
    } else {
        RiskLevel::Critical
    }
}

/// Evidence the availability analyzer has gathered for one extension.
#[derive(Debug, Clone, Default)]
pub struct AvailabilityEvidence {
    pub is_system_extension: bool,
    pub ter_available: bool,
    pub packagist_available: bool,
    pub git_available: bool,
    pub git_repository_health: Option<f64>,
}

/// `a = 4·I(registry-A) + 3·I(registry-B) + (1 or 2·h)·I(repo)`, mapped
/// into the `[0,10]` band per §4.5.
pub fn availability_risk(evidence: &AvailabilityEvidence) -> f64 {
    if evidence.is_system_extension {
        return 1.0;
    }

    let mut a = 0.0;
    if evidence.ter_available {
        a += 4.0;
    }
    if evidence.packagist_available {
        a += 3.0;
    }
    if evidence.git_available {
        let h = evidence.git_repository_health.unwrap_or(0.5);
        a += 2.0 * h;
    }

    if a >= 6.0 {
        1.5
    } else if a >= 4.0 {
        2.5
    } else if a >= 2.0 {
        5.0
    } else {
        9.0
    }
}

/// How many entries `top_files`/`top_rules` retain.
const TOP_N: usize = 5;

/// Per-severity, per-change-type finding counts from a
/// source-transformation run, plus the top-N breakdowns and derived
/// complexity/fix-time estimates §4.4 requires.
#[derive(Debug, Clone, Default)]
pub struct TransformationCounts {
    pub critical: u64,
    pub warnings: u64,
    pub info: u64,
    pub suggestions: u64,
    pub affected_files: u64,
    pub total_files: u64,
    pub change_type_counts: HashMap<String, u64>,
    /// `(file, finding count)`, descending, capped at `TOP_N`.
    pub top_files: Vec<(String, u64)>,
    /// `(rule class, finding count)`, descending, capped at `TOP_N`.
    pub top_rules: Vec<(String, u64)>,
    pub complexity: f64,
    pub estimated_fix_minutes: f64,
    pub estimated_fix_hours: f64,
}

/// Per-finding fix-time weight, in minutes, used to derive the
/// aggregate estimated fix-time §4.4 asks for.
fn fix_minutes_for(severity: FindingSeverity) -> f64 {
    match severity {
        FindingSeverity::Critical => 90.0,
        FindingSeverity::Warning => 30.0,
        FindingSeverity::Info => 10.0,
        FindingSeverity::Suggestion => 5.0,
    }
}

/// Per-finding complexity weight: how much one finding of this severity
/// contributes to the extension's overall transformation complexity.
fn complexity_weight_for(severity: FindingSeverity) -> f64 {
    match severity {
        FindingSeverity::Critical => 2.0,
        FindingSeverity::Warning => 1.0,
        FindingSeverity::Info => 0.5,
        FindingSeverity::Suggestion => 0.25,
    }
}

fn top_n_by_count(counts: HashMap<String, u64>) -> Vec<(String, u64)> {
    let mut entries: Vec<(String, u64)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(TOP_N);
    entries
}

impl TransformationCounts {
    pub fn from_changed_files(changed_files: &[ChangedFile], total_files: u64) -> Self {
        let mut critical = 0u64;
        let mut warnings = 0u64;
        let mut info = 0u64;
        let mut suggestions = 0u64;
        let mut change_type_counts: HashMap<String, u64> = HashMap::new();
        let mut file_counts: HashMap<String, u64> = HashMap::new();
        let mut rule_counts: HashMap<String, u64> = HashMap::new();
        let mut complexity_sum = 0.0;
        let mut fix_minutes = 0.0;

        for file in changed_files {
            for rule in &file.applied_rectors {
                match rule.severity {
                    FindingSeverity::Critical => critical += 1,
                    FindingSeverity::Warning => warnings += 1,
                    FindingSeverity::Info => info += 1,
                    FindingSeverity::Suggestion => suggestions += 1,
                }
                *change_type_counts.entry(rule.change_type.clone()).or_insert(0) += 1;
                *file_counts.entry(file.file.clone()).or_insert(0) += 1;
                *rule_counts.entry(rule.class.clone()).or_insert(0) += 1;
                complexity_sum += complexity_weight_for(rule.severity);
                fix_minutes += fix_minutes_for(rule.severity);
            }
        }

        let affected_files = changed_files.len() as u64;
        let complexity = if affected_files > 0 {
            (complexity_sum / affected_files as f64).clamp(0.0, 10.0)
        } else {
            0.0
        };

        TransformationCounts {
            critical,
            warnings,
            info,
            suggestions,
            affected_files,
            total_files,
            change_type_counts,
            top_files: top_n_by_count(file_counts),
            top_rules: top_n_by_count(rule_counts),
            complexity,
            estimated_fix_minutes: fix_minutes,
            estimated_fix_hours: fix_minutes / 60.0,
        }
    }
}

/// `base = 1 + 0.8·critical + 0.3·warnings + 2·(affectedFiles /
/// totalFiles); base ·= (1 + complexity/10); add 1.0 if fixHours > 8,
/// 0.5 if > 4; clamp to [0,10]`.
pub fn transformation_risk(counts: &TransformationCounts) -> f64 {
    let affected_ratio = if counts.total_files > 0 {
        counts.affected_files as f64 / counts.total_files as f64
    } else {
        0.0
    };

    let mut base = 1.0
        + 0.8 * counts.critical as f64
        + 0.3 * counts.warnings as f64
        + 2.0 * affected_ratio;
    base *= 1.0 + counts.complexity / 10.0;

    if counts.estimated_fix_hours > 8.0 {
        base += 1.0;
    } else if counts.estimated_fix_hours > 4.0 {
        base += 0.5;
    }

    base.clamp(0.0, 10.0)
}

/// Size-proportional code-size risk, clamped to `[0,10]`.
pub fn code_size_risk(total_lines: u64) -> f64 {
    // 20k lines of code is treated as the point at which size alone
    // saturates risk; linear below that.
    ((total_lines as f64) / 2000.0).clamp(0.0, 10.0)
}

/// `overallRisk = mean(successfulAnalyzerScores); maxRisk = max(...)`.
/// Extensions with any failed analyzer and no successful results get
/// `risk = 10, level = critical`.
pub fn aggregate_extension_risk(successful_scores: &[f64], any_failed: bool) -> (f64, f64, RiskLevel) {
    if successful_scores.is_empty() {
        return if any_failed {
            (10.0, 10.0, RiskLevel::Critical)
        } else {
            (0.0, 0.0, RiskLevel::Low)
        };
    }

    let sum: f64 = successful_scores.iter().sum();
    let mean = sum / successful_scores.len() as f64;
    let max = successful_scores
        .iter()
        .cloned()
        .fold(f64::MIN, f64::max);
    (mean, max, risk_level(mean))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_extension_is_always_low_risk() {
        let evidence = AvailabilityEvidence {
            is_system_extension: true,
            ..Default::default()
        };
        assert_eq!(availability_risk(&evidence), 1.0);
    }

    #[test]
    fn single_secondary_registry_hit_lands_in_medium_band() {
        let evidence = AvailabilityEvidence {
            is_system_extension: false,
            ter_available: false,
            packagist_available: true,
            git_available: false,
            git_repository_health: None,
        };
        // a = 3 -> band [2,4) -> 5.0.
        assert_eq!(availability_risk(&evidence), 5.0);
    }

    #[test]
    fn repo_only_with_health_below_registry_hits_lands_in_worst_band() {
        let evidence = AvailabilityEvidence {
            is_system_extension: false,
            ter_available: false,
            packagist_available: false,
            git_available: true,
            git_repository_health: Some(0.85),
        };
        // a = 2*0.85 = 1.7 -> band < 2 -> 9.0.
        assert_eq!(availability_risk(&evidence), 9.0);
    }

    #[test]
    fn from_changed_files_classifies_by_real_severity_and_change_type() {
        use crate::clients::{AppliedRule, ChangedFile};

        let changed_files = vec![
            ChangedFile {
                file: "Classes/Foo.php".into(),
                applied_rectors: vec![
                    AppliedRule {
                        class: "RemovedMethodRector".into(),
                        line: 10,
                        message: "method removed".into(),
                        old: None,
                        new: None,
                        severity: FindingSeverity::Critical,
                        change_type: "removal".into(),
                    },
                    AppliedRule {
                        class: "RemovedMethodRector".into(),
                        line: 42,
                        message: "method removed".into(),
                        old: None,
                        new: None,
                        severity: FindingSeverity::Critical,
                        change_type: "removal".into(),
                    },
                ],
            },
            ChangedFile {
                file: "Classes/Bar.php".into(),
                applied_rectors: vec![AppliedRule {
                    class: "DeprecatedCallRector".into(),
                    line: 5,
                    message: "deprecated".into(),
                    old: None,
                    new: None,
                    severity: FindingSeverity::Warning,
                    change_type: "deprecation".into(),
                }],
            },
        ];

        let counts = TransformationCounts::from_changed_files(&changed_files, 10);
        assert_eq!(counts.critical, 2);
        assert_eq!(counts.warnings, 1);
        assert_eq!(counts.info, 0);
        assert_eq!(counts.suggestions, 0);
        assert_eq!(counts.change_type_counts.get("removal"), Some(&2));
        assert_eq!(counts.change_type_counts.get("deprecation"), Some(&1));
        assert_eq!(counts.top_files[0], ("Classes/Foo.php".to_owned(), 2));
        assert_eq!(counts.top_rules[0], ("RemovedMethodRector".to_owned(), 2));
        assert!(counts.complexity > 0.0);
        // 2 critical (90 min each) + 1 warning (30 min) = 210 min = 3.5 hours.
        assert_eq!(counts.estimated_fix_minutes, 210.0);
        assert_eq!(counts.estimated_fix_hours, 3.5);
    }

    #[test]
    fn empty_extension_list_yields_zero_aggregate() {
        let (mean, max, level) = aggregate_extension_risk(&[], false);
        assert_eq!(mean, 0.0);
        assert_eq!(max, 0.0);
        assert_eq!(level, RiskLevel::Low);
    }

    #[test]
    fn all_analyzers_failing_is_critical() {
        let (mean, max, level) = aggregate_extension_risk(&[], true);
        assert_eq!(mean, 10.0);
        assert_eq!(max, 10.0);
        assert_eq!(level, RiskLevel::Critical);
    }

    #[test]
    fn risk_bands_match_closed_set() {
        assert_eq!(risk_level(2.0), RiskLevel::Low);
        assert_eq!(risk_level(5.0), RiskLevel::Medium);
        assert_eq!(risk_level(8.0), RiskLevel::High);
        assert_eq!(risk_level(8.1), RiskLevel::Critical);
    }
}
