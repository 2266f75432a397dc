//! External-process invocation for source-transformation tools (§6).
//!
//! Follows the `hc_eslint::command` pattern of wrapping
//! `std::process::Command`, capturing stderr as the error message on a
//! non-zero exit. Timeout enforcement (absent from that pattern, since
//! `Command::output()` blocks indefinitely) is added via a polling
//! `try_wait` loop so the child can be killed and the analyzer still
//! return a failure result rather than hang the worker.

use crate::error::{Error, ErrorCode, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// A finding's severity band, per §4.4's closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FindingSeverity {
    Critical,
    Warning,
    Info,
    Suggestion,
}

/// One rule application reported by the tool. `severity` and
/// `change_type` extend §6's minimal wire shape (`class`/`line`/
/// `message`/`old`/`new`) so the counter can actually classify findings
/// per §4.4's documented aggregation rather than guessing from `class`'s
/// naming convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedRule {
    pub class: String,
    pub line: u32,
    pub message: String,
    pub old: Option<String>,
    pub new: Option<String>,
    pub severity: FindingSeverity,
    pub change_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedFile {
    pub file: String,
    pub applied_rectors: Vec<AppliedRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub changed_files: Vec<ChangedFile>,
}

/// Invokes `toolBinary --config <generatedConfigPath> <targetPath>
/// [flags...]` with the working directory set to the installation root,
/// enforcing `timeout` and parsing the resulting JSON stdout.
pub fn run_transformation_tool(
    binary_path: &Path,
    config_path: &Path,
    target_path: &Path,
    working_dir: &Path,
    extra_flags: &[&str],
    timeout: Duration,
) -> Result<ToolOutput> {
    if !binary_path.exists() {
        return Err(Error::external(
            ErrorCode::AnalyzerToolMissing,
            format!("tool binary not found at {}", binary_path.display()),
        ));
    }

    let mut command = Command::new(binary_path);
    command
        .arg("--config")
        .arg(config_path)
        .arg(target_path)
        .args(extra_flags)
        .current_dir(working_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|e| Error::external(ErrorCode::Io, format!("spawning tool: {e}")))?;

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(Error::external(
                        ErrorCode::AnalyzerTimeout,
                        format!("tool exceeded {:?} timeout", timeout),
                    ));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                return Err(Error::external(ErrorCode::Io, format!("waiting on tool: {e}")));
            }
        }
    };

    let output = child
        .wait_with_output()
        .map_err(|e| Error::external(ErrorCode::Io, format!("collecting tool output: {e}")))?;

    if !status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        return Err(Error::external(
            ErrorCode::AnalyzerExitNonzero,
            if stderr.is_empty() {
                format!("tool exited with {status}")
            } else {
                stderr
            },
        ));
    }

    serde_json::from_slice(&output.stdout)
        .map_err(|e| Error::external(ErrorCode::Io, format!("parsing tool output: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_tool_missing() {
        let err = run_transformation_tool(
            Path::new("/nonexistent/tool"),
            Path::new("/tmp/cfg.json"),
            Path::new("/tmp/target"),
            Path::new("/tmp"),
            &[],
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::AnalyzerToolMissing);
    }
}
