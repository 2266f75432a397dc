//! External-client surface (§4.4, §6): package-registry lookups,
//! source-hosting repository health, external-process invocation for
//! source-transformation tools, and the shared rate-limit substrate.

mod github;
mod process;
mod ratelimit;
mod registry;

pub use github::{health_score, GitHubClient, RepositoryHealthReport, TagRef};
pub use process::{run_transformation_tool, AppliedRule, ChangedFile, FindingSeverity, ToolOutput};
pub use registry::{PackagistClient, PackagistVersionRecord, TerClient};

use crate::config::Config;
use std::time::Duration;

/// Constructs every external client from a resolved `Config`, wiring
/// tokens and timeouts through from `git.github.token`, `git.timeout_seconds`.
pub struct ExternalClients {
    pub ter: TerClient,
    pub packagist: PackagistClient,
    pub github: GitHubClient,
}

impl ExternalClients {
    pub fn from_config(config: &Config) -> Self {
        let timeout = Duration::from_secs(config.git.timeout_seconds);
        ExternalClients {
            ter: TerClient::new("https://extensions.typo3.org/api/v1", None, timeout),
            packagist: PackagistClient::new("https://repo.packagist.org", None, timeout),
            github: GitHubClient::new(config.git.github.token.clone(), timeout),
        }
    }
}
