//! Package-registry HTTP clients (§6).
//!
//! One registry returns an array of available versions per extension key
//! (TER-shaped); the other returns version-constraint records per
//! `vendor/name` (Packagist-shaped). Both treat 404 as "not available"
//! rather than as an error, and carry a bearer token when configured.

use crate::error::{Error, ErrorCode, Result};
use serde::Deserialize;
use std::time::Duration;
use ureq::{Agent, AgentBuilder};

fn build_agent(timeout: Duration) -> Agent {
    AgentBuilder::new().timeout(timeout).build()
}

/// `ter_available` lookups: a registry keyed by bare extension key,
/// returning the list of published versions.
pub struct TerClient {
    agent: Agent,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TerVersionsResponse {
    versions: Vec<String>,
}

impl TerClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Self {
        TerClient {
            agent: build_agent(timeout),
            base_url: base_url.into(),
            token,
        }
    }

    /// Returns the published version strings for `key`, or `Ok(vec![])`
    /// when the registry has never heard of the extension (HTTP 404).
    pub fn versions(&self, key: &str) -> Result<Vec<String>> {
        let url = format!("{}/extensions/{key}/versions", self.base_url);
        let mut request = self.agent.get(&url);
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }

        match request.call() {
            Ok(response) => {
                let parsed: TerVersionsResponse = response
                    .into_json()
                    .map_err(|e| Error::external(ErrorCode::Io, format!("ter response: {e}")))?;
                Ok(parsed.versions)
            }
            Err(ureq::Error::Status(404, _)) => Ok(Vec::new()),
            Err(e) => Err(Error::external(ErrorCode::Io, format!("ter request: {e}"))),
        }
    }
}

/// `packagist_available` lookups: a registry keyed by `vendor/name`,
/// returning per-version constraint records.
pub struct PackagistClient {
    agent: Agent,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PackagistPackageResponse {
    package: PackagistPackage,
}

#[derive(Debug, Deserialize)]
struct PackagistPackage {
    versions: std::collections::HashMap<String, PackagistVersion>,
}

#[derive(Debug, Deserialize)]
struct PackagistVersion {
    version: String,
    require: Option<std::collections::HashMap<String, String>>,
}

/// One published version and the constraint it declares on the target
/// platform (if any), e.g. `typo3/cms-core: ^12.4`.
#[derive(Debug, Clone)]
pub struct PackagistVersionRecord {
    pub version: String,
    pub core_constraint: Option<String>,
}

impl PackagistClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Self {
        PackagistClient {
            agent: build_agent(timeout),
            base_url: base_url.into(),
            token,
        }
    }

    pub fn versions(
        &self,
        vendor_name: &str,
        core_package: &str,
    ) -> Result<Vec<PackagistVersionRecord>> {
        let url = format!("{}/p2/{vendor_name}.json", self.base_url);
        let mut request = self.agent.get(&url);
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }

        match request.call() {
            Ok(response) => {
                let parsed: PackagistPackageResponse = response.into_json().map_err(|e| {
                    Error::external(ErrorCode::Io, format!("packagist response: {e}"))
                })?;
                Ok(parsed
                    .package
                    .versions
                    .into_values()
                    .map(|v| PackagistVersionRecord {
                        version: v.version,
                        core_constraint: v
                            .require
                            .and_then(|r| r.get(core_package).cloned()),
                    })
                    .collect())
            }
            Err(ureq::Error::Status(404, _)) => Ok(Vec::new()),
            Err(e) => Err(Error::external(
                ErrorCode::Io,
                format!("packagist request: {e}"),
            )),
        }
    }
}
