//! Source-hosting GraphQL client (§6): archived flag, star count,
//! last-update timestamp, and tag refs with their target commit dates.
//!
//! Follows `data/github/graphql.rs`'s pattern: a `#[derive(GraphQLQuery)]`
//! struct paired with on-disk schema/query files, a bearer-authenticated
//! `ureq` agent, and manual JSON transport (`graphql_client` only builds
//! the request body; it does not ship a client).

use crate::clients::ratelimit::{Backoff, TokenBucket};
use crate::error::{Error, ErrorCode, Result};
use graphql_client::{GraphQLQuery, Response};
use std::time::Duration;
use ureq::Agent;

#[allow(clippy::upper_case_acronyms)]
type DateTime = String;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "src/clients/gh_schema.graphql",
    query_path = "src/clients/gh_query.graphql",
    response_derives = "Debug, Clone"
)]
pub struct RepositoryHealth;

const GH_API_V4: &str = "https://api.github.com/graphql";

/// The subset of repository health evidence the availability analyzer
/// needs, lowered out of the raw GraphQL response shape.
#[derive(Debug, Clone)]
pub struct RepositoryHealthReport {
    pub archived: bool,
    pub is_fork: bool,
    pub star_count: i64,
    pub pushed_at: Option<String>,
    pub tags: Vec<TagRef>,
}

#[derive(Debug, Clone)]
pub struct TagRef {
    pub name: String,
    pub committed_date: Option<String>,
}

pub struct GitHubClient {
    agent: Agent,
    token: Option<String>,
    bucket: TokenBucket,
}

impl GitHubClient {
    pub fn new(token: Option<String>, timeout: Duration) -> Self {
        GitHubClient {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            token,
            // GitHub's default GraphQL budget is 5000 points/hour; a
            // conservative per-second refill keeps bursts well under it.
            bucket: TokenBucket::new(5.0, 1.0),
        }
    }

    /// Queries repository health, honoring rate-limit exhaustion by
    /// retrying with exponential backoff. On exhaustion past the backoff
    /// ceiling, returns `Ok(None)` rather than an error (§6: "the analyzer
    /// returns `{git_available: false}` without error").
    pub fn repository_health(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<RepositoryHealthReport>> {
        let variables = repository_health::Variables {
            owner: owner.to_owned(),
            name: name.to_owned(),
        };
        let query = RepositoryHealth::build_query(variables);

        let mut backoff = Backoff::new(Duration::from_millis(500), Duration::from_secs(30));
        for attempt in 0..5 {
            self.bucket.take();

            let mut request = self.agent.post(GH_API_V4);
            if let Some(token) = &self.token {
                request = request.set("Authorization", &format!("Bearer {token}"));
            }

            match request.send_json(&query) {
                Ok(response) => {
                    let body: Response<repository_health::ResponseData> = response
                        .into_json()
                        .map_err(|e| Error::external(ErrorCode::Io, format!("gh response: {e}")))?;
                    return Ok(lower(body));
                }
                Err(ureq::Error::Status(403, _)) | Err(ureq::Error::Status(429, _)) => {
                    if attempt == 4 {
                        return Ok(None);
                    }
                    std::thread::sleep(backoff.next_delay());
                }
                Err(e) => {
                    return Err(Error::external(ErrorCode::Io, format!("gh request: {e}")));
                }
            }
        }
        Ok(None)
    }
}

fn lower(body: Response<repository_health::ResponseData>) -> Option<RepositoryHealthReport> {
    let repo = body.data?.repository?;
    let tags = repo
        .refs
        .map(|conn| {
            conn.nodes
                .into_iter()
                .map(|n| TagRef {
                    name: n.name,
                    committed_date: n.target.and_then(|t| t.committed_date),
                })
                .collect()
        })
        .unwrap_or_default();

    Some(RepositoryHealthReport {
        archived: repo.is_archived,
        is_fork: repo.is_fork,
        star_count: repo.stargazer_count as i64,
        pushed_at: repo.pushed_at,
        tags,
    })
}

/// Health score in `[0,1]` derived from age-of-last-update, archive/fork
/// flags, and activity counts (§4.4).
pub fn health_score(report: &RepositoryHealthReport, now_unix: i64) -> f64 {
    if report.archived || report.is_fork {
        return 0.1;
    }

    let recency = report
        .pushed_at
        .as_deref()
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| {
            let age_days = (now_unix - dt.timestamp()).max(0) as f64 / 86_400.0;
            (1.0 - age_days / 365.0).clamp(0.0, 1.0)
        })
        .unwrap_or(0.3);

    let activity = (report.tags.len() as f64 / 10.0).min(1.0);
    let stars = (report.star_count as f64 / 1000.0).min(1.0);

    (0.5 * recency + 0.3 * activity + 0.2 * stars).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archived_repos_score_low() {
        let report = RepositoryHealthReport {
            archived: true,
            is_fork: false,
            star_count: 5000,
            pushed_at: Some("2026-01-01T00:00:00Z".to_owned()),
            tags: vec![],
        };
        assert!(health_score(&report, 1_800_000_000) < 0.2);
    }

    #[test]
    fn active_well_starred_repo_scores_high() {
        let report = RepositoryHealthReport {
            archived: false,
            is_fork: false,
            star_count: 2000,
            pushed_at: Some("2026-07-20T00:00:00Z".to_owned()),
            tags: (0..20)
                .map(|i| TagRef {
                    name: format!("v{i}"),
                    committed_date: Some("2026-07-01T00:00:00Z".to_owned()),
                })
                .collect(),
        };
        assert!(health_score(&report, 1_800_000_000) > 0.7);
    }
}
