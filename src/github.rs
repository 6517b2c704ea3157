use anyhow::{Context, Result, bail};
use serde::de::IgnoredAny;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{Config, RetryPolicy};
use crate::stats::{Churn, CodeFrequencyWeek, Repository, Stats};
use crate::transport::{ApiRequest, HttpTransport, Transport};

/// Page size for every paginated endpoint (the API maximum).
pub const PAGE_SIZE: usize = 100;

/// What happened when asking for one repository's code-frequency statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChurnOutcome {
    Counted(Churn),
    /// Still `202 Accepted` after every allowed attempt.
    NotReady { attempts: u32 },
    /// Any other non-success status.
    Failed { status: u16 },
}

pub struct GithubClient<T = HttpTransport> {
    transport: T,
    api_base: String,
    username: String,
    retry: RetryPolicy,
    throttle: Duration,
    strict: bool,
}

impl GithubClient<HttpTransport> {
    /// Create a REST client authenticated with the configured token.
    pub fn new(config: &Config) -> Result<Self> {
        let transport = HttpTransport::new(&config.token)?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> GithubClient<T> {
    pub fn with_transport(config: &Config, transport: T) -> Self {
        Self {
            transport,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            retry: config.retry,
            throttle: config.throttle,
            strict: config.strict,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// All repositories owned by the user, following `Link: rel="next"`.
    pub async fn list_repos(&self) -> Result<Vec<Repository>> {
        let mut repos = Vec::new();
        let mut request = Some(
            ApiRequest::new(format!("{}/users/{}/repos", self.api_base, self.username))
                .param("per_page", PAGE_SIZE)
                .param("type", "owner"),
        );

        while let Some(req) = request.take() {
            let resp = self.transport.get(&req).await?;
            if !resp.is_success() {
                bail!(
                    "Listing repositories for {} returned HTTP {}: {}",
                    self.username,
                    resp.status,
                    resp.body
                );
            }

            let page: Vec<Repository> = resp
                .json()
                .context("Failed to deserialize repository listing")?;
            debug!(url = %req.url, count = page.len(), "repository page");
            repos.extend(page);

            request = resp.next.map(ApiRequest::new);
        }

        Ok(repos)
    }

    /// Commits by the user on the repository's default branch.
    ///
    /// A page shorter than [`PAGE_SIZE`] ends pagination. A non-200 page stops
    /// this repository early and keeps what was counted so far.
    pub async fn repo_commit_count(&self, repo: &Repository) -> Result<u64> {
        let url = format!(
            "{}/repos/{}/{}/commits",
            self.api_base, self.username, repo.name
        );
        let mut count = 0u64;
        let mut page = 1usize;

        loop {
            let req = ApiRequest::new(url.as_str())
                .param("author", &self.username)
                .param("sha", &repo.default_branch)
                .param("per_page", PAGE_SIZE)
                .param("page", page);

            let resp = self.transport.get(&req).await?;
            if resp.status != 200 {
                warn!(
                    repo = %repo.name,
                    page,
                    status = resp.status,
                    "commit listing failed; keeping partial count"
                );
                break;
            }

            let commits: Vec<IgnoredAny> = resp
                .json()
                .with_context(|| format!("Failed to deserialize commits page {page} of {}", repo.name))?;
            let len = commits.len();
            debug!(repo = %repo.name, page, len, "commit page");
            count = count.saturating_add(len as u64);

            if len < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        Ok(count)
    }

    /// Sum of [`Self::repo_commit_count`] over `repos`.
    pub async fn total_commits(&self, repos: &[Repository]) -> Result<u64> {
        let mut total = 0u64;
        for repo in repos {
            let count = self.repo_commit_count(repo).await?;
            info!(repo = %repo.name, commits = count, "counted commits");
            total = total.saturating_add(count);
        }
        Ok(total)
    }

    /// Weekly additions/deletions for one repository, polling while the
    /// statistics are still being generated.
    pub async fn repo_churn(&self, repo: &Repository) -> Result<ChurnOutcome> {
        let req = ApiRequest::new(format!(
            "{}/repos/{}/{}/stats/code_frequency",
            self.api_base, self.username, repo.name
        ));
        let attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=attempts {
            let resp = self.transport.get(&req).await?;
            match resp.status {
                200 => {
                    let weeks: Vec<CodeFrequencyWeek> = resp.json().with_context(|| {
                        format!("Failed to deserialize code frequency of {}", repo.name)
                    })?;
                    for week in &weeks {
                        debug!(
                            repo = %repo.name,
                            week = %week.week.date_naive(),
                            additions = week.additions,
                            deletions = week.deletions,
                            "code frequency"
                        );
                    }
                    return Ok(ChurnOutcome::Counted(weeks.into_iter().collect()));
                }
                // Empty repository: nothing to count.
                204 => return Ok(ChurnOutcome::Counted(Churn::default())),
                202 => {
                    debug!(repo = %repo.name, attempt, "statistics still being computed");
                    if attempt < attempts {
                        sleep(self.retry.backoff).await;
                    }
                }
                status => return Ok(ChurnOutcome::Failed { status }),
            }
        }

        Ok(ChurnOutcome::NotReady { attempts })
    }

    /// Aggregate churn over `repos`, pausing after each repository.
    ///
    /// Repositories whose statistics never become available contribute
    /// nothing, unless the client is strict.
    pub async fn total_churn(&self, repos: &[Repository]) -> Result<Churn> {
        let mut total = Churn::default();

        for repo in repos {
            let outcome = self.repo_churn(repo).await?;
            match outcome {
                ChurnOutcome::Counted(churn) => {
                    info!(
                        repo = %repo.name,
                        added = churn.added,
                        deleted = churn.deleted,
                        "counted lines"
                    );
                    total.absorb(churn);
                }
                ChurnOutcome::NotReady { attempts } if self.strict => {
                    bail!("Statistics for {} not ready after {attempts} attempts", repo.name)
                }
                ChurnOutcome::Failed { status } if self.strict => {
                    bail!("Statistics for {} returned HTTP {status}", repo.name)
                }
                ChurnOutcome::NotReady { attempts } => {
                    warn!(repo = %repo.name, attempts, "statistics not ready; skipping repository");
                }
                ChurnOutcome::Failed { status } => {
                    warn!(repo = %repo.name, status, "statistics unavailable; skipping repository");
                }
            }
            sleep(self.throttle).await;
        }

        Ok(total)
    }

    /// Run lister, commit counter and churn aggregator in sequence.
    pub async fn collect_stats(&self) -> Result<Stats> {
        let repos = self.list_repos().await?;
        info!(user = %self.username, repos = repos.len(), "listed repositories");

        let commits = self.total_commits(&repos).await?;
        let churn = self.total_churn(&repos).await?;

        Ok(Stats {
            repos: repos.len() as u64,
            commits,
            churn,
        })
    }
}
