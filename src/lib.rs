pub mod config;
pub mod format;
pub mod github;
pub mod stats;
pub mod svg;
pub mod testing;
pub mod transport;

use anyhow::{Context, Result};
use tracing::info;

use config::Config;
use github::GithubClient;
use stats::Stats;
use transport::Transport;

/// Fetch everything over HTTP and rewrite the configured cards.
pub async fn run(config: &Config) -> Result<Stats> {
    let client = GithubClient::new(config)?;
    refresh(&client, config).await
}

/// Collect stats through `client`, then write them into every card in
/// `config.svg_paths`.
pub async fn refresh<T: Transport>(client: &GithubClient<T>, config: &Config) -> Result<Stats> {
    let stats = client.collect_stats().await?;
    info!(
        repos = stats.repos,
        commits = stats.commits,
        added = stats.churn.added,
        deleted = stats.churn.deleted,
        net = stats.churn.net(),
        "collected stats"
    );

    for path in &config.svg_paths {
        svg::update_svg(path, &stats, config.strict)
            .with_context(|| format!("Failed to update {}", path.display()))?;
    }

    Ok(stats)
}
