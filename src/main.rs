use anyhow::Result;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use statcard::config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "statcard=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let stats = statcard::run(&config).await?;

    println!(
        "Updated {} card(s): {} repos, {} commits, {} lines net.",
        config.svg_paths.len(),
        stats.repos,
        stats.commits,
        stats.churn.net()
    );

    Ok(())
}
