use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_USERNAME: &str = "mattfrayser";
pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_SVG: &str = "darkmode.svg";

/// How often, and how patiently, to poll an endpoint that answers
/// "still computing".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total requests per repository, including the first one.
    pub max_attempts: u32,
    /// Pause between two consecutive attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Same attempt budget, no waiting.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Duration::ZERO,
        }
    }
}

/// Runtime configuration, loaded once in `main` and passed down explicitly.
#[derive(Clone)]
pub struct Config {
    /// Bearer token for the REST API
    pub token: String,
    /// Account whose repositories are counted
    pub username: String,
    /// REST API base, without trailing slash
    pub api_base: String,
    /// SVG cards to rewrite, in order
    pub svg_paths: Vec<PathBuf>,
    /// Polling policy for code-frequency statistics
    pub retry: RetryPolicy,
    /// Pause after each repository's statistics request
    pub throttle: Duration,
    /// Fail instead of skipping missing card ids or unavailable statistics
    pub strict: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("token", &"<redacted>")
            .field("username", &self.username)
            .field("api_base", &self.api_base)
            .field("svg_paths", &self.svg_paths)
            .field("retry", &self.retry)
            .field("throttle", &self.throttle)
            .field("strict", &self.strict)
            .finish()
    }
}

impl Config {
    /// Configuration with every optional setting at its default.
    pub fn new(token: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            username: username.into(),
            api_base: DEFAULT_API_URL.to_string(),
            svg_paths: vec![PathBuf::from(DEFAULT_SVG)],
            retry: RetryPolicy::default(),
            throttle: Duration::from_secs(1),
            strict: false,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("ACCESS_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let username = lookup("STATS_USERNAME").unwrap_or_else(|| DEFAULT_USERNAME.to_string());
        let mut config = Self::new(token, username);

        if let Some(base) = lookup("GITHUB_API_URL") {
            config.api_base = base.trim_end_matches('/').to_string();
        }

        if let Some(paths) = lookup("STATS_SVG") {
            let paths: Vec<PathBuf> = paths
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .collect();
            if paths.is_empty() {
                return Err(ConfigError::InvalidValue("STATS_SVG"));
            }
            config.svg_paths = paths;
        }

        if let Some(attempts) = lookup("STATS_RETRY_ATTEMPTS") {
            config.retry.max_attempts = attempts
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or(ConfigError::InvalidValue("STATS_RETRY_ATTEMPTS"))?;
        }

        if let Some(backoff) = lookup("STATS_RETRY_BACKOFF") {
            config.retry.backoff = humantime::parse_duration(backoff.trim())
                .map_err(|_| ConfigError::InvalidValue("STATS_RETRY_BACKOFF"))?;
        }

        if let Some(throttle) = lookup("STATS_THROTTLE") {
            config.throttle = humantime::parse_duration(throttle.trim())
                .map_err(|_| ConfigError::InvalidValue("STATS_THROTTLE"))?;
        }

        if let Some(strict) = lookup("STATS_STRICT") {
            config.strict = match strict.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                _ => return Err(ConfigError::InvalidValue("STATS_STRICT")),
            };
        }

        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "ACCESS_TOKEN environment variable is not set. Export a GitHub token (or add it to the repository secrets in CI)"
    )]
    MissingToken,
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
