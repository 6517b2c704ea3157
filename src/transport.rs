use std::future::Future;

use anyhow::{Context, Result};
use reqwest::Client;
use reqwest::header::{ACCEPT, LINK};
use serde::de::DeserializeOwned;

const USER_AGENT: &str = "statcard";
const GITHUB_JSON: &str = "application/vnd.github+json";

/// A GET request against the REST API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// The URL with its query parameters appended in insertion order.
    pub fn key(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let query: Vec<String> = self.query.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let sep = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{sep}{}", self.url, query.join("&"))
    }
}

/// Status, `rel="next"` link and raw body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub next: Option<String>,
    pub body: String,
}

impl ApiResponse {
    pub fn ok(body: serde_json::Value) -> Self {
        Self {
            status: 200,
            next: None,
            body: body.to_string(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            next: None,
            body: String::new(),
        }
    }

    pub fn with_next(mut self, url: impl Into<String>) -> Self {
        self.next = Some(url.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }
}

/// Anything that can answer REST API requests.
pub trait Transport {
    fn get(&self, request: &ApiRequest) -> impl Future<Output = Result<ApiResponse>> + Send;
}

/// Transport backed by reqwest, authenticating with a bearer token.
#[derive(Clone)]
pub struct HttpTransport {
    token: String,
    http: Client,
}

impl HttpTransport {
    pub fn new(token: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            token: token.to_string(),
            http,
        })
    }
}

impl Transport for HttpTransport {
    async fn get(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut req = self
            .http
            .get(&request.url)
            .bearer_auth(&self.token)
            .header(ACCEPT, GITHUB_JSON);
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("Network error requesting {}", request.url))?;

        let status = resp.status().as_u16();
        let next = resp
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(next_link);
        let body = resp
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", request.url))?;

        Ok(ApiResponse { status, next, body })
    }
}

/// Extracts the `rel="next"` target from an RFC 8288 `Link` header.
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let url = target.strip_prefix('<')?.strip_suffix('>')?;

        let is_next = parts.any(|param| {
            param
                .trim()
                .strip_prefix("rel=")
                .map(|rel| rel.trim_matches('"').split_whitespace().any(|r| r == "next"))
                .unwrap_or(false)
        });

        is_next.then(|| url.to_string())
    })
}
