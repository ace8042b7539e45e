use super::types::{LintReport, LintRequest, LintResponse, RuleInfo, Violation};
use super::LintBackend;
use crate::config::UpstreamConfig;
use crate::error::{BridgeError, Result};
use crate::metrics;
use crate::resilience::GuardedCaller;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Instant;
use tracing::{debug, info};

/// Longest upstream error body kept in error messages
const MAX_ERROR_BODY: usize = 512;

/// HTTP client for the upstream linter service.
///
/// `lint` and `list_rules` run through the guarded caller; `ping` does not,
/// so health probes never trip the breaker.
#[derive(Debug, Clone)]
pub struct LinterClient {
    client: reqwest::Client,
    base_url: String,
    guard: GuardedCaller,
}

impl LinterClient {
    /// Create a new linter client
    pub fn new(config: &UpstreamConfig, guard: GuardedCaller) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| BridgeError::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            base_url = %config.base_url,
            timeout_secs = config.timeout_secs,
            "Creating linter client"
        );

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            guard,
        })
    }

    pub fn guard(&self) -> &GuardedCaller {
        &self.guard
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn lint_once(&self, request: &LintRequest) -> Result<Vec<Violation>> {
        let started = Instant::now();
        let result = self.send_lint(request).await;
        record("lint", &result, started);
        result
    }

    async fn send_lint(&self, request: &LintRequest) -> Result<Vec<Violation>> {
        let response = self
            .client
            .post(self.url("lint"))
            .json(request)
            .send()
            .await?;
        let body: LintResponse = decode(check_status(response).await?).await?;
        Ok(body.violations)
    }

    async fn rules_once(&self) -> Result<Vec<RuleInfo>> {
        let started = Instant::now();
        let result = self.send_rules().await;
        record("list_rules", &result, started);
        result
    }

    async fn send_rules(&self) -> Result<Vec<RuleInfo>> {
        let response = self.client.get(self.url("rules")).send().await?;
        decode(check_status(response).await?).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl LintBackend for LinterClient {
    async fn lint(&self, request: &LintRequest) -> Result<LintReport> {
        debug!(
            bytes = request.document.len(),
            format = ?request.format,
            ruleset = ?request.ruleset,
            "Linting document"
        );

        let violations = self
            .guard
            .call(|| self.lint_once(request), Some("lint"))
            .await?;

        Ok(LintReport::new(violations))
    }

    async fn list_rules(&self) -> Result<Vec<RuleInfo>> {
        Ok(self
            .guard
            .call(|| self.rules_once(), Some("list_rules"))
            .await?)
    }

    /// Hits the linter's health endpoint directly, bypassing the breaker
    async fn ping(&self) -> Result<()> {
        let response = self.client.get(self.url("health")).send().await?;
        check_status(response).await.map(|_| ())
    }
}

/// Turn non-2xx responses into [`BridgeError::UpstreamStatus`]
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }

    Err(BridgeError::UpstreamStatus {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| BridgeError::Decode(e.to_string()))
}

fn record<T>(operation: &str, result: &Result<T>, started: Instant) {
    let outcome = match result {
        Ok(_) => "success",
        Err(BridgeError::Upstream(e)) if e.is_timeout() => "timeout",
        Err(_) => "error",
    };
    metrics::record_upstream_call(operation, outcome, started.elapsed().as_secs_f64());
}
