pub mod client;
pub mod types;

pub use client::LinterClient;
pub use types::{LintReport, LintRequest, RuleInfo, Severity, SpecFormat, Violation};

use crate::error::Result;
use async_trait::async_trait;

/// Source of lint results for the tool layer
#[async_trait]
pub trait LintBackend: Send + Sync {
    /// Lint a single document
    async fn lint(&self, request: &LintRequest) -> Result<LintReport>;

    /// List the rules the linter applies
    async fn list_rules(&self) -> Result<Vec<RuleInfo>>;

    /// Check that the backend is reachable
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
