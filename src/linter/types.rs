use serde::{Deserialize, Serialize};
use std::fmt;

/// Document format hint passed to the linter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecFormat {
    #[default]
    Auto,
    OpenApi,
    AsyncApi,
}

/// Lint request sent upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LintRequest {
    /// Raw specification text (YAML or JSON)
    pub document: String,
    #[serde(default)]
    pub format: SpecFormat,
    /// Named ruleset; the linter's default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ruleset: Option<String>,
}

/// Violation severity, ordered from most to least severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warn,
    Info,
    Hint,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warn => write!(f, "warn"),
            Severity::Info => write!(f, "info"),
            Severity::Hint => write!(f, "hint"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

/// A single rule violation reported by the linter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Rule code, e.g. `operation-operationId`
    pub code: String,
    pub message: String,
    pub severity: Severity,
    /// JSON path to the offending node
    #[serde(default)]
    pub path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code, self.message)?;
        if let Some(range) = &self.range {
            // Lines are zero-based upstream
            write!(f, " (line {})", range.start.line + 1)?;
        }
        if !self.path.is_empty() {
            write!(f, " at {}", self.path.join("."))?;
        }
        Ok(())
    }
}

/// Upstream `/lint` response body
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LintResponse {
    #[serde(default)]
    pub violations: Vec<Violation>,
}

/// Rule metadata from the upstream `/rules` endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleInfo {
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub severity: Severity,
}

/// Violations plus per-severity counts
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LintReport {
    pub violations: Vec<Violation>,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub hints: usize,
}

impl LintReport {
    pub fn new(mut violations: Vec<Violation>) -> Self {
        violations.sort_by_key(|v| v.severity);

        let mut report = Self::default();
        for v in &violations {
            match v.severity {
                Severity::Error => report.errors += 1,
                Severity::Warn => report.warnings += 1,
                Severity::Info => report.infos += 1,
                Severity::Hint => report.hints += 1,
            }
        }
        report.violations = violations;
        report
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// One-line summary, e.g. `2 errors, 1 warning, 0 info, 0 hints`
    pub fn summary(&self) -> String {
        if self.is_clean() {
            return "No violations found".to_string();
        }
        format!(
            "{} {}, {} {}, {} info, {} {}",
            self.errors,
            plural(self.errors, "error", "errors"),
            self.warnings,
            plural(self.warnings, "warning", "warnings"),
            self.infos,
            self.hints,
            plural(self.hints, "hint", "hints"),
        )
    }
}

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 {
        one
    } else {
        many
    }
}
