use super::protocol::{Tool, ToolResult};
use crate::error::{BridgeError, Result};
use crate::linter::{LintBackend, LintReport, LintRequest, RuleInfo, SpecFormat};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt::Write;
use tracing::warn;

pub const LINT_SPEC: &str = "lint_spec";
pub const LIST_RULES: &str = "list_rules";

#[derive(Debug, Deserialize)]
struct LintSpecArgs {
    document: String,
    #[serde(default)]
    format: SpecFormat,
    #[serde(default)]
    ruleset: Option<String>,
}

/// Tools advertised by `tools/list`
pub fn definitions() -> Vec<Tool> {
    vec![
        Tool {
            name: LINT_SPEC,
            description: "Lint an OpenAPI or AsyncAPI document and report rule violations",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "document": {
                        "type": "string",
                        "description": "The API specification, as YAML or JSON text"
                    },
                    "format": {
                        "type": "string",
                        "enum": ["auto", "openapi", "asyncapi"],
                        "default": "auto"
                    },
                    "ruleset": {
                        "type": "string",
                        "description": "Named ruleset to apply instead of the default"
                    }
                },
                "required": ["document"]
            }),
        },
        Tool {
            name: LIST_RULES,
            description: "List the rules applied by the linter",
            input_schema: json!({ "type": "object", "properties": {} }),
        },
    ]
}

/// Run a tool by name.
///
/// Bad arguments and unknown tools are protocol errors; upstream failures are
/// reported inside the result with `isError` set.
pub async fn call(backend: &dyn LintBackend, name: &str, arguments: Value) -> Result<ToolResult> {
    match name {
        LINT_SPEC => {
            let args: LintSpecArgs = serde_json::from_value(arguments)
                .map_err(|e| BridgeError::InvalidParams(format!("{}: {}", LINT_SPEC, e)))?;
            if args.document.trim().is_empty() {
                return Err(BridgeError::InvalidParams(
                    "document must not be empty".to_string(),
                ));
            }

            let request = LintRequest {
                document: args.document,
                format: args.format,
                ruleset: args.ruleset,
            };
            Ok(match backend.lint(&request).await {
                Ok(report) => ToolResult::text(render_report(&report)),
                Err(e) => upstream_failure(LINT_SPEC, &e),
            })
        }
        LIST_RULES => Ok(match backend.list_rules().await {
            Ok(rules) => ToolResult::text(render_rules(&rules)),
            Err(e) => upstream_failure(LIST_RULES, &e),
        }),
        other => Err(BridgeError::UnknownTool(other.to_string())),
    }
}

fn upstream_failure(tool: &str, error: &BridgeError) -> ToolResult {
    warn!(tool, error = %error, "Tool call failed upstream");

    match error {
        BridgeError::CircuitOpen { retry_in_ms, .. } => ToolResult::error(format!(
            "Linter service is temporarily unavailable, retry in {}s",
            retry_in_ms.div_ceil(1000)
        )),
        other => ToolResult::error(format!("Linting request failed: {}", other)),
    }
}

fn render_report(report: &LintReport) -> String {
    let mut out = report.summary();
    for violation in &report.violations {
        let _ = write!(out, "\n{}", violation);
    }
    out
}

fn render_rules(rules: &[RuleInfo]) -> String {
    if rules.is_empty() {
        return "No rules configured".to_string();
    }
    rules
        .iter()
        .map(|r| {
            if r.description.is_empty() {
                format!("{} ({})", r.code, r.severity)
            } else {
                format!("{} ({}): {}", r.code, r.severity, r.description)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linter::{Severity, Violation};
    use crate::mcp::protocol::Content;
    use async_trait::async_trait;

    struct FixedBackend {
        outcome: fn() -> Result<LintReport>,
    }

    #[async_trait]
    impl LintBackend for FixedBackend {
        async fn lint(&self, _request: &LintRequest) -> Result<LintReport> {
            (self.outcome)()
        }

        async fn list_rules(&self) -> Result<Vec<RuleInfo>> {
            Ok(vec![RuleInfo {
                code: "info-contact".to_string(),
                description: "Info object must have a contact".to_string(),
                severity: Severity::Warn,
            }])
        }
    }

    fn text(result: &ToolResult) -> &str {
        match &result.content[0] {
            Content::Text { text } => text,
        }
    }

    #[tokio::test]
    async fn test_lint_spec_renders_report() {
        let backend = FixedBackend {
            outcome: || {
                Ok(LintReport::new(vec![Violation {
                    code: "oas3-schema".to_string(),
                    message: "Invalid schema".to_string(),
                    severity: Severity::Error,
                    path: vec!["info".to_string()],
                    range: None,
                }]))
            },
        };

        let result = call(&backend, LINT_SPEC, json!({ "document": "openapi: 3.0.0" }))
            .await
            .unwrap();

        assert!(!result.is_error);
        assert_eq!(
            text(&result),
            "1 error, 0 warnings, 0 info, 0 hints\n[error] oas3-schema: Invalid schema at info"
        );
    }

    #[tokio::test]
    async fn test_circuit_open_is_reported_as_unavailable() {
        let backend = FixedBackend {
            outcome: || {
                Err(BridgeError::CircuitOpen {
                    breaker: "linter".to_string(),
                    retry_in_ms: 1500,
                })
            },
        };

        let result = call(&backend, LINT_SPEC, json!({ "document": "openapi: 3.0.0" }))
            .await
            .unwrap();

        assert!(result.is_error);
        assert_eq!(
            text(&result),
            "Linter service is temporarily unavailable, retry in 2s"
        );
    }

    #[tokio::test]
    async fn test_upstream_failure_is_reported_as_failed_request() {
        let backend = FixedBackend {
            outcome: || {
                Err(BridgeError::UpstreamStatus {
                    status: 500,
                    body: "boom".to_string(),
                })
            },
        };

        let result = call(&backend, LINT_SPEC, json!({ "document": "x" }))
            .await
            .unwrap();

        assert!(result.is_error);
        assert_eq!(
            text(&result),
            "Linting request failed: Upstream returned 500: boom"
        );
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let backend = FixedBackend {
            outcome: || Ok(LintReport::default()),
        };

        let err = call(&backend, LINT_SPEC, json!({})).await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidParams(_)));

        let err = call(&backend, LINT_SPEC, json!({ "document": "  " }))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidParams(_)));

        let err = call(&backend, "format_spec", json!({})).await.unwrap_err();
        assert!(matches!(err, BridgeError::UnknownTool(ref name) if name == "format_spec"));
    }

    #[tokio::test]
    async fn test_list_rules() {
        let backend = FixedBackend {
            outcome: || Ok(LintReport::default()),
        };

        let result = call(&backend, LIST_RULES, json!({})).await.unwrap();
        assert_eq!(
            text(&result),
            "info-contact (warn): Info object must have a contact"
        );
    }

    #[test]
    fn test_definitions_have_object_schemas() {
        let tools = definitions();
        assert_eq!(tools.len(), 2);
        for tool in tools {
            assert_eq!(tool.input_schema["type"], "object");
        }
    }
}
