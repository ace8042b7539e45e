use super::protocol::{Content, GetPromptResult, Prompt, PromptArgument, PromptMessage, Role};
use crate::error::{BridgeError, Result};
use serde_json::{Map, Value};

pub const REVIEW_API_SPEC: &str = "review_api_spec";
pub const EXPLAIN_VIOLATION: &str = "explain_violation";

/// Prompts advertised by `prompts/list`
pub fn definitions() -> Vec<Prompt> {
    vec![
        Prompt {
            name: REVIEW_API_SPEC,
            description: "Review an API specification and fix the linter's findings",
            arguments: vec![PromptArgument {
                name: "document",
                description: "The API specification, as YAML or JSON text",
                required: true,
            }],
        },
        Prompt {
            name: EXPLAIN_VIOLATION,
            description: "Explain a single linter rule violation and how to fix it",
            arguments: vec![
                PromptArgument {
                    name: "code",
                    description: "Rule code reported by the linter",
                    required: true,
                },
                PromptArgument {
                    name: "message",
                    description: "Violation message reported by the linter",
                    required: false,
                },
            ],
        },
    ]
}

/// Render a prompt by name
pub fn get(name: &str, arguments: &Map<String, Value>) -> Result<GetPromptResult> {
    match name {
        REVIEW_API_SPEC => {
            let document = required(arguments, "document")?;
            Ok(GetPromptResult {
                description: "Review an API specification".to_string(),
                messages: vec![user(format!(
                    "Please review the following API specification. Run the `lint_spec` tool on it, \
                     then explain each reported violation and propose a corrected document.\n\n```\n{}\n```",
                    document
                ))],
            })
        }
        EXPLAIN_VIOLATION => {
            let code = required(arguments, "code")?;
            let text = match optional(arguments, "message") {
                Some(message) => format!(
                    "The API linter reported rule `{}`: \"{}\". Explain what this rule checks, \
                     why it matters, and how to fix the specification.",
                    code, message
                ),
                None => format!(
                    "The API linter reported rule `{}`. Explain what this rule checks, \
                     why it matters, and how to fix the specification.",
                    code
                ),
            };
            Ok(GetPromptResult {
                description: format!("Explain linter rule {}", code),
                messages: vec![user(text)],
            })
        }
        other => Err(BridgeError::UnknownPrompt(other.to_string())),
    }
}

fn user(text: String) -> PromptMessage {
    PromptMessage {
        role: Role::User,
        content: Content::text(text),
    }
}

fn optional<'a>(arguments: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn required<'a>(arguments: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    optional(arguments, key)
        .ok_or_else(|| BridgeError::InvalidParams(format!("missing required argument '{}'", key)))
}
