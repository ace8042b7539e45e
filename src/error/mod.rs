use crate::resilience::CallError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// JSON-RPC 2.0 error codes
pub mod rpc_code {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Bridge error types
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Upstream returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Invalid upstream response: {0}")]
    Decode(String),

    #[error("Service temporarily unavailable: circuit '{breaker}' is open, retry in {retry_in_ms}ms")]
    CircuitOpen { breaker: String, retry_in_ms: u64 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Unknown prompt: {0}")]
    UnknownPrompt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            BridgeError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BridgeError::Upstream(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            BridgeError::Upstream(_) => StatusCode::BAD_GATEWAY,
            BridgeError::UpstreamStatus { .. } => StatusCode::BAD_GATEWAY,
            BridgeError::Decode(_) => StatusCode::BAD_GATEWAY,
            BridgeError::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            BridgeError::Parse(_) => StatusCode::BAD_REQUEST,
            BridgeError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            BridgeError::MethodNotFound(_) => StatusCode::NOT_FOUND,
            BridgeError::InvalidParams(_) => StatusCode::BAD_REQUEST,
            BridgeError::UnknownTool(_) => StatusCode::NOT_FOUND,
            BridgeError::UnknownPrompt(_) => StatusCode::NOT_FOUND,
            BridgeError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BridgeError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BridgeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the JSON-RPC error code for this error
    pub fn rpc_code(&self) -> i64 {
        match self {
            BridgeError::Parse(_) => rpc_code::PARSE_ERROR,
            BridgeError::InvalidRequest(_) => rpc_code::INVALID_REQUEST,
            BridgeError::MethodNotFound(_) => rpc_code::METHOD_NOT_FOUND,
            BridgeError::InvalidParams(_)
            | BridgeError::UnknownTool(_)
            | BridgeError::UnknownPrompt(_) => rpc_code::INVALID_PARAMS,
            _ => rpc_code::INTERNAL_ERROR,
        }
    }

    /// Whether the upstream was short-circuited rather than actually failing
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, BridgeError::CircuitOpen { .. })
    }
}

impl From<CallError<BridgeError>> for BridgeError {
    fn from(err: CallError<BridgeError>) -> Self {
        match err {
            CallError::Open { breaker, retry_in } => BridgeError::CircuitOpen {
                breaker,
                retry_in_ms: retry_in.as_millis() as u64,
            },
            CallError::Operation(e) => e,
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
