use super::protocol::{JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION, PROTOCOL_VERSION};
use super::{prompts, tools};
use crate::error::{BridgeError, Result};
use crate::linter::LintBackend;
use crate::metrics::Timer;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PromptGetParams {
    name: String,
    #[serde(default)]
    arguments: Map<String, Value>,
}

/// Stateless JSON-RPC endpoint: one request per HTTP call
pub async fn mcp_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => return reply(Value::Null, Err(BridgeError::Parse(e.to_string()))),
    };
    let id = value.get("id").cloned().unwrap_or(Value::Null);

    let request: JsonRpcRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => return reply(id, Err(BridgeError::InvalidRequest(e.to_string()))),
    };
    if request.jsonrpc != JSONRPC_VERSION {
        return reply(
            id,
            Err(BridgeError::InvalidRequest(format!(
                "unsupported jsonrpc version '{}'",
                request.jsonrpc
            ))),
        );
    }

    if request.is_notification() {
        debug!(method = %request.method, "Received notification");
        return StatusCode::ACCEPTED.into_response();
    }

    let span = info_span!(
        "mcp_request",
        request_id = %Uuid::new_v4(),
        method = %request.method
    );

    async move {
        let timer = Timer::new(request.method.clone());
        let result = dispatch(state.backend.as_ref(), &request.method, request.params).await;

        match &result {
            Ok(_) => timer.record("ok"),
            Err(e) => {
                warn!(error = %e, "Request failed");
                timer.record("error");
            }
        }

        reply(request.id.unwrap_or(Value::Null), result)
    }
    .instrument(span)
    .await
}

/// Route a JSON-RPC method to its implementation
pub async fn dispatch(backend: &dyn LintBackend, method: &str, params: Option<Value>) -> Result<Value> {
    match method {
        "initialize" => Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {}, "prompts": {} },
            "serverInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
        })),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(json!({ "tools": tools::definitions() })),
        "tools/call" => {
            let params: ToolCallParams = parse_params(params)?;
            let arguments = params.arguments.unwrap_or_else(|| json!({}));
            let result = tools::call(backend, &params.name, arguments).await?;
            Ok(serde_json::to_value(result)?)
        }
        "prompts/list" => Ok(json!({ "prompts": prompts::definitions() })),
        "prompts/get" => {
            let params: PromptGetParams = parse_params(params)?;
            let result = prompts::get(&params.name, &params.arguments)?;
            Ok(serde_json::to_value(result)?)
        }
        other => Err(BridgeError::MethodNotFound(other.to_string())),
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T> {
    let params = params.ok_or_else(|| BridgeError::InvalidParams("missing params".to_string()))?;
    serde_json::from_value(params).map_err(|e| BridgeError::InvalidParams(e.to_string()))
}

fn reply(id: Value, result: Result<Value>) -> Response {
    let response = match result {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::failure(id, &e),
    };
    Json(response).into_response()
}
