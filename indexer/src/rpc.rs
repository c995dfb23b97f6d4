//! # NEAR JSON-RPC Transport
//!
//! Read-only contract calls against a NEAR RPC node. Only one request shape
//! is needed: a `query` with `request_type = "call_function"`, which runs a
//! view method at a given finality and returns its raw output bytes.
//!
//! ```text
//! → {"jsonrpc":"2.0","id":7,"method":"query","params":{
//!      "request_type":"call_function","finality":"final",
//!      "account_id":"vault-0.sudostake.near",
//!      "method_name":"get_vault_state","args_base64":"e30="}}
//! ← {"jsonrpc":"2.0","id":7,"result":{
//!      "result":[123,34,111,...],"logs":[],"block_height":1,"block_hash":"..."}}
//! ```
//!
//! The transport sits behind [`ContractReader`] so the fetcher can be driven
//! by a fake node in tests.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{CALL_FUNCTION_REQUEST, FINALITY, RPC_QUERY_METHOD};
use crate::error::{IndexerError, IndexerResult};

// ---------------------------------------------------------------------------
// Wire Types
// ---------------------------------------------------------------------------

/// Parameters of a `call_function` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub request_type: String,
    pub finality: String,
    pub account_id: String,
    pub method_name: String,
    pub args_base64: String,
}

impl FunctionCall {
    /// A view call at `final` finality with the given JSON argument bytes.
    pub fn view(account_id: &str, method_name: &str, args_json: &[u8]) -> Self {
        Self {
            request_type: CALL_FUNCTION_REQUEST.to_string(),
            finality: FINALITY.to_string(),
            account_id: account_id.to_string(),
            method_name: method_name.to_string(),
            args_base64: base64::engine::general_purpose::STANDARD.encode(args_json),
        }
    }
}

/// Result of a `call_function` query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallResult {
    /// Raw bytes returned by the view method.
    #[serde(default)]
    pub result: Vec<u8>,
    /// Log lines emitted during execution.
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
    /// Older nodes report contract panics here instead of as an RPC error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// JSON-RPC request envelope.
#[derive(Debug, Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a P,
}

/// JSON-RPC response envelope.
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

/// JSON-RPC error object. NEAR adds `name`, `cause` and a free-form `data`.
#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    cause: Option<serde_json::Value>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

impl RpcError {
    fn describe(&self) -> String {
        let mut out = format!("rpc error {}: {}", self.code, self.message);
        if let Some(name) = &self.name {
            out.push_str(&format!(" [{}]", name));
        }
        if let Some(cause) = self.cause.as_ref().and_then(|c| c.get("name")) {
            out.push_str(&format!(" cause={}", cause));
        }
        if let Some(data) = &self.data {
            out.push_str(&format!(" data={}", data));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Reader Trait
// ---------------------------------------------------------------------------

/// Anything that can execute a read-only contract call against an endpoint.
#[async_trait]
pub trait ContractReader: Send + Sync {
    /// Run `call` against the node at `endpoint`.
    ///
    /// Transport, HTTP, and RPC-level failures surface as
    /// [`IndexerError::FetchFailed`]. The returned bytes are not inspected.
    async fn call_function(&self, endpoint: &str, call: &FunctionCall) -> IndexerResult<CallResult>;
}

// ---------------------------------------------------------------------------
// HTTP Client
// ---------------------------------------------------------------------------

/// [`ContractReader`] over HTTP JSON-RPC.
///
/// One client serves every endpoint in the registry; connection pools are
/// kept per host by `reqwest`.
pub struct JsonRpcClient {
    client: Client,
    request_id: AtomicU64,
}

impl JsonRpcClient {
    /// Create a client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            request_id: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl ContractReader for JsonRpcClient {
    async fn call_function(&self, endpoint: &str, call: &FunctionCall) -> IndexerResult<CallResult> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest {
            jsonrpc: "2.0",
            id,
            method: RPC_QUERY_METHOD,
            params: call,
        };

        debug!(
            endpoint,
            account_id = %call.account_id,
            method_name = %call.method_name,
            id,
            "rpc call_function"
        );

        let response = self
            .client
            .post(endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| IndexerError::FetchFailed(format!("rpc request to {} failed: {}", endpoint, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(endpoint, %status, "rpc node returned an error status");
            return Err(IndexerError::FetchFailed(format!("HTTP {} - {}", status, body)));
        }

        let envelope: RpcResponse<CallResult> = response
            .json()
            .await
            .map_err(|e| IndexerError::FetchFailed(format!("malformed rpc response: {}", e)))?;

        if let Some(error) = envelope.error {
            return Err(IndexerError::FetchFailed(error.describe()));
        }

        let result = envelope
            .result
            .ok_or_else(|| IndexerError::FetchFailed("empty rpc response".to_string()))?;

        if let Some(error) = &result.error {
            return Err(IndexerError::FetchFailed(format!(
                "contract call failed: {}",
                error
            )));
        }

        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Test Double
// ---------------------------------------------------------------------------
