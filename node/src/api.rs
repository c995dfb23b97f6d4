//! # REST API
//!
//! Builds the axum router that exposes the indexer's HTTP interface.
//! All endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                               | Description                          |
//! |--------|------------------------------------|--------------------------------------|
//! | GET    | `/health`                          | Liveness probe                       |
//! | POST   | `/index_vault`                     | Fetch, classify and store one vault  |
//! | GET    | `/get_user_vaults`                 | Vault ids owned by an account        |
//! | GET    | `/view_pending_liquidity_requests` | Vaults with an open request          |
//! | GET    | `/view_lender_positions`           | Vaults funded by a lender, newest first |
//!
//! Every response carries permissive CORS headers. `OPTIONS` on any path is
//! answered with `204 No Content`; any other unsupported method gets `405`.

use axum::{
    extract::{rejection::JsonRejection, Query, Request, State},
    http::{header, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use vault_indexer::{IndexerError, TransformedVaultState, VaultDocument, VaultIndexer};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone: everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The service's reported version string.
    pub version: String,
    /// The indexing pipeline and its store.
    pub indexer: Arc<VaultIndexer>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

impl AppState {
    /// Record a failed request and wrap it for the response.
    fn reject(&self, err: IndexerError) -> ApiError {
        self.metrics.record_failure(err.kind());
        ApiError(err)
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/index_vault",
            post(index_vault_handler)
                .options(preflight_handler)
                .fallback(|| async { method_not_allowed("POST") }),
        )
        .route(
            "/get_user_vaults",
            get(user_vaults_handler)
                .options(preflight_handler)
                .fallback(|| async { method_not_allowed("GET") }),
        )
        .route(
            "/view_pending_liquidity_requests",
            get(pending_requests_handler)
                .options(preflight_handler)
                .fallback(|| async { method_not_allowed("GET") }),
        )
        .route(
            "/view_lender_positions",
            get(lender_positions_handler)
                .options(preflight_handler)
                .fallback(|| async { method_not_allowed("GET") }),
        )
        .layer(cors)
        .layer(middleware::from_fn(preflight_no_content))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `CorsLayer` answers preflight itself with `200 OK`; clients of this API
/// expect `204`.
async fn preflight_no_content(req: Request, next: Next) -> Response {
    let is_preflight = req.method() == Method::OPTIONS;
    let mut response = next.run(req).await;
    if is_preflight && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

async fn preflight_handler() -> StatusCode {
    StatusCode::NO_CONTENT
}

fn method_not_allowed(allow: &'static str) -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, allow)],
        "Method Not Allowed",
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Body of `POST /index_vault`.
#[derive(Debug, Deserialize)]
pub struct IndexVaultRequest {
    pub vault: Option<String>,
}

/// Query of `GET /get_user_vaults`.
#[derive(Debug, Deserialize)]
pub struct UserVaultsQuery {
    pub owner: Option<String>,
    pub factory_id: Option<String>,
}

/// Query of `GET /view_pending_liquidity_requests`.
#[derive(Debug, Deserialize)]
pub struct PendingRequestsQuery {
    pub factory_id: Option<String>,
}

/// Query of `GET /view_lender_positions`.
#[derive(Debug, Deserialize)]
pub struct LenderPositionsQuery {
    pub factory_id: Option<String>,
    pub lender_id: Option<String>,
}

/// Error body returned on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

// ---------------------------------------------------------------------------
// Error Mapping
// ---------------------------------------------------------------------------

/// An [`IndexerError`] on its way out as an HTTP response.
///
/// `InvalidInput` is a 400 and `NotWhitelisted` a 403, both with the message
/// as `error`. Everything else is a 500 with a fixed `error` and the cause in
/// `details`.
#[derive(Debug)]
pub struct ApiError(IndexerError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self.0 {
            IndexerError::InvalidInput(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: msg,
                    details: None,
                },
            ),
            IndexerError::NotWhitelisted(msg) => (
                StatusCode::FORBIDDEN,
                ErrorResponse {
                    error: msg,
                    details: None,
                },
            ),
            other => {
                tracing::error!(kind = other.kind(), error = %other, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "Internal error".into(),
                        details: Some(other.to_string()),
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the service is alive.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok", "version": state.version })),
    )
}

/// `POST /index_vault`: fetch a vault from chain and upsert it.
///
/// A body that is not JSON, or lacks a string `vault`, is treated the same
/// as an empty vault id.
async fn index_vault_handler(
    State(state): State<AppState>,
    body: Result<Json<IndexVaultRequest>, JsonRejection>,
) -> Result<Json<TransformedVaultState>, ApiError> {
    let vault = match body {
        Ok(Json(req)) => req.vault.unwrap_or_default(),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "unreadable index_vault body");
            String::new()
        }
    };

    let transformed = state
        .indexer
        .index_vault(&vault)
        .await
        .map_err(|e| state.reject(e))?;

    state.metrics.vaults_indexed_total.inc();
    Ok(Json(transformed))
}

/// `GET /get_user_vaults`: ids of vaults owned by `owner`.
async fn user_vaults_handler(
    State(state): State<AppState>,
    Query(query): Query<UserVaultsQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    let factory_id = query.factory_id.unwrap_or_default();
    let owner = query.owner.unwrap_or_default();

    let ids = state
        .indexer
        .user_vaults(&factory_id, &owner)
        .map_err(|e| state.reject(e))?;

    state.metrics.record_query("get_user_vaults");
    Ok(Json(ids))
}

/// `GET /view_pending_liquidity_requests`: vaults awaiting a lender.
async fn pending_requests_handler(
    State(state): State<AppState>,
    Query(query): Query<PendingRequestsQuery>,
) -> Result<Json<Vec<VaultDocument>>, ApiError> {
    let factory_id = query.factory_id.unwrap_or_default();

    let docs = state
        .indexer
        .pending_requests(&factory_id)
        .map_err(|e| state.reject(e))?;

    state.metrics.record_query("view_pending_liquidity_requests");
    Ok(Json(docs))
}

/// `GET /view_lender_positions`: a lender's vaults, newest acceptance first.
async fn lender_positions_handler(
    State(state): State<AppState>,
    Query(query): Query<LenderPositionsQuery>,
) -> Result<Json<Vec<VaultDocument>>, ApiError> {
    let factory_id = query.factory_id.unwrap_or_default();
    let lender_id = query.lender_id.unwrap_or_default();

    let docs = state
        .indexer
        .lender_positions(&factory_id, &lender_id)
        .map_err(|e| state.reject(e))?;

    state.metrics.record_query("view_lender_positions");
    Ok(Json(docs))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tower::ServiceExt;
    use vault_indexer::rpc::{CallResult, ContractReader, FunctionCall};
    use vault_indexer::{EndpointRegistry, IndexerResult, VaultStore};

    const TESTNET: &str = "nzaza.testnet";

    /// Serves canned vault states keyed by account id.
    #[derive(Default)]
    struct CannedReader {
        states: Mutex<HashMap<String, Value>>,
    }

    impl CannedReader {
        fn put(&self, account_id: &str, state: Value) {
            self.states
                .lock()
                .unwrap()
                .insert(account_id.to_string(), state);
        }
    }

    #[async_trait]
    impl ContractReader for CannedReader {
        async fn call_function(&self, _: &str, call: &FunctionCall) -> IndexerResult<CallResult> {
            match self.states.lock().unwrap().get(&call.account_id) {
                Some(state) => Ok(CallResult {
                    result: serde_json::to_vec(state).unwrap(),
                    ..Default::default()
                }),
                None => Err(IndexerError::FetchFailed(format!(
                    "account {} does not exist while viewing",
                    call.account_id
                ))),
            }
        }
    }

    fn request_json() -> Value {
        json!({
            "token": "usdc.testnet",
            "amount": "1000000",
            "interest": "5",
            "collateral": "100000000",
            "duration": 86400
        })
    }

    /// Creates a test AppState backed by a temporary store.
    fn test_app_state(store: VaultStore) -> (AppState, Arc<CannedReader>) {
        let reader = Arc::new(CannedReader::default());
        let indexer = VaultIndexer::new(EndpointRegistry::default(), reader.clone(), store);
        let state = AppState {
            version: "0.1.0-test".into(),
            indexer: Arc::new(indexer),
            metrics: Arc::new(crate::metrics::IndexerMetrics::new().unwrap()),
        };
        (state, reader)
    }

    fn test_router() -> (Router, AppState, Arc<CannedReader>) {
        let (state, reader) = test_app_state(VaultStore::open_temporary().expect("temp store"));
        (create_router(state.clone()), state, reader)
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    /// Sends a GET request and returns (status, body_bytes).
    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        send(router, req).await
    }

    /// Sends a POST request with a raw body.
    async fn post_raw(router: &Router, path: &str, body: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(router, req).await
    }

    async fn index(router: &Router, vault: &str) -> (StatusCode, Vec<u8>) {
        post_raw(router, "/index_vault", &json!({ "vault": vault }).to_string()).await
    }

    fn error_of(body: &[u8]) -> ErrorResponse {
        serde_json::from_slice(body).unwrap()
    }

    // -- Health & method gating ---------------------------------------------

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let (router, _, _) = test_router();
        let (status, body) = get(&router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], "0.1.0-test");
    }

    #[tokio::test]
    async fn wrong_method_is_405() {
        let (router, _, _) = test_router();

        let (status, body) = get(&router, "/index_vault").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body, b"Method Not Allowed");

        let (status, _) = post_raw(&router, "/get_user_vaults", "{}").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let req = Request::builder()
            .method("DELETE")
            .uri("/view_lender_positions")
            .body(Body::empty())
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers()[header::ALLOW], "GET");
    }

    #[tokio::test]
    async fn preflight_is_204() {
        let (router, _, _) = test_router();
        for path in ["/index_vault", "/get_user_vaults", "/view_lender_positions"] {
            let req = Request::builder()
                .method("OPTIONS")
                .uri(path)
                .header("origin", "https://app.example")
                .header("access-control-request-method", "POST")
                .body(Body::empty())
                .unwrap();
            let resp = router.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::NO_CONTENT, "{}", path);
            assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        }

        let bare = Request::builder()
            .method("OPTIONS")
            .uri("/index_vault")
            .body(Body::empty())
            .unwrap();
        let resp = router.clone().oneshot(bare).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn responses_carry_cors_headers() {
        let (router, _, _) = test_router();
        let req = Request::builder()
            .uri("/view_pending_liquidity_requests?factory_id=nzaza.testnet")
            .header("origin", "https://app.example")
            .body(Body::empty())
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    // -- index_vault --------------------------------------------------------

    #[tokio::test]
    async fn index_vault_returns_transformed_state() {
        let (router, state, reader) = test_router();
        reader.put(
            "v1.nzaza.testnet",
            json!({
                "owner": "test.near",
                "liquidity_request": request_json(),
                "accepted_offer": { "lender": "lender.near", "accepted_at": 1_713_248_000_000_000_000u64 }
            }),
        );

        let (status, body) = index(&router, "v1.nzaza.testnet").await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["owner"], "test.near");
        assert_eq!(json["state"], "active");
        assert_eq!(json["accepted_offer"]["lender"], "lender.near");
        assert_eq!(json["accepted_offer"]["accepted_at"], 1_713_248_000_000i64);
        assert_eq!(json["liquidity_request"]["duration"], 86400);
        assert!(json.get("liquidation").is_none());

        let stored = state.indexer.store().get(TESTNET, "v1.nzaza.testnet").unwrap();
        assert!(stored.is_some());
        assert_eq!(state.metrics.vaults_indexed_total.get(), 1);
    }

    #[tokio::test]
    async fn index_vault_without_vault_is_400() {
        let (router, state, _) = test_router();

        let (status, body) = post_raw(&router, "/index_vault", "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(error_of(&body).error.contains("vault address"));

        let (status, _) = post_raw(&router, "/index_vault", "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post_raw(&router, "/index_vault", r#"{"vault": 42}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert_eq!(
            state
                .metrics
                .failures_total
                .with_label_values(&["invalid_input"])
                .get(),
            3
        );
    }

    #[tokio::test]
    async fn index_vault_unlisted_is_403() {
        let (router, _, _) = test_router();
        let (status, body) = index(&router, "unlisted.near").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let err = error_of(&body);
        assert!(err.error.contains("unlisted.near"));
        assert!(err.details.is_none());
    }

    #[tokio::test]
    async fn index_vault_fetch_failure_is_500() {
        let (router, state, _) = test_router();
        let (status, body) = index(&router, "ghost.nzaza.testnet").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let err = error_of(&body);
        assert_eq!(err.error, "Internal error");
        assert!(err.details.unwrap().contains("does not exist"));
        assert_eq!(state.indexer.store().count(TESTNET).unwrap(), 0);
        assert_eq!(
            state
                .metrics
                .failures_total
                .with_label_values(&["fetch_failed"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn index_vault_bad_payload_is_500() {
        let (router, _, reader) = test_router();
        reader.put("v1.nzaza.testnet", json!({ "owner": 7 }));
        let (status, body) = index(&router, "v1.nzaza.testnet").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(error_of(&body).details.unwrap().starts_with("decode failed"));
    }

    // -- Queries ------------------------------------------------------------

    async fn seeded_router() -> (Router, AppState) {
        let (router, state, reader) = test_router();
        reader.put("a.nzaza.testnet", json!({ "owner": "alice.near" }));
        reader.put(
            "b.nzaza.testnet",
            json!({ "owner": "alice.near", "liquidity_request": request_json() }),
        );
        reader.put(
            "c.nzaza.testnet",
            json!({
                "owner": "bob.near",
                "liquidity_request": request_json(),
                "accepted_offer": { "lender": "lender.near", "accepted_at": "3000000" }
            }),
        );
        reader.put(
            "d.nzaza.testnet",
            json!({
                "owner": "carol.near",
                "liquidity_request": request_json(),
                "accepted_offer": { "lender": "lender.near", "accepted_at": "9000000" }
            }),
        );
        for id in ["a", "b", "c", "d"] {
            let (status, _) = index(&router, &format!("{}.nzaza.testnet", id)).await;
            assert_eq!(status, StatusCode::OK);
        }
        (router, state)
    }

    #[tokio::test]
    async fn get_user_vaults_returns_ids() {
        let (router, state) = seeded_router().await;
        let (status, body) =
            get(&router, "/get_user_vaults?owner=alice.near&factory_id=nzaza.testnet").await;

        assert_eq!(status, StatusCode::OK);
        let ids: Vec<String> = serde_json::from_slice(&body).unwrap();
        assert_eq!(ids, ["a.nzaza.testnet", "b.nzaza.testnet"]);
        assert_eq!(
            state
                .metrics
                .queries_total
                .with_label_values(&["get_user_vaults"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn get_user_vaults_validation() {
        let (router, _, _) = test_router();

        let (status, _) = get(&router, "/get_user_vaults?factory_id=nzaza.testnet").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get(&router, "/get_user_vaults?owner=alice.near").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = get(&router, "/get_user_vaults?owner=alice.near&factory_id=evil.near").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(error_of(&body).error.contains("unauthorized factory_id"));
    }

    #[tokio::test]
    async fn pending_requests_returns_documents() {
        let (router, _) = seeded_router().await;
        let (status, body) = get(
            &router,
            "/view_pending_liquidity_requests?factory_id=nzaza.testnet",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let docs: Vec<Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["id"], "b.nzaza.testnet");
        assert_eq!(docs[0]["state"], "pending");
        assert_eq!(docs[0]["owner"], "alice.near");
    }

    #[tokio::test]
    async fn pending_requests_validation() {
        let (router, _, _) = test_router();

        let (status, _) = get(&router, "/view_pending_liquidity_requests").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get(&router, "/view_pending_liquidity_requests?factory_id=x.near").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn lender_positions_newest_first() {
        let (router, _) = seeded_router().await;
        let (status, body) = get(
            &router,
            "/view_lender_positions?factory_id=nzaza.testnet&lender_id=lender.near",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let docs: Vec<Value> = serde_json::from_slice(&body).unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, ["d.nzaza.testnet", "c.nzaza.testnet"]);
        assert_eq!(docs[0]["accepted_offer"]["accepted_at"], 9);
    }

    #[tokio::test]
    async fn lender_positions_checks_factory_before_lender() {
        let (router, _, _) = test_router();

        let (status, _) = get(&router, "/view_lender_positions?lender_id=l.near").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get(&router, "/view_lender_positions?factory_id=evil.near").await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = get(&router, "/view_lender_positions?factory_id=nzaza.testnet").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(error_of(&body).error.contains("lender_id"));
    }

    #[tokio::test]
    async fn on_disk_store_serves_queries_after_restart() {
        let dir = tempfile::tempdir().unwrap();

        {
            let (state, reader) = test_app_state(VaultStore::open(dir.path()).unwrap());
            reader.put("a.nzaza.testnet", json!({ "owner": "alice.near" }));
            let router = create_router(state.clone());
            let (status, _) = index(&router, "a.nzaza.testnet").await;
            assert_eq!(status, StatusCode::OK);
            state.indexer.store().flush().unwrap();
        }

        let (state, _) = test_app_state(VaultStore::open(dir.path()).unwrap());
        let router = create_router(state);
        let (status, body) =
            get(&router, "/get_user_vaults?owner=alice.near&factory_id=nzaza.testnet").await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<String> = serde_json::from_slice(&body).unwrap();
        assert_eq!(ids, ["a.nzaza.testnet"]);
    }
}
