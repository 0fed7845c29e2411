//! REST API for button-panel integration
//!
//! Exposes the action/feedback catalogs, action execution, feedback evaluation,
//! variables and a WebSocket push of host updates.
//! Default port: 8125

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::actions::Options;
use crate::catalog::{self, ActionDefinition, FeedbackDefinition};
use crate::drivers::{Driver, MagicQDriver};
use crate::error::GatewayError;
use crate::host::{ConnectionStatus, HostUpdate, VariableDefinition, VariableTable};
use crate::state::StateSnapshot;

/// Default API port
pub const DEFAULT_API_PORT: u16 = 8125;

/// Shared state for API handlers
pub struct ApiState {
    pub driver: Arc<MagicQDriver>,
    /// In-memory host holding variables and the update broadcast
    pub host: Arc<VariableTable>,
}

/// Body of POST /api/feedbacks/evaluate
#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub feedback: String,
    #[serde(default)]
    pub options: Options,
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub struct VariablesResponse {
    pub definitions: Vec<VariableDefinition>,
    pub values: BTreeMap<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub driver: String,
    pub status: ConnectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub state: StateSnapshot,
}

/// API error response
#[derive(Debug, Serialize)]
struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    error: String,
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        let status = match &e {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            GatewayError::ConfigIncomplete(_) | GatewayError::NotConnected => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            error: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Build the API router
pub fn build_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/actions", get(list_actions))
        .route("/api/actions/:action", post(run_action))
        .route("/api/feedbacks", get(list_feedbacks))
        .route("/api/feedbacks/evaluate", post(evaluate_feedback))
        .route("/api/variables", get(list_variables))
        .route("/api/status", get(status))
        .route("/api/ws/updates", get(updates_ws))
        .route("/api/health", get(health_check))
        .with_state(state)
}

/// GET /api/actions - Action catalog
async fn list_actions() -> Json<Vec<ActionDefinition>> {
    Json(catalog::action_definitions())
}

/// POST /api/actions/:action - Run one action with JSON options
async fn run_action(
    Path(action): Path<String>,
    State(state): State<Arc<ApiState>>,
    Json(options): Json<Options>,
) -> Result<Json<Value>, ApiError> {
    state.driver.execute(&action, &options).await?;
    debug!(action, "Action executed via API");
    Ok(Json(serde_json::json!({ "ok": true, "action": action })))
}

/// GET /api/feedbacks - Feedback catalog
async fn list_feedbacks() -> Json<Vec<FeedbackDefinition>> {
    Json(catalog::feedback_definitions())
}

/// POST /api/feedbacks/evaluate - Evaluate one feedback query
async fn evaluate_feedback(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, ApiError> {
    let active = state
        .driver
        .evaluate_feedback(&req.feedback, &req.options)
        .await?;
    Ok(Json(EvaluateResponse { active }))
}

/// GET /api/variables - Registered variables and their current values
async fn list_variables(State(state): State<Arc<ApiState>>) -> Json<VariablesResponse> {
    Json(VariablesResponse {
        definitions: state.host.definitions(),
        values: state.host.values(),
    })
}

/// GET /api/status - Connection status and a state snapshot
async fn status(State(state): State<Arc<ApiState>>) -> Result<Json<StatusResponse>, ApiError> {
    let (status, message) = state.host.status();
    let snapshot = state.driver.state().snapshot().await?;
    Ok(Json(StatusResponse {
        driver: state.driver.name().to_string(),
        status,
        message,
        state: snapshot,
    }))
}

/// GET /api/ws/updates - WebSocket for push notifications
async fn updates_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ApiState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state.host.subscribe()))
}

/// Forward host updates to one WebSocket client
async fn handle_websocket(mut socket: WebSocket, mut rx: broadcast::Receiver<HostUpdate>) {
    debug!("WebSocket client connected for updates");

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(update) => {
                        let msg = match serde_json::to_string(&update) {
                            Ok(msg) => msg,
                            Err(e) => {
                                warn!("Failed to serialize update: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(msg)).await.is_err() {
                            debug!("WebSocket client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("WebSocket client lagged by {} messages", n);
                    }
                }
            }
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client closed connection");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                }
            }
        }
    }
}

/// GET /api/health - Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// Start the API server
pub async fn start_server(state: Arc<ApiState>, port: u16) -> Result<()> {
    let router = build_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting MagicQ gateway API on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind API server")?;

    axum::serve(listener, router)
        .await
        .context("API server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsoleConfig;
    use serde_json::json;

    async fn api_state(config: ConsoleConfig) -> Arc<ApiState> {
        let host = VariableTable::shared();
        let driver = Arc::new(MagicQDriver::new(config, host.clone()));
        driver.init().await.unwrap();
        Arc::new(ApiState { driver, host })
    }

    fn opts(value: Value) -> Options {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_catalog_endpoints() {
        assert_eq!(health_check().await, "ok");
        assert_eq!(list_actions().await.0.len(), 14);
        assert_eq!(list_feedbacks().await.0.len(), 4);
    }

    #[tokio::test]
    async fn test_run_action_without_host_is_unavailable() {
        let state = api_state(ConsoleConfig::default()).await;
        let err = run_action(
            Path("pb".to_string()),
            State(state.clone()),
            Json(opts(json!({ "pbId": 1, "pbVal": 50 }))),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);

        let err = run_action(Path("nope".to_string()), State(state), Json(Options::new()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_run_action_and_read_back() {
        let console = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = ConsoleConfig {
            host: Some("127.0.0.1".into()),
            port: console.local_addr().unwrap().port() as u32,
            ..ConsoleConfig::default()
        };
        let state = api_state(config).await;

        run_action(
            Path("executeToggle".to_string()),
            State(state.clone()),
            Json(opts(json!({ "exeP": 2, "exeNr": 5 }))),
        )
        .await
        .unwrap();

        let evaluated = evaluate_feedback(
            State(state.clone()),
            Json(EvaluateRequest {
                feedback: "execLevel".into(),
                options: opts(json!({ "page": 2, "nr": 5, "op": "equal", "value": 100 })),
            }),
        )
        .await
        .unwrap();
        assert!(evaluated.0.active);

        let variables = list_variables(State(state.clone())).await.0;
        assert_eq!(variables.definitions.len(), 22);
        assert_eq!(variables.values["exec2_5"], json!(100));

        let status = status(State(state)).await.unwrap().0;
        assert_eq!(status.driver, "magicq");
        assert_eq!(status.status, ConnectionStatus::Ok);
        assert_eq!(status.state.executes["exec2_5"].level, 100);
    }

    #[test]
    fn test_error_mapping() {
        let err = ApiError::from(GatewayError::malformed("pb", "missing 'pbId'"));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        let err = ApiError::from(GatewayError::StateActorClosed);
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
