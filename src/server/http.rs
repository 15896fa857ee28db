//! HTTP + WebSocket 接口
//!
//! POST /generate 受理任务；GET /status/:job_id 升级为 WebSocket 推送状态；DELETE /jobs/:job_id 取消任务。
//! 另有 /api/chat、/api/session/clear、/api/blog 与 /api/health。

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::campaign::StatusEvent;
use crate::config::AppConfig;
use crate::copy::CopyRegistry;
use crate::core::{CampaignError, ShutdownManager};
use crate::llm::{LlmFactory, Provider, StructuredLlm};
use crate::search::SearchProvider;
use crate::server::intake::{self, GenerateRequest, GenerateResponse};
use crate::server::jobs::{JobHandle, JobStore};
use crate::server::session::SessionStore;
use crate::workflow::{BlogOutcome, BlogWorkflow};

pub struct AppState {
    pub config: AppConfig,
    pub factory: Arc<dyn LlmFactory>,
    pub registry: Arc<CopyRegistry>,
    pub jobs: Arc<JobStore>,
    pub sessions: Arc<SessionStore>,
    pub search: Arc<dyn SearchProvider>,
    pub shutdown: Arc<ShutdownManager>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        factory: Arc<dyn LlmFactory>,
        search: Arc<dyn SearchProvider>,
        shutdown: Arc<ShutdownManager>,
    ) -> Self {
        Self {
            registry: Arc::new(CopyRegistry::with_builtins()),
            jobs: Arc::new(JobStore::new(config.server.job_ttl_secs)),
            sessions: Arc::new(SessionStore::new(
                config.chat.max_context_turns,
                config.chat.session_ttl_secs,
            )),
            config,
            factory,
            search,
            shutdown,
        }
    }

    fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.config.llm.timeouts.request)
    }
}

/// JSON 错误响应 `{"error": "..."}`
#[derive(Debug)]
pub struct ApiError(StatusCode, String);

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(StatusCode::BAD_REQUEST, message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

impl From<CampaignError> for ApiError {
    fn from(e: CampaignError) -> Self {
        let status = match e {
            CampaignError::Validation(_) => StatusCode::BAD_REQUEST,
            CampaignError::Provider(_) | CampaignError::StructuredOutput(_) => {
                StatusCode::BAD_GATEWAY
            }
            CampaignError::Channel(_) | CampaignError::Cancelled => StatusCode::CONFLICT,
            CampaignError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self(status, e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::bad_request(e.body_text())
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok())
                .collect::<Vec<_>>(),
        )
    };
    CorsLayer::new()
        .allow_origin(allow)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.allowed_origins);
    Router::new()
        .route("/generate", post(generate))
        .route("/jobs/:job_id", delete(cancel_job))
        .route("/status/:job_id", get(status_ws))
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/chat", post(api_chat))
        .route("/api/session/clear", post(api_session_clear))
        .route("/api/blog", post(api_blog))
        .layer(cors)
        .with_state(state)
}

/// 在 listener 上提供服务，直到 shutdown 令牌触发
pub async fn serve(listener: tokio::net::TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    let manager = Arc::clone(&state.shutdown);
    let shutdown = manager.token();
    let job_reaper = state.jobs.spawn_reaper(shutdown.clone());
    let session_reaper = state.sessions.spawn_reaper(shutdown.clone());
    let app = router(state);
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;
    job_reaper.abort();
    session_reaper.abort();
    tracing::info!(reason = ?manager.reason(), "server stopped");
    result
}

/// POST /generate
async fn generate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(req) = payload?;
    let (description, config) =
        intake::validate(req, &state.config.server, &state.config.llm).inspect_err(|e| {
            tracing::warn!(error = %e, "generate request rejected");
        })?;
    let handle = intake::start_job(&state, description, config).await;
    Ok(Json(GenerateResponse {
        job_id: handle.id.clone(),
    }))
}

/// DELETE /jobs/:job_id
async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.jobs.cancel(&job_id).await {
        Ok(StatusCode::ACCEPTED)
    } else {
        Err(ApiError(
            StatusCode::NOT_FOUND,
            format!("Unknown job id: {job_id}"),
        ))
    }
}

/// GET /status/:job_id（WebSocket）
async fn status_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Response {
    ws.on_upgrade(move |socket| stream_status(socket, state, job_id))
}

/// 发送一条 error 后关闭连接
async fn refuse(mut socket: WebSocket, message: String) {
    let frame = StatusEvent::error(message).to_frame();
    let _ = socket.send(WsMessage::Text(frame)).await;
    let _ = socket.send(WsMessage::Close(None)).await;
}

async fn stream_status(mut socket: WebSocket, state: Arc<AppState>, job_id: String) {
    let Some(handle) = state.jobs.get(&job_id).await else {
        tracing::warn!(job_id = %job_id, "status requested for unknown job");
        refuse(socket, format!("Unknown job id: {job_id}")).await;
        return;
    };
    let mut events = match handle.channel.subscribe() {
        Ok(rx) => rx,
        Err(e) => {
            tracing::warn!(job_id = %job_id, error = %e, "status subscription refused");
            refuse(socket, e.to_string()).await;
            return;
        }
    };
    tracing::info!(job_id = %job_id, "status subscriber connected");

    let mut flushed = false;
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let terminal = event.is_terminal();
                if socket.send(WsMessage::Text(event.to_frame())).await.is_err() {
                    break;
                }
                if terminal {
                    flushed = true;
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    // 客户端消息无意义，忽略
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    if flushed {
        let _ = socket.send(WsMessage::Close(None)).await;
        handle.channel.close();
        tracing::info!(job_id = %job_id, "status stream finished");
    } else {
        on_disconnect(&state, &handle);
    }
    state.jobs.release_if_done(&job_id).await;
}

fn on_disconnect(state: &AppState, handle: &JobHandle) {
    handle.channel.detach();
    if state.config.server.cancel_on_disconnect {
        tracing::info!(job_id = %handle.id, "subscriber disconnected, cancelling job");
        handle.cancel.cancel();
    } else {
        tracing::info!(job_id = %handle.id, "subscriber disconnected, job keeps running");
    }
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    reply: String,
    session_id: String,
}

/// POST /api/chat
async fn api_chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(req) = payload?;
    if req.message.trim().is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }
    let provider: Provider = state
        .config
        .chat
        .provider
        .parse()
        .map_err(CampaignError::Config)?;
    let (session_id, model) = state.sessions.open(req.session_id, req.model).await;
    let llm = state
        .factory
        .reasoning(provider, model.as_deref())
        .map_err(CampaignError::from)?;
    let llm = StructuredLlm::new(llm, state.llm_timeout());
    let reply = state
        .sessions
        .exchange(&session_id, &llm, req.message.trim())
        .await?;
    Ok(Json(ChatResponse { reply, session_id }))
}

#[derive(Debug, Deserialize)]
struct ClearSessionRequest {
    #[serde(default)]
    session_id: Option<String>,
}

/// POST /api/session/clear
async fn api_session_clear(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ClearSessionRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(req) = payload?;
    let session_id = req
        .session_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("session_id is required"))?;
    state.sessions.clear(&session_id).await;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct BlogRequest {
    query: String,
}

/// POST /api/blog
async fn api_blog(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BlogRequest>, JsonRejection>,
) -> Result<Json<BlogOutcome>, ApiError> {
    let Json(req) = payload?;
    let provider: Provider = state
        .config
        .llm
        .default_provider
        .parse()
        .map_err(CampaignError::Config)?;
    let llm = state
        .factory
        .reasoning(provider, None)
        .map_err(CampaignError::from)?;
    let workflow = BlogWorkflow::new(
        StructuredLlm::new(llm, state.llm_timeout()),
        Arc::clone(&state.search),
    );
    Ok(Json(workflow.run(&req.query).await?))
}
