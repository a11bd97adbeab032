//! REST API server for the INA advisor
//!
//! Exposes chat sessions, quick actions, the business profile and run
//! audit records over HTTP.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AdvisorError;
use crate::models::{Profile, Utterance};
use crate::session::{QuickAction, SessionManager};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct QuickActionRequest {
    pub session_id: Option<String>,
    pub action: String,
}

#[derive(Debug, Serialize)]
struct HistoryEntry<'a> {
    role: String,
    speaker: String,
    text: &'a str,
    timestamp: String,
}

impl<'a> From<&'a Utterance> for HistoryEntry<'a> {
    fn from(utterance: &'a Utterance) -> Self {
        Self {
            role: serde_json::to_value(utterance.role())
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            speaker: utterance.role().to_string(),
            text: utterance.text(),
            timestamp: utterance.timestamp().to_rfc3339(),
        }
    }
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

fn ok<T: Serialize>(data: T) -> ApiResult {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

fn fail(status: StatusCode, message: String) -> ApiResult {
    (status, Json(ApiResponse::error(message)))
}

fn error_status(error: &AdvisorError) -> StatusCode {
    match error {
        AdvisorError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub sessions: Arc<SessionManager>,
}

/// Accept a UUID, or derive a stable one from any other non-empty key so
/// front-ends can use their own chat identifiers.
fn session_uuid(value: Option<&str>) -> Option<Uuid> {
    use sha2::{Digest, Sha256};

    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    if let Ok(id) = Uuid::parse_str(value) {
        return Some(id);
    }

    let hash = Sha256::digest(value.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    Some(Uuid::from_bytes(bytes))
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "INA - Asisten UMKM",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Chat Endpoints
/// =============================

async fn chat_handler(State(state): State<ApiState>, Json(req): Json<ChatRequest>) -> ApiResult {
    let message = req.message.trim();
    if message.is_empty() {
        return fail(StatusCode::BAD_REQUEST, "message must not be empty".into());
    }

    let session = state
        .sessions
        .get_or_create(session_uuid(req.session_id.as_deref()))
        .await;
    let mut session = session.lock().await;

    info!(session_id = %session.id(), "Chat message received");
    ok(session.send(message).await)
}

async fn quick_action_handler(
    State(state): State<ApiState>,
    Json(req): Json<QuickActionRequest>,
) -> ApiResult {
    let action = match req.action.parse::<QuickAction>() {
        Ok(action) => action,
        Err(e) => return fail(error_status(&e), e.to_string()),
    };

    let session = state
        .sessions
        .get_or_create(session_uuid(req.session_id.as_deref()))
        .await;
    let mut session = session.lock().await;

    info!(session_id = %session.id(), ?action, "Quick action received");
    ok(session.quick_action(action).await)
}

async fn history_handler(State(state): State<ApiState>, Path(id): Path<String>) -> ApiResult {
    let Some(session_id) = session_uuid(Some(&id)) else {
        return fail(StatusCode::BAD_REQUEST, "invalid session id".into());
    };
    let Some(session) = state.sessions.get(session_id).await else {
        return fail(StatusCode::NOT_FOUND, format!("session {} not found", id));
    };

    let (history, window) = {
        let session = session.lock().await;
        (session.history(), session.memory_window())
    };
    let entries: Vec<HistoryEntry> = history.iter().map(HistoryEntry::from).collect();
    ok(serde_json::json!({
        "session_id": session_id,
        "window": window,
        "messages": entries,
    }))
}

async fn clear_history_handler(State(state): State<ApiState>, Path(id): Path<String>) -> ApiResult {
    let Some(session_id) = session_uuid(Some(&id)) else {
        return fail(StatusCode::BAD_REQUEST, "invalid session id".into());
    };
    let Some(session) = state.sessions.get(session_id).await else {
        return fail(StatusCode::NOT_FOUND, format!("session {} not found", id));
    };

    session.lock().await.clear_history();
    ok(serde_json::json!({ "session_id": session_id, "cleared": true }))
}

/// =============================
/// Profile Endpoints
/// =============================

async fn get_profile(State(state): State<ApiState>) -> ApiResult {
    match state.sessions.services().profiles.load().await {
        Ok(Some(profile)) => ok(profile),
        Ok(None) => fail(StatusCode::NOT_FOUND, "no profile saved yet".into()),
        Err(e) => {
            warn!("Failed to load profile: {}", e);
            fail(error_status(&e), e.to_string())
        }
    }
}

async fn save_profile(State(state): State<ApiState>, Json(profile): Json<Profile>) -> ApiResult {
    match state.sessions.services().profiles.save(profile).await {
        Ok(saved) => {
            info!(profile_id = saved.id, "Profile saved");
            ok(saved)
        }
        Err(e) => fail(error_status(&e), e.to_string()),
    }
}

/// =============================
/// Audit Endpoint
/// =============================

async fn get_run(State(state): State<ApiState>, Path(run_id): Path<Uuid>) -> ApiResult {
    let audit = &state.sessions.services().audit;

    match audit.get(run_id).await {
        Ok(Some(record)) => {
            let verified = audit.verify_integrity(run_id).await.unwrap_or(false);
            ok(serde_json::json!({
                "record": record,
                "verified": verified,
            }))
        }
        Ok(None) => fail(StatusCode::NOT_FOUND, format!("run {} not found", run_id)),
        Err(e) => fail(error_status(&e), e.to_string()),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(sessions: Arc<SessionManager>) -> Router {
    let state = ApiState { sessions };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_handler))
        .route("/api/quick-action", post(quick_action_handler))
        .route(
            "/api/sessions/:id/history",
            get(history_handler).delete(clear_history_handler),
        )
        .route("/api/profile", get(get_profile).post(save_profile))
        .route("/api/runs/:run_id", get(get_run))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    sessions: Arc<SessionManager>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(sessions);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentOrchestrator, AgentSettings};
    use crate::audit::AuditLog;
    use crate::knowledge::{seed, HashedEmbedder, KnowledgeStore};
    use crate::llm::KeywordModel;
    use crate::session::SessionServices;
    use crate::store::ProfileStore;
    use crate::tools::create_default_registry;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app() -> Router {
        let store = KnowledgeStore::new(Box::new(HashedEmbedder::default()));
        store.add(seed::seed_documents()).await.unwrap();
        let registry = Arc::new(create_default_registry(Arc::new(store)).unwrap());
        let services = SessionServices {
            orchestrator: Arc::new(AgentOrchestrator::new(
                Arc::new(KeywordModel),
                registry,
                AgentSettings::default(),
            )),
            profiles: Arc::new(ProfileStore::in_memory()),
            audit: Arc::new(AuditLog::new()),
        };
        create_router(Arc::new(SessionManager::new(services, 10)))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app().await, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_chat_then_history() {
        let app = app().await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/chat",
            Some(json!({ "session_id": "chat-1", "message": "Usaha fashion cocoknya di platform apa?" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["state"], "DONE");
        assert!(body["data"]["answer"].as_str().unwrap().contains("TikTok Shop"));

        let (status, history) = send(&app, "GET", "/api/sessions/chat-1/history", None).await;
        assert_eq!(status, StatusCode::OK);
        let messages = history["data"]["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["speaker"], "INA");
        assert_eq!(history["data"]["window"], 10);

        let run_id = body["data"]["run_id"].as_str().unwrap();
        let (status, run) = send(&app, "GET", &format!("/api/runs/{}", run_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(run["data"]["verified"], true);
    }

    #[tokio::test]
    async fn test_clear_history() {
        let app = app().await;
        send(&app, "POST", "/api/chat", Some(json!({ "session_id": "chat-2", "message": "Halo" }))).await;

        let (status, body) = send(&app, "DELETE", "/api/sessions/chat-2/history", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["cleared"], true);

        let (_, history) = send(&app, "GET", "/api/sessions/chat-2/history", None).await;
        assert!(history["data"]["messages"].as_array().unwrap().is_empty());

        let (status, _) = send(&app, "DELETE", "/api/sessions/missing/history", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let (status, body) = send(
            &app().await,
            "POST",
            "/api/chat",
            Some(json!({ "message": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_profile_and_quick_action() {
        let app = app().await;

        let (status, _) = send(&app, "GET", "/api/profile", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, saved) = send(
            &app,
            "POST",
            "/api/profile",
            Some(json!({ "owner_name": "Siti", "business_type": "kuliner", "location": "Bandung" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["data"]["owner_name"], "Siti");

        let (status, reply) = send(
            &app,
            "POST",
            "/api/quick-action",
            Some(json!({ "action": "swot" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            reply["data"]["question"],
            "Buat analisis SWOT untuk usaha kuliner di Bandung"
        );
        assert!(reply["data"]["answer"]
            .as_str()
            .unwrap()
            .contains("Analisis SWOT untuk kuliner:"));

        let (status, _) = send(
            &app,
            "POST",
            "/api/quick-action",
            Some(json!({ "action": "laporan" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_session_and_run() {
        let app = app().await;
        let (status, _) = send(&app, "GET", "/api/sessions/nope/history", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, "GET", &format!("/api/runs/{}", Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_session_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(session_uuid(Some(&id.to_string())), Some(id));
        assert_eq!(session_uuid(Some("chat-1")), session_uuid(Some("chat-1")));
        assert_eq!(session_uuid(Some("  ")), None);
        assert_eq!(session_uuid(None), None);
    }
}
