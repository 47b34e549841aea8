//! HTTP Endpoints
//!
//! Health, metrics, the conversation log and the viewer WebSocket.

use axum::{
    extract::{Json, State},
    http::{HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::metrics::metrics_handler;
use crate::state::AppState;
use crate::websocket::WebSocketHandler;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(&state.config.server.cors_origins, state.config.server.cors_enabled);

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/api/conversation", get(conversation))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configured origins
///
/// Disabled CORS is permissive; no configured origins means localhost only.
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins");
        return CorsLayer::permissive();
    }

    let parsed_origins: Vec<HeaderValue> = if origins.is_empty() {
        tracing::info!("No CORS origins configured, defaulting to localhost:3000");
        vec![HeaderValue::from_static("http://localhost:3000")]
    } else {
        origins
            .iter()
            .filter_map(|origin| {
                origin.parse::<HeaderValue>().ok().or_else(|| {
                    tracing::warn!("Invalid CORS origin: {}", origin);
                    None
                })
            })
            .collect()
    };

    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
}

async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "phase": state.phase().as_str(),
            "viewers": state.surface.viewers(),
        })),
    )
}

/// Current phase, live display state and, once finished, the run report
async fn conversation(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "run_id": state.run_id,
        "phase": state.phase(),
        "surface": state.surface.snapshot(),
        "report": state.report(),
    }))
}

async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    WebSocketHandler::handle(ws, State(state)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;
    use voice_duet_agent::{EndReason, LifecyclePhase, PresentationSurface, RunReport};
    use voice_duet_config::Settings;
    use voice_duet_core::{AgentId, AgentIdentity, ConversationLog, Turn};

    use crate::presentation::BroadcastSurface;

    fn state(phase: LifecyclePhase) -> (AppState, watch::Sender<LifecyclePhase>) {
        let (tx, rx) = watch::channel(phase);
        let state = AppState::new(Settings::default(), Arc::new(BroadcastSurface::new(16)), rx);
        (state, tx)
    }

    #[test]
    fn test_router_creation() {
        let (state, _tx) = state(LifecyclePhase::Idle);
        let _ = create_router(state);
    }

    #[tokio::test]
    async fn test_health_reports_phase() {
        let (state, tx) = state(LifecyclePhase::Running);
        let (status, Json(body)) = health_check(State(state.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phase"], "running");

        tx.send_replace(LifecyclePhase::Closed);
        let (_, Json(body)) = health_check(State(state)).await;
        assert_eq!(body["phase"], "closed");
    }

    #[tokio::test]
    async fn test_conversation_includes_report_once_finished() {
        let (state, _tx) = state(LifecyclePhase::Running);
        state.surface.set_message(AgentId::A, "Hello.").unwrap();

        let Json(body) = conversation(State(state.clone())).await;
        assert_eq!(body["phase"], "running");
        assert_eq!(body["surface"]["messages"][0], "Hello.");
        assert!(body["report"].is_null());

        let mut log = ConversationLog::new();
        let mut turn = Turn::open(0, &AgentIdentity::new(AgentId::A, "Alex"));
        turn.seal(Some("Hello.".to_string()));
        log.append(turn).unwrap();
        state.set_report(RunReport {
            end_reason: EndReason::TurnLimit,
            turns_taken: 1,
            log,
            audio: Vec::new(),
            elapsed: Duration::from_secs(2),
            discarded_turn: None,
        });

        let Json(body) = conversation(State(state)).await;
        assert_eq!(body["report"]["end_reason"], "turn_limit");
        assert_eq!(body["report"]["log"]["turns"][0]["text"], "Hello.");
    }
}
