//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::app::AppState;
use crate::game::{RegistryError, RoomError, RoomSummary};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/room/list", get(list_rooms_handler))
        .route("/room/:room/ws", get(ws_handler))
        .fallback_service(ServeDir::new(&state.config.static_dir))
        .layer(TraceLayer::new_for_http());

    // CORS only when explicit origins are configured (comma-separated CLIENT_ORIGIN)
    let allowed_origins: Vec<HeaderValue> = state
        .config
        .client_origins
        .iter()
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if !allowed_origins.is_empty() {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE]),
        );
    }

    router.with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    rooms: usize,
    players: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        rooms: state.game.room_count(),
        players: state.game.total_players(),
    })
}

// ============================================================================
// Room endpoints
// ============================================================================

async fn list_rooms_handler(State(state): State<AppState>) -> Json<Vec<RoomSummary>> {
    Json(state.game.list_rooms())
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),
}

impl From<RegistryError> for AppError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound => AppError::NotFound(e.to_string()),
        }
    }
}

impl From<RoomError> for AppError {
    fn from(e: RoomError) -> Self {
        AppError::Forbidden(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::game::{Game, Room};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state(game: Game) -> AppState {
        let config = Config::from_lookup(|_| None).unwrap();
        AppState::with_game(config, Arc::new(game))
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn lists_rooms() {
        let state = test_state(Game::spawn(vec![Room::new("Solo", 1), Room::new("Quad", 4)]));
        let (status, body) = get_json(build_router(state), "/room/list").await;

        assert_eq!(status, StatusCode::OK);
        let rooms = body.as_array().unwrap();
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0]["name"], "Solo");
        assert_eq!(rooms[0]["slots"], 1);
        assert_eq!(rooms[1]["name"], "Quad");
        assert_eq!(rooms[1]["player_count"], 0);
    }

    #[tokio::test]
    async fn health_reports_players() {
        let game = Game::spawn(vec![Room::new("Solo", 1)]);
        let room = game.get_room(&game.list_rooms()[0].id.to_string()).unwrap();
        let _session = room.add_player().unwrap();

        let (status, body) = get_json(build_router(test_state(game)), "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["rooms"], 1);
        assert_eq!(body["players"], 1);
    }

    #[test]
    fn errors_map_to_status_codes() {
        let response = AppError::from(RegistryError::NotFound).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = AppError::from(RoomError::Full).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn error_body_is_json() {
        let response = AppError::from(RoomError::Full).into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({ "error": "room is full" }));
    }
}
