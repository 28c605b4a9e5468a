//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, Method},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::http::polling::{close_handler, open_handler, poll_handler, push_handler};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(state.config.client_origin.as_deref());
    // Static client assets, gzip where the browser accepts it
    let assets = ServiceBuilder::new()
        .layer(CompressionLayer::new())
        .service(ServeDir::new(&state.config.static_dir));

    let transport_routes = Router::new()
        .route("/ws", get(ws_handler))
        .route("/poll", post(open_handler))
        .route(
            "/poll/:id",
            get(poll_handler).post(push_handler).delete(close_handler),
        );

    Router::new()
        .route("/health", get(health_handler))
        .merge(transport_routes)
        .fallback_service(assets)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS: comma-separated origins, or any origin when unset
fn cors_layer(client_origin: Option<&str>) -> CorsLayer {
    let origin = match client_origin {
        Some(origins) => {
            let allowed: Vec<header::HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
                .collect();
            AllowOrigin::list(allowed)
        }
        None => AllowOrigin::from(Any),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    connections: usize,
    players: usize,
    polling_sessions: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.relay.stats();
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        connections: stats.connections(),
        players: stats.players(),
        polling_sessions: state.polls.len(),
    })
}
