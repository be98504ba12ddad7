use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{agent_chat, api, voice};
use crate::state::AppState;
use std::sync::Arc;

/// Create the HTTP API router: health, text turns and the inbound call webhook.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::health_check))
        .route("/agent-chat", post(agent_chat::agent_chat_handler))
        .route("/voice", post(voice::voice_webhook_handler))
        .layer(TraceLayer::new_for_http())
}
