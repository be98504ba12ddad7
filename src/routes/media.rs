//! Media stream WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::media_stream::media_stream_handler;
use crate::handlers::voice::MEDIA_STREAM_PATH;
use crate::state::AppState;
use std::sync::Arc;

/// Create the media stream router
///
/// # Endpoint
///
/// `GET /media-stream` - WebSocket upgrade for a call's audio
///
/// # Protocol
///
/// The telephony provider sends JSON frames tagged by `event`:
/// `connected`, `start` (with `customParameters.businessId` and
/// `customParameters.callerPhone`), `media` (base64 mu-law audio), `mark` and
/// `stop`.
///
/// The server replies with `media` frames carrying the assistant's audio, a
/// `mark` after each chunk and `clear` when the caller interrupts.
///
/// Connection limits are applied in main.rs.
pub fn create_media_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(MEDIA_STREAM_PATH, get(media_stream_handler))
        .layer(TraceLayer::new_for_http())
}
