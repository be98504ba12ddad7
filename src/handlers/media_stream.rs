//! Telephony media stream WebSocket.
//!
//! Each connection is one phone call. Inbound frames are parsed into bridge
//! events and handed to a [`BridgeRunner`]; the runner's outbound frames are
//! written back by a dedicated sender task.

use std::sync::Arc;

use axum::{
    Extension,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::select;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::core::bridge::{BridgeEvent, BridgeRunner, TransportRoute};
use crate::core::telephony::MediaStreamFrame;
use crate::middleware::ClientIp;
use crate::state::AppState;

/// Outbound frames buffered per call. Audio deltas arrive in bursts.
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (1 MB)
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    client_ip: Option<Extension<ClientIp>>,
) -> Response {
    let client_ip = client_ip.map(|Extension(ip)| ip);
    info!(ip = ?client_ip, "Media stream upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_media_socket(socket, state, client_ip))
}

async fn handle_media_socket(socket: WebSocket, state: Arc<AppState>, client_ip: Option<ClientIp>) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<TransportRoute>(CHANNEL_BUFFER_SIZE);
    let (event_tx, event_rx) = mpsc::channel::<BridgeEvent>(CHANNEL_BUFFER_SIZE);

    let sender_task = tokio::spawn(async move {
        while let Some(route) = outbound_rx.recv().await {
            let result = match route {
                TransportRoute::Frame(frame) => match frame.to_json() {
                    Ok(json) => sender.send(Message::Text(json.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outbound frame: {}", e);
                        continue;
                    }
                },
                TransportRoute::Close => {
                    debug!("Closing media stream");
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };
            if let Err(e) = result {
                warn!("Failed to write media stream frame: {}", e);
                break;
            }
        }
    });

    let runner = BridgeRunner::new(state.bridge.clone(), outbound_tx);
    let mut runner_task = tokio::spawn(runner.run(event_rx));
    let mut runner_done = false;

    loop {
        select! {
            msg = receiver.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("Media stream read error: {}", e);
                        break;
                    }
                };
                let frame = match MediaStreamFrame::parse(text.as_str()) {
                    Ok(frame) => frame,
                    Err(e) => {
                        debug!("Ignoring unparseable media frame: {}", e);
                        continue;
                    }
                };
                let is_stop = matches!(frame, MediaStreamFrame::Stop);
                if let Some(event) = BridgeEvent::from_transport(frame)
                    && event_tx.send(event).await.is_err()
                {
                    break;
                }
                if is_stop {
                    break;
                }
            }
            result = &mut runner_task => {
                runner_done = true;
                if let Err(e) = result {
                    error!("Bridge runner failed: {}", e);
                }
                break;
            }
        }
    }

    // Dropping the event sender closes the transport leg for the runner.
    drop(event_tx);
    if !runner_done && let Err(e) = runner_task.await {
        error!("Bridge runner failed: {}", e);
    }
    // The sender task exits on its own once it has flushed the close frame.
    let _ = tokio::time::timeout(std::time::Duration::from_secs(1), sender_task).await;

    if let Some(ClientIp(ip)) = client_ip {
        state.release_connection(ip);
    }
    info!("Media stream closed");
}
