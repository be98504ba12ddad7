//! WebSocket connector for the OpenAI Realtime API.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};
use url::Url;
use zeroize::Zeroize;

use super::config::{OPENAI_REALTIME_URL, OpenAIRealtimeModel, OpenAIRealtimeVoice};
use super::messages::{ClientEvent, ServerEvent};
use crate::core::realtime::base::{ModelConnector, ModelSocket, RealtimeError, RealtimeResult};

/// Capacity of the channels between the bridge and the socket task.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Opens one OpenAI Realtime WebSocket per call. No reconnection is attempted;
/// a dropped socket ends the call's bridge.
pub struct OpenAIConnector {
    api_key: Option<String>,
    url: String,
    model: OpenAIRealtimeModel,
    voice: OpenAIRealtimeVoice,
}

impl Drop for OpenAIConnector {
    fn drop(&mut self) {
        if let Some(key) = self.api_key.as_mut() {
            key.zeroize();
        }
    }
}

impl OpenAIConnector {
    pub fn new(api_key: Option<String>, model: &str, voice: &str) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            url: OPENAI_REALTIME_URL.to_string(),
            model: OpenAIRealtimeModel::from_str_or_default(model),
            voice: OpenAIRealtimeVoice::from_str_or_default(voice),
        }
    }

    /// Override the endpoint (e.g. a proxy).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    fn build_ws_url(&self) -> RealtimeResult<Url> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| RealtimeError::InvalidConfiguration(format!("realtime url: {e}")))?;
        url.query_pairs_mut().append_pair("model", self.model.as_str());
        Ok(url)
    }
}

#[async_trait]
impl ModelConnector for OpenAIConnector {
    fn voice(&self) -> &str {
        self.voice.as_str()
    }

    async fn connect(&self) -> RealtimeResult<ModelSocket> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| RealtimeError::InvalidConfiguration("OpenAI API key not set".into()))?;

        let url = self.build_ws_url()?;
        let host = url
            .host_str()
            .ok_or_else(|| RealtimeError::InvalidConfiguration("realtime url has no host".into()))?
            .to_string();

        let request = http::Request::builder()
            .uri(url.as_str())
            .header("Authorization", format!("Bearer {api_key}"))
            .header("OpenAI-Beta", "realtime=v1")
            .header(
                "Sec-WebSocket-Key",
                tungstenite::handshake::client::generate_key(),
            )
            .header("Sec-WebSocket-Version", "13")
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Host", host)
            .body(())
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        info!(model = %self.model, "Connected to OpenAI Realtime API");

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let (client_tx, mut client_rx) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);
        let (server_tx, server_rx) = mpsc::channel::<ServerEvent>(WS_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outgoing = client_rx.recv() => {
                        let Some(event) = outgoing else {
                            // Bridge dropped its sender: close the session.
                            let _ = ws_sink.send(Message::Close(None)).await;
                            break;
                        };
                        let json = match serde_json::to_string(&event) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!("Failed to serialize {} event: {}", event.kind(), e);
                                continue;
                            }
                        };
                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            warn!("Failed to send realtime message: {}", e);
                            break;
                        }
                    }

                    incoming = ws_stream.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str::<ServerEvent>(&text) {
                                    Ok(ServerEvent::Unknown) => {}
                                    Ok(event) => {
                                        if server_tx.send(event).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(e) => debug!("Unparsed realtime event: {}", e),
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    warn!("Failed to send pong: {}", e);
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                info!("Realtime WebSocket closed by server");
                                break;
                            }
                            Some(Err(e)) => {
                                warn!("Realtime WebSocket error: {}", e);
                                break;
                            }
                            Some(Ok(_)) => {}
                        }
                    }
                }
            }
        });

        Ok(ModelSocket::new(client_tx, server_rx))
    }
}
