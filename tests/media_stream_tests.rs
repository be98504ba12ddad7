//! Media stream WebSocket tests
//!
//! Serves the real `/media-stream` route (with connection limits) on a local
//! port and speaks the telephony frame protocol to it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::middleware;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use receptionist_gateway::core::booking::{
    AvailabilityRequest, BookingApi, BookingRequest, BookingResult,
};
use receptionist_gateway::core::business::StaticProfileSource;
use receptionist_gateway::core::nlu::OpenAIFieldExtractor;
use receptionist_gateway::core::prompt::ReceptionistPrompt;
use receptionist_gateway::core::realtime::{
    ClientEvent, ModelConnector, ModelSocket, RealtimeResult, ServerEvent,
};
use receptionist_gateway::core::telemetry::TelemetrySidecar;
use receptionist_gateway::{
    ServerConfig, middleware::connection_limit_middleware, routes, state::AppState,
    state::Services,
};

const WAIT: Duration = Duration::from_secs(2);

struct ModelEnds {
    client_rx: mpsc::Receiver<ClientEvent>,
    server_tx: mpsc::Sender<ServerEvent>,
}

struct LoopbackConnector {
    ends: mpsc::UnboundedSender<ModelEnds>,
}

#[async_trait]
impl ModelConnector for LoopbackConnector {
    fn voice(&self) -> &str {
        "alloy"
    }

    async fn connect(&self) -> RealtimeResult<ModelSocket> {
        let (client_tx, client_rx) = mpsc::channel(64);
        let (server_tx, server_rx) = mpsc::channel(64);
        let _ = self.ends.send(ModelEnds {
            client_rx,
            server_tx,
        });
        Ok(ModelSocket::new(client_tx, server_rx))
    }
}

struct NoBooking;

#[async_trait]
impl BookingApi for NoBooking {
    async fn check_availability(&self, _request: &AvailabilityRequest) -> BookingResult<Value> {
        Ok(json!({"available": false}))
    }

    async fn book_appointment(&self, _request: &BookingRequest) -> BookingResult<Value> {
        Ok(json!({"ok": false}))
    }
}

async fn serve(max_per_ip: u32) -> (SocketAddr, Arc<AppState>, mpsc::UnboundedReceiver<ModelEnds>) {
    let (ends_tx, ends_rx) = mpsc::unbounded_channel();
    let mut config = ServerConfig::default();
    config.max_connections_per_ip = max_per_ip;

    let services = Services {
        booking: Arc::new(NoBooking),
        profiles: Arc::new(StaticProfileSource::new()),
        extractor: Arc::new(OpenAIFieldExtractor::new("http://127.0.0.1:9", None, "test")),
        connector: Arc::new(LoopbackConnector { ends: ends_tx }),
        prompts: Arc::new(ReceptionistPrompt::new("America/New_York")),
        telemetry: TelemetrySidecar::disabled(),
    };
    let state = AppState::with_services(config, services);

    let app = routes::media::create_media_router()
        .layer(middleware::from_fn_with_state(
            state.clone(),
            connection_limit_middleware,
        ))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    (addr, state, ends_rx)
}

fn start_frame() -> String {
    json!({
        "event": "start",
        "sequenceNumber": "1",
        "streamSid": "MZ42",
        "start": {
            "streamSid": "MZ42",
            "callSid": "CA42",
            "accountSid": "AC1",
            "customParameters": {"businessId": "waismofit", "callerPhone": "+15550001111"}
        }
    })
    .to_string()
}

async fn wait_for_release(state: &AppState) {
    timeout(WAIT, async {
        while state.ws_connection_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connection slot was not released");
}

#[tokio::test]
async fn test_call_streams_audio_both_ways() {
    let (addr, state, mut ends) = serve(10).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/media-stream"))
        .await
        .unwrap();
    assert_eq!(state.ws_connection_count(), 1);

    ws.send(Message::Text(json!({"event": "connected"}).to_string().into()))
        .await
        .unwrap();
    ws.send(Message::Text(start_frame().into())).await.unwrap();

    let mut model = timeout(WAIT, ends.recv()).await.unwrap().unwrap();
    let first = timeout(WAIT, model.client_rx.recv()).await.unwrap().unwrap();
    assert_eq!(first.kind(), "session.update");

    ws.send(Message::Text(
        json!({"event": "media", "streamSid": "MZ42", "media": {"timestamp": "60", "payload": "/w=="}})
            .to_string()
            .into(),
    ))
    .await
    .unwrap();
    let append = timeout(WAIT, model.client_rx.recv()).await.unwrap().unwrap();
    assert_eq!(
        append,
        ClientEvent::InputAudioBufferAppend {
            audio: "/w==".to_string()
        }
    );

    let delta: ServerEvent = serde_json::from_value(json!({
        "type": "response.audio.delta",
        "item_id": "item_1",
        "delta": "AAEC"
    }))
    .unwrap();
    model.server_tx.send(delta).await.unwrap();

    let frame = timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
    let frame: Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
    assert_eq!(frame["event"], "media");
    assert_eq!(frame["streamSid"], "MZ42");
    assert_eq!(frame["media"]["payload"], "AAEC");

    let mark = timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
    let mark: Value = serde_json::from_str(mark.to_text().unwrap()).unwrap();
    assert_eq!(mark["event"], "mark");

    ws.send(Message::Text(json!({"event": "stop", "streamSid": "MZ42"}).to_string().into()))
        .await
        .unwrap();

    assert!(timeout(WAIT, model.client_rx.recv()).await.unwrap().is_none());
    wait_for_release(&state).await;
}

#[tokio::test]
async fn test_model_hangup_closes_socket() {
    let (addr, state, mut ends) = serve(10).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/media-stream"))
        .await
        .unwrap();
    ws.send(Message::Text(start_frame().into())).await.unwrap();

    let model = timeout(WAIT, ends.recv()).await.unwrap().unwrap();
    drop(model);

    let closed = timeout(WAIT, async {
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => return true,
                Ok(_) => continue,
            }
        }
        true
    })
    .await
    .unwrap();
    assert!(closed);
    wait_for_release(&state).await;
}

#[tokio::test]
async fn test_per_ip_limit_rejects_second_call() {
    let (addr, state, _ends) = serve(1).await;
    let url = format!("ws://{addr}/media-stream");

    let (first, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    match tokio_tungstenite::connect_async(url.as_str()).await {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 429),
        Err(e) => panic!("expected HTTP 429, got {e}"),
        Ok(_) => panic!("second call was admitted"),
    }
    assert_eq!(state.ws_connection_count(), 1);

    drop(first);
    wait_for_release(&state).await;
}
