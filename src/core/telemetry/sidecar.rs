//! Fire-and-forget delivery of telemetry events.
//!
//! Every emission is spawned onto the runtime and never awaited by the caller.
//! Each delivery gets one bounded attempt plus exactly one retry for timeouts and
//! connection failures. Anything else, including a non-2xx answer, is logged and
//! dropped.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use super::events::{ToolEvent, TranscriptEvent, UsageEvent};

/// Default per-attempt timeout for collector requests.
pub const DEFAULT_TELEMETRY_TIMEOUT: Duration = Duration::from_millis(2500);

const TRANSCRIPTS_PATH: &str = "/transcripts";
const TOOL_EVENTS_PATH: &str = "/tool-events";
const USAGE_PATH: &str = "/usage";

/// Result of one delivery, including its retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: u8 },
    Rejected { status: u16 },
    Failed { attempts: u8, error: String },
}

#[derive(Debug, Clone)]
pub struct TelemetrySidecar {
    client: reqwest::Client,
    base_url: Option<String>,
    timeout: Duration,
}

impl TelemetrySidecar {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
            timeout,
        }
    }

    /// Sidecar that drops everything. Used when no collector is configured.
    pub fn disabled() -> Self {
        Self::new(None, DEFAULT_TELEMETRY_TIMEOUT)
    }

    pub fn is_enabled(&self) -> bool {
        self.base_url.is_some()
    }

    pub fn transcript(&self, event: TranscriptEvent) {
        self.emit(TRANSCRIPTS_PATH, &event);
    }

    pub fn tool(&self, event: ToolEvent) {
        self.emit(TOOL_EVENTS_PATH, &event);
    }

    pub fn usage(&self, event: UsageEvent) {
        self.emit(USAGE_PATH, &event);
    }

    /// Serializes `payload` and posts it in the background. Never blocks, never fails.
    pub fn emit<T: Serialize>(&self, path: &str, payload: &T) {
        let Some(base_url) = self.base_url.as_deref() else {
            debug!(path, "Telemetry disabled, dropping event");
            return;
        };

        let body = match serde_json::to_value(payload) {
            Ok(body) => body,
            Err(e) => {
                warn!(path, error = %e, "Failed to serialize telemetry payload");
                return;
            }
        };

        let url = format!("{base_url}{path}");
        let client = self.client.clone();
        let timeout = self.timeout;

        tokio::spawn(async move {
            deliver(&client, &url, &body, timeout).await;
        });
    }
}

fn is_retryable(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

/// Posts `body` to `url`, retrying once on timeout or connection failure.
pub async fn deliver(
    client: &reqwest::Client,
    url: &str,
    body: &serde_json::Value,
    timeout: Duration,
) -> DeliveryOutcome {
    let mut attempts: u8 = 0;
    loop {
        attempts += 1;
        let result = client.post(url).timeout(timeout).json(body).send().await;

        match result {
            Ok(response) if response.status().is_success() => {
                return DeliveryOutcome::Delivered { attempts };
            }
            Ok(response) => {
                warn!(
                    url = %url,
                    status = %response.status(),
                    "Telemetry collector returned non-success status"
                );
                return DeliveryOutcome::Rejected {
                    status: response.status().as_u16(),
                };
            }
            Err(e) if attempts == 1 && is_retryable(&e) => {
                debug!(url = %url, error = %e, "Telemetry delivery failed, retrying once");
            }
            Err(e) => {
                warn!(url = %url, attempts, error = %e, "Telemetry delivery dropped");
                return DeliveryOutcome::Failed {
                    attempts,
                    error: e.to_string(),
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_deliver_success_single_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transcripts"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = deliver(
            &reqwest::Client::new(),
            &format!("{}/transcripts", server.uri()),
            &json!({"text": "hi"}),
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 1 });
    }

    #[tokio::test]
    async fn test_deliver_retries_once_on_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .expect(2)
            .mount(&server)
            .await;

        let outcome = deliver(
            &reqwest::Client::new(),
            &format!("{}/usage", server.uri()),
            &json!({}),
            Duration::from_millis(100),
        )
        .await;

        assert!(matches!(outcome, DeliveryOutcome::Failed { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_deliver_does_not_retry_non_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = deliver(
            &reqwest::Client::new(),
            &format!("{}/tool-events", server.uri()),
            &json!({}),
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(outcome, DeliveryOutcome::Rejected { status: 503 });
    }

    #[tokio::test]
    async fn test_deliver_retries_once_on_connect_error() {
        // Bind and drop to get a port nothing listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let outcome = deliver(
            &reqwest::Client::new(),
            &format!("http://127.0.0.1:{port}/transcripts"),
            &json!({}),
            Duration::from_millis(500),
        )
        .await;

        assert!(matches!(outcome, DeliveryOutcome::Failed { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_emit_returns_immediately_and_delivers_in_background() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transcripts"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
            .expect(1)
            .mount(&server)
            .await;

        let sidecar = TelemetrySidecar::new(Some(format!("{}/", server.uri())), Duration::from_secs(2));
        let started = std::time::Instant::now();
        sidecar.transcript(TranscriptEvent::new(
            "CA1",
            crate::core::idempotency::TurnRole::User,
            0,
            "hello",
        ));
        assert!(started.elapsed() < Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(500)).await;
        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(body["turnId"], "CA1:user:0");
    }

    #[tokio::test]
    async fn test_disabled_sidecar_is_noop() {
        let sidecar = TelemetrySidecar::disabled();
        assert!(!sidecar.is_enabled());
        sidecar.usage(UsageEvent::new("CA1", 1, 1));
    }
}
