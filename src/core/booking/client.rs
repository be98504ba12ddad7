use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("Booking API not configured")]
    NotConfigured,
    #[error("Booking API request failed: {0}")]
    Request(String),
    #[error("Booking API returned a non-JSON body: {0}")]
    InvalidBody(String),
}

pub type BookingResult<T> = Result<T, BookingError>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRequest {
    pub business_id: String,
    pub date: String,
    pub timezone: String,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub business_id: String,
    pub start: String,
    pub timezone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub guest_name: String,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
}

/// External scheduling backend.
///
/// Responses are handed back as raw JSON; callers interpret them leniently
/// through [`super::AvailabilityOutcome`] and [`super::BookingOutcome`].
#[async_trait]
pub trait BookingApi: Send + Sync {
    async fn check_availability(&self, request: &AvailabilityRequest) -> BookingResult<Value>;

    async fn book_appointment(&self, request: &BookingRequest) -> BookingResult<Value>;
}

/// HTTP client for the scheduling backend.
pub struct HttpBookingClient {
    client: reqwest::Client,
    base_url: Option<String>,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpBookingClient {
    pub fn new(base_url: Option<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
            api_key,
            timeout,
        }
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> BookingResult<Value> {
        let base_url = self.base_url.as_deref().ok_or(BookingError::NotConfigured)?;
        let url = format!("{base_url}{path}");

        let mut request = self.client.post(&url).timeout(self.timeout).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BookingError::Request(e.to_string()))?;
        let status = response.status();
        debug!(url = %url, status = %status, "Booking API responded");

        // Error statuses usually still carry a JSON body with an `error` field
        let text = response
            .text()
            .await
            .map_err(|e| BookingError::Request(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| {
            if status.is_success() {
                BookingError::InvalidBody(e.to_string())
            } else {
                BookingError::Request(format!("HTTP {status}"))
            }
        })
    }
}

#[async_trait]
impl BookingApi for HttpBookingClient {
    async fn check_availability(&self, request: &AvailabilityRequest) -> BookingResult<Value> {
        self.post("/availability", request).await
    }

    async fn book_appointment(&self, request: &BookingRequest) -> BookingResult<Value> {
        self.post("/bookings", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn availability() -> AvailabilityRequest {
        AvailabilityRequest {
            business_id: "biz".to_string(),
            date: "2025-05-02".to_string(),
            timezone: "America/New_York".to_string(),
            duration_minutes: 45,
        }
    }

    #[tokio::test]
    async fn test_check_availability_posts_camel_case() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/availability"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(json!({"date": "2025-05-02", "durationMinutes": 45})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"available": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpBookingClient::new(
            Some(server.uri()),
            Some("secret".to_string()),
            Duration::from_secs(2),
        );
        let value = client.check_availability(&availability()).await.unwrap();
        assert_eq!(value["available"], true);
    }

    #[tokio::test]
    async fn test_error_status_with_json_body_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bookings"))
            .respond_with(
                ResponseTemplate::new(409).set_body_json(json!({"ok": false, "error": "Slot taken"})),
            )
            .mount(&server)
            .await;

        let client = HttpBookingClient::new(Some(server.uri()), None, Duration::from_secs(2));
        let value = client
            .book_appointment(&BookingRequest {
                business_id: "biz".to_string(),
                start: "2025-05-02T10:00:00".to_string(),
                timezone: "America/New_York".to_string(),
                service: None,
                guest_name: "Sam".to_string(),
                guest_email: None,
                guest_phone: Some("+15551234567".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(value["error"], "Slot taken");
    }

    #[tokio::test]
    async fn test_error_status_without_json_is_request_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = HttpBookingClient::new(Some(server.uri()), None, Duration::from_secs(2));
        let err = client.check_availability(&availability()).await.unwrap_err();
        assert!(matches!(err, BookingError::Request(_)));
    }

    #[tokio::test]
    async fn test_unconfigured_client() {
        let client = HttpBookingClient::new(None, None, Duration::from_secs(2));
        let err = client.check_availability(&availability()).await.unwrap_err();
        assert!(matches!(err, BookingError::NotConfigured));
    }
}
