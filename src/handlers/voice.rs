//! Inbound call webhook.
//!
//! The telephony provider posts here when a call arrives; the TwiML reply
//! connects the call audio to `/media-stream` and passes the business and
//! caller through as stream parameters.

use std::sync::Arc;

use axum::{
    Form,
    extract::{Query, State, rejection::FormRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::info;

use crate::state::AppState;

pub const MEDIA_STREAM_PATH: &str = "/media-stream";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceQuery {
    #[serde(default)]
    pub business_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VoiceForm {
    #[serde(rename = "From", default)]
    pub from: Option<String>,
    #[serde(rename = "CallSid", default)]
    pub call_sid: Option<String>,
}

fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// WebSocket URL of the media stream endpoint. `public_url` wins over the
/// request's Host header; http schemes map to their ws counterparts.
pub fn stream_url(public_url: Option<&str>, host: Option<&str>) -> String {
    let base = match public_url.map(|u| u.trim().trim_end_matches('/')) {
        Some(url) if !url.is_empty() => {
            if let Some(rest) = url.strip_prefix("https://") {
                format!("wss://{rest}")
            } else if let Some(rest) = url.strip_prefix("http://") {
                format!("ws://{rest}")
            } else if url.starts_with("wss://") || url.starts_with("ws://") {
                url.to_string()
            } else {
                format!("wss://{url}")
            }
        }
        _ => format!("wss://{}", host.unwrap_or("localhost")),
    };
    format!("{base}{MEDIA_STREAM_PATH}")
}

/// Builds the `<Connect><Stream>` document.
pub fn connect_twiml(url: &str, business_id: &str, caller_phone: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<Response><Connect><Stream url="{}">"#,
            r#"<Parameter name="businessId" value="{}"/>"#,
            r#"<Parameter name="callerPhone" value="{}"/>"#,
            r#"</Stream></Connect></Response>"#
        ),
        xml_escape(url),
        xml_escape(business_id),
        xml_escape(caller_phone),
    )
}

pub async fn voice_webhook_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VoiceQuery>,
    headers: HeaderMap,
    form: Result<Form<VoiceForm>, FormRejection>,
) -> Response {
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let business_id = query.business_id.unwrap_or_default();
    let caller_phone = form.from.unwrap_or_default();
    let host = headers.get(header::HOST).and_then(|h| h.to_str().ok());
    let url = stream_url(state.config.public_url.as_deref(), host);

    info!(
        call_sid = ?form.call_sid,
        business_id = %business_id,
        "Inbound call, connecting media stream"
    );

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/xml")],
        connect_twiml(&url, business_id.trim(), caller_phone.trim()),
    )
        .into_response()
}
