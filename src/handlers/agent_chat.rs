//! Text turn endpoint.
//!
//! `POST /agent-chat` runs one dialogue turn for a call and returns the reply
//! together with the call's slot state.

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::dialog::TurnInput;
use crate::core::session::CallSession;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentChatRequest {
    #[serde(default)]
    pub business_id: Option<String>,
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub caller_phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AgentChatResponse {
    pub ok: bool,
    pub reply: String,
    pub state: CallSession,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl AgentChatRequest {
    /// `text`, else the content of the last user message.
    pub fn utterance(&self) -> Option<String> {
        non_blank(self.text.as_deref()).or_else(|| {
            self.messages
                .iter()
                .rev()
                .find(|m| m.role.eq_ignore_ascii_case("user"))
                .and_then(|m| non_blank(Some(&m.content)))
        })
    }

    /// Validate and normalise into a pipeline input.
    pub fn into_turn(self) -> AppResult<TurnInput> {
        let business_id = non_blank(self.business_id.as_deref())
            .ok_or_else(|| AppError::Validation("businessId is required".into()))?;
        let text = self
            .utterance()
            .ok_or_else(|| AppError::Validation("text is required".into()))?;
        let caller_phone = non_blank(self.caller_phone.as_deref());
        let call_id = non_blank(self.call_id.as_deref())
            .or_else(|| caller_phone.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(TurnInput {
            business_id,
            call_id,
            text,
            caller_phone,
        })
    }
}

pub async fn agent_chat_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AgentChatRequest>, JsonRejection>,
) -> AppResult<Json<AgentChatResponse>> {
    let Json(request) =
        payload.map_err(|e| AppError::Validation(format!("invalid request body: {}", e.body_text())))?;
    let turn = request.into_turn()?;

    debug!(call_id = %turn.call_id, business_id = %turn.business_id, "Agent chat turn");
    let call_id = turn.call_id.clone();
    let output = state.pipeline.handle_turn(turn).await?;
    info!(call_id = %call_id, step = ?output.state.step, "Agent chat reply");

    Ok(Json(AgentChatResponse {
        ok: true,
        reply: output.reply,
        state: output.state,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> AgentChatRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_text_wins_over_messages() {
        let req = request(serde_json::json!({
            "businessId": "biz",
            "callId": "c1",
            "text": "hello",
            "messages": [{"role": "user", "content": "ignored"}]
        }));
        assert_eq!(req.into_turn().unwrap().text, "hello");
    }

    #[test]
    fn test_last_user_message_used() {
        let req = request(serde_json::json!({
            "businessId": "biz",
            "messages": [
                {"role": "user", "content": "first"},
                {"role": "assistant", "content": "reply"},
                {"role": "user", "content": " second "},
                {"role": "assistant", "content": "latest assistant"}
            ],
            "callerPhone": "+15551234567"
        }));
        let turn = req.into_turn().unwrap();
        assert_eq!(turn.text, "second");
        assert_eq!(turn.call_id, "+15551234567");
    }

    #[test]
    fn test_missing_business_id_is_validation_error() {
        let req = request(serde_json::json!({"text": "hi"}));
        assert!(matches!(req.into_turn(), Err(AppError::Validation(m)) if m.contains("businessId")));
    }

    #[test]
    fn test_blank_text_is_validation_error() {
        let req = request(serde_json::json!({"businessId": "biz", "text": "  "}));
        assert!(matches!(req.into_turn(), Err(AppError::Validation(m)) if m.contains("text")));
    }

    #[test]
    fn test_generated_call_id() {
        let req = request(serde_json::json!({"businessId": "biz", "text": "hi"}));
        let turn = req.into_turn().unwrap();
        assert!(Uuid::parse_str(&turn.call_id).is_ok());
    }
}
