//! Field extraction through the OpenAI chat completions API in JSON mode.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{ExtractionContext, FieldExtractor, NluError};
use crate::core::dialog::ExtractedFields;

pub const OPENAI_API_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_NLU_MODEL: &str = "gpt-4o-mini";

const NLU_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

pub struct OpenAIFieldExtractor {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAIFieldExtractor {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        }
    }

    fn system_prompt(context: &ExtractionContext) -> String {
        let services = if context.service_names.is_empty() {
            "(none listed)".to_string()
        } else {
            context.service_names.join(", ")
        };
        format!(
            "You extract appointment booking details from a caller's message.\n\
             Today is {today} in timezone {tz}. Services offered: {services}.\n\
             Respond with a JSON object with keys: intent (one of book, ask_services, price, cancel, other), \
             service (exact name from the list or null), date (YYYY-MM-DD or null), time (HH:MM 24-hour or null), \
             timezone (IANA name or null), name, email, phone, confirmation (true, false or null).\n\
             Use null for anything the caller did not say.",
            today = context.today,
            tz = context.timezone,
        )
    }
}

#[async_trait]
impl FieldExtractor for OpenAIFieldExtractor {
    async fn extract(
        &self,
        text: &str,
        context: &ExtractionContext,
    ) -> Result<ExtractedFields, NluError> {
        let api_key = self.api_key.as_deref().ok_or(NluError::NotConfigured)?;

        let body = json!({
            "model": self.model,
            "temperature": 0,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": Self::system_prompt(context)},
                {"role": "user", "content": text},
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .timeout(NLU_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| NluError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NluError::Status(response.status().as_u16()));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| NluError::InvalidResponse(e.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| NluError::InvalidResponse("no message content".to_string()))?;

        debug!(content = %content, "NLU extraction result");

        serde_json::from_str(&content).map_err(|e| NluError::InvalidResponse(e.to_string()))
    }
}
