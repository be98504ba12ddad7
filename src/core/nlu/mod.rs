//! Natural-language field extraction.
//!
//! The extractor is treated as a black box from utterance text to
//! [`ExtractedFields`]. Failures never reach the caller: they degrade to
//! [`ExtractedFields::unknown`], which leaves existing slots untouched.

mod openai;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::core::dialog::ExtractedFields;

pub use openai::{DEFAULT_NLU_MODEL, OPENAI_API_BASE_URL, OpenAIFieldExtractor};

#[derive(Debug, Error)]
pub enum NluError {
    #[error("NLU extractor not configured")]
    NotConfigured,
    #[error("NLU request failed: {0}")]
    Request(String),
    #[error("NLU returned status {0}")]
    Status(u16),
    #[error("NLU returned an unusable response: {0}")]
    InvalidResponse(String),
}

/// What the extractor knows about the conversation besides the utterance.
#[derive(Debug, Clone, Default)]
pub struct ExtractionContext {
    pub service_names: Vec<String>,
    pub timezone: String,
    /// `YYYY-MM-DD`, used to resolve relative dates.
    pub today: String,
}

#[async_trait]
pub trait FieldExtractor: Send + Sync {
    async fn extract(
        &self,
        text: &str,
        context: &ExtractionContext,
    ) -> Result<ExtractedFields, NluError>;
}

pub async fn extract_or_unknown(
    extractor: &dyn FieldExtractor,
    text: &str,
    context: &ExtractionContext,
) -> ExtractedFields {
    match extractor.extract(text, context).await {
        Ok(fields) => fields,
        Err(e) => {
            warn!(error = %e, "Field extraction failed, treating turn as intent=other");
            ExtractedFields::unknown()
        }
    }
}
