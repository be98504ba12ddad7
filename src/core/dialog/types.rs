//! Structured output of the natural-language extraction step.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::core::session::SessionPatch;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Book,
    AskServices,
    Price,
    Cancel,
    #[default]
    #[serde(other)]
    Other,
}

fn lenient_intent<'de, D>(deserializer: D) -> Result<Intent, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => {
            let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
            serde_json::from_value(Value::String(normalized)).unwrap_or_default()
        }
        _ => Intent::Other,
    })
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let text = match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => return Ok(None),
    };
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" | "y" | "confirm" | "confirmed" => Some(true),
            "no" | "false" | "n" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// Fields extracted from one caller utterance. Transient: merged into the
/// session and then dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    #[serde(default, deserialize_with = "lenient_intent")]
    pub intent: Intent,
    #[serde(default, deserialize_with = "lenient_text")]
    pub service: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub time: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub timezone: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub confirmation: Option<bool>,
}

impl ExtractedFields {
    /// Result used when extraction fails: no intent, no fields.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Slot updates carried by this extraction.
    pub fn to_patch(&self) -> SessionPatch {
        SessionPatch {
            step: None,
            service: self.service.clone(),
            date: self.date.clone(),
            time: self.time.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            timezone: self.timezone.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_intent_parsing_is_lenient() {
        let parse = |v: Value| serde_json::from_value::<ExtractedFields>(json!({"intent": v})).unwrap().intent;
        assert_eq!(parse(json!("book")), Intent::Book);
        assert_eq!(parse(json!("ask_services")), Intent::AskServices);
        assert_eq!(parse(json!("Ask Services")), Intent::AskServices);
        assert_eq!(parse(json!("reschedule")), Intent::Other);
        assert_eq!(parse(json!(3)), Intent::Other);
        assert_eq!(parse(json!(null)), Intent::Other);
    }

    #[test]
    fn test_fields_blank_and_null_strings_are_absent() {
        let fields: ExtractedFields = serde_json::from_value(json!({
            "intent": "book",
            "service": "  ",
            "date": "null",
            "time": "10:00",
            "phone": 15551234567u64,
            "confirmation": "yes"
        }))
        .unwrap();

        assert!(fields.service.is_none());
        assert!(fields.date.is_none());
        assert_eq!(fields.time.as_deref(), Some("10:00"));
        assert_eq!(fields.phone.as_deref(), Some("15551234567"));
        assert_eq!(fields.confirmation, Some(true));
    }

    #[test]
    fn test_unknown_produces_empty_patch() {
        let fields = ExtractedFields::unknown();
        assert_eq!(fields.intent, Intent::Other);
        assert!(fields.to_patch().is_empty());
    }
}
