//! Instruction text for the voice model.

use std::fmt::Write;

use crate::core::business::BusinessProfile;

/// Turns a business profile into system instructions for a realtime session.
pub trait PromptFormatter: Send + Sync {
    fn instructions(&self, profile: &BusinessProfile) -> String;
}

/// Front-desk receptionist persona that books appointments through the
/// `check_availability` and `book_appointment` tools.
#[derive(Debug, Clone)]
pub struct ReceptionistPrompt {
    default_timezone: String,
}

impl ReceptionistPrompt {
    pub fn new(default_timezone: impl Into<String>) -> Self {
        Self {
            default_timezone: default_timezone.into(),
        }
    }
}

impl PromptFormatter for ReceptionistPrompt {
    fn instructions(&self, profile: &BusinessProfile) -> String {
        let timezone = profile
            .timezone
            .as_deref()
            .unwrap_or(&self.default_timezone);

        let mut text = format!(
            "You are the friendly phone receptionist for {}. Keep answers short and \
             conversational; callers are on the phone.\n",
            profile.display_name()
        );

        if profile.services.is_empty() {
            text.push_str("Ask the caller what they would like to book.\n");
        } else {
            text.push_str("Services offered:\n");
            for service in &profile.services {
                let _ = write!(text, "- {}", service.name);
                if let Some(minutes) = service.duration_minutes {
                    let _ = write!(text, " ({minutes} min)");
                }
                if let Some(price) = &service.price {
                    let _ = write!(text, ", {price}");
                }
                text.push('\n');
            }
        }

        let _ = write!(
            text,
            "Collect the service, the date and time, the caller's name, and an email or phone \
             number. Dates use YYYY-MM-DD and times use HH:MM in the {timezone} timezone.\n\
             Call check_availability before booking. Only call book_appointment after it \
             reports the slot is available. If a tool fails, apologise and offer another time."
        );
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lists_catalog_and_timezone() {
        let profile: BusinessProfile = serde_json::from_value(json!({
            "name": "Waismo Fitness",
            "timezone": "America/Chicago",
            "services": [{"name": "Personal training", "durationMinutes": 60, "price": "$80"}]
        }))
        .unwrap();

        let text = ReceptionistPrompt::new("America/New_York").instructions(&profile);
        assert!(text.contains("Waismo Fitness"));
        assert!(text.contains("- Personal training (60 min), $80"));
        assert!(text.contains("America/Chicago"));
        assert!(!text.contains("America/New_York"));
    }

    #[test]
    fn test_empty_catalog_uses_default_timezone() {
        let profile: BusinessProfile = serde_json::from_value(json!({})).unwrap();
        let text = ReceptionistPrompt::new("Europe/London").instructions(&profile);
        assert!(text.contains("our office"));
        assert!(text.contains("what they would like to book"));
        assert!(text.contains("Europe/London"));
    }
}
