//! Business profile and a tolerant service catalog.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Duration used when a service is unknown or carries no usable duration.
pub const DEFAULT_SERVICE_MINUTES: u32 = 30;

/// Name of the single service offered when the real catalog cannot be loaded.
pub const FALLBACK_SERVICE_NAME: &str = "General appointment";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOffering {
    pub name: String,
    pub duration_minutes: Option<u32>,
    pub price: Option<String>,
}

impl ServiceOffering {
    /// Builds an offering from an arbitrary catalog entry. Returns `None` for
    /// entries without a usable name.
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(name) => non_blank(name).map(|name| Self {
                name,
                duration_minutes: None,
                price: None,
            }),
            Value::Object(map) => {
                let name = map
                    .get("name")
                    .or_else(|| map.get("title"))
                    .and_then(Value::as_str)
                    .and_then(non_blank)?;
                let duration_minutes = map
                    .get("durationMinutes")
                    .or_else(|| map.get("duration_minutes"))
                    .or_else(|| map.get("duration"))
                    .and_then(parse_minutes);
                let price = map.get("price").and_then(|p| match p {
                    Value::String(s) => non_blank(s),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                });
                Some(Self {
                    name,
                    duration_minutes,
                    price,
                })
            }
            _ => None,
        }
    }
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_minutes(value: &Value) -> Option<u32> {
    let minutes = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (minutes.is_finite() && minutes >= 1.0 && minutes <= 24.0 * 60.0).then(|| minutes.round() as u32)
}

fn lenient_services<'de, D>(deserializer: D) -> Result<Vec<ServiceOffering>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items.iter().filter_map(ServiceOffering::from_value).collect(),
        _ => Vec::new(),
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_str).and_then(non_blank))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessProfile {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub timezone: Option<String>,
    #[serde(default, deserialize_with = "lenient_services")]
    pub services: Vec<ServiceOffering>,
}

impl BusinessProfile {
    /// Profile substituted when the real one cannot be loaded: one generic
    /// 30-minute service.
    pub fn fallback(business_id: &str) -> Self {
        Self {
            id: Some(business_id.to_string()),
            name: None,
            timezone: None,
            services: vec![ServiceOffering {
                name: FALLBACK_SERVICE_NAME.to_string(),
                duration_minutes: Some(DEFAULT_SERVICE_MINUTES),
                price: None,
            }],
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("our office")
    }

    pub fn service_names(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name.as_str()).collect()
    }

    /// Case-insensitive lookup by service name.
    pub fn find_service(&self, name: &str) -> Option<&ServiceOffering> {
        let wanted = name.trim();
        self.services
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(wanted))
    }

    /// Duration of the named service, or [`DEFAULT_SERVICE_MINUTES`].
    pub fn duration_for(&self, service: &str) -> u32 {
        self.find_service(service)
            .and_then(|s| s.duration_minutes)
            .unwrap_or(DEFAULT_SERVICE_MINUTES)
    }
}
