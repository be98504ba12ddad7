use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use thiserror::Error;
use tracing::{debug, warn};

use super::profile::BusinessProfile;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("Profile source not configured")]
    NotConfigured,
    #[error("Profile request failed: {0}")]
    Request(String),
    #[error("Profile service returned status {0}")]
    Status(u16),
    #[error("Invalid profile payload: {0}")]
    InvalidPayload(String),
}

/// Resolves a business identifier to its profile.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn load(&self, business_id: &str) -> Result<BusinessProfile, ProfileError>;
}

/// Loads the profile, substituting [`BusinessProfile::fallback`] on any failure.
pub async fn load_or_fallback(source: &dyn ProfileSource, business_id: &str) -> BusinessProfile {
    match source.load(business_id).await {
        Ok(profile) => profile,
        Err(e) => {
            warn!(business_id = %business_id, error = %e, "Using fallback business profile");
            BusinessProfile::fallback(business_id)
        }
    }
}

/// Profile source backed by `GET {base_url}/businesses/{id}` with an in-memory TTL cache.
pub struct HttpProfileSource {
    client: reqwest::Client,
    base_url: Option<String>,
    cache: Cache<String, BusinessProfile>,
}

impl HttpProfileSource {
    pub fn new(base_url: Option<String>, cache_ttl: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
            cache: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(cache_ttl)
                .build(),
        }
    }

    async fn fetch(&self, base_url: &str, business_id: &str) -> Result<BusinessProfile, ProfileError> {
        let url = format!("{base_url}/businesses/{business_id}");
        debug!(url = %url, "Fetching business profile");

        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| ProfileError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProfileError::Status(response.status().as_u16()));
        }

        response
            .json::<BusinessProfile>()
            .await
            .map_err(|e| ProfileError::InvalidPayload(e.to_string()))
    }
}

#[async_trait]
impl ProfileSource for HttpProfileSource {
    async fn load(&self, business_id: &str) -> Result<BusinessProfile, ProfileError> {
        let Some(base_url) = self.base_url.as_deref() else {
            return Err(ProfileError::NotConfigured);
        };

        self.cache
            .try_get_with(business_id.to_string(), self.fetch(base_url, business_id))
            .await
            .map_err(|e: Arc<ProfileError>| (*e).clone())
    }
}

/// Fixed in-memory profiles, keyed by business identifier.
#[derive(Debug, Default, Clone)]
pub struct StaticProfileSource {
    profiles: std::collections::HashMap<String, BusinessProfile>,
}

impl StaticProfileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, business_id: impl Into<String>, profile: BusinessProfile) -> Self {
        self.profiles.insert(business_id.into(), profile);
        self
    }
}

#[async_trait]
impl ProfileSource for StaticProfileSource {
    async fn load(&self, business_id: &str) -> Result<BusinessProfile, ProfileError> {
        self.profiles
            .get(business_id)
            .cloned()
            .ok_or_else(|| ProfileError::Request(format!("unknown business {business_id}")))
    }
}
