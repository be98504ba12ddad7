//! Shared application state.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tracing::info;

use crate::config::ServerConfig;
use crate::core::booking::{BookingApi, HttpBookingClient};
use crate::core::bridge::{BridgeServices, ToolExecutor};
use crate::core::business::{HttpProfileSource, ProfileSource};
use crate::core::dialog::TurnPipeline;
use crate::core::nlu::{FieldExtractor, OpenAIFieldExtractor};
use crate::core::prompt::{PromptFormatter, ReceptionistPrompt};
use crate::core::realtime::{ModelConnector, OpenAIConnector};
use crate::core::session::SessionStore;
use crate::core::telemetry::TelemetrySidecar;

/// Why a WebSocket connection was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionLimitError {
    GlobalLimitReached,
    PerIpLimitReached,
}

/// External collaborators. [`AppState::new`] builds the HTTP-backed set from
/// configuration; tests substitute their own.
#[derive(Clone)]
pub struct Services {
    pub booking: Arc<dyn BookingApi>,
    pub profiles: Arc<dyn ProfileSource>,
    pub extractor: Arc<dyn FieldExtractor>,
    pub connector: Arc<dyn ModelConnector>,
    pub prompts: Arc<dyn PromptFormatter>,
    pub telemetry: TelemetrySidecar,
}

impl Services {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            booking: Arc::new(HttpBookingClient::new(
                config.booking_api_url.clone(),
                config.booking_api_key.clone(),
                config.booking_timeout(),
            )),
            profiles: Arc::new(HttpProfileSource::new(
                config.profile_api_url.clone(),
                config.profile_cache_ttl(),
            )),
            extractor: Arc::new(OpenAIFieldExtractor::new(
                config.openai_base_url.clone(),
                config.openai_api_key.clone(),
                config.nlu_model.clone(),
            )),
            connector: Arc::new(OpenAIConnector::new(
                config.openai_api_key.clone(),
                &config.realtime_model,
                &config.realtime_voice,
            )),
            prompts: Arc::new(ReceptionistPrompt::new(config.default_timezone.clone())),
            telemetry: TelemetrySidecar::new(
                config.telemetry_url.clone(),
                config.telemetry_timeout(),
            ),
        }
    }
}

pub struct AppState {
    pub config: ServerConfig,
    pub sessions: Arc<SessionStore>,
    pub pipeline: TurnPipeline,
    pub bridge: BridgeServices,

    ws_connections: AtomicUsize,
    ip_connections: DashMap<IpAddr, u32>,
}

impl AppState {
    pub async fn new(config: ServerConfig) -> Arc<Self> {
        let services = Services::from_config(&config);
        Self::with_services(config, services)
    }

    pub fn with_services(config: ServerConfig, services: Services) -> Arc<Self> {
        let sessions = Arc::new(SessionStore::new(config.session_ttl()));
        Self::with_store(config, services, sessions)
    }

    /// Build with a caller-supplied session store (e.g. one on a manual clock).
    pub fn with_store(
        config: ServerConfig,
        services: Services,
        sessions: Arc<SessionStore>,
    ) -> Arc<Self> {
        let pipeline = TurnPipeline::new(
            sessions.clone(),
            services.telemetry.clone(),
            services.booking.clone(),
            services.profiles.clone(),
            services.extractor.clone(),
            config.default_timezone.clone(),
        );
        let bridge = BridgeServices {
            connector: services.connector,
            prompts: services.prompts,
            profiles: services.profiles,
            tools: ToolExecutor::new(services.booking, config.default_timezone.clone()),
            telemetry: services.telemetry.clone(),
            sessions: sessions.clone(),
        };

        info!(
            telemetry = services.telemetry.is_enabled(),
            session_ttl_secs = config.session_ttl_seconds,
            "Application state initialised"
        );

        Arc::new(Self {
            config,
            sessions,
            pipeline,
            bridge,
            ws_connections: AtomicUsize::new(0),
            ip_connections: DashMap::new(),
        })
    }

    /// Reserve a WebSocket slot for `ip`.
    pub fn try_acquire_connection(&self, ip: IpAddr) -> Result<(), ConnectionLimitError> {
        let max_global = self.config.max_websocket_connections;
        self.ws_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| match max_global {
                Some(max) if current >= max => None,
                _ => Some(current + 1),
            })
            .map_err(|_| ConnectionLimitError::GlobalLimitReached)?;

        let mut per_ip = self.ip_connections.entry(ip).or_insert(0);
        if *per_ip >= self.config.max_connections_per_ip {
            drop(per_ip);
            self.ws_connections.fetch_sub(1, Ordering::SeqCst);
            return Err(ConnectionLimitError::PerIpLimitReached);
        }
        *per_ip += 1;
        Ok(())
    }

    pub fn release_connection(&self, ip: IpAddr) {
        let _ = self
            .ws_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| c.checked_sub(1));

        if let Some(mut count) = self.ip_connections.get_mut(&ip) {
            *count = count.saturating_sub(1);
        }
        self.ip_connections.remove_if(&ip, |_, count| *count == 0);
    }

    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::SeqCst)
    }

    pub fn ip_connection_count(&self, ip: &IpAddr) -> u32 {
        self.ip_connections.get(ip).map(|c| *c).unwrap_or(0)
    }
}
