//! Business profiles: display name, timezone and the bookable service catalog.

mod profile;
mod source;

pub use profile::{
    BusinessProfile, DEFAULT_SERVICE_MINUTES, FALLBACK_SERVICE_NAME, ServiceOffering,
};
pub use source::{
    HttpProfileSource, ProfileError, ProfileSource, StaticProfileSource, load_or_fallback,
};
