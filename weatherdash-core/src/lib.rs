//! Core library for the `weatherdash` CLI.
//!
//! This crate defines:
//! - The single-fetch weather contract ([`WeatherProvider::fetch`])
//! - Provider adapters (OpenWeatherMap, WeatherAPI.com, a generic flat-JSON endpoint)
//! - The normalized [`WeatherRecord`] and the [`FetchError`] taxonomy
//! - Configuration & credentials handling
//!
//! It is used by `weatherdash-cli`, but can also be reused by other front ends.

pub mod config;
pub mod credential;
pub mod error;
pub mod model;
pub mod provider;

pub use config::{Config, ProviderConfig};
pub use credential::Credential;
pub use error::{FetchError, ProviderError};
pub use model::{Coordinates, Units, WeatherRecord};
pub use provider::{
    ProviderId, ProviderSettings, WeatherProvider, default_provider_from_config,
    provider_from_config,
};
