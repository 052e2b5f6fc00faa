use crate::{
    Config, Credential, FetchError, ProviderError, Units, WeatherRecord,
    provider::{generic::GenericProvider, openweather::OpenWeatherProvider, weatherapi::WeatherApiProvider},
};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::Value;
use std::{convert::TryFrom, fmt::Debug, time::Duration};
use tracing::debug;

pub mod generic;
pub mod openweather;
pub mod weatherapi;

/// Bound on a whole request, connect through body.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenWeather,
    WeatherApi,
    Generic,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "openweather",
            ProviderId::WeatherApi => "weatherapi",
            ProviderId::Generic => "generic",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenWeather, ProviderId::WeatherApi, ProviderId::Generic]
    }

    /// Environment variable that overrides the stored API key.
    pub fn env_var(&self) -> String {
        format!("WEATHERDASH_{}_API_KEY", self.as_str().to_uppercase())
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openweather" => Ok(ProviderId::OpenWeather),
            "weatherapi" => Ok(ProviderId::WeatherApi),
            "generic" => Ok(ProviderId::Generic),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openweather, weatherapi, generic."
            )),
        }
    }
}

/// Fetches current weather for one city from one provider.
///
/// Every call issues at most one request and ends in exactly one record or
/// one error. Implementations hold no per-call state and never store the
/// credential.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    async fn fetch(&self, city: &str, credential: &Credential) -> Result<WeatherRecord, FetchError>;
}

/// Non-secret settings an adapter is built from.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub units: Units,
    pub timeout: Duration,
    /// Overrides the adapter's default endpoint. Required for `generic`.
    pub base_url: Option<String>,
    pub city_param: Option<String>,
    pub key_param: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            units: Units::default(),
            timeout: DEFAULT_TIMEOUT,
            base_url: None,
            city_param: None,
            key_param: None,
        }
    }
}

/// Construct a provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let settings = config.provider_settings(id);

    let boxed: Box<dyn WeatherProvider> = match id {
        ProviderId::OpenWeather => Box::new(OpenWeatherProvider::new(settings)?),
        ProviderId::WeatherApi => Box::new(WeatherApiProvider::new(settings)?),
        ProviderId::Generic => Box::new(GenericProvider::new(settings)?),
    };

    Ok(boxed)
}

/// Construct the default provider from config, using `default_provider` field.
pub fn default_provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let id = config.default_provider_id()?;
    provider_from_config(id, config)
}

pub(crate) fn build_client(timeout: Duration) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Trimmed, non-empty city or `EmptyCity`.
pub(crate) fn require_city(city: &str) -> Result<&str, FetchError> {
    let city = city.trim();
    if city.is_empty() { Err(FetchError::EmptyCity) } else { Ok(city) }
}

/// Send one GET and read the whole body. Never retries.
pub(crate) async fn get_text(
    http: &Client,
    url: &str,
    query: &[(&str, &str)],
    timeout: Duration,
) -> Result<(StatusCode, String), ProviderError> {
    debug!(url, "sending current weather request");

    let res = http
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|err| transport_error(err, timeout))?;

    let status = res.status();
    let body = res.text().await.map_err(|err| transport_error(err, timeout))?;

    debug!(status = status.as_u16(), bytes = body.len(), "provider responded");
    Ok((status, body))
}

/// The request URL carries the credential, so it is stripped before formatting.
fn transport_error(err: reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        return ProviderError::Timeout(timeout);
    }

    let stage = if err.is_connect() {
        "connection failed"
    } else if err.is_body() || err.is_decode() {
        "failed to read response body"
    } else if err.is_builder() {
        "invalid request"
    } else {
        "request failed"
    };

    ProviderError::Transport(format!("{stage}: {}", err.without_url()))
}

pub(crate) fn status_reason(code: u16) -> &'static str {
    match code {
        400 => "bad request, invalid parameters",
        401 => "unauthorized, invalid API key",
        403 => "forbidden, API key blocked",
        404 => "not found",
        429 => "too many requests, rate limit exceeded",
        500 => "internal server error",
        502 => "bad gateway",
        503 => "service unavailable",
        _ => "unexpected status",
    }
}

pub(crate) fn status_error(code: u16, message: Option<&str>) -> ProviderError {
    let reason = status_reason(code);
    let detail = match message.map(str::trim).filter(|m| !m.is_empty()) {
        Some(message) => format!("{reason}: {}", truncate_body(message)),
        None => reason.to_string(),
    };

    ProviderError::Status { code, detail }
}

pub(crate) fn malformed_json(err: serde_json::Error) -> ProviderError {
    ProviderError::MalformedBody(format!("invalid JSON ({err})"))
}

/// Present and non-blank, or `MissingField(field)`.
pub(crate) fn require_text(value: Option<String>, field: &'static str) -> Result<String, ProviderError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ProviderError::MissingField(field))
}

/// Humidity as a whole percentage. Fractional readings are rounded to the
/// nearest integer; anything outside 0-100 is a malformed response.
pub(crate) fn humidity_pct(value: Option<f64>) -> Result<Option<u8>, ProviderError> {
    match value {
        None => Ok(None),
        Some(v) if (0.0..=100.0).contains(&v) => Ok(Some(v.round() as u8)),
        Some(v) => Err(ProviderError::MalformedBody(format!("humidity {v} is outside 0-100"))),
    }
}

/// Visibility in whole metres; negative or non-finite readings are dropped.
pub(crate) fn visibility_m(value: Option<f64>) -> Option<u32> {
    value
        .filter(|v| v.is_finite() && *v >= 0.0 && *v <= f64::from(u32::MAX))
        .map(|v| v.round() as u32)
}

/// `deserialize_with` for optional fields: a value of the wrong type becomes
/// `None` instead of failing the whole body. Pair with `#[serde(default)]`.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        let head: String = body.chars().take(MAX).collect();
        format!("{head}...")
    } else {
        body.to_string()
    }
}
