//! Adapter for any endpoint that already speaks the flat record schema:
//!
//! ```json
//! {"city": "London", "temp": 15.2, "condition": "cloudy", "humidity": 70}
//! ```
//!
//! Not-found is HTTP 404. URL and parameter names come from configuration.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

use crate::{
    Credential, FetchError, ProviderError, Units,
    model::{Coordinates, WeatherRecord},
    provider::{
        ProviderId, ProviderSettings, build_client, get_text, humidity_pct, malformed_json,
        lenient, non_blank, require_city, require_text, status_error, visibility_m,
    },
};

use super::WeatherProvider;

pub const DEFAULT_CITY_PARAM: &str = "city";
pub const DEFAULT_KEY_PARAM: &str = "key";

#[derive(Debug, Clone)]
pub struct GenericProvider {
    http: Client,
    url: String,
    city_param: String,
    key_param: String,
    units: Units,
    timeout: Duration,
}

impl GenericProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let url = settings.base_url.ok_or_else(|| {
            anyhow!(
                "Provider 'generic' has no base_url configured.\n\
                 Hint: run `weatherdash configure generic` and enter the endpoint URL."
            )
        })?;

        Ok(Self {
            http: build_client(settings.timeout)?,
            url,
            city_param: settings.city_param.unwrap_or_else(|| DEFAULT_CITY_PARAM.to_string()),
            key_param: settings.key_param.unwrap_or_else(|| DEFAULT_KEY_PARAM.to_string()),
            units: settings.units,
            timeout: settings.timeout,
        })
    }

    #[instrument(skip(self, credential), fields(provider = "generic"))]
    async fn fetch_current(
        &self,
        city: &str,
        credential: &Credential,
    ) -> Result<WeatherRecord, FetchError> {
        let query_city = require_city(city)?;

        let (status, body) = get_text(
            &self.http,
            &self.url,
            &[
                (self.city_param.as_str(), query_city),
                (self.key_param.as_str(), credential.expose()),
                ("units", self.units.as_str()),
            ],
            self.timeout,
        )
        .await?;

        interpret(status, &body, city, self.units)
    }
}

#[async_trait]
impl WeatherProvider for GenericProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Generic
    }

    async fn fetch(&self, city: &str, credential: &Credential) -> Result<WeatherRecord, FetchError> {
        self.fetch_current(city, credential)
            .await
            .map_err(|err| err.redact(credential.expose()))
    }
}

/// `city`, `temp` and `condition` are required and strictly typed; the rest
/// are dropped when mistyped.
#[derive(Debug, Deserialize)]
struct FlatRecord {
    city: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    country: Option<String>,
    temp: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    feels_like: Option<f64>,
    condition: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    humidity: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pressure: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    wind_speed: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    visibility: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    lon: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    icon: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    observed_at: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    message: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    error: Option<String>,
}

fn interpret(
    status: StatusCode,
    body: &str,
    city: &str,
    units: Units,
) -> Result<WeatherRecord, FetchError> {
    if status == StatusCode::NOT_FOUND {
        return Err(FetchError::CityNotFound(city.to_string()));
    }

    let parsed = serde_json::from_str::<FlatRecord>(body);

    if !status.is_success() {
        let message = parsed.ok().and_then(|r| r.message.or(r.error));
        return Err(status_error(status.as_u16(), message.as_deref()).into());
    }

    let rec = parsed.map_err(malformed_json)?;

    let name = require_text(rec.city, "city")?;
    let temperature = rec.temp.ok_or(ProviderError::MissingField("temp"))?;
    let condition = require_text(rec.condition, "condition")?;

    let coordinates = match (rec.lat, rec.lon) {
        (Some(lat), Some(lon)) => Some(Coordinates { lat, lon }),
        _ => None,
    };

    Ok(WeatherRecord {
        city: name,
        country: non_blank(rec.country),
        temperature,
        feels_like: rec.feels_like,
        condition,
        humidity: humidity_pct(rec.humidity)?,
        pressure_hpa: rec.pressure,
        wind_speed: rec.wind_speed,
        visibility_m: visibility_m(rec.visibility),
        coordinates,
        icon: non_blank(rec.icon),
        units,
        observed_at: rec.observed_at.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
        retrieved_at: Utc::now(),
    })
}
