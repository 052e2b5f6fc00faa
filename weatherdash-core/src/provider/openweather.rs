use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
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

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// OpenWeatherMap current weather (`/weather?q=..&appid=..&units=..`).
///
/// Not-found is signalled either by HTTP 404 or by `"cod": "404"` in the body.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    http: Client,
    url: String,
    units: Units,
    timeout: Duration,
}

impl OpenWeatherProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let base = settings.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);

        Ok(Self {
            http: build_client(settings.timeout)?,
            url: format!("{}/weather", base.trim_end_matches('/')),
            units: settings.units,
            timeout: settings.timeout,
        })
    }

    #[instrument(skip(self, credential), fields(provider = "openweather"))]
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
                ("q", query_city),
                ("appid", credential.expose()),
                ("units", self.units.as_str()),
            ],
            self.timeout,
        )
        .await?;

        interpret(status, &body, city, self.units)
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenWeather
    }

    async fn fetch(&self, city: &str, credential: &Credential) -> Result<WeatherRecord, FetchError> {
        self.fetch_current(city, credential)
            .await
            .map_err(|err| err.redact(credential.expose()))
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    feels_like: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    humidity: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pressure: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    icon: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    #[serde(default, deserialize_with = "lenient")]
    speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    #[serde(default, deserialize_with = "lenient")]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwCoord {
    #[serde(default, deserialize_with = "lenient")]
    lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    lon: Option<f64>,
}

/// Every field optional: presence is checked after parsing so a missing
/// field becomes `MissingField` rather than an opaque serde error. Secondary
/// fields are lenient so a mistyped one is dropped instead of failing the body.
#[derive(Debug, Deserialize)]
struct OwEnvelope {
    cod: Option<Value>,
    message: Option<Value>,
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    dt: Option<i64>,
    main: Option<OwMain>,
    weather: Option<Vec<OwWeather>>,
    #[serde(default, deserialize_with = "lenient")]
    wind: Option<OwWind>,
    #[serde(default, deserialize_with = "lenient")]
    sys: Option<OwSys>,
    #[serde(default, deserialize_with = "lenient")]
    coord: Option<OwCoord>,
    #[serde(default, deserialize_with = "lenient")]
    visibility: Option<f64>,
}

/// `cod` arrives as a number on success and as a string on errors.
fn cod_of(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn interpret(
    status: StatusCode,
    body: &str,
    city: &str,
    units: Units,
) -> Result<WeatherRecord, FetchError> {
    let parsed = serde_json::from_str::<OwEnvelope>(body);

    let (cod, message) = match &parsed {
        Ok(env) => (
            env.cod.as_ref().and_then(cod_of),
            env.message.as_ref().and_then(Value::as_str).map(str::to_string),
        ),
        Err(_) => (None, None),
    };

    if status == StatusCode::NOT_FOUND || cod == Some(404) {
        return Err(FetchError::CityNotFound(city.to_string()));
    }
    if !status.is_success() {
        return Err(status_error(status.as_u16(), message.as_deref()).into());
    }
    if let Some(code) = cod.filter(|c| !(200..300).contains(c)) {
        return Err(status_error(code, message.as_deref()).into());
    }

    let env = parsed.map_err(malformed_json)?;

    let name = require_text(env.name, "name")?;
    let main = env.main.ok_or(ProviderError::MissingField("main.temp"))?;
    let temperature = main.temp.ok_or(ProviderError::MissingField("main.temp"))?;

    let primary = env.weather.and_then(|w| w.into_iter().next());
    let (description, icon) = match primary {
        Some(w) => (w.description, w.icon),
        None => (None, None),
    };
    let condition = require_text(description, "weather[0].description")?;

    let coordinates = match env.coord.map(|c| (c.lat, c.lon)) {
        Some((Some(lat), Some(lon))) => Some(Coordinates { lat, lon }),
        _ => None,
    };

    Ok(WeatherRecord {
        city: name,
        country: non_blank(env.sys.and_then(|s| s.country)),
        temperature,
        feels_like: main.feels_like,
        condition,
        humidity: humidity_pct(main.humidity)?,
        pressure_hpa: main.pressure,
        wind_speed: env.wind.and_then(|w| w.speed),
        visibility_m: visibility_m(env.visibility),
        coordinates,
        icon: non_blank(icon),
        units,
        observed_at: env.dt.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
        retrieved_at: Utc::now(),
    })
}
