use anyhow::Result;
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

const DEFAULT_BASE_URL: &str = "https://api.weatherapi.com/v1";

/// WeatherAPI.com error code for "No matching location found".
const NO_MATCHING_LOCATION: i64 = 1006;

const KELVIN_OFFSET: f64 = 273.15;

/// WeatherAPI.com current weather (`/current.json?key=..&q=..`).
///
/// The endpoint always answers in both metric and imperial; the configured
/// units pick which columns end up in the record.
#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    http: Client,
    url: String,
    units: Units,
    timeout: Duration,
}

impl WeatherApiProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let base = settings.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);

        Ok(Self {
            http: build_client(settings.timeout)?,
            url: format!("{}/current.json", base.trim_end_matches('/')),
            units: settings.units,
            timeout: settings.timeout,
        })
    }

    #[instrument(skip(self, credential), fields(provider = "weatherapi"))]
    async fn fetch_current(
        &self,
        city: &str,
        credential: &Credential,
    ) -> Result<WeatherRecord, FetchError> {
        let query_city = require_city(city)?;

        let (status, body) = get_text(
            &self.http,
            &self.url,
            &[("key", credential.expose()), ("q", query_city), ("aqi", "no")],
            self.timeout,
        )
        .await?;

        interpret(status, &body, city, self.units)
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::WeatherApi
    }

    async fn fetch(&self, city: &str, credential: &Credential) -> Result<WeatherRecord, FetchError> {
        self.fetch_current(city, credential)
            .await
            .map_err(|err| err.redact(credential.expose()))
    }
}

#[derive(Debug, Deserialize)]
struct WaError {
    code: Option<i64>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    country: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    icon: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    #[serde(default, deserialize_with = "lenient")]
    temp_c: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    temp_f: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    feelslike_c: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    feelslike_f: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    humidity: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    wind_kph: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    wind_mph: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pressure_mb: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    vis_km: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    last_updated_epoch: Option<i64>,
    condition: Option<WaCondition>,
}

#[derive(Debug, Deserialize)]
struct WaEnvelope {
    error: Option<WaError>,
    location: Option<WaLocation>,
    current: Option<WaCurrent>,
}

/// Pick the temperature column for `units`; standard is derived from Celsius.
fn temperature_in(units: Units, celsius: Option<f64>, fahrenheit: Option<f64>) -> Option<f64> {
    match units {
        Units::Metric => celsius,
        Units::Imperial => fahrenheit,
        Units::Standard => celsius.map(|c| c + KELVIN_OFFSET),
    }
}

fn interpret(
    status: StatusCode,
    body: &str,
    city: &str,
    units: Units,
) -> Result<WeatherRecord, FetchError> {
    let parsed = serde_json::from_str::<WaEnvelope>(body);

    let (error_code, message) = match &parsed {
        Ok(WaEnvelope { error: Some(err), .. }) => (err.code, err.message.clone()),
        _ => (None, None),
    };

    if error_code == Some(NO_MATCHING_LOCATION) {
        return Err(FetchError::CityNotFound(city.to_string()));
    }
    if !status.is_success() {
        return Err(status_error(status.as_u16(), message.as_deref()).into());
    }
    if error_code.is_some() {
        // An error object on a 2xx is still a failure; report it as a bad request.
        return Err(status_error(StatusCode::BAD_REQUEST.as_u16(), message.as_deref()).into());
    }

    let env = parsed.map_err(malformed_json)?;

    let location = env.location.ok_or(ProviderError::MissingField("location.name"))?;
    let name = require_text(location.name, "location.name")?;
    let current = env.current.ok_or(ProviderError::MissingField("current"))?;

    let temp_field = match units {
        Units::Imperial => "current.temp_f",
        Units::Metric | Units::Standard => "current.temp_c",
    };
    let temperature = temperature_in(units, current.temp_c, current.temp_f)
        .ok_or(ProviderError::MissingField(temp_field))?;

    let (text, icon) = match current.condition {
        Some(c) => (c.text, c.icon),
        None => (None, None),
    };
    let condition = require_text(text, "current.condition.text")?;

    let wind_speed = match units {
        Units::Imperial => current.wind_mph,
        Units::Metric | Units::Standard => current.wind_kph.map(|kph| kph / 3.6),
    };

    let coordinates = match (location.lat, location.lon) {
        (Some(lat), Some(lon)) => Some(Coordinates { lat, lon }),
        _ => None,
    };

    Ok(WeatherRecord {
        city: name,
        country: non_blank(location.country),
        temperature,
        feels_like: temperature_in(units, current.feelslike_c, current.feelslike_f),
        condition,
        humidity: humidity_pct(current.humidity)?,
        pressure_hpa: current.pressure_mb,
        wind_speed,
        visibility_m: visibility_m(current.vis_km.map(|km| km * 1000.0)),
        coordinates,
        icon: non_blank(icon),
        units,
        observed_at: current
            .last_updated_epoch
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
        retrieved_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KEY: &str = "wa-secret-key";

    fn paris_body() -> Value {
        json!({
            "location": {"name": "Paris", "country": "France", "lat": 48.87, "lon": 2.33},
            "current": {
                "last_updated_epoch": 1_700_000_100,
                "temp_c": 11.0,
                "temp_f": 51.8,
                "feelslike_c": 9.5,
                "feelslike_f": 49.1,
                "humidity": 82,
                "wind_kph": 18.0,
                "wind_mph": 11.2,
                "pressure_mb": 1008.0,
                "vis_km": 10.0,
                "condition": {"text": "Light rain", "icon": "//cdn.weatherapi.com/weather/64x64/day/296.png"}
            }
        })
    }

    fn provider(server: &MockServer, units: Units) -> WeatherApiProvider {
        WeatherApiProvider::new(ProviderSettings {
            base_url: Some(server.uri()),
            units,
            ..ProviderSettings::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn fetch_maps_metric_columns() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/current.json"))
            .and(query_param("key", KEY))
            .and(query_param("q", "Paris"))
            .respond_with(ResponseTemplate::new(200).set_body_json(paris_body()))
            .expect(1)
            .mount(&server)
            .await;

        let record = provider(&server, Units::Metric)
            .fetch("Paris", &Credential::new(KEY))
            .await
            .unwrap();

        assert_eq!(record.city, "Paris");
        assert_eq!(record.country.as_deref(), Some("France"));
        assert_eq!(record.temperature, 11.0);
        assert_eq!(record.feels_like, Some(9.5));
        assert_eq!(record.condition, "Light rain");
        assert_eq!(record.humidity, Some(82));
        assert_eq!(record.wind_speed, Some(5.0));
        assert_eq!(record.visibility_m, Some(10_000));
        assert_eq!(record.pressure_hpa, Some(1008.0));
    }

    #[tokio::test]
    async fn imperial_uses_fahrenheit_and_mph() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/current.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(paris_body()))
            .mount(&server)
            .await;

        let record = provider(&server, Units::Imperial)
            .fetch("Paris", &Credential::new(KEY))
            .await
            .unwrap();

        assert_eq!(record.temperature, 51.8);
        assert_eq!(record.feels_like, Some(49.1));
        assert_eq!(record.wind_speed, Some(11.2));
        assert_eq!(record.units, Units::Imperial);
    }

    #[test]
    fn standard_units_are_kelvin() {
        let record =
            interpret(StatusCode::OK, &paris_body().to_string(), "Paris", Units::Standard).unwrap();
        assert!((record.temperature - 284.15).abs() < 1e-9);
    }

    #[tokio::test]
    async fn no_matching_location_yields_city_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/current.json"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 1006, "message": "No matching location found."}
            })))
            .mount(&server)
            .await;

        let err = provider(&server, Units::Metric)
            .fetch("Nonexistentville", &Credential::new(KEY))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::CityNotFound(ref c) if c == "Nonexistentville"));
    }

    #[test]
    fn other_error_codes_are_provider_errors() {
        let body = json!({"error": {"code": 2006, "message": "API key is invalid."}}).to_string();
        let err = interpret(StatusCode::UNAUTHORIZED, &body, "Paris", Units::Metric).unwrap_err();

        assert_eq!(
            err.diagnostic().as_deref(),
            Some("HTTP 401: unauthorized, invalid API key: API key is invalid.")
        );
    }

    #[test]
    fn missing_temperature_column_is_provider_error() {
        let mut body = paris_body();
        body["current"].as_object_mut().unwrap().remove("temp_f");

        let err = interpret(StatusCode::OK, &body.to_string(), "Paris", Units::Imperial).unwrap_err();
        assert!(matches!(err, FetchError::Provider(ProviderError::MissingField("current.temp_f"))));

        // Metric still works from the remaining column.
        assert!(interpret(StatusCode::OK, &body.to_string(), "Paris", Units::Metric).is_ok());
    }

    #[test]
    fn missing_location_is_provider_error() {
        let mut body = paris_body();
        body.as_object_mut().unwrap().remove("location");

        let err = interpret(StatusCode::OK, &body.to_string(), "Paris", Units::Metric).unwrap_err();
        assert!(matches!(err, FetchError::Provider(ProviderError::MissingField("location.name"))));
    }

    #[test]
    fn mistyped_secondary_fields_are_dropped() {
        let mut body = paris_body();
        body["current"]["vis_km"] = json!("ten");
        body["current"]["wind_kph"] = json!(null);
        body["location"]["lat"] = json!("48.87");

        let record = interpret(StatusCode::OK, &body.to_string(), "Paris", Units::Metric).unwrap();

        assert_eq!(record.temperature, 11.0);
        assert_eq!(record.visibility_m, None);
        assert_eq!(record.wind_speed, None);
        assert_eq!(record.coordinates, None);
    }

    #[test]
    fn not_found_keeps_original_input() {
        let body = json!({"error": {"code": 1006, "message": "No matching location found."}}).to_string();
        let err = interpret(StatusCode::BAD_REQUEST, &body, " paris-ish ", Units::Metric).unwrap_err();
        assert!(matches!(err, FetchError::CityNotFound(ref c) if c == " paris-ish "));
    }
}
