use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// Unit system the record's numbers are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
    Standard,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Standard => "standard",
        }
    }

    pub fn temperature_symbol(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
            Units::Standard => "K",
        }
    }

    pub fn speed_symbol(&self) -> &'static str {
        match self {
            Units::Imperial => "mph",
            Units::Metric | Units::Standard => "m/s",
        }
    }
}

impl std::fmt::Display for Units {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Units {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            "standard" | "kelvin" => Ok(Units::Standard),
            _ => Err(anyhow::anyhow!(
                "Unknown units '{value}'. Supported units: metric, imperial, standard."
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Normalized snapshot of current weather for one city.
///
/// Only built from a response that carried a city, a temperature and a
/// condition; everything else is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub city: String,
    pub country: Option<String>,
    pub temperature: f64,
    pub feels_like: Option<f64>,
    pub condition: String,
    pub humidity: Option<u8>,
    pub pressure_hpa: Option<f64>,
    pub wind_speed: Option<f64>,
    pub visibility_m: Option<u32>,
    pub coordinates: Option<Coordinates>,
    pub icon: Option<String>,
    pub units: Units,
    pub observed_at: Option<DateTime<Utc>>,
    pub retrieved_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_parse_is_case_insensitive_and_accepts_kelvin() {
        assert_eq!(Units::try_from("Metric").unwrap(), Units::Metric);
        assert_eq!(Units::try_from("IMPERIAL").unwrap(), Units::Imperial);
        assert_eq!(Units::try_from("kelvin").unwrap(), Units::Standard);
        assert_eq!(Units::try_from("standard").unwrap(), Units::Standard);
    }

    #[test]
    fn unknown_units_error() {
        let err = Units::try_from("furlongs").unwrap_err();
        assert!(err.to_string().contains("Unknown units"));
    }

    #[test]
    fn unit_symbols() {
        assert_eq!(Units::Metric.temperature_symbol(), "°C");
        assert_eq!(Units::Imperial.speed_symbol(), "mph");
        assert_eq!(Units::Standard.temperature_symbol(), "K");
        assert_eq!(Units::Standard.speed_symbol(), "m/s");
    }

    #[test]
    fn units_serialize_lowercase() {
        let json = serde_json::to_string(&Units::Imperial).unwrap();
        assert_eq!(json, "\"imperial\"");
    }
}
