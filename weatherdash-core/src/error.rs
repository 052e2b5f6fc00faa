//! Failure taxonomy of a single weather fetch.

use std::time::Duration;
use thiserror::Error;

/// Outcome of a fetch that produced no record.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("City name must not be empty")]
    EmptyCity,

    #[error("City not found: {0}")]
    CityNotFound(String),

    #[error("Could not retrieve weather: {0}")]
    Provider(#[from] ProviderError),
}

/// Everything that went wrong on the provider side: transport, status or schema.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {code}: {detail}")]
    Status { code: u16, detail: String },

    #[error("response is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unexpected response body: {0}")]
    MalformedBody(String),
}

impl FetchError {
    /// Text for the user. Provider failures collapse to one generic line.
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyCity => "Please enter a city name.".to_string(),
            Self::CityNotFound(city) => format!("City not found: {city}"),
            Self::Provider(_) => {
                "Could not retrieve weather. Check your connection and API key, then try again."
                    .to_string()
            }
        }
    }

    /// Detail worth logging, if any.
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            Self::Provider(err) => Some(err.to_string()),
            Self::EmptyCity | Self::CityNotFound(_) => None,
        }
    }

    /// Whether the user can fix this by changing the city input.
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, Self::EmptyCity | Self::CityNotFound(_))
    }

    /// Replace every occurrence of `secret` in the carried strings with `***`.
    pub fn redact(self, secret: &str) -> Self {
        if secret.is_empty() {
            return self;
        }
        match self {
            Self::Provider(err) => Self::Provider(err.redact(secret)),
            // The city is user input and is echoed back verbatim unless it is the key itself.
            Self::CityNotFound(city) => Self::CityNotFound(city.replace(secret, "***")),
            other => other,
        }
    }
}

impl ProviderError {
    fn redact(self, secret: &str) -> Self {
        match self {
            Self::Transport(msg) => Self::Transport(msg.replace(secret, "***")),
            Self::Status { code, detail } => Self::Status {
                code,
                detail: detail.replace(secret, "***"),
            },
            Self::MalformedBody(msg) => Self::MalformedBody(msg.replace(secret, "***")),
            other => other,
        }
    }
}
