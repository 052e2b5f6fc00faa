use chrono::Local;
use weatherdash_core::{FetchError, WeatherRecord};

/// Multi-line dashboard block for one record. Lines for absent optional
/// fields are left out, as is a section with nothing left to show.
pub fn dashboard(record: &WeatherRecord) -> String {
    let temp_unit = record.units.temperature_symbol();
    let speed_unit = record.units.speed_symbol();

    let location = match &record.country {
        Some(country) => format!("{}, {country}", record.city),
        None => record.city.clone(),
    };
    let retrieved = record.retrieved_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S");

    let mut lines = vec![
        format!("LOCATION:  {location}"),
        format!("RETRIEVED: {retrieved}"),
        String::new(),
        "TEMPERATURE".to_string(),
        format!("   Current: {:.1}{temp_unit}", record.temperature),
    ];
    if let Some(feels_like) = record.feels_like {
        lines.push(format!("   Feels like: {feels_like:.1}{temp_unit}"));
    }

    lines.push(String::new());
    lines.push("CONDITIONS".to_string());
    lines.push(format!("   Weather: {}", title_case(&record.condition)));

    let mut atmosphere = Vec::new();
    if let Some(humidity) = record.humidity {
        atmosphere.push(format!("   Humidity: {humidity}%"));
    }
    if let Some(pressure) = record.pressure_hpa {
        atmosphere.push(format!("   Pressure: {pressure:.0} hPa"));
    }
    if let Some(wind) = record.wind_speed {
        atmosphere.push(format!("   Wind Speed: {wind:.1} {speed_unit}"));
    }
    if let Some(visibility) = record.visibility_m {
        atmosphere.push(format!("   Visibility: {:.1} km", f64::from(visibility) / 1000.0));
    }
    if !atmosphere.is_empty() {
        lines.push(String::new());
        lines.push("ATMOSPHERIC DATA".to_string());
        lines.extend(atmosphere);
    }

    if let Some(coords) = record.coordinates {
        lines.push(String::new());
        lines.push("COORDINATES".to_string());
        lines.push(format!("   Latitude: {}°", coords.lat));
        lines.push(format!("   Longitude: {}°", coords.lon));
    }

    if let Some(icon) = &record.icon {
        lines.push(String::new());
        lines.push(format!("ICON CODE: {icon}"));
    }

    lines.join("\n")
}

/// What the user sees when a fetch fails.
pub fn failure(err: &FetchError) -> String {
    if err.is_user_correctable() {
        err.user_message()
    } else {
        format!(
            "{}\n\nTroubleshooting:\n\
             - Check your internet connection\n\
             - Ensure your API key is valid and active (`weatherdash configure <provider>`)\n\
             - Try again in a few moments if rate limited",
            err.user_message()
        )
    }
}

/// "broken clouds" -> "Broken Clouds"
fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use weatherdash_core::{Coordinates, ProviderError, Units};

    fn minimal() -> WeatherRecord {
        WeatherRecord {
            city: "London".into(),
            country: None,
            temperature: 15.2,
            feels_like: None,
            condition: "cloudy".into(),
            humidity: Some(70),
            pressure_hpa: None,
            wind_speed: None,
            visibility_m: None,
            coordinates: None,
            icon: None,
            units: Units::Metric,
            observed_at: None,
            retrieved_at: Utc::now(),
        }
    }

    #[test]
    fn minimal_record_omits_absent_lines() {
        let text = dashboard(&minimal());

        assert!(text.contains("LOCATION:  London\n"));
        assert!(text.contains("Current: 15.2°C"));
        assert!(text.contains("Weather: Cloudy"));
        assert!(text.contains("Humidity: 70%"));
        assert!(!text.contains("Feels like"));
        assert!(!text.contains("Pressure"));
        assert!(!text.contains("COORDINATES"));
        assert!(!text.contains("ICON CODE"));
    }

    #[test]
    fn full_record_renders_every_section() {
        let record = WeatherRecord {
            country: Some("GB".into()),
            feels_like: Some(14.6),
            condition: "broken clouds".into(),
            pressure_hpa: Some(1012.0),
            wind_speed: Some(4.1),
            visibility_m: Some(10_000),
            coordinates: Some(Coordinates { lat: 51.5085, lon: -0.1257 }),
            icon: Some("04d".into()),
            units: Units::Imperial,
            ..minimal()
        };

        let text = dashboard(&record);

        assert!(text.contains("LOCATION:  London, GB"));
        assert!(text.contains("Feels like: 14.6°F"));
        assert!(text.contains("Weather: Broken Clouds"));
        assert!(text.contains("Pressure: 1012 hPa"));
        assert!(text.contains("Wind Speed: 4.1 mph"));
        assert!(text.contains("Visibility: 10.0 km"));
        assert!(text.contains("Latitude: 51.5085°"));
        assert!(text.contains("ICON CODE: 04d"));
    }

    #[test]
    fn sections_are_separated_by_one_blank_line() {
        let record = WeatherRecord { humidity: None, ..minimal() };
        let text = dashboard(&record);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "LOCATION:  London");
        assert!(lines[1].starts_with("RETRIEVED: "));
        assert_eq!(
            &lines[2..],
            ["", "TEMPERATURE", "   Current: 15.2°C", "", "CONDITIONS", "   Weather: Cloudy"]
        );
        assert!(!text.contains("ATMOSPHERIC DATA"));
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn city_not_found_is_shown_verbatim() {
        let msg = failure(&FetchError::CityNotFound("Nonexistentville".into()));
        assert_eq!(msg, "City not found: Nonexistentville");
    }

    #[test]
    fn provider_failure_is_generic_with_tips() {
        let err = FetchError::from(ProviderError::Status { code: 500, detail: "boom".into() });
        let msg = failure(&err);

        assert!(msg.starts_with("Could not retrieve weather"));
        assert!(msg.contains("Troubleshooting"));
        assert!(!msg.contains("boom"));
    }

    #[test]
    fn title_case_handles_unicode_and_spacing() {
        assert_eq!(title_case("clear  sky"), "Clear Sky");
        assert_eq!(title_case("éclaircies"), "Éclaircies");
        assert_eq!(title_case(""), "");
    }
}
