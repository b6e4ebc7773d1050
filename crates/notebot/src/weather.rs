//! Weather lookup against an Open-Meteo-compatible endpoint.
//!
//! One request, one short timeout, no retries and no caching. Every
//! failure mode (timeout, non-200, malformed payload) collapses into an
//! error the caller renders as a single "service unavailable" message.

use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use tracing::{debug, info};

/// Current conditions, already mapped to the fields the bot renders.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub temperature_c: f64,
    pub wind_speed_kmh: f64,
    pub humidity_pct: Option<f64>,
    pub weather_code: i64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentConditions,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    temperature_2m: f64,
    wind_speed_10m: f64,
    relative_humidity_2m: Option<f64>,
    weather_code: i64,
}

pub struct WeatherClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl WeatherClient {
    /// `base_url` without a trailing slash, e.g. `https://api.open-meteo.com`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            http_client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    fn forecast_url(&self) -> String {
        format!("{}/v1/forecast", self.base_url)
    }

    pub async fn fetch_current(&self, latitude: f64, longitude: f64) -> anyhow::Result<WeatherReport> {
        debug!("Requesting current weather for {}, {}", latitude, longitude);
        let response = self
            .http_client
            .get(self.forecast_url())
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                (
                    "current",
                    "temperature_2m,relative_humidity_2m,weather_code,wind_speed_10m".to_string(),
                ),
            ])
            .send()
            .await
            .context("weather request failed")?
            .error_for_status()
            .context("weather service returned an error status")?;

        let payload: ForecastResponse = response
            .json()
            .await
            .context("malformed weather payload")?;

        let report = WeatherReport {
            temperature_c: payload.current.temperature_2m,
            wind_speed_kmh: payload.current.wind_speed_10m,
            humidity_pct: payload.current.relative_humidity_2m,
            weather_code: payload.current.weather_code,
        };
        info!(
            "Weather data received: {}°C, code {}",
            report.temperature_c, report.weather_code
        );
        Ok(report)
    }
}

/// Fixed WMO-code lookup. Codes outside the table render as "unknown".
pub fn describe_weather_code(code: i64) -> &'static str {
    match code {
        0 => "clear sky ☀️",
        1 => "mainly clear 🌤",
        2 => "partly cloudy ⛅",
        3 => "overcast ☁️",
        45 => "fog 🌫",
        48 => "depositing rime fog 🌫",
        51 => "light drizzle 🌧",
        53 => "moderate drizzle 🌧",
        55 => "dense drizzle 🌧",
        61 => "slight rain 🌦",
        63 => "moderate rain 🌧",
        65 => "heavy rain 🌧",
        80 => "rain showers 🌧",
        95 => "thunderstorm ⛈",
        _ => "unknown",
    }
}

/// Human-readable block for the chat reply.
pub fn format_report(report: &WeatherReport) -> String {
    let mut text = format!(
        "🌤 Current weather:\n\
         • Temperature: {}°C\n\
         • Conditions: {}\n\
         • Wind speed: {} km/h",
        report.temperature_c,
        describe_weather_code(report.weather_code),
        report.wind_speed_kmh,
    );
    if let Some(humidity) = report.humidity_pct {
        text.push_str(&format!("\n• Humidity: {}%", humidity));
    }
    text
}
