use crate::config::Settings;
use crate::domain::pricing::{Location, WeatherReading};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const DEFAULT_TIMEOUT_SECS: u64 = 8;

#[derive(Debug, Clone)]
pub struct WeatherObservation {
    pub reading: WeatherReading,
    pub raw: Value,
}

#[async_trait::async_trait]
pub trait WeatherProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Current conditions at `location`; `None` when the provider has no temperature for it.
    async fn fetch_current(&self, location: Location) -> Result<Option<WeatherObservation>>;
}

#[derive(Debug, Clone)]
pub struct OpenWeatherMapClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherMapClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.require_owm_api_key()?.to_string();

        let base_url = std::env::var("OWM_BASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("OWM_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build weather http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }
}

#[async_trait::async_trait]
impl WeatherProvider for OpenWeatherMapClient {
    fn provider_name(&self) -> &'static str {
        "OWM"
    }

    async fn fetch_current(&self, location: Location) -> Result<Option<WeatherObservation>> {
        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
                ("lat", location.lat.to_string()),
                ("lon", location.lon.to_string()),
            ])
            .send()
            .await
            .context("weather request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read weather response")?;
        let raw = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("weather response is not valid JSON: {text}"))?;

        if !status.is_success() {
            anyhow::bail!("weather provider HTTP {status}: {raw}");
        }

        let reading = parse_current_weather(&raw)?;
        Ok(reading.map(|reading| WeatherObservation { reading, raw }))
    }
}

#[derive(Debug, Deserialize)]
struct OwmCurrent {
    #[serde(default)]
    main: Option<OwmMain>,
    #[serde(default)]
    weather: Vec<OwmCondition>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    #[serde(default)]
    main: String,
}

fn parse_current_weather(raw: &Value) -> Result<Option<WeatherReading>> {
    let parsed = serde_json::from_value::<OwmCurrent>(raw.clone())
        .context("failed to parse weather response")?;

    let Some(temperature_c) = parsed.main.and_then(|m| m.temp) else {
        return Ok(None);
    };
    let condition = parsed
        .weather
        .into_iter()
        .next()
        .map(|c| c.main)
        .unwrap_or_default();

    Ok(Some(WeatherReading {
        temperature_c,
        condition,
    }))
}
