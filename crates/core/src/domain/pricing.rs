use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub current_price: f64,
    #[serde(default)]
    pub competitor_prices: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    #[serde(alias = "temperature")]
    pub temperature_c: f64,
    #[serde(default)]
    pub condition: String,
}

impl WeatherReading {
    pub fn normalized_condition(&self) -> String {
        self.condition.trim().to_lowercase()
    }

    pub fn is_rainy(&self) -> bool {
        matches!(
            self.normalized_condition().as_str(),
            "rain" | "thunderstorm" | "drizzle"
        )
    }
}

/// Ordinal popularity of a nearby event. Ordering is Low < Medium < High.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Popularity {
    #[default]
    Low,
    Medium,
    High,
}

impl Popularity {
    pub fn rank(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSignal {
    pub name: String,
    #[serde(default)]
    pub popularity: Popularity,
    pub distance_km: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.lat.is_finite() && (-90.0..=90.0).contains(&self.lat),
            "lat must be within -90..=90 (got {})",
            self.lat
        );
        anyhow::ensure!(
            self.lon.is_finite() && (-180.0..=180.0).contains(&self.lon),
            "lon must be within -180..=180 (got {})",
            self.lon
        );
        Ok(())
    }
}

/// A single entry of a recommendation's factor breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactorValue {
    Number(f64),
    Text(String),
    Weights(BTreeMap<String, f64>),
}

impl FactorValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for FactorValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for FactorValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<BTreeMap<String, f64>> for FactorValue {
    fn from(v: BTreeMap<String, f64>) -> Self {
        Self::Weights(v)
    }
}

pub type Factors = BTreeMap<String, FactorValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Rules,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub recommended_price: f64,
    pub factors: Factors,
    pub reasoning: String,
    pub strategy: Strategy,
}

impl RecommendationResult {
    pub fn factor(&self, key: &str) -> Option<f64> {
        self.factors.get(key).and_then(FactorValue::as_f64)
    }
}
