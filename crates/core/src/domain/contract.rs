use crate::domain::pricing::{
    EventSignal, Factors, Location, PriceQuote, RecommendationResult, WeatherReading,
};
use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestRequest {
    pub menu_item_id: i64,
    pub current_price: f64,
    pub competitor_prices: Vec<f64>,
    #[serde(default)]
    pub weather: Option<WeatherReading>,
    #[serde(default)]
    pub events: Option<Vec<EventSignal>>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestResponse {
    pub menu_item_id: i64,
    pub recommended_price: f64,
    pub factors: Factors,
    pub reasoning: String,
}

impl SuggestResponse {
    pub fn new(menu_item_id: i64, result: RecommendationResult) -> Self {
        Self {
            menu_item_id,
            recommended_price: result.recommended_price,
            factors: result.factors,
            reasoning: result.reasoning,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorPricesIn {
    pub menu_item_id: i64,
    pub competitor_prices: Vec<f64>,
}

/// A request that passed validation.
///
/// `weather`/`events` stay `None` when the caller did not supply them, so they can be fetched.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub menu_item_id: i64,
    pub quote: PriceQuote,
    pub weather: Option<WeatherReading>,
    pub events: Option<Vec<EventSignal>>,
    pub location: Option<Location>,
    pub payload: Value,
}

impl SuggestRequest {
    pub fn validate_and_into_inputs(self) -> anyhow::Result<ValidatedRequest> {
        ensure_price("current_price", self.current_price)?;
        validate_competitor_prices(&self.competitor_prices)?;

        if let Some(w) = &self.weather {
            ensure!(
                w.temperature_c.is_finite(),
                "weather temperature must be finite (got {})",
                w.temperature_c
            );
        }

        for e in self.events.iter().flatten() {
            ensure!(!e.name.trim().is_empty(), "event name must be non-empty");
            ensure!(
                e.distance_km.is_finite() && e.distance_km >= 0.0,
                "event distance_km must be >= 0 (got {} for {})",
                e.distance_km,
                e.name
            );
        }

        let location = match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => {
                let loc = Location { lat, lon };
                loc.validate()?;
                Some(loc)
            }
            (None, None) => None,
            _ => anyhow::bail!("lat and lon must be given together"),
        };

        let payload = serde_json::to_value(&self).context("serialize request payload failed")?;

        // An empty list counts as "not supplied", same as a missing one.
        let events = self.events.filter(|events| !events.is_empty());

        Ok(ValidatedRequest {
            menu_item_id: self.menu_item_id,
            quote: PriceQuote {
                current_price: self.current_price,
                competitor_prices: self.competitor_prices,
            },
            weather: self.weather,
            events,
            location,
            payload,
        })
    }
}

impl CompetitorPricesIn {
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_competitor_prices(&self.competitor_prices)
    }
}

fn ensure_price(field: &str, price: f64) -> anyhow::Result<()> {
    ensure!(
        price.is_finite() && price >= 0.0,
        "{field} must be a finite price >= 0 (got {price})"
    );
    Ok(())
}

fn validate_competitor_prices(prices: &[f64]) -> anyhow::Result<()> {
    for (idx, p) in prices.iter().enumerate() {
        ensure_price(&format!("competitor_prices[{idx}]"), *p)?;
    }
    Ok(())
}
