use serde::Serialize;

use crate::domain::pricing::{EventSignal, WeatherReading};
use crate::pricing::math::{median, population_std_dev};

pub const FEATURE_NAMES: [&str; 9] = [
    "bias",
    "current_price",
    "comp_median",
    "comp_std",
    "temp_c",
    "is_hot",
    "is_rain",
    "top_event_popularity",
    "min_event_distance",
];

pub const HOT_THRESHOLD_C: f64 = 30.0;

/// Distance reported when there are no events nearby.
pub const NO_EVENT_DISTANCE_KM: f64 = 999.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector {
    pub bias: f64,
    pub current_price: f64,
    pub comp_median: f64,
    pub comp_std: f64,
    pub temp_c: f64,
    pub is_hot: f64,
    pub is_rain: f64,
    pub top_event_popularity: f64,
    pub min_event_distance: f64,
}

impl FeatureVector {
    pub fn derive(
        current_price: f64,
        competitor_prices: &[f64],
        weather: Option<&WeatherReading>,
        events: &[EventSignal],
    ) -> Self {
        let temp_c = weather.map(|w| w.temperature_c).unwrap_or(0.0);
        let is_rain = weather.is_some_and(WeatherReading::is_rainy);

        let top_event_popularity = events
            .iter()
            .map(|e| e.popularity.rank())
            .max()
            .unwrap_or(0);
        let min_event_distance = events
            .iter()
            .map(|e| e.distance_km)
            .reduce(f64::min)
            .unwrap_or(NO_EVENT_DISTANCE_KM);

        Self {
            bias: 1.0,
            current_price,
            comp_median: median(competitor_prices),
            comp_std: population_std_dev(competitor_prices),
            temp_c,
            is_hot: indicator(temp_c >= HOT_THRESHOLD_C),
            is_rain: indicator(is_rain),
            top_event_popularity: f64::from(top_event_popularity),
            min_event_distance,
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        let v = match name {
            "bias" => self.bias,
            "current_price" => self.current_price,
            "comp_median" => self.comp_median,
            "comp_std" => self.comp_std,
            "temp_c" => self.temp_c,
            "is_hot" => self.is_hot,
            "is_rain" => self.is_rain,
            "top_event_popularity" => self.top_event_popularity,
            "min_event_distance" => self.min_event_distance,
            _ => return None,
        };
        Some(v)
    }

    /// Features in their canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES
            .iter()
            .filter_map(move |name| self.get(name).map(|v| (*name, v)))
    }
}

fn indicator(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}
