use crate::domain::pricing::{
    EventSignal, Factors, Popularity, PriceQuote, RecommendationResult, Strategy, WeatherReading,
};
use crate::pricing::error::PricingError;
use crate::pricing::features::HOT_THRESHOLD_C;
use crate::pricing::math::{median, round_dp, round_to_step};
use crate::pricing::PricingConfig;

const RAIN_MULTIPLIER: f64 = 1.06;
const HOT_AND_SUNNY_MULTIPLIER: f64 = 1.08;
const SNOW_MULTIPLIER: f64 = 1.04;

const MIN_DISTANCE_DECAY: f64 = 0.7;
const DECAY_RADIUS_KM: f64 = 10.0;
const MAX_EVENTS_MULTIPLIER: f64 = 1.25;

pub fn weather_multiplier(weather: Option<&WeatherReading>) -> f64 {
    let Some(w) = weather else {
        return 1.0;
    };

    if w.is_rainy() {
        return RAIN_MULTIPLIER;
    }
    match w.normalized_condition().as_str() {
        "sunny" | "clear" if w.temperature_c >= HOT_THRESHOLD_C => HOT_AND_SUNNY_MULTIPLIER,
        "snow" => SNOW_MULTIPLIER,
        _ => 1.0,
    }
}

fn popularity_factor(popularity: Popularity) -> f64 {
    match popularity {
        Popularity::Low => 1.00,
        Popularity::Medium => 1.05,
        Popularity::High => 1.12,
    }
}

/// Product of per-event popularity × distance decay, capped so many events cannot run away.
pub fn events_multiplier(events: &[EventSignal]) -> f64 {
    if events.is_empty() {
        return 1.0;
    }

    let total: f64 = events
        .iter()
        .map(|e| {
            let decay = (1.0 - e.distance_km / DECAY_RADIUS_KM).max(MIN_DISTANCE_DECAY);
            popularity_factor(e.popularity) * decay
        })
        .product();

    total.min(MAX_EVENTS_MULTIPLIER)
}

/// Floor and ceiling derived from the competitor price extremes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Guardrails {
    pub min: f64,
    pub max: f64,
}

impl Guardrails {
    pub fn from_competitors(
        competitor_prices: &[f64],
        config: &PricingConfig,
    ) -> Result<Self, PricingError> {
        let finite = competitor_prices.iter().copied().filter(|p| p.is_finite());
        let (lo, hi) = finite.fold(None, |acc: Option<(f64, f64)>, p| match acc {
            None => Some((p, p)),
            Some((lo, hi)) => Some((lo.min(p), hi.max(p))),
        })
        .ok_or(PricingError::EmptyCompetitorSet)?;

        Ok(Self {
            min: lo * config.min_discount_below_min_comp,
            max: hi * config.max_markup_over_max_comp,
        })
    }

    /// Raises to the floor first, then caps at the ceiling.
    pub fn apply(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }
}

pub fn recommend_by_rules(
    quote: &PriceQuote,
    weather: Option<&WeatherReading>,
    events: &[EventSignal],
    config: &PricingConfig,
) -> RecommendationResult {
    let comp_median = median(&quote.competitor_prices);
    let internal_anchor = if comp_median > 0.0 {
        0.5 * quote.current_price + 0.5 * comp_median
    } else {
        quote.current_price
    };

    let w_mult = weather_multiplier(weather);
    let e_mult = events_multiplier(events);
    let external_multiplier = w_mult * e_mult;

    let raw = internal_anchor
        * (config.internal_weight + config.external_weight * external_multiplier);

    let mut reasoning = Vec::new();
    if let Some(w) = weather {
        reasoning.push(format!(
            "Weather {} {}°C → x{w_mult:.2}",
            w.condition, w.temperature_c
        ));
    }
    if !events.is_empty() {
        reasoning.push(format!("Events impact → x{e_mult:.2}"));
    }

    let guarded = match Guardrails::from_competitors(&quote.competitor_prices, config) {
        Ok(guards) => guards.apply(raw),
        Err(PricingError::EmptyCompetitorSet) => {
            reasoning.push("No competitor prices → guardrails skipped".to_string());
            raw
        }
        Err(err) => {
            tracing::warn!(error = %err, "unexpected guardrail failure; skipping guardrails");
            raw
        }
    };
    let recommended_price = round_to_step(guarded, config.rounding_step);

    reasoning.push(format!(
        "Internal anchor based on current & competitors → {internal_anchor:.2}"
    ));

    let mut factors = Factors::new();
    factors.insert("internal_weight".into(), config.internal_weight.into());
    factors.insert("external_weight".into(), config.external_weight.into());
    factors.insert("weather_multiplier".into(), round_dp(w_mult, 3).into());
    factors.insert("events_multiplier".into(), round_dp(e_mult, 3).into());

    tracing::debug!(
        internal_anchor,
        weather_multiplier = w_mult,
        events_multiplier = e_mult,
        raw,
        recommended_price,
        "rule-based recommendation"
    );

    RecommendationResult {
        recommended_price,
        factors,
        reasoning: reasoning.join("; "),
        strategy: Strategy::Rules,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(current_price: f64, competitor_prices: &[f64]) -> PriceQuote {
        PriceQuote {
            current_price,
            competitor_prices: competitor_prices.to_vec(),
        }
    }

    fn weather(temperature_c: f64, condition: &str) -> WeatherReading {
        WeatherReading {
            temperature_c,
            condition: condition.to_string(),
        }
    }

    fn event(popularity: Popularity, distance_km: f64) -> EventSignal {
        EventSignal {
            name: "Fest".to_string(),
            popularity,
            distance_km,
            starts_at: None,
        }
    }

    #[test]
    fn festival_on_a_hot_day() {
        let w = weather(32.0, "Sunny");
        let events = [event(Popularity::High, 2.5)];
        let res = recommend_by_rules(
            &quote(250.0, &[240.0, 260.0, 245.0]),
            Some(&w),
            &events,
            &PricingConfig::default(),
        );

        // raw = 247.5 * (0.6 + 0.4 * 1.08 * 0.84) = 238.31, which rounds up to 240.
        assert!(res.recommended_price >= 240.0);
        assert_eq!(res.recommended_price, 240.0);
        assert!(res.factor("weather_multiplier").unwrap() >= 1.0);
        assert_eq!(res.factor("weather_multiplier"), Some(1.08));
        assert_eq!(res.factor("events_multiplier"), Some(0.84));
        assert_eq!(res.factor("internal_weight"), Some(0.6));
        assert_eq!(res.factor("external_weight"), Some(0.4));
        assert_eq!(res.strategy, Strategy::Rules);
        assert_eq!(
            res.reasoning,
            "Weather Sunny 32°C → x1.08; Events impact → x0.84; \
             Internal anchor based on current & competitors → 247.50"
        );
    }

    #[test]
    fn identical_inputs_give_identical_output() {
        let w = weather(12.0, "Rain");
        let events = [event(Popularity::Medium, 1.0)];
        let q = quote(180.0, &[170.0, 200.0]);
        let cfg = PricingConfig::default();
        assert_eq!(
            recommend_by_rules(&q, Some(&w), &events, &cfg),
            recommend_by_rules(&q, Some(&w), &events, &cfg)
        );
    }

    #[test]
    fn weather_multiplier_table() {
        assert_eq!(weather_multiplier(None), 1.0);
        assert_eq!(weather_multiplier(Some(&weather(10.0, "rain"))), 1.06);
        assert_eq!(weather_multiplier(Some(&weather(35.0, "Thunderstorm"))), 1.06);
        assert_eq!(weather_multiplier(Some(&weather(-2.0, "Snow"))), 1.04);
        assert_eq!(weather_multiplier(Some(&weather(31.0, "Clear"))), 1.08);
        assert_eq!(weather_multiplier(Some(&weather(31.0, "Clouds"))), 1.0);
    }

    #[test]
    fn sunny_multiplier_starts_at_thirty_degrees() {
        assert_eq!(weather_multiplier(Some(&weather(29.9, "Sunny"))), 1.0);
        assert_eq!(weather_multiplier(Some(&weather(30.0, "Sunny"))), 1.08);
    }

    #[test]
    fn events_multiplier_is_capped() {
        let events: Vec<_> = (0..5).map(|_| event(Popularity::High, 0.0)).collect();
        let m = events_multiplier(&events);
        assert!(m <= 1.25);
        assert_eq!(m, 1.25);
    }

    #[test]
    fn distant_events_decay_to_floor() {
        assert_eq!(events_multiplier(&[]), 1.0);
        // Decay bottoms out at 0.7 beyond 3 km.
        assert!((events_multiplier(&[event(Popularity::Low, 50.0)]) - 0.7).abs() < 1e-12);
        assert!((events_multiplier(&[event(Popularity::Medium, 0.0)]) - 1.05).abs() < 1e-12);
    }

    #[test]
    fn price_is_held_within_guardrails() {
        let cfg = PricingConfig::default();
        let half_step = f64::from(cfg.rounding_step) / 2.0;
        let cases: [(f64, &[f64]); 5] = [
            (1000.0, &[100.0, 120.0]),
            (10.0, &[100.0, 120.0]),
            (250.0, &[240.0, 260.0, 245.0]),
            (0.0, &[55.0]),
            (75.0, &[60.0, 62.0, 300.0, 90.0]),
        ];
        let hot = weather(40.0, "Sunny");
        let crowd: Vec<_> = (0..4).map(|_| event(Popularity::High, 0.0)).collect();

        for (current, comps) in cases {
            let guards = Guardrails::from_competitors(comps, &cfg).unwrap();
            for (w, evs) in [(None, &[][..]), (Some(&hot), &crowd[..])] {
                let res = recommend_by_rules(&quote(current, comps), w, evs, &cfg);
                assert!(
                    res.recommended_price >= guards.min - half_step
                        && res.recommended_price <= guards.max + half_step,
                    "{} outside [{}, {}] for current={current}",
                    res.recommended_price,
                    guards.min,
                    guards.max
                );
            }
        }
    }

    #[test]
    fn runaway_current_price_is_capped_at_competitor_ceiling() {
        let res = recommend_by_rules(
            &quote(1000.0, &[100.0, 120.0]),
            None,
            &[],
            &PricingConfig::default(),
        );
        // ceiling 132 rounds to 130
        assert_eq!(res.recommended_price, 130.0);
    }

    #[test]
    fn empty_competitor_set_skips_guardrails() {
        assert_eq!(
            Guardrails::from_competitors(&[], &PricingConfig::default()),
            Err(PricingError::EmptyCompetitorSet)
        );

        let res = recommend_by_rules(&quote(1000.0, &[]), None, &[], &PricingConfig::default());
        // Anchor falls back to the current price and nothing clamps it.
        assert_eq!(res.recommended_price, 1000.0);
        assert!(res.reasoning.contains("guardrails skipped"));
        assert!(res.reasoning.ends_with("→ 1000.00"));
    }

    #[test]
    fn respects_injected_configuration() {
        let cfg = PricingConfig {
            internal_weight: 1.0,
            external_weight: 0.0,
            rounding_step: 1,
            ..PricingConfig::default()
        };
        let w = weather(10.0, "Rain");
        let res = recommend_by_rules(&quote(101.0, &[99.0, 101.0]), Some(&w), &[], &cfg);
        // External weight 0 leaves the anchor (100.5) untouched; the tie rounds away from zero.
        assert_eq!(res.recommended_price, 101.0);
        assert_eq!(res.factor("weather_multiplier"), Some(1.06));
        assert_eq!(res.factor("external_weight"), Some(0.0));
    }
}
