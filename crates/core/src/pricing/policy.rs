use crate::domain::pricing::{
    EventSignal, Factors, PriceQuote, RecommendationResult, WeatherReading,
};
use crate::pricing::model::{recommend_by_model, ModelSource};
use crate::pricing::rules::recommend_by_rules;
use crate::pricing::PricingConfig;

/// Preferred entry point: the model strategy first, the rule-based strategy on any failure.
///
/// Reported factors always carry the configured internal/external weights.
pub fn suggest_price(
    quote: &PriceQuote,
    weather: Option<&WeatherReading>,
    events: &[EventSignal],
    config: &PricingConfig,
    models: &dyn ModelSource,
) -> RecommendationResult {
    let outcome = models
        .load()
        .and_then(|model| recommend_by_model(quote, weather, events, model.as_ref()));

    match outcome {
        Ok(mut result) => {
            let mut factors = Factors::new();
            factors.insert("internal_weight".into(), config.internal_weight.into());
            factors.insert("external_weight".into(), config.external_weight.into());
            factors.append(&mut result.factors);
            result.factors = factors;
            result
        }
        Err(err) => {
            tracing::warn!(error = %err, "model strategy unavailable; falling back to rules");
            recommend_by_rules(quote, weather, events, config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pricing::{FactorValue, Popularity, Strategy};
    use crate::pricing::error::PricingError;
    use crate::pricing::model::{CoefficientsFile, LinearModel, PricePredictor};
    use crate::pricing::FeatureVector;
    use std::io::Write;
    use std::sync::Arc;

    struct Unavailable;

    impl ModelSource for Unavailable {
        fn load(&self) -> Result<Arc<dyn PricePredictor>, PricingError> {
            Err(PricingError::config_load("memory", "nothing configured"))
        }
    }

    struct Diverging;

    impl PricePredictor for Diverging {
        fn name(&self) -> &'static str {
            "diverging"
        }

        fn predict(&self, _features: &FeatureVector) -> f64 {
            f64::NAN
        }

        fn factors(&self, _features: &FeatureVector) -> Factors {
            Factors::new()
        }

        fn reasoning(&self) -> String {
            "never returned".to_string()
        }
    }

    fn inputs() -> (PriceQuote, WeatherReading, Vec<EventSignal>) {
        (
            PriceQuote {
                current_price: 250.0,
                competitor_prices: vec![240.0, 260.0, 245.0],
            },
            WeatherReading {
                temperature_c: 32.0,
                condition: "Sunny".to_string(),
            },
            vec![EventSignal {
                name: "Fest".to_string(),
                popularity: Popularity::High,
                distance_km: 2.5,
                starts_at: None,
            }],
        )
    }

    #[test]
    fn missing_coefficients_fall_back_to_rules() {
        let (q, w, events) = inputs();
        let cfg = PricingConfig::default();
        let dir = tempfile::tempdir().unwrap();
        let source = CoefficientsFile::new(dir.path().join("ml_coeffs.json"));

        let suggested = suggest_price(&q, Some(&w), &events, &cfg, &source);
        assert_eq!(suggested, recommend_by_rules(&q, Some(&w), &events, &cfg));
    }

    #[test]
    fn corrupt_coefficients_fall_back_to_rules() {
        let (q, w, events) = inputs();
        let cfg = PricingConfig::default();
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"{ truncated").unwrap();
        let source = CoefficientsFile::new(f.path());

        let suggested = suggest_price(&q, Some(&w), &events, &cfg, &source);
        assert_eq!(suggested, recommend_by_rules(&q, Some(&w), &events, &cfg));
        assert_eq!(suggested.strategy, Strategy::Rules);
    }

    #[test]
    fn any_model_source_failure_falls_back() {
        let (q, _, _) = inputs();
        let cfg = PricingConfig::default();
        let suggested = suggest_price(&q, None, &[], &cfg, &Unavailable);
        assert_eq!(suggested, recommend_by_rules(&q, None, &[], &cfg));
    }

    #[test]
    fn non_finite_prediction_falls_back() {
        let (q, _, _) = inputs();
        let cfg = PricingConfig::default();
        let source: Arc<dyn PricePredictor> = Arc::new(Diverging);
        let suggested = suggest_price(&q, None, &[], &cfg, &source);
        assert_eq!(suggested.strategy, Strategy::Rules);
    }

    #[test]
    fn model_result_carries_configured_weights() {
        let (q, w, events) = inputs();
        let cfg = PricingConfig {
            internal_weight: 0.7,
            external_weight: 0.3,
            ..PricingConfig::default()
        };
        let model: Arc<dyn PricePredictor> =
            Arc::new(LinearModel::from_json_str(r#"{"comp_median": 1.0}"#, "inline").unwrap());

        let res = suggest_price(&q, Some(&w), &events, &cfg, &model);
        assert_eq!(res.strategy, Strategy::Model);
        assert_eq!(res.recommended_price, 245.0);
        assert_eq!(res.factor("internal_weight"), Some(0.7));
        assert_eq!(res.factor("external_weight"), Some(0.3));
        assert_eq!(res.factors.get("model").and_then(FactorValue::as_str), Some("linear"));
        assert!(res.factors.contains_key("coefficients_used"));
    }

    // The model path is deliberately left unguarded, unlike the rule-based path.
    #[test]
    fn model_path_skips_guardrails_that_rules_apply() {
        let (q, _, _) = inputs();
        let cfg = PricingConfig::default();
        let model: Arc<dyn PricePredictor> =
            Arc::new(LinearModel::from_json_str(r#"{"bias": 999.0}"#, "inline").unwrap());

        let via_model = suggest_price(&q, None, &[], &cfg, &model);
        let via_rules = recommend_by_rules(&q, None, &[], &cfg);
        assert_eq!(via_model.recommended_price, 999.0);
        assert!(via_rules.recommended_price <= 260.0 * cfg.max_markup_over_max_comp);
    }
}
