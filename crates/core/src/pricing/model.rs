use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use crate::domain::pricing::{
    EventSignal, Factors, PriceQuote, RecommendationResult, Strategy, WeatherReading,
};
use crate::pricing::error::PricingError;
use crate::pricing::features::{FeatureVector, FEATURE_NAMES};

/// A model that turns a feature vector into a price.
pub trait PricePredictor: Send + Sync {
    fn name(&self) -> &'static str;

    fn predict(&self, features: &FeatureVector) -> f64;

    /// Model-specific part of the factor breakdown.
    fn factors(&self, features: &FeatureVector) -> Factors;

    fn reasoning(&self) -> String;
}

/// Supplies a ready-to-use predictor, or explains why none is available.
pub trait ModelSource: Send + Sync {
    fn load(&self) -> Result<Arc<dyn PricePredictor>, PricingError>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearModel {
    coefficients: BTreeMap<String, f64>,
}

impl LinearModel {
    pub fn new(coefficients: BTreeMap<String, f64>) -> Self {
        Self { coefficients }
    }

    /// Parses a flat JSON object of feature name to weight.
    ///
    /// Keys that are not model features are ignored whatever their value; known features must be
    /// numeric. Missing features weigh 0.
    pub fn from_json_str(text: &str, origin: &str) -> Result<Self, PricingError> {
        let parsed: Value =
            serde_json::from_str(text).map_err(|e| PricingError::config_load(origin, e))?;
        let Value::Object(obj) = parsed else {
            return Err(PricingError::config_load(
                origin,
                "coefficients must be a JSON object",
            ));
        };

        let mut coefficients = BTreeMap::new();
        for name in FEATURE_NAMES {
            let Some(raw) = obj.get(name) else {
                continue;
            };
            let weight = raw.as_f64().ok_or_else(|| {
                PricingError::config_load(origin, format!("coefficient `{name}` is not a number"))
            })?;
            coefficients.insert(name.to_string(), weight);
        }

        Ok(Self { coefficients })
    }

    pub fn weight(&self, feature: &str) -> f64 {
        self.coefficients.get(feature).copied().unwrap_or(0.0)
    }
}

impl PricePredictor for LinearModel {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn predict(&self, features: &FeatureVector) -> f64 {
        features
            .iter()
            .map(|(name, value)| self.weight(name) * value)
            .sum()
    }

    fn factors(&self, features: &FeatureVector) -> Factors {
        let used: BTreeMap<String, f64> = features
            .iter()
            .map(|(name, _)| (name.to_string(), self.weight(name)))
            .collect();

        let mut factors = Factors::new();
        factors.insert("model".into(), self.name().into());
        factors.insert("coefficients_used".into(), used.into());
        factors
    }

    fn reasoning(&self) -> String {
        "ML linear regression prediction".to_string()
    }
}

/// Always hands out the same predictor. Handy for tests and for embedding a fixed model.
impl ModelSource for Arc<dyn PricePredictor> {
    fn load(&self) -> Result<Arc<dyn PricePredictor>, PricingError> {
        Ok(Arc::clone(self))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: SystemTime,
    len: u64,
}

#[derive(Debug)]
struct CachedModel {
    stamp: FileStamp,
    model: Arc<LinearModel>,
}

/// Linear coefficients stored as JSON on disk.
///
/// The parsed model is cached and re-read whenever the file's modification time or size changes.
#[derive(Debug)]
pub struct CoefficientsFile {
    path: PathBuf,
    cache: RwLock<Option<CachedModel>>,
}

impl CoefficientsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn origin(&self) -> String {
        self.path.display().to_string()
    }

    fn stamp(&self) -> Result<FileStamp, PricingError> {
        let meta =
            std::fs::metadata(&self.path).map_err(|e| PricingError::config_load(self.origin(), e))?;
        let modified = meta
            .modified()
            .map_err(|e| PricingError::config_load(self.origin(), e))?;
        Ok(FileStamp {
            modified,
            len: meta.len(),
        })
    }

    pub fn load_model(&self) -> Result<Arc<LinearModel>, PricingError> {
        let stamp = self.stamp()?;

        if let Ok(guard) = self.cache.read() {
            if let Some(cached) = guard.as_ref().filter(|c| c.stamp == stamp) {
                return Ok(Arc::clone(&cached.model));
            }
        }

        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| PricingError::config_load(self.origin(), e))?;
        let model = Arc::new(LinearModel::from_json_str(&text, &self.origin())?);

        tracing::info!(path = %self.path.display(), "loaded model coefficients");

        if let Ok(mut guard) = self.cache.write() {
            *guard = Some(CachedModel {
                stamp,
                model: Arc::clone(&model),
            });
        }
        Ok(model)
    }
}

impl ModelSource for CoefficientsFile {
    fn load(&self) -> Result<Arc<dyn PricePredictor>, PricingError> {
        let model: Arc<dyn PricePredictor> = self.load_model()?;
        Ok(model)
    }
}

/// Prices with a model. No guardrails or rounding are applied on this path.
pub fn recommend_by_model(
    quote: &PriceQuote,
    weather: Option<&WeatherReading>,
    events: &[EventSignal],
    predictor: &dyn PricePredictor,
) -> Result<RecommendationResult, PricingError> {
    let features = FeatureVector::derive(
        quote.current_price,
        &quote.competitor_prices,
        weather,
        events,
    );

    let prediction = predictor.predict(&features);
    if !prediction.is_finite() {
        return Err(PricingError::NonFinitePrediction {
            model: predictor.name(),
            value: prediction,
        });
    }

    Ok(RecommendationResult {
        recommended_price: prediction,
        factors: predictor.factors(&features),
        reasoning: predictor.reasoning(),
        strategy: Strategy::Model,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pricing::FactorValue;
    use std::io::Write;
    use std::time::Duration;

    fn quote() -> PriceQuote {
        PriceQuote {
            current_price: 250.0,
            competitor_prices: vec![240.0, 260.0, 245.0],
        }
    }

    fn write_coeffs(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn predicts_weighted_sum_of_features() {
        let model = LinearModel::from_json_str(
            r#"{"bias": 10, "current_price": 0.5, "comp_median": 0.5, "is_hot": 7}"#,
            "inline",
        )
        .unwrap();
        let w = WeatherReading {
            temperature_c: 31.0,
            condition: "Clear".to_string(),
        };
        let res = recommend_by_model(&quote(), Some(&w), &[], &model).unwrap();
        // 10 + 125 + 122.5 + 7
        assert_eq!(res.recommended_price, 264.5);
        assert_eq!(res.strategy, Strategy::Model);
        assert_eq!(res.reasoning, "ML linear regression prediction");
    }

    #[test]
    fn reports_coefficients_for_every_feature() {
        let model = LinearModel::from_json_str(r#"{"bias": 3, "extra": "ignored"}"#, "inline")
            .unwrap();
        let res = recommend_by_model(&quote(), None, &[], &model).unwrap();

        assert_eq!(res.factors.get("model").and_then(FactorValue::as_str), Some("linear"));
        let Some(FactorValue::Weights(used)) = res.factors.get("coefficients_used") else {
            panic!("missing coefficients_used");
        };
        assert_eq!(used.len(), FEATURE_NAMES.len());
        assert_eq!(used.get("bias"), Some(&3.0));
        assert_eq!(used.get("comp_std"), Some(&0.0));
        assert!(!used.contains_key("extra"));
    }

    #[test]
    fn model_output_is_neither_guarded_nor_rounded() {
        let model = LinearModel::from_json_str(r#"{"current_price": 3.3333}"#, "inline").unwrap();
        let res = recommend_by_model(&quote(), None, &[], &model).unwrap();
        // Far above the competitor ceiling (286) and not a multiple of 5.
        assert!((res.recommended_price - 833.325).abs() < 1e-9);
    }

    #[test]
    fn rejects_malformed_coefficients() {
        for text in ["not json", "[1, 2]", r#"{"bias": "1.0"}"#, r#"{"temp_c": null}"#] {
            let err = LinearModel::from_json_str(text, "inline").unwrap_err();
            assert!(matches!(err, PricingError::ConfigLoad { .. }), "{text}: {err}");
        }
    }

    #[test]
    fn non_finite_prediction_is_an_error() {
        let model = LinearModel::from_json_str(r#"{"bias": 1e308, "current_price": 1e308}"#, "inline")
            .unwrap();
        let err = recommend_by_model(&quote(), None, &[], &model).unwrap_err();
        assert!(matches!(err, PricingError::NonFinitePrediction { model: "linear", .. }));
    }

    #[test]
    fn missing_file_is_a_config_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = CoefficientsFile::new(dir.path().join("absent.json"));
        assert!(matches!(source.load(), Err(PricingError::ConfigLoad { .. })));
    }

    #[test]
    fn file_is_reread_after_it_changes() {
        let f = write_coeffs(r#"{"bias": 1}"#);
        let source = CoefficientsFile::new(f.path());

        let first = source.load_model().unwrap();
        assert_eq!(first.weight("bias"), 1.0);
        let again = source.load_model().unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        let mut file = std::fs::File::create(f.path()).unwrap();
        file.write_all(br#"{"bias": 2.5}"#).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(60))
            .unwrap();
        drop(file);

        let reloaded = source.load_model().unwrap();
        assert_eq!(reloaded.weight("bias"), 2.5);
    }
}
