pub mod error;
pub mod features;
pub mod math;
pub mod model;
pub mod policy;
pub mod rules;

pub use error::PricingError;
pub use features::FeatureVector;
pub use model::{CoefficientsFile, LinearModel, ModelSource, PricePredictor};
pub use policy::suggest_price;
pub use rules::recommend_by_rules;

use crate::config::parse_var;

/// Weights, guard thresholds and rounding applied by the recommenders.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingConfig {
    pub internal_weight: f64,
    pub external_weight: f64,
    pub rounding_step: u32,
    pub max_markup_over_max_comp: f64,
    pub min_discount_below_min_comp: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            internal_weight: 0.6,
            external_weight: 0.4,
            rounding_step: 5,
            max_markup_over_max_comp: 1.10,
            min_discount_below_min_comp: 0.95,
        }
    }
}

impl PricingConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut out = Self::default();

        if let Some(v) = parse_var(&lookup, "INTERNAL_WEIGHT")? {
            out.internal_weight = v;
        }
        if let Some(v) = parse_var(&lookup, "EXTERNAL_WEIGHT")? {
            out.external_weight = v;
        }
        if let Some(v) = parse_var(&lookup, "ROUNDING_STEP")? {
            out.rounding_step = v;
        }
        if let Some(v) = parse_var(&lookup, "MAX_MARKUP_OVER_MAX_COMP")? {
            out.max_markup_over_max_comp = v;
        }
        if let Some(v) = parse_var(&lookup, "MIN_DISCOUNT_BELOW_MIN_COMP")? {
            out.min_discount_below_min_comp = v;
        }

        out.validate()?;
        Ok(out)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.rounding_step >= 1, "ROUNDING_STEP must be >= 1");
        for (key, v) in [
            ("INTERNAL_WEIGHT", self.internal_weight),
            ("EXTERNAL_WEIGHT", self.external_weight),
            ("MAX_MARKUP_OVER_MAX_COMP", self.max_markup_over_max_comp),
            ("MIN_DISCOUNT_BELOW_MIN_COMP", self.min_discount_below_min_comp),
        ] {
            anyhow::ensure!(v.is_finite(), "{key} must be finite (got {v})");
        }
        Ok(())
    }
}
