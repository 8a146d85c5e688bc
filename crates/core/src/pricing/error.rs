use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PricingError {
    #[error("could not load model coefficients from `{origin}`: {detail}")]
    ConfigLoad { origin: String, detail: String },
    #[error("competitor price list is empty")]
    EmptyCompetitorSet,
    #[error("model `{model}` produced a non-finite prediction ({value})")]
    NonFinitePrediction { model: &'static str, value: f64 },
}

impl PricingError {
    pub fn config_load(origin: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Self::ConfigLoad {
            origin: origin.into(),
            detail: detail.to_string(),
        }
    }
}
