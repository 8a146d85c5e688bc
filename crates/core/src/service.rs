use crate::config::Settings;
use crate::domain::contract::{SuggestResponse, ValidatedRequest};
use crate::domain::pricing::{Location, RecommendationResult};
use crate::ingest::{resolve_signals, ResolvedSignals, SignalProviders};
use crate::pricing::{
    recommend_by_rules, suggest_price, CoefficientsFile, ModelSource, PricingConfig,
};
use crate::storage;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyChoice {
    /// Model first, rules on any failure.
    Preferred,
    RulesOnly,
}

/// Everything a pricing call needs besides its request.
///
/// Without a pool the service still prices; persistence is simply skipped.
#[derive(Clone)]
pub struct PricingService {
    pub config: PricingConfig,
    pub models: Arc<dyn ModelSource>,
    pub providers: SignalProviders,
    pub default_location: Location,
    pub pool: Option<sqlx::PgPool>,
}

impl PricingService {
    pub fn from_settings(settings: &Settings, pool: Option<sqlx::PgPool>) -> anyhow::Result<Self> {
        Ok(Self {
            config: settings.pricing.clone(),
            models: Arc::new(CoefficientsFile::new(settings.coefficients_path.clone())),
            providers: SignalProviders::from_settings(settings)?,
            default_location: settings.default_location,
            pool,
        })
    }

    pub fn recommend(
        &self,
        signals: &ResolvedSignals,
        request: &ValidatedRequest,
        choice: StrategyChoice,
    ) -> RecommendationResult {
        let weather = signals.weather.as_ref();
        match choice {
            StrategyChoice::Preferred => suggest_price(
                &request.quote,
                weather,
                &signals.events,
                &self.config,
                self.models.as_ref(),
            ),
            StrategyChoice::RulesOnly => {
                recommend_by_rules(&request.quote, weather, &signals.events, &self.config)
            }
        }
    }

    /// Resolves signals, prices the item and records what happened. Storage failures are logged
    /// and never change the answer.
    pub async fn suggest(
        &self,
        request: ValidatedRequest,
        choice: StrategyChoice,
    ) -> SuggestResponse {
        let location = request.location.unwrap_or(self.default_location);

        let request_id = match &self.pool {
            Some(pool) => match storage::pricing::record_pricing_request(
                pool,
                request.menu_item_id,
                &request.payload,
            )
            .await
            {
                Ok(id) => Some(id),
                Err(err) => {
                    tracing::error!(
                        menu_item_id = request.menu_item_id,
                        error = %format!("{err:#}"),
                        "failed to record pricing request"
                    );
                    None
                }
            },
            None => None,
        };

        let signals = resolve_signals(
            &self.providers,
            location,
            request.weather.clone(),
            request.events.clone(),
        )
        .await;
        self.snapshot_signals(location, &signals).await;

        let result = self.recommend(&signals, &request, choice);

        tracing::info!(
            menu_item_id = request.menu_item_id,
            strategy = ?result.strategy,
            recommended_price = result.recommended_price,
            "priced menu item"
        );

        if let (Some(pool), Some(request_id)) = (&self.pool, request_id) {
            if let Err(err) =
                storage::pricing::record_recommendation(pool, request_id, &result, &self.config)
                    .await
            {
                tracing::error!(
                    %request_id,
                    error = %format!("{err:#}"),
                    "failed to record recommendation"
                );
            }
        }

        SuggestResponse::new(request.menu_item_id, result)
    }

    async fn snapshot_signals(&self, location: Location, signals: &ResolvedSignals) {
        let Some(pool) = &self.pool else {
            return;
        };

        if let Some((source, obs)) = &signals.fetched_weather {
            if let Err(err) =
                storage::signals::record_weather_snapshot(pool, source, location, obs).await
            {
                tracing::warn!(error = %format!("{err:#}"), "failed to snapshot weather");
            }
        }
        if let Some((source, observations)) = &signals.fetched_events {
            if let Err(err) =
                storage::signals::record_event_snapshots(pool, source, location, observations).await
            {
                tracing::warn!(error = %format!("{err:#}"), "failed to snapshot events");
            }
        }
    }
}
