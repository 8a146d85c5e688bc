use crate::domain::pricing::RecommendationResult;
use crate::pricing::PricingConfig;
use anyhow::Context;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

pub async fn record_pricing_request(
    pool: &sqlx::PgPool,
    menu_item_id: i64,
    payload: &Value,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO pricing_requests (id, menu_item_id, payload_json, created_at) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(id)
    .bind(menu_item_id)
    .bind(payload)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("insert pricing_requests failed")?;

    Ok(id)
}

pub async fn record_recommendation(
    pool: &sqlx::PgPool,
    pricing_request_id: Uuid,
    result: &RecommendationResult,
    config: &PricingConfig,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let factors = serde_json::to_value(&result.factors).context("serialize factors failed")?;
    let strategy = serde_json::to_value(result.strategy)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();

    sqlx::query(
        "INSERT INTO pricing_recommendations \
         (id, pricing_request_id, recommended_price, internal_weight, external_weight, strategy, factors, reasoning, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(id)
    .bind(pricing_request_id)
    .bind(result.recommended_price)
    .bind(result.factor("internal_weight").unwrap_or(config.internal_weight))
    .bind(result.factor("external_weight").unwrap_or(config.external_weight))
    .bind(strategy)
    .bind(factors)
    .bind(&result.reasoning)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("insert pricing_recommendations failed")?;

    Ok(id)
}
