use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use menu_pricing_core::domain::contract::{CompetitorPricesIn, SuggestRequest, SuggestResponse};
use menu_pricing_core::service::{PricingService, StrategyChoice};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = menu_pricing_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();
    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match menu_pricing_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let service = PricingService::from_settings(&settings, pool)?;
    tracing::info!(
        coefficients = %settings.coefficients_path.display(),
        weather_provider = service.providers.weather.is_some(),
        events_provider = service.providers.events.is_some(),
        "pricing service ready"
    );

    let state = AppState {
        service: Arc::new(service),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/pricing/suggest", post(suggest_price))
        .route("/api/pricing/rules", post(suggest_price_by_rules))
        .route("/api/ingest/competitors", post(ingest_competitors))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[derive(Clone)]
struct AppState {
    service: Arc<PricingService>,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    db: &'static str,
    owm_key_loaded: bool,
    tm_key_loaded: bool,
}

async fn healthz(State(state): State<AppState>) -> Json<Health> {
    let svc = &state.service;
    Json(Health {
        status: "ok",
        db: if svc.pool.is_some() {
            "postgres"
        } else {
            "unavailable"
        },
        owm_key_loaded: svc.providers.weather.is_some(),
        tm_key_loaded: svc.providers.events.is_some(),
    })
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

fn bad_request(err: anyhow::Error) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError {
            error: format!("{err:#}"),
        }),
    )
}

async fn suggest_price(
    State(state): State<AppState>,
    Json(req): Json<SuggestRequest>,
) -> ApiResult<SuggestResponse> {
    price(&state, req, StrategyChoice::Preferred).await
}

async fn suggest_price_by_rules(
    State(state): State<AppState>,
    Json(req): Json<SuggestRequest>,
) -> ApiResult<SuggestResponse> {
    price(&state, req, StrategyChoice::RulesOnly).await
}

async fn price(
    state: &AppState,
    req: SuggestRequest,
    choice: StrategyChoice,
) -> ApiResult<SuggestResponse> {
    let validated = req.validate_and_into_inputs().map_err(bad_request)?;
    Ok(Json(state.service.suggest(validated, choice).await))
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    status: &'static str,
    menu_item_id: i64,
    inserted: u64,
}

async fn ingest_competitors(
    State(state): State<AppState>,
    Json(payload): Json<CompetitorPricesIn>,
) -> ApiResult<IngestResponse> {
    payload.validate().map_err(bad_request)?;

    let Some(pool) = &state.service.pool else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError {
                error: "database unavailable".to_string(),
            }),
        ));
    };

    if payload.competitor_prices.is_empty() {
        return Ok(Json(IngestResponse {
            status: "ok",
            menu_item_id: payload.menu_item_id,
            inserted: 0,
        }));
    }

    let inserted = async {
        menu_pricing_core::storage::competitors::ensure_menu_item(pool, payload.menu_item_id)
            .await?;
        menu_pricing_core::storage::competitors::insert_competitor_prices(
            pool,
            payload.menu_item_id,
            &payload.competitor_prices,
        )
        .await
    }
    .await
    .map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        tracing::error!(
            menu_item_id = payload.menu_item_id,
            error = %format!("{e:#}"),
            "competitor ingest failed"
        );
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError {
                error: format!("failed to save competitor prices: {e}"),
            }),
        )
    })?;

    Ok(Json(IngestResponse {
        status: "ok",
        menu_item_id: payload.menu_item_id,
        inserted,
    }))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &menu_pricing_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
