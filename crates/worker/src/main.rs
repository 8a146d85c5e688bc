use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use menu_pricing_core::domain::contract::SuggestRequest;
use menu_pricing_core::ingest::SignalProviders;
use menu_pricing_core::service::{PricingService, StrategyChoice};

#[derive(Debug, Parser)]
#[command(name = "menu_pricing_worker")]
struct Args {
    /// JSON file holding an array of pricing requests.
    #[arg(long)]
    input: PathBuf,

    /// Price everything but skip writing to the database.
    #[arg(long)]
    dry_run: bool,

    /// Fetch weather/events for requests that do not carry them.
    #[arg(long)]
    fetch_signals: bool,

    /// Skip the model and use the rule-based strategy only.
    #[arg(long)]
    rules_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = menu_pricing_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let requests: Vec<SuggestRequest> = serde_json::from_str(&text).with_context(|| {
        format!(
            "{} is not a JSON array of pricing requests",
            args.input.display()
        )
    })?;

    let pool = if args.dry_run {
        None
    } else {
        let db_url = settings.require_database_url()?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
            .context("connect DATABASE_URL failed")?;
        menu_pricing_core::storage::migrate(&pool).await?;
        Some(pool)
    };

    let mut service = PricingService::from_settings(&settings, pool)?;
    if !args.fetch_signals {
        service.providers = SignalProviders::default();
    }

    let choice = if args.rules_only {
        StrategyChoice::RulesOnly
    } else {
        StrategyChoice::Preferred
    };

    let total = requests.len();
    let mut failures: usize = 0;
    for (idx, req) in requests.into_iter().enumerate() {
        let menu_item_id = req.menu_item_id;
        let validated = match req.validate_and_into_inputs() {
            Ok(v) => v,
            Err(err) => {
                failures += 1;
                sentry_anyhow::capture_anyhow(&err);
                tracing::warn!(
                    idx,
                    menu_item_id,
                    error = %format!("{err:#}"),
                    "skipping invalid request"
                );
                continue;
            }
        };

        let response = service.suggest(validated, choice).await;
        println!("{}", serde_json::to_string(&response)?);
    }

    tracing::info!(
        total,
        priced = total - failures,
        failures,
        dry_run = args.dry_run,
        "repricing run finished"
    );

    anyhow::ensure!(
        failures == 0 || failures < total,
        "every request in {} was invalid",
        args.input.display()
    );
    Ok(())
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
