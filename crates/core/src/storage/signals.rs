use crate::domain::pricing::Location;
use crate::ingest::events::EventObservation;
use crate::ingest::weather::WeatherObservation;
use anyhow::Context;
use chrono::Utc;
use uuid::Uuid;

pub async fn record_weather_snapshot(
    pool: &sqlx::PgPool,
    source: &str,
    location: Location,
    observation: &WeatherObservation,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO weather_snapshots (id, temp_c, condition, source, fetched_at, lat, lon, location_key, raw) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(id)
    .bind(observation.reading.temperature_c)
    .bind(&observation.reading.condition)
    .bind(source)
    .bind(Utc::now())
    .bind(location.lat)
    .bind(location.lon)
    .bind(format!("{},{}", location.lat, location.lon))
    .bind(&observation.raw)
    .execute(pool)
    .await
    .context("insert weather_snapshots failed")?;

    Ok(id)
}

pub async fn record_event_snapshots(
    pool: &sqlx::PgPool,
    source: &str,
    location: Location,
    observations: &[EventObservation],
) -> anyhow::Result<u64> {
    if observations.is_empty() {
        return Ok(0);
    }

    let fetched_at = Utc::now();
    let mut tx = pool.begin().await.context("begin transaction failed")?;

    let mut qb = sqlx::QueryBuilder::new(
        "INSERT INTO event_snapshots (id, name, popularity, distance_km, starts_at, source, fetched_at, lat, lon, raw) ",
    );
    qb.push_values(observations, |mut b, obs| {
        b.push_bind(Uuid::new_v4())
            .push_bind(obs.signal.name.clone())
            .push_bind(format!("{:?}", obs.signal.popularity))
            .push_bind(obs.signal.distance_km)
            .push_bind(obs.signal.starts_at)
            .push_bind(source.to_string())
            .push_bind(fetched_at)
            .push_bind(location.lat)
            .push_bind(location.lon)
            .push_bind(obs.raw.clone());
    });

    let res = qb
        .build()
        .execute(&mut *tx)
        .await
        .context("insert event_snapshots failed")?;

    tx.commit().await.context("commit transaction failed")?;
    Ok(res.rows_affected())
}
