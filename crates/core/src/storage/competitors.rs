use anyhow::Context;
use uuid::Uuid;

/// Creates a placeholder menu item so competitor prices can reference it.
pub async fn ensure_menu_item(pool: &sqlx::PgPool, menu_item_id: i64) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO menu_items (id, name, category, base_price) \
         VALUES ($1, $2, 'NA', NULL) \
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(menu_item_id)
    .bind(format!("Item-{menu_item_id}"))
    .execute(pool)
    .await
    .with_context(|| format!("ensure menu_items row failed (menu_item_id={menu_item_id})"))?;
    Ok(())
}

pub async fn insert_competitor_prices(
    pool: &sqlx::PgPool,
    menu_item_id: i64,
    prices: &[f64],
) -> anyhow::Result<u64> {
    anyhow::ensure!(!prices.is_empty(), "competitor prices must be non-empty");

    let mut tx = pool.begin().await.context("begin transaction failed")?;

    let mut qb = sqlx::QueryBuilder::new(
        "INSERT INTO competitor_prices (id, menu_item_id, price) ",
    );
    qb.push_values(prices, |mut b, price| {
        b.push_bind(Uuid::new_v4())
            .push_bind(menu_item_id)
            .push_bind(*price);
    });

    let res = qb
        .build()
        .execute(&mut *tx)
        .await
        .context("insert competitor_prices failed")?;

    tx.commit().await.context("commit transaction failed")?;
    Ok(res.rows_affected())
}
