use crate::model::Instrument;
use crate::store::SqliteStore;
use anyhow::{Context, Result};

/// Insert the reference instruments into an empty instrument table.
///
/// Runs on every startup when seeding is enabled; an already populated table
/// is left untouched so existing runs keep pointing at the same rows.
pub async fn load_reference_data(store: &SqliteStore) -> Result<()> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM instrument")
        .fetch_one(store.pool())
        .await
        .context("Failed to count instruments")?;

    if existing > 0 {
        log::debug!("Instrument table already holds {} rows, skipping seed", existing);
        return Ok(());
    }

    let instruments = Instrument::reference_set();
    let mut tx = store
        .pool()
        .begin()
        .await
        .context("Failed to begin seed transaction")?;

    for instrument in &instruments {
        sqlx::query("INSERT INTO instrument(instrument_id, description) VALUES (?, ?)")
            .bind(instrument.instrument_id)
            .bind(&instrument.description)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to seed {}", instrument.description))?;
    }

    tx.commit().await.context("Failed to commit seed data")?;
    log::info!("Seeded {} reference instruments", instruments.len());

    Ok(())
}
