use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use std::str::FromStr;
use std::time::Duration;

use crate::model::{Run, RunId};
use crate::store::traits::RunStore;

const CREATE_TABLES: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS instrument(
        instrument_id INTEGER PRIMARY KEY,
        description TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS run_instrument(
        run_id INTEGER PRIMARY KEY,
        instrument_id INTEGER NOT NULL,
        timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY(instrument_id) REFERENCES instrument(instrument_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS run_sample(
        sample_id INTEGER,
        run_id INTEGER,
        FOREIGN KEY(run_id) REFERENCES run_instrument(run_id),
        PRIMARY KEY(sample_id, run_id)
    )
    "#,
];

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid SQLite URL: {}", database_url))?
            .create_if_missing(true)
            .foreign_keys(true)
            // Writers queue on SQLite's lock instead of failing with "database is locked".
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .context("Failed to create SQLite connection pool")?;

        Ok(Self { pool })
    }

    /// Create an isolated in-memory store.
    ///
    /// Every SQLite in-memory connection is its own database, so the pool is
    /// pinned to a single connection that is never closed for idleness or age.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("Invalid in-memory SQLite URL")?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to create in-memory SQLite pool")?;

        Ok(Self { pool })
    }

    /// Create the instrument, run and run-sample tables if they are missing
    pub async fn migrate(&self) -> Result<()> {
        for statement in CREATE_TABLES {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to create lab tables")?;
        }
        log::debug!("Lab tables are in place");
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl RunStore for SqliteStore {
    async fn persist_run(&self, run: &Run) -> Result<RunId> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin run transaction")?;

        match insert_run(&mut *tx, run).await {
            Ok(run_id) => {
                tx.commit().await.context("Failed to commit run")?;
                log::info!(
                    "Persisted run {} on instrument {} with {} samples",
                    run_id,
                    run.instrument_id,
                    run.samples.len()
                );
                Ok(run_id)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    log::error!("Failed to roll back run transaction: {}", rollback_err);
                }
                log::warn!(
                    "Run on instrument {} rolled back: {:#}",
                    run.instrument_id,
                    err
                );
                Err(err)
            }
        }
    }
}

/// Insert the run row and its sample links on one connection. The run id is
/// the rowid of this connection's own insert, so concurrent writers cannot
/// leak into it.
async fn insert_run(conn: &mut SqliteConnection, run: &Run) -> Result<RunId> {
    let run_id = sqlx::query("INSERT INTO run_instrument(instrument_id) VALUES (?)")
        .bind(run.instrument_id)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Failed to create run for instrument {}", run.instrument_id))?
        .last_insert_rowid();

    for sample in &run.samples {
        sqlx::query("INSERT INTO run_sample(sample_id, run_id) VALUES (?, ?)")
            .bind(sample.id)
            .bind(run_id)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to link sample {} to run {}", sample.id, run_id))?;
    }

    Ok(run_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Instrument, Sample};
    use crate::seed::load_reference_data;

    async fn seeded_store() -> SqliteStore {
        let store = SqliteStore::in_memory().await.unwrap();
        store.migrate().await.unwrap();
        load_reference_data(&store).await.unwrap();
        store
    }

    async fn count(store: &SqliteStore, table: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(store.pool())
            .await
            .unwrap()
    }

    fn run(instrument_id: i64, ids: &[i64]) -> Run {
        Run::new(instrument_id, ids.iter().copied().map(Sample::new).collect())
    }

    #[tokio::test]
    async fn test_first_run_gets_id_one_and_links_samples() {
        let store = seeded_store().await;

        let run_id = store.persist_run(&run(1, &[1, 2, 999])).await.unwrap();
        assert_eq!(run_id, 1);

        let linked: Vec<(i64, i64)> =
            sqlx::query_as("SELECT sample_id, run_id FROM run_sample ORDER BY sample_id")
                .fetch_all(store.pool())
                .await
                .unwrap();
        assert_eq!(linked, vec![(1, 1), (2, 1), (999, 1)]);
    }

    #[tokio::test]
    async fn test_run_ids_strictly_increase() {
        let store = seeded_store().await;

        let first = store.persist_run(&run(1, &[1])).await.unwrap();
        let second = store.persist_run(&run(1, &[1])).await.unwrap();
        let third = store.persist_run(&run(2, &[5, 6])).await.unwrap();

        assert!(first < second && second < third);
        assert_eq!(count(&store, "run_instrument").await, 3);
    }

    #[tokio::test]
    async fn test_returned_id_matches_inserted_row() {
        let store = seeded_store().await;
        store.persist_run(&run(1, &[1])).await.unwrap();

        let run_id = store.persist_run(&run(3, &[7])).await.unwrap();
        let instrument_id: i64 =
            sqlx::query_scalar("SELECT instrument_id FROM run_instrument WHERE run_id = ?")
                .bind(run_id)
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(instrument_id, 3);
    }

    #[tokio::test]
    async fn test_store_assigns_timestamp() {
        let store = seeded_store().await;
        let run_id = store.persist_run(&run(1, &[1])).await.unwrap();

        let timestamp: chrono::NaiveDateTime =
            sqlx::query_scalar("SELECT timestamp FROM run_instrument WHERE run_id = ?")
                .bind(run_id)
                .fetch_one(store.pool())
                .await
                .unwrap();
        let age = chrono::Utc::now().naive_utc() - timestamp;
        assert!(age < chrono::Duration::minutes(5));
    }

    #[tokio::test]
    async fn test_empty_run_is_accepted() {
        let store = seeded_store().await;

        let run_id = store.persist_run(&run(1, &[])).await.unwrap();
        assert_eq!(run_id, 1);
        assert_eq!(count(&store, "run_instrument").await, 1);
        assert_eq!(count(&store, "run_sample").await, 0);
    }

    #[tokio::test]
    async fn test_failed_link_rolls_back_whole_run() {
        let store = seeded_store().await;

        // Second link violates PRIMARY KEY(sample_id, run_id) after the run
        // row and the first link are already written.
        let result = store.persist_run(&run(1, &[4, 4])).await;
        assert!(result.is_err());

        assert_eq!(count(&store, "run_instrument").await, 0);
        assert_eq!(count(&store, "run_sample").await, 0);

        // The rolled back row leaves no gap behind.
        assert_eq!(store.persist_run(&run(1, &[4])).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_instrument_is_rejected() {
        let store = seeded_store().await;

        let err = store.persist_run(&run(42, &[1, 2])).await.unwrap_err();
        assert!(format!("{:#}", err).contains("instrument 42"));
        assert_eq!(count(&store, "run_instrument").await, 0);
        assert_eq!(count(&store, "run_sample").await, 0);
    }

    #[tokio::test]
    async fn test_sample_ids_may_repeat_across_runs() {
        let store = seeded_store().await;

        store.persist_run(&run(1, &[1, 2])).await.unwrap();
        store.persist_run(&run(1, &[1, 2])).await.unwrap();
        assert_eq!(count(&store, "run_sample").await, 4);
    }

    #[tokio::test]
    async fn test_missing_tables_surface_as_error() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(store.persist_run(&run(1, &[1])).await.is_err());
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let store = seeded_store().await;
        store.migrate().await.unwrap();
        assert_eq!(
            count(&store, "instrument").await,
            Instrument::reference_set().len() as i64
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_runs_get_their_own_ids() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("lab.db").display());
        let store = SqliteStore::new(&url, 4).await.unwrap();
        store.migrate().await.unwrap();
        load_reference_data(&store).await.unwrap();

        let handles: Vec<_> = (0..12i64)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let submitted = run(1 + i % 3, &[100 + i]);
                    let run_id = store.persist_run(&submitted).await.unwrap();
                    (run_id, submitted)
                })
            })
            .collect();

        let mut seen = Vec::new();
        for handle in handles {
            let (run_id, submitted) = handle.await.unwrap();

            let instrument_id: i64 =
                sqlx::query_scalar("SELECT instrument_id FROM run_instrument WHERE run_id = ?")
                    .bind(run_id)
                    .fetch_one(store.pool())
                    .await
                    .unwrap();
            assert_eq!(instrument_id, submitted.instrument_id);

            let sample_ids: Vec<i64> =
                sqlx::query_scalar("SELECT sample_id FROM run_sample WHERE run_id = ?")
                    .bind(run_id)
                    .fetch_all(store.pool())
                    .await
                    .unwrap();
            assert_eq!(sample_ids, vec![submitted.samples[0].id]);

            seen.push(run_id);
        }

        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 12);
        assert_eq!(count(&store, "run_instrument").await, 12);
    }

    #[tokio::test]
    async fn test_file_backed_store_keeps_runs() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("lab.db").display());

        {
            let store = SqliteStore::new(&url, 2).await.unwrap();
            store.migrate().await.unwrap();
            load_reference_data(&store).await.unwrap();
            assert_eq!(store.persist_run(&run(2, &[10, 11])).await.unwrap(), 1);
            store.pool().close().await;
        }

        let reopened = SqliteStore::new(&url, 2).await.unwrap();
        reopened.migrate().await.unwrap();
        load_reference_data(&reopened).await.unwrap();
        assert_eq!(reopened.persist_run(&run(2, &[10])).await.unwrap(), 2);
        assert_eq!(count(&reopened, "instrument").await, 3);
    }
}
