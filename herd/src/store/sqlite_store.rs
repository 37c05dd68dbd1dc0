//! SQLiteHerdStore
//! --------------------
//! This module provides a **SQLite-backed implementation** of the `HerdStore`
//! trait. It is responsible for durable persistence of populations, batches,
//! and the depletion ledger so that:
//!
//!  - batch counters survive restarts
//!  - the ledger keeps every entry ever written, voided ones included
//!  - a depletion or reversal lands atomically via `commit_unit`

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use super::{EntryFilter, HerdStore};
use crate::model::{
    Batch, BatchId, BatchStatus, DepletionMethod, DepletionType, EntryContext, EntryId,
    HealthStatus, LedgerEntry, Population, PopulationId,
};

/// SQLite-based persistence backend for the herd domain.
///
/// Provides:
///
///   - schema creation on startup
///   - upsert semantics for populations and batches (`save_*`)
///   - append-plus-void semantics for ledger entries
///   - transactional commit units (`commit_unit`)
pub struct SQLiteHerdStore {
    pool: SqlitePool,
}

impl SQLiteHerdStore {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new SQLite-backed store and ensure schema exists.
    pub async fn new(path: &str) -> anyhow::Result<Self> {
        let pool = SqlitePool::connect(path).await?;
        let store = Self { pool };
        store.create_schema().await?;
        Ok(store)
    }

    /// Creates tables if they do not exist.
    pub async fn create_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS populations (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                tracks_batches INTEGER NOT NULL,
                current_quantity INTEGER NOT NULL,
                quantity_depleted INTEGER NOT NULL
            );
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS batches (
                id TEXT PRIMARY KEY,
                population_id TEXT NOT NULL,
                started_on TEXT NOT NULL,
                status TEXT NOT NULL,
                health TEXT NOT NULL,
                initial_quantity INTEGER NOT NULL,
                quantity_depleted INTEGER NOT NULL,
                quantity_sold INTEGER NOT NULL,
                quantity_transferred INTEGER NOT NULL
            );
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ledger_entries (
                id TEXT PRIMARY KEY,
                population_id TEXT NOT NULL,
                batch_id TEXT,
                depletion_type TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                occurred_on TEXT NOT NULL,
                method TEXT NOT NULL,
                sequence_index INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                voided_at TEXT,
                context_json TEXT NOT NULL
            );
        "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn population_from_row(row: &SqliteRow) -> anyhow::Result<Population> {
        let id_str: String = row.get("id");
        let id = uuid::Uuid::parse_str(&id_str)?;
        let name: String = row.get("name");
        let tracks_batches: i64 = row.get("tracks_batches");
        let current_quantity = row.get::<i64, _>("current_quantity") as u64;
        let quantity_depleted = row.get::<i64, _>("quantity_depleted") as u64;

        Ok(Population {
            id,
            name,
            tracks_batches: tracks_batches != 0,
            current_quantity,
            quantity_depleted,
        })
    }

    fn batch_from_row(row: &SqliteRow) -> anyhow::Result<Batch> {
        let id_str: String = row.get("id");
        let id = uuid::Uuid::parse_str(&id_str)?;
        let population_id_str: String = row.get("population_id");
        let population_id = uuid::Uuid::parse_str(&population_id_str)?;

        let started_on_str: String = row.get("started_on");
        let started_on = chrono::NaiveDate::parse_from_str(&started_on_str, "%Y-%m-%d")
            .map_err(|e| anyhow::anyhow!("Invalid started_on '{}': {}", started_on_str, e))?;

        let status_str: String = row.get("status");
        let status = BatchStatus::from_str(&status_str)?;

        let health_str: String = row.get("health");
        let health = HealthStatus::from_str(&health_str)?;

        Ok(Batch {
            id,
            population_id,
            started_on,
            status,
            health,
            initial_quantity: row.get::<i64, _>("initial_quantity") as u64,
            quantity_depleted: row.get::<i64, _>("quantity_depleted") as u64,
            quantity_sold: row.get::<i64, _>("quantity_sold") as u64,
            quantity_transferred: row.get::<i64, _>("quantity_transferred") as u64,
        })
    }

    fn entry_from_row(row: &SqliteRow) -> anyhow::Result<LedgerEntry> {
        let id_str: String = row.get("id");
        let id = uuid::Uuid::parse_str(&id_str)?;
        let population_id_str: String = row.get("population_id");
        let population_id = uuid::Uuid::parse_str(&population_id_str)?;

        let batch_id = match row.get::<Option<String>, _>("batch_id") {
            Some(s) => Some(uuid::Uuid::parse_str(&s)?),
            None => None,
        };

        let depletion_type_str: String = row.get("depletion_type");
        let depletion_type = DepletionType::from_str(&depletion_type_str)?;

        let occurred_on_str: String = row.get("occurred_on");
        let occurred_on = chrono::NaiveDate::parse_from_str(&occurred_on_str, "%Y-%m-%d")
            .map_err(|e| anyhow::anyhow!("Invalid occurred_on '{}': {}", occurred_on_str, e))?;

        let method_str: String = row.get("method");
        let method = DepletionMethod::from_str(&method_str)?;

        let created_at = parse_utc(&row.get::<String, _>("created_at"))?;
        let voided_at = match row.get::<Option<String>, _>("voided_at") {
            Some(s) => Some(parse_utc(&s)?),
            None => None,
        };

        let context_json: String = row.get("context_json");
        let context: EntryContext = serde_json::from_str(&context_json)
            .map_err(|e| anyhow::anyhow!("Invalid context JSON '{}': {}", context_json, e))?;

        Ok(LedgerEntry {
            id,
            population_id,
            batch_id,
            depletion_type,
            quantity: row.get::<i64, _>("quantity") as u64,
            occurred_on,
            method,
            sequence_index: row.get::<i64, _>("sequence_index") as u32,
            created_at,
            voided_at,
            context,
        })
    }

    async fn save_population_in(
        tx: &mut Transaction<'_, Sqlite>,
        population: &Population,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO populations (
                id, name, tracks_batches, current_quantity, quantity_depleted
            )
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                tracks_batches = excluded.tracks_batches,
                current_quantity = excluded.current_quantity,
                quantity_depleted = excluded.quantity_depleted;
        "#,
        )
        .bind(population.id.to_string())
        .bind(&population.name)
        .bind(population.tracks_batches as i64)
        .bind(population.current_quantity as i64)
        .bind(population.quantity_depleted as i64)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn save_batch_in(tx: &mut Transaction<'_, Sqlite>, batch: &Batch) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO batches (
                id, population_id, started_on, status, health,
                initial_quantity, quantity_depleted, quantity_sold, quantity_transferred
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                population_id = excluded.population_id,
                started_on = excluded.started_on,
                status = excluded.status,
                health = excluded.health,
                initial_quantity = excluded.initial_quantity,
                quantity_depleted = excluded.quantity_depleted,
                quantity_sold = excluded.quantity_sold,
                quantity_transferred = excluded.quantity_transferred;
        "#,
        )
        .bind(batch.id.to_string())
        .bind(batch.population_id.to_string())
        .bind(batch.started_on.format("%Y-%m-%d").to_string())
        .bind(batch.status.to_string())
        .bind(batch.health.to_string())
        .bind(batch.initial_quantity as i64)
        .bind(batch.quantity_depleted as i64)
        .bind(batch.quantity_sold as i64)
        .bind(batch.quantity_transferred as i64)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn save_entry_in(
        tx: &mut Transaction<'_, Sqlite>,
        entry: &LedgerEntry,
    ) -> anyhow::Result<()> {
        let context_json = serde_json::to_string(&entry.context)?;

        sqlx::query(
            r#"
            INSERT INTO ledger_entries (
                id, population_id, batch_id,
                depletion_type, quantity, occurred_on,
                method, sequence_index,
                created_at, voided_at, context_json
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                voided_at = excluded.voided_at;
        "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.population_id.to_string())
        .bind(entry.batch_id.map(|b| b.to_string()))
        .bind(entry.depletion_type.to_string())
        .bind(entry.quantity as i64)
        .bind(entry.occurred_on.format("%Y-%m-%d").to_string())
        .bind(entry.method.to_string())
        .bind(entry.sequence_index as i64)
        .bind(entry.created_at.to_rfc3339())
        .bind(entry.voided_at.map(|t| t.to_rfc3339()))
        .bind(context_json)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

fn parse_utc(s: &str) -> anyhow::Result<chrono::DateTime<chrono::Utc>> {
    let parsed = chrono::DateTime::parse_from_rfc3339(s)
        .map_err(|e| anyhow::anyhow!("Invalid timestamp '{}': {}", s, e))?;
    Ok(parsed.with_timezone(&chrono::Utc))
}

#[async_trait]
impl HerdStore for SQLiteHerdStore {
    async fn population(&self, id: PopulationId) -> anyhow::Result<Option<Population>> {
        let row = sqlx::query("SELECT * FROM populations WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| Self::population_from_row(&r)).transpose()
    }

    async fn save_population(&self, population: &Population) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::save_population_in(&mut tx, population).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn batch(&self, id: BatchId) -> anyhow::Result<Option<Batch>> {
        let row = sqlx::query("SELECT * FROM batches WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| Self::batch_from_row(&r)).transpose()
    }

    async fn batches_for(&self, population_id: PopulationId) -> anyhow::Result<Vec<Batch>> {
        let rows = sqlx::query("SELECT * FROM batches WHERE population_id = ?")
            .bind(population_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::batch_from_row).collect()
    }

    async fn save_batch(&self, batch: &Batch) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::save_batch_in(&mut tx, batch).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn entry(&self, id: EntryId) -> anyhow::Result<Option<LedgerEntry>> {
        let row = sqlx::query("SELECT * FROM ledger_entries WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| Self::entry_from_row(&r)).transpose()
    }

    async fn entries_for(
        &self,
        population_id: PopulationId,
        filter: &EntryFilter,
    ) -> anyhow::Result<Vec<LedgerEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM ledger_entries WHERE population_id = ? \
             ORDER BY created_at, sequence_index",
        )
        .bind(population_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let entry = Self::entry_from_row(row)?;

            if !filter.include_voided && entry.is_voided() {
                continue;
            }
            if let Some(batch_id) = filter.batch_id {
                if entry.batch_id != Some(batch_id) {
                    continue;
                }
            }
            if let Some(kind) = filter.depletion_type {
                if entry.depletion_type != kind {
                    continue;
                }
            }

            entries.push(entry);
        }

        Ok(entries)
    }

    async fn commit_unit(
        &self,
        population: &Population,
        batches: &[Batch],
        entries: &[LedgerEntry],
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        for batch in batches {
            Self::save_batch_in(&mut tx, batch).await?;
        }
        for entry in entries {
            Self::save_entry_in(&mut tx, entry).await?;
        }
        Self::save_population_in(&mut tx, population).await?;

        tx.commit().await?;
        Ok(())
    }
}
