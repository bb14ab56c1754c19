use crate::errors::persistence;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pharma_ledger::{
    Batch, BatchId, BatchPatch, BatchWrite, ClearSummary, Error as LedgerError, Event,
    EventFilter, NewEvent, Result, SortOrder, SupplyStore,
};
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;
use tracing::{error, info};

const BATCH_COLUMNS: &str = "batch_id, drug_name, stage, status, created_at";
const EVENT_COLUMNS: &str = "id, batch_id, actor, action, notes, occurred_at";

#[derive(Debug, FromRow)]
struct BatchRow {
    batch_id: String,
    drug_name: String,
    stage: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<BatchRow> for Batch {
    type Error = LedgerError;

    fn try_from(row: BatchRow) -> Result<Self> {
        let stage = row.stage.parse().map_err(|_| {
            LedgerError::Persistence(format!("Stored stage is invalid: {}", row.stage))
        })?;

        Ok(Batch {
            batch_id: BatchId::parse(&row.batch_id)
                .map_err(|_| LedgerError::Persistence("Stored batch ID is empty".to_string()))?,
            drug_name: row.drug_name,
            stage,
            status: row.status,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct EventRow {
    id: i64,
    batch_id: String,
    actor: String,
    action: String,
    notes: Option<String>,
    occurred_at: DateTime<Utc>,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Event {
            id: row.id,
            batch_id: row.batch_id,
            actor: row.actor,
            action: row.action,
            notes: row.notes,
            timestamp: row.occurred_at,
        }
    }
}

/// PostgreSQL-backed store
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        acquire_timeout_secs: u64,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(acquire_timeout_secs))
            .connect(database_url)
            .await
            .map_err(persistence)?;

        Ok(Database { pool })
    }

    /// Create tables and indexes when missing
    pub async fn ensure_schema(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS batches (
                seq BIGSERIAL,
                batch_id TEXT PRIMARY KEY,
                drug_name TEXT NOT NULL,
                stage TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id BIGSERIAL PRIMARY KEY,
                batch_id TEXT NOT NULL,
                actor TEXT NOT NULL,
                action TEXT NOT NULL,
                notes TEXT,
                occurred_at TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp()
            )
            "#,
            "CREATE INDEX IF NOT EXISTS events_batch_idx ON events (batch_id, occurred_at, id)",
            "CREATE INDEX IF NOT EXISTS events_time_idx ON events (occurred_at, id)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(persistence)?;
        }

        info!("Database schema ready");
        Ok(())
    }

    async fn connection(&self) -> Result<sqlx::pool::PoolConnection<sqlx::Postgres>> {
        self.pool.acquire().await.map_err(persistence)
    }
}

async fn insert_batch_row(conn: &mut PgConnection, batch: &Batch) -> Result<Option<Batch>> {
    let row = sqlx::query_as::<_, BatchRow>(&format!(
        r#"
        INSERT INTO batches (batch_id, drug_name, stage, status, created_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (batch_id) DO NOTHING
        RETURNING {}
        "#,
        BATCH_COLUMNS
    ))
    .bind(batch.batch_id.as_str())
    .bind(&batch.drug_name)
    .bind(batch.stage.as_str())
    .bind(&batch.status)
    .bind(batch.created_at)
    .fetch_optional(conn)
    .await
    .map_err(persistence)?;

    row.map(Batch::try_from).transpose()
}

async fn update_batch_row(
    conn: &mut PgConnection,
    batch_id: &BatchId,
    patch: &BatchPatch,
) -> Result<Option<Batch>> {
    let row = sqlx::query_as::<_, BatchRow>(&format!(
        r#"
        UPDATE batches
        SET stage = COALESCE($2, stage), status = COALESCE($3, status)
        WHERE batch_id = $1
        RETURNING {}
        "#,
        BATCH_COLUMNS
    ))
    .bind(batch_id.as_str())
    .bind(patch.stage.map(|s| s.as_str()))
    .bind(patch.status.as_deref())
    .fetch_optional(conn)
    .await
    .map_err(persistence)?;

    row.map(Batch::try_from).transpose()
}

async fn insert_event_row(conn: &mut PgConnection, event: &NewEvent) -> Result<Event> {
    let row = sqlx::query_as::<_, EventRow>(&format!(
        r#"
        INSERT INTO events (batch_id, actor, action, notes)
        VALUES ($1, $2, $3, $4)
        RETURNING {}
        "#,
        EVENT_COLUMNS
    ))
    .bind(&event.batch_id)
    .bind(&event.actor)
    .bind(&event.action)
    .bind(event.notes.as_deref())
    .fetch_one(conn)
    .await
    .map_err(persistence)?;

    Ok(row.into())
}

#[async_trait]
impl SupplyStore for Database {
    async fn find_batch(&self, batch_id: &BatchId) -> Result<Option<Batch>> {
        let row = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {} FROM batches WHERE batch_id = $1",
            BATCH_COLUMNS
        ))
        .bind(batch_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence)?;

        row.map(Batch::try_from).transpose()
    }

    async fn insert_batch(&self, batch: Batch) -> Result<Batch> {
        let mut conn = self.connection().await?;
        insert_batch_row(&mut conn, &batch)
            .await?
            .ok_or_else(|| LedgerError::DuplicateBatch(batch.batch_id.to_string()))
    }

    async fn update_batch(&self, batch_id: &BatchId, patch: &BatchPatch) -> Result<Option<Batch>> {
        let mut conn = self.connection().await?;
        update_batch_row(&mut conn, batch_id, patch).await
    }

    async fn list_batches(&self) -> Result<Vec<Batch>> {
        let rows = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {} FROM batches ORDER BY created_at DESC, seq DESC",
            BATCH_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;

        rows.into_iter().map(Batch::try_from).collect()
    }

    async fn delete_batches(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM batches")
            .execute(&self.pool)
            .await
            .map_err(persistence)?;
        Ok(result.rows_affected())
    }

    async fn insert_event(&self, event: NewEvent) -> Result<Event> {
        let mut conn = self.connection().await?;
        insert_event_row(&mut conn, &event).await
    }

    async fn list_events(&self, filter: &EventFilter, order: SortOrder) -> Result<Vec<Event>> {
        let direction = match order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };

        let rows = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            SELECT {columns} FROM events
            WHERE ($1::TEXT IS NULL OR batch_id = $1)
            ORDER BY occurred_at {dir}, id {dir}
            "#,
            columns = EVENT_COLUMNS,
            dir = direction
        ))
        .bind(filter.batch_id.as_deref())
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;

        Ok(rows.into_iter().map(Event::from).collect())
    }

    async fn delete_events(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM events")
            .execute(&self.pool)
            .await
            .map_err(persistence)?;
        Ok(result.rows_affected())
    }

    async fn write_with_event(
        &self,
        write: BatchWrite,
        event: NewEvent,
    ) -> Result<Option<(Batch, Event)>> {
        let mut tx = self.pool.begin().await.map_err(persistence)?;

        let batch = match write {
            BatchWrite::Insert(ref batch) => match insert_batch_row(&mut tx, batch).await? {
                Some(batch) => batch,
                None => {
                    tx.rollback().await.map_err(persistence)?;
                    return Err(LedgerError::DuplicateBatch(batch.batch_id.to_string()));
                }
            },
            BatchWrite::Update(ref batch_id, ref patch) => {
                match update_batch_row(&mut tx, batch_id, patch).await? {
                    Some(batch) => batch,
                    None => {
                        tx.rollback().await.map_err(persistence)?;
                        return Ok(None);
                    }
                }
            }
        };

        let event = match insert_event_row(&mut tx, &event).await {
            Ok(event) => event,
            Err(e) => {
                // Dropping the transaction rolls the batch write back
                error!(
                    batch_id = %batch.batch_id,
                    error = %e,
                    "Ledger append failed, batch write rolled back"
                );
                return Err(e);
            }
        };

        tx.commit().await.map_err(persistence)?;
        Ok(Some((batch, event)))
    }

    async fn clear_all(&self) -> Result<ClearSummary> {
        let mut tx = self.pool.begin().await.map_err(persistence)?;

        let events = sqlx::query("DELETE FROM events")
            .execute(&mut *tx)
            .await
            .map_err(persistence)?;
        let batches = sqlx::query("DELETE FROM batches")
            .execute(&mut *tx)
            .await
            .map_err(persistence)?;

        tx.commit().await.map_err(persistence)?;

        Ok(ClearSummary {
            batches_removed: batches.rows_affected(),
            events_removed: events.rows_affected(),
        })
    }
}
