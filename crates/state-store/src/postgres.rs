use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{Result, SagaId, StateRepository, StateStoreError, TransitionKind, TransitionRecord};

/// PostgreSQL-backed state repository.
///
/// Every record becomes one row of `saga_transitions`; rows are never
/// updated or deleted.
#[derive(Clone)]
pub struct PostgresStateRepository {
    pool: PgPool,
}

impl PostgresStateRepository {
    /// Creates a new PostgreSQL state repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and brings the schema up to date.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        let repository = Self::new(pool);
        repository.run_migrations().await?;
        tracing::info!("postgres state repository ready");
        Ok(repository)
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    /// Reads back every record of one saga instance, in insertion order.
    ///
    /// Operator tooling only; the controller never reads the repository.
    pub async fn history(&self, saga_id: &SagaId) -> Result<Vec<TransitionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT saga_id, step_name, transition, error_kind, error_message, recorded_at
            FROM saga_transitions
            WHERE saga_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(saga_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    /// Returns the ids of saga instances whose latest record is `status`.
    pub async fn sagas_with_status(&self, status: &str) -> Result<Vec<SagaId>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT saga_id FROM (
                SELECT DISTINCT ON (saga_id) saga_id, status
                FROM saga_transitions
                ORDER BY saga_id, id DESC
            ) latest
            WHERE status = $1
            ORDER BY saga_id
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(SagaId::from).collect())
    }

    fn row_to_record(row: PgRow) -> Result<TransitionRecord> {
        let transition: String = row.try_get("transition")?;
        let transition: TransitionKind = transition
            .parse()
            .map_err(StateStoreError::CorruptRecord)?;

        Ok(TransitionRecord {
            saga_id: SagaId::from(row.try_get::<String, _>("saga_id")?),
            step_name: row.try_get("step_name")?,
            transition,
            error_kind: row.try_get("error_kind")?,
            error_message: row.try_get("error_message")?,
            recorded_at: row.try_get::<DateTime<Utc>, _>("recorded_at")?,
        })
    }
}

#[async_trait]
impl StateRepository for PostgresStateRepository {
    async fn record(&self, record: TransitionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO saga_transitions (saga_id, step_name, transition, status, error_kind, error_message, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.saga_id.as_str())
        .bind(&record.step_name)
        .bind(record.transition.as_str())
        .bind(record.status())
        .bind(&record.error_kind)
        .bind(&record.error_message)
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await?;

        metrics::counter!("state_store_records_written").increment(1);
        Ok(())
    }
}
