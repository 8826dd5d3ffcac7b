use crate::error::CoreError;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LifecycleEventRow {
    pub id: Uuid,
    pub container_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append-only audit trail. Best-effort per §7: callers log failures
    /// rather than rolling back the lifecycle transition that triggered them.
    pub async fn insert(
        &self,
        container_id: Uuid,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO lifecycle_events (id, container_id, event_type, payload, created_at)
             VALUES ($1, $2, $3, $4, now())",
        )
        .bind(Uuid::new_v4())
        .bind(container_id)
        .bind(event_type)
        .bind(payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_by_container(
        &self,
        container_id: Uuid,
    ) -> Result<Vec<LifecycleEventRow>, CoreError> {
        let rows = sqlx::query_as::<_, LifecycleEventRow>(
            "SELECT * FROM lifecycle_events WHERE container_id = $1 ORDER BY created_at",
        )
        .bind(container_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
