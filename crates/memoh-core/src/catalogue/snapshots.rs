use crate::error::CoreError;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SnapshotRow {
    pub id: Uuid,
    pub container_id: Uuid,
    pub parent_snapshot_id: Option<Uuid>,
    pub snapshotter: String,
    pub name: String,
    pub digest: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct SnapshotRepository {
    pool: PgPool,
}

impl SnapshotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        container_id: Uuid,
        parent_snapshot_id: Option<Uuid>,
        snapshotter: &str,
        name: &str,
    ) -> Result<SnapshotRow, CoreError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            "INSERT INTO snapshots (id, container_id, parent_snapshot_id, snapshotter, name, created_at)
             VALUES ($1, $2, $3, $4, $5, now())
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(container_id)
        .bind(parent_snapshot_id)
        .bind(snapshotter)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_by_container(&self, container_id: Uuid) -> Result<Vec<SnapshotRow>, CoreError> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            "SELECT * FROM snapshots WHERE container_id = $1 ORDER BY created_at",
        )
        .bind(container_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM snapshots WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
