use crate::error::CoreError;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VersionRow {
    pub id: Uuid,
    pub container_id: Uuid,
    pub snapshot_id: Uuid,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

pub struct VersionRepository {
    pool: PgPool,
}

impl VersionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Computes `next_version` and inserts the new row within the given
    /// transaction, per §4.2's contract: the caller begins the transaction
    /// (so it can interleave the runtime snapshot-commit call between the
    /// version computation and the insert, per §9), locking the container
    /// row first so two concurrent commits cannot observe the same MAX.
    pub async fn next_version_and_insert(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        container_id: Uuid,
        snapshot_id: Uuid,
    ) -> Result<VersionRow, CoreError> {
        sqlx::query("SELECT id FROM containers WHERE id = $1 FOR UPDATE")
            .bind(container_id)
            .fetch_one(&mut **tx)
            .await?;

        let (max_version,): (Option<i32>,) = sqlx::query_as(
            "SELECT MAX(version) FROM container_versions WHERE container_id = $1",
        )
        .bind(container_id)
        .fetch_one(&mut **tx)
        .await?;
        let version = max_version.unwrap_or(0) + 1;

        let row = sqlx::query_as::<_, VersionRow>(
            "INSERT INTO container_versions (id, container_id, snapshot_id, version, created_at)
             VALUES ($1, $2, $3, $4, now())
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(container_id)
        .bind(snapshot_id)
        .bind(version)
        .fetch_one(&mut **tx)
        .await?;
        Ok(row)
    }

    pub async fn list_by_container(&self, container_id: Uuid) -> Result<Vec<VersionRow>, CoreError> {
        let rows = sqlx::query_as::<_, VersionRow>(
            "SELECT * FROM container_versions WHERE container_id = $1 ORDER BY version",
        )
        .bind(container_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn snapshot_id_for_version(
        &self,
        container_id: Uuid,
        version: i32,
    ) -> Result<Uuid, CoreError> {
        if version <= 0 {
            return Err(CoreError::not_found(format!("version {version}")));
        }
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT snapshot_id FROM container_versions WHERE container_id = $1 AND version = $2",
        )
        .bind(container_id)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|(id,)| id)
            .ok_or_else(|| CoreError::not_found(format!("version {version}")))
    }
}
