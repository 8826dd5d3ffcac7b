use crate::error::CoreError;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContainerRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub container_id: String,
    pub container_name: String,
    pub image: String,
    pub status: String,
    pub namespace: String,
    pub auto_start: bool,
    pub host_path: Option<String>,
    pub container_path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
}

pub struct NewContainer {
    pub user_id: Uuid,
    pub container_id: String,
    pub container_name: String,
    pub image: String,
    pub namespace: String,
    pub auto_start: bool,
    pub host_path: Option<String>,
    pub container_path: String,
}

pub struct ContainerRepository {
    pool: PgPool,
}

impl ContainerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, req: NewContainer) -> Result<ContainerRow, CoreError> {
        let row = sqlx::query_as::<_, ContainerRow>(
            "INSERT INTO containers
                (id, user_id, container_id, container_name, image, status, namespace,
                 auto_start, host_path, container_path, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, 'created', $6, $7, $8, $9, now(), now())
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(req.user_id)
        .bind(&req.container_id)
        .bind(&req.container_name)
        .bind(&req.image)
        .bind(&req.namespace)
        .bind(req.auto_start)
        .bind(&req.host_path)
        .bind(&req.container_path)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_by_container_id(&self, container_id: &str) -> Result<ContainerRow, CoreError> {
        let row = sqlx::query_as::<_, ContainerRow>("SELECT * FROM containers WHERE container_id = $1")
            .bind(container_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn try_get_by_container_id(
        &self,
        container_id: &str,
    ) -> Result<Option<ContainerRow>, CoreError> {
        let row = sqlx::query_as::<_, ContainerRow>("SELECT * FROM containers WHERE container_id = $1")
            .bind(container_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<ContainerRow>, CoreError> {
        let rows = sqlx::query_as::<_, ContainerRow>(
            "SELECT * FROM containers WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn update_status_with_timestamps(
        &self,
        container_id: &str,
        status: &str,
        started_at: Option<DateTime<Utc>>,
        stopped_at: Option<DateTime<Utc>>,
    ) -> Result<(), CoreError> {
        sqlx::query(
            "UPDATE containers
             SET status = $2,
                 started_at = COALESCE($3, started_at),
                 stopped_at = COALESCE($4, stopped_at),
                 updated_at = now()
             WHERE container_id = $1",
        )
        .bind(container_id)
        .bind(status)
        .bind(started_at)
        .bind(stopped_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete(&self, container_id: &str) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM containers WHERE container_id = $1")
            .bind(container_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
