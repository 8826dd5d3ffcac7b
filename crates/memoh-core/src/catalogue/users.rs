use crate::error::CoreError;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub external_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, external_id: &str) -> Result<UserRow, CoreError> {
        self.create_with_id(Uuid::new_v4(), external_id).await
    }

    pub async fn create_with_id(&self, id: Uuid, external_id: &str) -> Result<UserRow, CoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (id, external_id, created_at) VALUES ($1, $2, now())
             RETURNING id, external_id, created_at",
        )
        .bind(id)
        .bind(external_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_by_username(&self, external_id: &str) -> Result<UserRow, CoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, external_id, created_at FROM users WHERE external_id = $1",
        )
        .bind(external_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<UserRow, CoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, external_id, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Reconciliation helper: returns the existing row if present, otherwise
    /// inserts a fresh one. Used by `EnsureUser` when the runtime already has
    /// a container labelled for this user but the catalogue lagged behind.
    pub async fn upsert_by_username(&self, external_id: &str) -> Result<UserRow, CoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (id, external_id, created_at) VALUES ($1, $2, now())
             ON CONFLICT (external_id) DO UPDATE SET external_id = EXCLUDED.external_id
             RETURNING id, external_id, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(external_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn count(&self) -> Result<i64, CoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
