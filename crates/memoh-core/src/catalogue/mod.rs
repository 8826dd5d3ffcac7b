//! Catalogue store (§4.2): relational record of users, containers,
//! snapshots, versions, and lifecycle events — one `sqlx::PgPool`-backed
//! repository struct per entity, each constructed as `Repository::new(pool)`.

pub mod containers;
pub mod events;
pub mod snapshots;
pub mod users;
pub mod versions;

pub use containers::{ContainerRepository, ContainerRow, NewContainer};
pub use events::{EventRepository, LifecycleEventRow};
pub use snapshots::{SnapshotRepository, SnapshotRow};
pub use users::{UserRepository, UserRow};
pub use versions::{VersionRepository, VersionRow};

use sqlx::PgPool;

/// Bundles one repository of each kind over a shared pool, the way the
/// teacher's `AppState` groups feature-specific repositories for services
/// that need more than one.
#[derive(Clone)]
pub struct Catalogue {
    pub users: std::sync::Arc<UserRepository>,
    pub containers: std::sync::Arc<ContainerRepository>,
    pub snapshots: std::sync::Arc<SnapshotRepository>,
    pub versions: std::sync::Arc<VersionRepository>,
    pub events: std::sync::Arc<EventRepository>,
    pool: PgPool,
}

impl Catalogue {
    pub fn new(pool: PgPool) -> Self {
        Self {
            users: std::sync::Arc::new(UserRepository::new(pool.clone())),
            containers: std::sync::Arc::new(ContainerRepository::new(pool.clone())),
            snapshots: std::sync::Arc::new(SnapshotRepository::new(pool.clone())),
            versions: std::sync::Arc::new(VersionRepository::new(pool.clone())),
            events: std::sync::Arc::new(EventRepository::new(pool.clone())),
            pool,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
