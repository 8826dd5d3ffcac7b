//! User-container manager (§4.3): the central orchestrator composing the
//! runtime adapter and catalogue store inside a per-user critical section.
//! Grounded on the teacher's `containers/service.rs` shape — free `async fn`
//! taking a shared app handle, not a `self`-ful god object.

pub mod lock;

use crate::catalogue::{Catalogue, NewContainer};
use crate::config::Config;
use crate::error::CoreError;
use crate::identity::{container_id_for, validate_user_id, version_snapshot_name};
use crate::runtime::{
    CreateContainerRequest, DeleteContainerOpts, DeleteTaskOpts, ExecOpts, PullImageOpts, RuntimeAdapter,
    SpecOpts, StartTaskOpts, StopTaskOpts,
};
use memoh_types::{Container, ExecRequest, ExecResponse, VersionInfo};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const SNAPSHOTTER: &str = "overlayfs";
const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared handle the request boundary and FS operations both depend on.
/// Analogous to the teacher's `AppState`.
#[derive(Clone)]
pub struct Core {
    pub runtime: Arc<dyn RuntimeAdapter>,
    pub catalogue: Catalogue,
    pub config: Arc<Config>,
    pub locks: Arc<lock::UserLockTable>,
}

impl Core {
    pub fn new(runtime: Arc<dyn RuntimeAdapter>, catalogue: Catalogue, config: Arc<Config>) -> Self {
        Self {
            runtime,
            catalogue,
            config,
            locks: Arc::new(lock::UserLockTable::new()),
        }
    }

    fn data_mount(&self) -> &str {
        &self.config.mcp.data_mount
    }
}

fn to_wire_container(row: &crate::catalogue::ContainerRow) -> Container {
    Container {
        id: row.id,
        user_id: row.user_id,
        container_id: row.container_id.clone(),
        container_name: row.container_name.clone(),
        image: row.image.clone(),
        status: row.status.clone(),
        namespace: row.namespace.clone(),
        auto_start: row.auto_start,
        host_path: row.host_path.clone(),
        container_path: row.container_path.clone(),
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

/// `Init()` — idempotent bootstrap: pulls the configured base image if
/// absent.
pub async fn init(core: &Core) -> Result<(), CoreError> {
    let image = &core.config.mcp.image;
    if core.runtime.get_image(image).await.is_err() {
        core.runtime
            .pull_image(
                image,
                PullImageOpts {
                    unpack: true,
                    snapshotter: SNAPSHOTTER.to_string(),
                },
            )
            .await?;
    }
    Ok(())
}

/// Checks the container's `user` label against the caller's user-id
/// (invariant 2 / §8.4). Called before any manager or FS operation touches
/// the container.
fn check_label(info: &crate::runtime::ContainerInfo, user_id: &str) -> Result<(), CoreError> {
    match info.labels.get("user") {
        Some(label_user) if label_user == user_id => Ok(()),
        _ => Err(CoreError::forbidden(format!(
            "container {} is not labelled for user {user_id}",
            info.id
        ))),
    }
}

/// `EnsureUser(user_id)`.
pub async fn ensure_user(core: &Core, user_id: &str) -> Result<Container, CoreError> {
    validate_user_id(user_id)?;
    let _guard = core.locks.acquire(user_id).await;
    ensure_user_locked(core, user_id).await
}

async fn ensure_user_locked(core: &Core, user_id: &str) -> Result<Container, CoreError> {
    let container_id = container_id_for(user_id);

    if let Ok(info) = core.runtime.get_container(&container_id).await {
        check_label(&info, user_id)?;
        if let Some(row) = core.catalogue.containers.try_get_by_container_id(&container_id).await? {
            return Ok(to_wire_container(&row));
        }
        // Runtime has the container but the catalogue lagged; reconcile.
        let user = core.catalogue.users.upsert_by_username(user_id).await?;
        let row = core
            .catalogue
            .containers
            .create(NewContainer {
                user_id: user.id,
                container_id: container_id.clone(),
                container_name: container_id.clone(),
                image: info.image_ref.clone(),
                namespace: core.config.containerd.namespace.clone(),
                auto_start: false,
                host_path: Some(host_path_for(core, user_id)),
                container_path: core.data_mount().to_string(),
            })
            .await?;
        return Ok(to_wire_container(&row));
    }

    init(core).await?;

    let host_path = host_path_for(core, user_id);
    tokio::fs::create_dir_all(&host_path).await?;

    core.runtime
        .prepare_snapshot(SNAPSHOTTER, &container_id, None)
        .await?;

    let mut labels = HashMap::new();
    labels.insert("user".to_string(), user_id.to_string());

    core.runtime
        .create_container(CreateContainerRequest {
            id: container_id.clone(),
            image_ref: core.config.mcp.image.clone(),
            snapshot_id: Some(container_id.clone()),
            snapshotter: SNAPSHOTTER.to_string(),
            labels,
            spec_opts: SpecOpts {
                mounts: vec![crate::runtime::BindMount {
                    host_path: host_path.clone(),
                    container_path: core.data_mount().to_string(),
                }],
            },
        })
        .await?;

    let user = core.catalogue.users.upsert_by_username(user_id).await?;
    let row = core
        .catalogue
        .containers
        .create(NewContainer {
            user_id: user.id,
            container_id: container_id.clone(),
            container_name: container_id.clone(),
            image: core.config.mcp.image.clone(),
            namespace: core.config.containerd.namespace.clone(),
            auto_start: false,
            host_path: Some(host_path),
            container_path: core.data_mount().to_string(),
        })
        .await?;

    core.catalogue
        .snapshots
        .create(row.id, None, SNAPSHOTTER, &container_id)
        .await?;

    emit_event(core, row.id, "created").await;

    Ok(to_wire_container(&row))
}

fn host_path_for(core: &Core, user_id: &str) -> String {
    format!(
        "{}/{}",
        core.config.mcp.host_path_root.trim_end_matches('/'),
        user_id
    )
}

async fn emit_event(core: &Core, container_row_id: Uuid, event_type: &str) {
    if let Err(err) = core
        .catalogue
        .events
        .insert(container_row_id, event_type, serde_json::json!({}))
        .await
    {
        tracing::warn!(container_id = %container_row_id, event_type, error = %err, "failed to append lifecycle event");
    }
}

async fn load_container_checked(
    core: &Core,
    user_id: &str,
) -> Result<(crate::catalogue::ContainerRow, crate::runtime::ContainerInfo), CoreError> {
    validate_user_id(user_id)?;
    let container_id = container_id_for(user_id);
    let row = core.catalogue.containers.get_by_container_id(&container_id).await?;
    let info = core.runtime.get_container(&container_id).await?;
    check_label(&info, user_id)?;
    Ok((row, info))
}

/// `Start(user_id)`.
pub async fn start(core: &Core, user_id: &str) -> Result<(), CoreError> {
    validate_user_id(user_id)?;
    let _guard = core.locks.acquire(user_id).await;
    let (row, _info) = load_container_checked(core, user_id).await?;

    if core.runtime.get_task(&row.container_id).await.map(|t| t.running).unwrap_or(false) {
        return Ok(());
    }

    core.runtime
        .start_task(
            &row.container_id,
            StartTaskOpts {
                use_stdio: true,
                terminal: false,
                fifo_dir: None,
            },
        )
        .await?;

    core.catalogue
        .containers
        .update_status_with_timestamps(&row.container_id, "running", Some(chrono::Utc::now()), None)
        .await?;
    emit_event(core, row.id, "started").await;
    Ok(())
}

/// `Stop(user_id, timeout)`.
pub async fn stop(core: &Core, user_id: &str, timeout: Duration) -> Result<(), CoreError> {
    validate_user_id(user_id)?;
    let _guard = core.locks.acquire(user_id).await;
    let (row, _info) = load_container_checked(core, user_id).await?;

    match core.runtime.get_task(&row.container_id).await {
        Ok(_) => {
            core.runtime
                .stop_task(
                    &row.container_id,
                    StopTaskOpts {
                        signal: 15,
                        timeout,
                        force: true,
                    },
                )
                .await?;
            core.runtime
                .delete_task(&row.container_id, DeleteTaskOpts { force: true })
                .await?;
        }
        Err(CoreError::NotFound(_)) => {}
        Err(err) => return Err(err),
    }

    core.catalogue
        .containers
        .update_status_with_timestamps(&row.container_id, "stopped", None, Some(chrono::Utc::now()))
        .await?;
    emit_event(core, row.id, "stopped").await;
    Ok(())
}

/// `Delete(user_id)`.
pub async fn delete(core: &Core, user_id: &str) -> Result<(), CoreError> {
    validate_user_id(user_id)?;
    let _guard = core.locks.acquire(user_id).await;
    let (row, _info) = load_container_checked(core, user_id).await?;

    if core.runtime.get_task(&row.container_id).await.is_ok() {
        core.runtime
            .stop_task(
                &row.container_id,
                StopTaskOpts {
                    signal: 15,
                    timeout: DEFAULT_STOP_TIMEOUT,
                    force: true,
                },
            )
            .await?;
        core.runtime
            .delete_task(&row.container_id, DeleteTaskOpts { force: true })
            .await?;
    }

    delete_locked(core, &row).await
}

async fn delete_locked(core: &Core, row: &crate::catalogue::ContainerRow) -> Result<(), CoreError> {
    core.runtime
        .delete_container(
            &row.container_id,
            DeleteContainerOpts {
                cleanup_snapshot: true,
            },
        )
        .await?;
    core.runtime.delete_snapshot(SNAPSHOTTER, &row.container_id).await.ok();

    emit_event(core, row.id, "deleted").await;
    core.catalogue.containers.delete(&row.container_id).await?;
    Ok(())
}

/// `Exec(ExecRequest) -> {exit_code}`.
pub async fn exec(core: &Core, user_id: &str, req: ExecRequest) -> Result<ExecResponse, CoreError> {
    validate_user_id(user_id)?;
    let _guard = core.locks.acquire(user_id).await;
    let (row, _info) = load_container_checked(core, user_id).await?;

    if !core.runtime.get_task(&row.container_id).await.map(|t| t.running).unwrap_or(false) {
        core.runtime
            .start_task(
                &row.container_id,
                StartTaskOpts {
                    use_stdio: true,
                    terminal: req.terminal,
                    fifo_dir: None,
                },
            )
            .await?;
        core.catalogue
            .containers
            .update_status_with_timestamps(&row.container_id, "running", Some(chrono::Utc::now()), None)
            .await?;
    }

    let result = core
        .runtime
        .exec(
            &row.container_id,
            ExecOpts {
                args: req.command,
                env: req.env,
                work_dir: req.work_dir,
                terminal: req.terminal,
                use_stdio: true,
            },
        )
        .await?;

    Ok(ExecResponse {
        exit_code: result.exit_code,
    })
}

/// `CreateVersion(user_id) -> {id, version, snapshot_id, created_at}`.
pub async fn create_version(core: &Core, user_id: &str) -> Result<VersionInfo, CoreError> {
    validate_user_id(user_id)?;
    let _guard = core.locks.acquire(user_id).await;
    let (row, _info) = load_container_checked(core, user_id).await?;

    let snapshot_count = core.catalogue.versions.list_by_container(row.id).await?.len() as i32;
    let next_version = snapshot_count + 1;
    let snapshot_name = version_snapshot_name(&row.container_id, next_version);

    core.runtime
        .commit_snapshot(SNAPSHOTTER, &snapshot_name, &row.container_id)
        .await?;

    let compensate = |core: &Core, name: String| async move {
        core.runtime.delete_snapshot(SNAPSHOTTER, &name).await.ok();
    };

    let new_writable_key = format!("{}-{}", row.container_id, Uuid::new_v4());
    if let Err(err) = core
        .runtime
        .prepare_snapshot(SNAPSHOTTER, &new_writable_key, Some(&snapshot_name))
        .await
    {
        compensate(core, snapshot_name).await;
        return Err(err);
    }

    let mut tx = core.catalogue.pool().begin().await.map_err(CoreError::from)?;

    let snapshot_row = match sqlx::query_as::<_, crate::catalogue::SnapshotRow>(
        "INSERT INTO snapshots (id, container_id, parent_snapshot_id, snapshotter, name, created_at)
         VALUES ($1, $2, NULL, $3, $4, now()) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(row.id)
    .bind(SNAPSHOTTER)
    .bind(&snapshot_name)
    .fetch_one(&mut *tx)
    .await
    {
        Ok(row) => row,
        Err(err) => {
            let _ = tx.rollback().await;
            compensate(core, snapshot_name).await;
            return Err(CoreError::from(err));
        }
    };

    let version_row = match crate::catalogue::VersionRepository::next_version_and_insert(
        &mut tx,
        row.id,
        snapshot_row.id,
    )
    .await
    {
        Ok(v) => v,
        Err(err) => {
            let _ = tx.rollback().await;
            compensate(core, snapshot_name).await;
            return Err(err);
        }
    };

    tx.commit().await.map_err(CoreError::from)?;

    core.runtime
        .delete_snapshot(SNAPSHOTTER, &row.container_id)
        .await
        .ok();
    // Re-point the container's active snapshot by recreating it against the
    // freshly prepared writable snapshot, keeping the external container-id
    // stable per §9 open question (ii).
    core.runtime
        .delete_container(&row.container_id, DeleteContainerOpts { cleanup_snapshot: false })
        .await?;
    core.runtime
        .create_container(CreateContainerRequest {
            id: row.container_id.clone(),
            image_ref: row.image.clone(),
            snapshot_id: Some(new_writable_key),
            snapshotter: SNAPSHOTTER.to_string(),
            labels: {
                let mut labels = HashMap::new();
                labels.insert("user".to_string(), user_id.to_string());
                labels
            },
            spec_opts: SpecOpts {
                mounts: vec![crate::runtime::BindMount {
                    host_path: row.host_path.clone().unwrap_or_default(),
                    container_path: row.container_path.clone(),
                }],
            },
        })
        .await?;

    emit_event(core, row.id, "version_created").await;

    Ok(VersionInfo {
        id: version_row.id,
        version: version_row.version,
        snapshot_id: snapshot_name,
        created_at: version_row.created_at,
    })
}

/// `ListVersions(user_id)`, ordered ascending.
pub async fn list_versions(core: &Core, user_id: &str) -> Result<Vec<VersionInfo>, CoreError> {
    validate_user_id(user_id)?;
    let container_id = container_id_for(user_id);
    let row = core.catalogue.containers.get_by_container_id(&container_id).await?;
    let versions = core.catalogue.versions.list_by_container(row.id).await?;
    Ok(versions
        .into_iter()
        .map(|v| VersionInfo {
            id: v.id,
            version: v.version,
            snapshot_id: version_snapshot_name(&container_id, v.version),
            created_at: v.created_at,
        })
        .collect())
}

/// `VersionSnapshotID(user_id, version)`.
pub async fn version_snapshot_id(core: &Core, user_id: &str, version: i32) -> Result<String, CoreError> {
    validate_user_id(user_id)?;
    let container_id = container_id_for(user_id);
    let row = core.catalogue.containers.get_by_container_id(&container_id).await?;
    core.catalogue
        .versions
        .snapshot_id_for_version(row.id, version)
        .await?;
    Ok(version_snapshot_name(&container_id, version))
}

/// `Rollback(user_id, version)`.
pub async fn rollback(core: &Core, user_id: &str, version: i32) -> Result<(), CoreError> {
    validate_user_id(user_id)?;
    let _guard = core.locks.acquire(user_id).await;
    let (row, _info) = load_container_checked(core, user_id).await?;

    if core.runtime.get_task(&row.container_id).await.is_ok() {
        core.runtime
            .stop_task(
                &row.container_id,
                StopTaskOpts {
                    signal: 15,
                    timeout: DEFAULT_STOP_TIMEOUT,
                    force: true,
                },
            )
            .await
            .ok();
        core.runtime
            .delete_task(&row.container_id, DeleteTaskOpts { force: true })
            .await
            .ok();
    }

    let target_snapshot = core
        .catalogue
        .versions
        .snapshot_id_for_version(row.id, version)
        .await?;
    let target_snapshot_name = version_snapshot_name(&row.container_id, version);
    let _ = target_snapshot;

    core.runtime
        .delete_container(&row.container_id, DeleteContainerOpts { cleanup_snapshot: true })
        .await?;

    let fresh_key = format!("{}-{}", row.container_id, Uuid::new_v4());
    core.runtime
        .prepare_snapshot(SNAPSHOTTER, &fresh_key, Some(&target_snapshot_name))
        .await?;

    let mut labels = HashMap::new();
    labels.insert("user".to_string(), user_id.to_string());
    core.runtime
        .create_container(CreateContainerRequest {
            id: row.container_id.clone(),
            image_ref: row.image.clone(),
            snapshot_id: Some(fresh_key),
            snapshotter: SNAPSHOTTER.to_string(),
            labels,
            spec_opts: SpecOpts {
                mounts: vec![crate::runtime::BindMount {
                    host_path: row.host_path.clone().unwrap_or_default(),
                    container_path: row.container_path.clone(),
                }],
            },
        })
        .await?;

    core.catalogue
        .containers
        .update_status_with_timestamps(&row.container_id, "stopped", None, Some(chrono::Utc::now()))
        .await?;
    emit_event(core, row.id, "rolled_back").await;
    Ok(())
}
