//! FS operations (§4.5): the public, mount-aware entry points used by the
//! request boundary. Each function mounts the relevant snapshot(s), resolves
//! the caller's path under the mount, performs the operation, and releases
//! the mount(s) on every exit path — including its own errors.

pub mod ops;
pub mod patch;
pub mod path;

use crate::error::CoreError;
use crate::identity::{container_id_for, validate_user_id};
use crate::manager::{self, Core};
use crate::mount;
use memoh_types::{CommitResp, DiffResp, Encoding, ListResp, ReadResp, VersionInfo};

async fn mounted_host_path(
    core: &Core,
    user_id: &str,
    request_path: &str,
) -> Result<(mount::MountHandle, std::path::PathBuf, String), CoreError> {
    validate_user_id(user_id)?;
    let container_id = container_id_for(user_id);

    let info = core.runtime.get_container(&container_id).await?;
    if info.labels.get("user").map(String::as_str) != Some(user_id) {
        return Err(CoreError::forbidden(format!(
            "container {container_id} is not labelled for user {user_id}"
        )));
    }

    let data_mount = core.config.mcp.data_mount.clone();
    let container_path = path::resolve_container_path(&data_mount, request_path)?;
    let handle = mount::mount_container_snapshot(core.runtime.as_ref(), &container_id).await?;
    let host_path = path::resolve_host_path(handle.dir(), &data_mount, &container_path)?;
    Ok((handle, host_path, container_path))
}

pub async fn read(core: &Core, user_id: &str, request_path: &str) -> Result<ReadResp, CoreError> {
    let (handle, host_path, container_path) = mounted_host_path(core, user_id, request_path).await?;
    let result = ops::read(&host_path, &container_path).await;
    handle.release().await?;
    result
}

pub async fn list(
    core: &Core,
    user_id: &str,
    request_path: &str,
    recursive: bool,
) -> Result<ListResp, CoreError> {
    let (handle, host_path, container_path) = mounted_host_path(core, user_id, request_path).await?;
    let data_mount = core.config.mcp.data_mount.clone();
    let result = ops::list(&host_path, &data_mount, &container_path, recursive).await;
    handle.release().await?;
    result
}

pub async fn write_atomic(
    core: &Core,
    user_id: &str,
    request_path: &str,
    content: &str,
    encoding: Encoding,
    mode: Option<u32>,
    mtime: Option<chrono::DateTime<chrono::Utc>>,
) -> Result<(), CoreError> {
    let (handle, host_path, _container_path) = mounted_host_path(core, user_id, request_path).await?;
    let result = ops::write_atomic(&host_path, content, encoding, mode, mtime).await;
    handle.release().await?;
    result
}

pub async fn apply_patch(
    core: &Core,
    user_id: &str,
    request_path: &str,
    patch_text: &str,
) -> Result<(), CoreError> {
    let (handle, host_path, _container_path) = mounted_host_path(core, user_id, request_path).await?;
    let result = ops::apply_patch(&host_path, patch_text).await;
    handle.release().await?;
    result
}

/// `Commit()` — delegates to `manager::create_version`.
pub async fn commit(core: &Core, user_id: &str) -> Result<CommitResp, CoreError> {
    let version: VersionInfo = manager::create_version(core, user_id).await?;
    Ok(CommitResp {
        id: version.id,
        version: version.version,
        snapshot_id: version.snapshot_id,
        created_at: version.created_at,
    })
}

/// `Diff(path, version)`.
pub async fn diff(
    core: &Core,
    user_id: &str,
    request_path: &str,
    version: i32,
) -> Result<DiffResp, CoreError> {
    validate_user_id(user_id)?;
    if version <= 0 {
        return Err(CoreError::not_found(format!("version {version}")));
    }
    let container_id = container_id_for(user_id);

    let info = core.runtime.get_container(&container_id).await?;
    if info.labels.get("user").map(String::as_str) != Some(user_id) {
        return Err(CoreError::forbidden(format!(
            "container {container_id} is not labelled for user {user_id}"
        )));
    }

    let data_mount = core.config.mcp.data_mount.clone();
    let container_path = path::resolve_container_path(&data_mount, request_path)?;

    let version_snapshot = manager::version_snapshot_id(core, user_id, version).await?;

    let live_handle = mount::mount_container_snapshot(core.runtime.as_ref(), &container_id).await?;
    let version_handle = match mount::mount_snapshot(core.runtime.as_ref(), "overlayfs", &version_snapshot).await
    {
        Ok(h) => h,
        Err(err) => {
            live_handle.release().await.ok();
            return Err(err);
        }
    };

    let live_host_path = match path::resolve_host_path(live_handle.dir(), &data_mount, &container_path) {
        Ok(p) => p,
        Err(err) => {
            live_handle.release().await.ok();
            version_handle.release().await.ok();
            return Err(err);
        }
    };
    let version_host_path = match path::resolve_host_path(version_handle.dir(), &data_mount, &container_path) {
        Ok(p) => p,
        Err(err) => {
            live_handle.release().await.ok();
            version_handle.release().await.ok();
            return Err(err);
        }
    };

    let diff_text = ops::diff(&live_host_path, &version_host_path, &container_path).await;
    live_handle.release().await.ok();
    version_handle.release().await.ok();

    Ok(DiffResp {
        path: container_path,
        version,
        diff: diff_text?,
    })
}

