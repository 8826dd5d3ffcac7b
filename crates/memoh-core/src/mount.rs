//! Snapshot mounter (§4.4): mount a named snapshot onto a fresh host
//! directory and guarantee release on every exit path.
//!
//! `fs_type == "bind"` mounts (produced by [`crate::runtime::docker`]) get a
//! real Linux bind mount via `nix::mount`, so the FS-operations layer never
//! touches the backing directory directly. `fs_type == "direct"` (the fake
//! adapter used in tests) skips the syscall and uses the reported directory
//! as-is — there is nothing to isolate in a test fixture.

use crate::error::CoreError;
use crate::runtime::RuntimeAdapter;
use std::path::PathBuf;

pub struct MountHandle {
    dir: PathBuf,
    bound: bool,
    released: bool,
}

impl MountHandle {
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    /// Explicit release, preferred at call sites so the unmount happens at a
    /// known point rather than whenever the guard happens to drop.
    pub async fn release(mut self) -> Result<(), CoreError> {
        self.do_release()
    }

    fn do_release(&mut self) -> Result<(), CoreError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        if self.bound {
            unmount(&self.dir)?;
        }
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(CoreError::from(e)),
        }
        Ok(())
    }
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        if !self.released {
            if let Err(err) = self.do_release() {
                tracing::warn!(dir = %self.dir.display(), error = %err, "mount handle release failed on drop");
            }
        }
    }
}

#[cfg(target_os = "linux")]
fn bind_mount(source: &std::path::Path, target: &std::path::Path) -> Result<(), CoreError> {
    use nix::mount::{mount, MsFlags};
    mount(
        Some(source),
        target,
        None::<&str>,
        MsFlags::MS_BIND | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|errno| CoreError::Internal(format!("bind mount {source:?} -> {target:?}: {errno}")))
}

#[cfg(target_os = "linux")]
fn unmount(target: &std::path::Path) -> Result<(), CoreError> {
    use nix::mount::{umount2, MntFlags};
    umount2(target, MntFlags::MNT_DETACH)
        .map_err(|errno| CoreError::Internal(format!("unmount {target:?}: {errno}")))
}

#[cfg(not(target_os = "linux"))]
fn bind_mount(_source: &std::path::Path, _target: &std::path::Path) -> Result<(), CoreError> {
    Err(CoreError::Internal(
        "bind mounts are only supported on linux".to_string(),
    ))
}

#[cfg(not(target_os = "linux"))]
fn unmount(_target: &std::path::Path) -> Result<(), CoreError> {
    Ok(())
}

async fn mount_from(
    runtime: &dyn RuntimeAdapter,
    snapshotter: &str,
    key: &str,
) -> Result<MountHandle, CoreError> {
    let mounts = runtime.snapshot_mounts(snapshotter, key).await?;
    let info = mounts
        .into_iter()
        .next()
        .ok_or_else(|| CoreError::Internal(format!("no mount instructions for snapshot {key}")))?;

    let dir = tempfile::Builder::new()
        .prefix("memoh-mount-")
        .tempdir()
        .map_err(CoreError::from)?
        .into_path();

    let bound = match info.fs_type.as_str() {
        "bind" => {
            if let Err(err) = bind_mount(std::path::Path::new(&info.source), &dir) {
                let _ = std::fs::remove_dir_all(&dir);
                return Err(err);
            }
            true
        }
        "direct" => {
            let _ = std::fs::remove_dir(&dir);
            symlink_or_copy(std::path::Path::new(&info.source), &dir)?;
            false
        }
        other => {
            let _ = std::fs::remove_dir_all(&dir);
            return Err(CoreError::Internal(format!("unsupported mount fs_type {other}")));
        }
    };

    Ok(MountHandle {
        dir,
        bound,
        released: false,
    })
}

#[cfg(unix)]
fn symlink_or_copy(source: &std::path::Path, target: &std::path::Path) -> Result<(), CoreError> {
    std::os::unix::fs::symlink(source, target).map_err(CoreError::from)
}

#[cfg(not(unix))]
fn symlink_or_copy(source: &std::path::Path, target: &std::path::Path) -> Result<(), CoreError> {
    std::fs::create_dir_all(target)?;
    Ok(())
}

/// `MountContainerSnapshot(container_id)`.
pub async fn mount_container_snapshot(
    runtime: &dyn RuntimeAdapter,
    container_id: &str,
) -> Result<MountHandle, CoreError> {
    let info = runtime.get_container(container_id).await?;
    mount_from(runtime, &info.snapshotter, &info.snapshot_key).await
}

/// `MountSnapshot(snapshotter, snapshot_key)`, used for version diff.
pub async fn mount_snapshot(
    runtime: &dyn RuntimeAdapter,
    snapshotter: &str,
    snapshot_key: &str,
) -> Result<MountHandle, CoreError> {
    mount_from(runtime, snapshotter, snapshot_key).await
}
