//! Path handling per §4.5: `resolve_container_path` maps a caller-supplied
//! path onto the container's data mount; `resolve_host_path` then joins it
//! under the mounted host directory without ever following a symlink that
//! would escape the mount (invariant 7 / S6).

use crate::error::CoreError;
use std::path::{Component, Path, PathBuf};

/// Lexically cleans a path (resolves `.`/`..` without touching the
/// filesystem), refusing to let `..` climb above the root.
fn lexical_clean(path: &Path) -> Result<PathBuf, CoreError> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return Err(CoreError::invalid_argument("path escapes root via '..'"));
                }
            }
            Component::Prefix(_) => {}
        }
    }
    Ok(out)
}

/// `resolve_container_path(data_mount, request_path)`.
pub fn resolve_container_path(data_mount: &str, request_path: &str) -> Result<String, CoreError> {
    let data_mount_path = Path::new(data_mount);
    if !data_mount_path.is_absolute() {
        return Err(CoreError::invalid_argument("data_mount must be absolute"));
    }

    let joined = if Path::new(request_path).is_absolute() {
        Path::new(request_path).to_path_buf()
    } else {
        data_mount_path.join(request_path)
    };

    let cleaned = lexical_clean(&joined)?;

    if !cleaned.starts_with(data_mount_path) {
        return Err(CoreError::invalid_argument(format!(
            "path {request_path} is outside data mount {data_mount}"
        )));
    }

    Ok(cleaned.to_string_lossy().into_owned())
}

/// `resolve_host_path(mount_dir, container_path)`: securely joins
/// `container_path` (already resolved under the data mount) onto the host
/// mount directory, refusing to follow any symlink component that would
/// place the final path outside `mount_dir`.
pub fn resolve_host_path(mount_dir: &Path, data_mount: &str, container_path: &str) -> Result<PathBuf, CoreError> {
    let relative = Path::new(container_path)
        .strip_prefix(data_mount)
        .unwrap_or_else(|_| Path::new(container_path));

    let mut resolved = mount_dir.to_path_buf();
    for component in relative.components() {
        let part = match component {
            Component::Normal(part) => part,
            Component::RootDir | Component::CurDir | Component::Prefix(_) => continue,
            Component::ParentDir => {
                return Err(CoreError::invalid_argument("path escapes root via '..'"));
            }
        };

        let candidate = resolved.join(part);
        match std::fs::symlink_metadata(&candidate) {
            Ok(meta) if meta.file_type().is_symlink() => {
                let target = std::fs::read_link(&candidate)?;
                let absolute_target = if target.is_absolute() {
                    target
                } else {
                    candidate
                        .parent()
                        .map(|p| p.join(&target))
                        .unwrap_or(target)
                };
                let canonical = absolute_target
                    .canonicalize()
                    .unwrap_or(absolute_target);
                if !canonical.starts_with(mount_dir) {
                    return Err(CoreError::invalid_argument(
                        "path resolves through a symlink that escapes the mount",
                    ));
                }
                resolved = canonical;
            }
            _ => resolved = candidate,
        }
    }

    if !resolved.starts_with(mount_dir) {
        return Err(CoreError::invalid_argument("path escapes the mount directory"));
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_relative_path() {
        assert_eq!(
            resolve_container_path("/data", "notes.txt").unwrap(),
            "/data/notes.txt"
        );
    }

    #[test]
    fn accepts_absolute_path_within_mount() {
        assert_eq!(
            resolve_container_path("/data", "/data/a/b.txt").unwrap(),
            "/data/a/b.txt"
        );
    }

    #[test]
    fn rejects_path_outside_mount() {
        assert!(resolve_container_path("/data", "/etc/passwd").is_err());
    }

    #[test]
    fn rejects_dot_dot_escape() {
        assert!(resolve_container_path("/data", "../../etc/passwd").is_err());
        assert!(resolve_container_path("/data", "/data/../../etc/passwd").is_err());
    }

    #[test]
    fn cleans_dot_dot_within_bounds() {
        assert_eq!(
            resolve_container_path("/data", "a/../b.txt").unwrap(),
            "/data/b.txt"
        );
    }

    #[test]
    fn resolve_host_path_stays_under_mount() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("sub")).unwrap();
        let resolved = resolve_host_path(tmp.path(), "/data", "/data/sub/file.txt").unwrap();
        assert!(resolved.starts_with(tmp.path()));
        assert_eq!(resolved, tmp.path().join("sub/file.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn resolve_host_path_rejects_symlink_escape() {
        let tmp = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("escape")).unwrap();
        let result = resolve_host_path(tmp.path(), "/data", "/data/escape/secret.txt");
        assert!(result.is_err());
    }
}
