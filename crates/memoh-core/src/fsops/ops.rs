//! FS operations (§4.5): read/list/write-atomic/apply-patch/diff against a
//! mounted snapshot. Every function takes the already-resolved host path
//! (see `path.rs`) — callers obtain mounts via `crate::mount` and release
//! them on every exit path, including these functions' own errors.

use crate::error::CoreError;
use base64::Engine;
use chrono::{DateTime, Utc};
use memoh_types::{Encoding, Entry, ListResp, ReadResp};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

fn system_time_to_chrono(t: std::time::SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(t)
}

/// `Read(path)`.
pub async fn read(host_path: &Path, container_path: &str) -> Result<ReadResp, CoreError> {
    let meta = tokio::fs::metadata(host_path).await?;
    if meta.is_dir() {
        return Err(CoreError::invalid_argument(format!(
            "{container_path} is a directory"
        )));
    }
    let bytes = tokio::fs::read(host_path).await?;
    let mtime = system_time_to_chrono(meta.modified()?);
    Ok(ReadResp {
        path: container_path.to_string(),
        content: base64::engine::general_purpose::STANDARD.encode(&bytes),
        encoding: Encoding::Base64,
        size: meta.len(),
        mode: meta.permissions().mode() & 0o777,
        mod_time: mtime,
    })
}

/// `List(path, recursive)`.
pub async fn list(host_path: &Path, data_mount: &str, container_path: &str, recursive: bool) -> Result<ListResp, CoreError> {
    let meta = tokio::fs::metadata(host_path).await?;
    if !meta.is_dir() {
        return Err(CoreError::invalid_argument(format!(
            "{container_path} is not a directory"
        )));
    }

    let mut entries = Vec::new();
    if recursive {
        walk_recursive(host_path, host_path, data_mount, &mut entries).await?;
    } else {
        let mut dir = tokio::fs::read_dir(host_path).await?;
        while let Some(entry) = dir.next_entry().await? {
            entries.push(entry_for(&entry.path(), host_path, data_mount).await?);
        }
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(ListResp {
        path: container_path.to_string(),
        entries,
    })
}

fn walk_recursive<'a>(
    dir: &'a Path,
    root: &'a Path,
    data_mount: &'a str,
    out: &'a mut Vec<Entry>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), CoreError>> + Send + 'a>> {
    Box::pin(async move {
        let mut read_dir = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            out.push(entry_for(&path, root, data_mount).await?);
            if entry.file_type().await?.is_dir() {
                walk_recursive(&path, root, data_mount, out).await?;
            }
        }
        Ok(())
    })
}

async fn entry_for(path: &Path, root: &Path, data_mount: &str) -> Result<Entry, CoreError> {
    let meta = tokio::fs::symlink_metadata(path).await?;
    let relative = path.strip_prefix(root).unwrap_or(path);
    let container_path = format!("{}/{}", data_mount.trim_end_matches('/'), relative.to_string_lossy());
    Ok(Entry {
        path: container_path,
        is_dir: meta.is_dir(),
        size: meta.len(),
        mode: meta.permissions().mode() & 0o777,
        mod_time: system_time_to_chrono(meta.modified()?),
    })
}

/// `WriteAtomic(path, content, encoding, mode?, mtime?)`. The rename is the
/// single commit point — any failure before it leaves no trace.
pub async fn write_atomic(
    host_path: &Path,
    content: &str,
    encoding: Encoding,
    mode: Option<u32>,
    mtime: Option<DateTime<Utc>>,
) -> Result<(), CoreError> {
    let bytes = match encoding {
        Encoding::Plain => content.as_bytes().to_vec(),
        Encoding::Base64 => base64::engine::general_purpose::STANDARD
            .decode(content)
            .map_err(|e| CoreError::invalid_argument(format!("invalid base64 content: {e}")))?,
    };

    let parent = host_path
        .parent()
        .ok_or_else(|| CoreError::invalid_argument("path has no parent directory"))?;
    tokio::fs::create_dir_all(parent).await?;
    tokio::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o755))
        .await
        .ok();

    let tmp_path = parent.join(format!(".{}.tmp-{}", file_name(host_path), uuid::Uuid::new_v4()));

    let result = write_atomic_inner(&tmp_path, host_path, &bytes, mode, mtime).await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp_path).await;
    }
    result
}

async fn write_atomic_inner(
    tmp_path: &Path,
    target: &Path,
    bytes: &[u8],
    mode: Option<u32>,
    mtime: Option<DateTime<Utc>>,
) -> Result<(), CoreError> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::File::create(tmp_path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);

    let final_mode = mode.unwrap_or(0o644);
    tokio::fs::set_permissions(tmp_path, std::fs::Permissions::from_mode(final_mode)).await?;

    if let Some(mtime) = mtime {
        set_mtime(tmp_path, mtime)?;
    }

    tokio::fs::rename(tmp_path, target).await?;
    Ok(())
}

fn set_mtime(path: &Path, mtime: DateTime<Utc>) -> Result<(), CoreError> {
    let secs = mtime.timestamp();
    let nanos = mtime.timestamp_subsec_nanos();
    let times = nix::sys::stat::UtimensatFlags::NoFollowSymlink;
    let ts = nix::sys::time::TimeSpec::new(secs, nanos as i64);
    nix::sys::stat::utimensat(None, path, &ts, &ts, times)
        .map_err(|errno| CoreError::Internal(format!("setting mtime on {path:?}: {errno}")))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string())
}

/// `ApplyPatch(path, patch)`: read original, apply, write back preserving
/// the original mode.
pub async fn apply_patch(host_path: &Path, patch: &str) -> Result<(), CoreError> {
    let meta = tokio::fs::metadata(host_path).await?;
    let mode = meta.permissions().mode() & 0o777;
    let original = tokio::fs::read_to_string(host_path).await?;
    let patched = super::patch::apply_unified_diff(&original, patch)?;
    write_atomic(host_path, &patched, Encoding::Plain, Some(mode), None).await
}

/// `Diff(path, version)`: compares the live file against the version's file,
/// both already resolved to host paths by the caller (each under its own
/// mount). A missing file on either side is treated as empty text.
pub async fn diff(
    live_host_path: &Path,
    version_host_path: &Path,
    container_path: &str,
) -> Result<String, CoreError> {
    let old = read_to_string_or_empty(version_host_path).await?;
    let new = read_to_string_or_empty(live_host_path).await?;
    Ok(super::patch::produce_unified_diff(&old, &new, container_path))
}

async fn read_to_string_or_empty(path: &Path) -> Result<String, CoreError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(CoreError::from(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("notes.txt");
        write_atomic(&path, "hello\n", Encoding::Plain, None, None)
            .await
            .unwrap();
        let resp = read(&path, "/data/notes.txt").await.unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&resp.content)
            .unwrap();
        assert_eq!(decoded, b"hello\n");
        assert_eq!(resp.size, 6);
        assert_eq!(resp.mode, 0o644);
    }

    #[tokio::test]
    async fn apply_patch_preserves_mode() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.txt");
        write_atomic(&path, "one\ntwo\nthree\n", Encoding::Plain, Some(0o640), None)
            .await
            .unwrap();
        apply_patch(&path, "@@ -2,1 +2,1 @@\n-two\n+TWO\n").await.unwrap();
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "one\nTWO\nthree\n");
        let meta = tokio::fs::metadata(&path).await.unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o640);
    }

    #[tokio::test]
    async fn apply_patch_mismatch_leaves_file_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.txt");
        write_atomic(&path, "one\ntwo\nthree\n", Encoding::Plain, None, None)
            .await
            .unwrap();
        let err = apply_patch(&path, "@@ -2,1 +2,1 @@\n-TWO\n+two\n").await.unwrap_err();
        assert!(matches!(err, CoreError::PatchMismatch(_)));
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "one\ntwo\nthree\n");
    }

    #[tokio::test]
    async fn list_recursive_excludes_root() {
        let tmp = tempfile::tempdir().unwrap();
        tokio::fs::create_dir(tmp.path().join("sub")).await.unwrap();
        write_atomic(&tmp.path().join("a.txt"), "x", Encoding::Plain, None, None)
            .await
            .unwrap();
        write_atomic(&tmp.path().join("sub/b.txt"), "y", Encoding::Plain, None, None)
            .await
            .unwrap();
        let resp = list(tmp.path(), "/data", "/data", true).await.unwrap();
        let paths: Vec<_> = resp.entries.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"/data/a.txt"));
        assert!(paths.contains(&"/data/sub"));
        assert!(paths.contains(&"/data/sub/b.txt"));
        assert!(!paths.contains(&"/data"));
    }
}
