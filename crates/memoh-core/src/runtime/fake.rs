//! In-memory `RuntimeAdapter` used by `crates/memoh-core/tests` so the
//! manager's orchestration logic can be exercised without a Docker daemon.

use super::*;
use std::collections::HashMap;
use std::sync::Mutex;

/// Each fake snapshot owns a real directory on disk (backed by the shared
/// `tempfile::TempDir` root below) so tests exercise the actual FS-operations
/// code path, just without a real container runtime or a privileged bind
/// mount — `snapshot_mounts` reports `fs_type: "direct"` and the mounter uses
/// the directory as-is (see `mount.rs`).
struct FakeSnapshot {
    dir: std::path::PathBuf,
}

#[derive(Default)]
struct State {
    images: HashMap<String, ImageInfo>,
    containers: HashMap<String, ContainerInfo>,
    tasks: HashMap<String, TaskInfo>,
    snapshots: HashMap<String, FakeSnapshot>,
}

pub struct FakeRuntime {
    root: tempfile::TempDir,
    state: Mutex<State>,
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self {
            root: tempfile::tempdir().expect("create fake runtime root"),
            state: Mutex::new(State::default()),
        }
    }
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RuntimeAdapter for FakeRuntime {
    async fn pull_image(&self, reference: &str, _opts: PullImageOpts) -> Result<ImageInfo, CoreError> {
        let info = ImageInfo {
            reference: reference.to_string(),
        };
        self.state
            .lock()
            .unwrap()
            .images
            .insert(reference.to_string(), info.clone());
        Ok(info)
    }

    async fn get_image(&self, reference: &str) -> Result<ImageInfo, CoreError> {
        self.state
            .lock()
            .unwrap()
            .images
            .get(reference)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("image {reference}")))
    }

    async fn list_images(&self) -> Result<Vec<ImageInfo>, CoreError> {
        Ok(self.state.lock().unwrap().images.values().cloned().collect())
    }

    async fn delete_image(&self, reference: &str, _opts: DeleteImageOpts) -> Result<(), CoreError> {
        self.state.lock().unwrap().images.remove(reference);
        Ok(())
    }

    async fn create_container(&self, req: CreateContainerRequest) -> Result<ContainerInfo, CoreError> {
        let snapshot_key = req.snapshot_id.clone().unwrap_or_else(|| req.id.clone());
        let info = ContainerInfo {
            id: req.id.clone(),
            image_ref: req.image_ref,
            labels: req.labels,
            snapshotter: req.snapshotter,
            snapshot_key,
        };
        let mut state = self.state.lock().unwrap();
        if state.containers.contains_key(&req.id) {
            return Err(CoreError::Conflict(format!("container {} already exists", req.id)));
        }
        state.containers.insert(req.id.clone(), info.clone());
        Ok(info)
    }

    async fn get_container(&self, id: &str) -> Result<ContainerInfo, CoreError> {
        self.state
            .lock()
            .unwrap()
            .containers
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("container {id}")))
    }

    async fn list_containers(&self) -> Result<Vec<ContainerInfo>, CoreError> {
        Ok(self.state.lock().unwrap().containers.values().cloned().collect())
    }

    async fn list_containers_by_label(
        &self,
        key: &str,
        value: Option<&str>,
    ) -> Result<Vec<ContainerInfo>, CoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .containers
            .values()
            .filter(|c| match (c.labels.get(key), value) {
                (Some(v), Some(expected)) => v == expected,
                (Some(_), None) => true,
                (None, _) => false,
            })
            .cloned()
            .collect())
    }

    async fn delete_container(&self, id: &str, opts: DeleteContainerOpts) -> Result<(), CoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(container) = state.containers.remove(id) {
            state.tasks.remove(id);
            if opts.cleanup_snapshot {
                state.snapshots.remove(&container.snapshot_key);
            }
        }
        Ok(())
    }

    async fn start_task(&self, container_id: &str, _opts: StartTaskOpts) -> Result<TaskInfo, CoreError> {
        let mut state = self.state.lock().unwrap();
        if !state.containers.contains_key(container_id) {
            return Err(CoreError::not_found(format!("container {container_id}")));
        }
        let task = TaskInfo {
            container_id: container_id.to_string(),
            pid: 1,
            running: true,
        };
        state.tasks.insert(container_id.to_string(), task.clone());
        Ok(task)
    }

    async fn get_task(&self, container_id: &str) -> Result<TaskInfo, CoreError> {
        self.state
            .lock()
            .unwrap()
            .tasks
            .get(container_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("task for {container_id}")))
    }

    async fn stop_task(&self, container_id: &str, _opts: StopTaskOpts) -> Result<(), CoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(task) = state.tasks.get_mut(container_id) {
            task.running = false;
        }
        Ok(())
    }

    async fn delete_task(&self, container_id: &str, _opts: DeleteTaskOpts) -> Result<(), CoreError> {
        self.state.lock().unwrap().tasks.remove(container_id);
        Ok(())
    }

    async fn exec(&self, container_id: &str, _opts: ExecOpts) -> Result<ExecResult, CoreError> {
        let state = self.state.lock().unwrap();
        let task = state
            .tasks
            .get(container_id)
            .ok_or_else(|| CoreError::not_found(format!("task for {container_id}")))?;
        if !task.running {
            return Err(CoreError::invalid_argument("container is not running"));
        }
        Ok(ExecResult { exit_code: 0 })
    }

    async fn prepare_snapshot(
        &self,
        _snapshotter: &str,
        key: &str,
        parent: Option<&str>,
    ) -> Result<(), CoreError> {
        let dir = self.root.path().join(sanitize(key));
        if let Some(parent_key) = parent {
            let mut state = self.state.lock().unwrap();
            let parent_dir = state
                .snapshots
                .get(parent_key)
                .map(|s| s.dir.clone())
                .ok_or_else(|| CoreError::not_found(format!("snapshot {parent_key}")))?;
            copy_dir_sync(&parent_dir, &dir)?;
            state.snapshots.insert(key.to_string(), FakeSnapshot { dir });
        } else {
            std::fs::create_dir_all(&dir)?;
            self.state
                .lock()
                .unwrap()
                .snapshots
                .insert(key.to_string(), FakeSnapshot { dir });
        }
        Ok(())
    }

    async fn commit_snapshot(&self, _snapshotter: &str, name: &str, key: &str) -> Result<(), CoreError> {
        let src = {
            let state = self.state.lock().unwrap();
            state
                .snapshots
                .get(key)
                .map(|s| s.dir.clone())
                .ok_or_else(|| CoreError::not_found(format!("snapshot {key}")))?
        };
        let dst = self.root.path().join(sanitize(name));
        copy_dir_sync(&src, &dst)?;
        self.state
            .lock()
            .unwrap()
            .snapshots
            .insert(name.to_string(), FakeSnapshot { dir: dst });
        Ok(())
    }

    async fn snapshot_mounts(&self, _snapshotter: &str, key: &str) -> Result<Vec<MountInfo>, CoreError> {
        let dir = self
            .state
            .lock()
            .unwrap()
            .snapshots
            .get(key)
            .map(|s| s.dir.clone())
            .ok_or_else(|| CoreError::not_found(format!("snapshot {key}")))?;
        Ok(vec![MountInfo {
            source: dir.to_string_lossy().into_owned(),
            fs_type: "direct".to_string(),
            options: vec![],
        }])
    }

    async fn delete_snapshot(&self, _snapshotter: &str, key: &str) -> Result<(), CoreError> {
        if let Some(snap) = self.state.lock().unwrap().snapshots.remove(key) {
            let _ = std::fs::remove_dir_all(snap.dir);
        }
        Ok(())
    }
}

fn sanitize(key: &str) -> String {
    key.replace([':', '/'], "_")
}

fn copy_dir_sync(src: &std::path::Path, dst: &std::path::Path) -> Result<(), CoreError> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let to = dst.join(entry.file_name());
        if file_type.is_dir() {
            copy_dir_sync(&entry.path(), &to)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &to)?;
        }
    }
    Ok(())
}
