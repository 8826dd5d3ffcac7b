//! Runtime adapter: the narrow typed surface over the external container
//! runtime (§4.1). A single `trait RuntimeAdapter` with plain request/response
//! structs, so the manager can be exercised against [`fake::FakeRuntime`] in
//! tests without a real Docker daemon, and a production caller can swap in
//! [`docker::DockerRuntime`].

pub mod docker;
pub mod fake;

use crate::error::CoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PullImageOpts {
    pub unpack: bool,
    pub snapshotter: String,
}

#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub reference: String,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteImageOpts {
    pub synchronous: bool,
}

#[derive(Debug, Clone)]
pub struct CreateContainerRequest {
    pub id: String,
    pub image_ref: String,
    pub snapshot_id: Option<String>,
    pub snapshotter: String,
    pub labels: HashMap<String, String>,
    pub spec_opts: SpecOpts,
}

#[derive(Debug, Clone, Default)]
pub struct SpecOpts {
    pub mounts: Vec<BindMount>,
}

#[derive(Debug, Clone)]
pub struct BindMount {
    pub host_path: String,
    pub container_path: String,
}

#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub id: String,
    pub image_ref: String,
    pub labels: HashMap<String, String>,
    pub snapshotter: String,
    pub snapshot_key: String,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteContainerOpts {
    pub cleanup_snapshot: bool,
}

#[derive(Debug, Clone)]
pub struct StartTaskOpts {
    pub use_stdio: bool,
    pub terminal: bool,
    pub fifo_dir: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub container_id: String,
    pub pid: u32,
    pub running: bool,
}

#[derive(Debug, Clone)]
pub struct StopTaskOpts {
    pub signal: i32,
    pub timeout: Duration,
    pub force: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteTaskOpts {
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct ExecOpts {
    pub args: Vec<String>,
    pub env: Vec<String>,
    pub work_dir: Option<String>,
    pub terminal: bool,
    pub use_stdio: bool,
}

#[derive(Debug, Clone)]
pub struct ExecResult {
    pub exit_code: i64,
}

#[derive(Debug, Clone)]
pub struct MountInfo {
    pub source: String,
    pub fs_type: String,
    pub options: Vec<String>,
}

/// Abstracts the external container runtime per §4.1. Request-shaped
/// structs rather than positional arguments, per §9's design note, so a
/// mock can be constructed without threading a dozen parameters through
/// test call sites.
#[async_trait]
pub trait RuntimeAdapter: Send + Sync {
    async fn pull_image(&self, reference: &str, opts: PullImageOpts) -> Result<ImageInfo, CoreError>;
    async fn get_image(&self, reference: &str) -> Result<ImageInfo, CoreError>;
    async fn list_images(&self) -> Result<Vec<ImageInfo>, CoreError>;
    async fn delete_image(&self, reference: &str, opts: DeleteImageOpts) -> Result<(), CoreError>;

    async fn create_container(&self, req: CreateContainerRequest) -> Result<ContainerInfo, CoreError>;
    async fn get_container(&self, id: &str) -> Result<ContainerInfo, CoreError>;
    async fn list_containers(&self) -> Result<Vec<ContainerInfo>, CoreError>;
    async fn list_containers_by_label(
        &self,
        key: &str,
        value: Option<&str>,
    ) -> Result<Vec<ContainerInfo>, CoreError>;
    async fn delete_container(&self, id: &str, opts: DeleteContainerOpts) -> Result<(), CoreError>;

    async fn start_task(&self, container_id: &str, opts: StartTaskOpts) -> Result<TaskInfo, CoreError>;
    async fn get_task(&self, container_id: &str) -> Result<TaskInfo, CoreError>;
    async fn stop_task(&self, container_id: &str, opts: StopTaskOpts) -> Result<(), CoreError>;
    async fn delete_task(&self, container_id: &str, opts: DeleteTaskOpts) -> Result<(), CoreError>;
    async fn exec(&self, container_id: &str, opts: ExecOpts) -> Result<ExecResult, CoreError>;

    async fn prepare_snapshot(
        &self,
        snapshotter: &str,
        key: &str,
        parent: Option<&str>,
    ) -> Result<(), CoreError>;
    async fn commit_snapshot(&self, snapshotter: &str, name: &str, key: &str) -> Result<(), CoreError>;
    async fn snapshot_mounts(&self, snapshotter: &str, key: &str) -> Result<Vec<MountInfo>, CoreError>;
    async fn delete_snapshot(&self, snapshotter: &str, key: &str) -> Result<(), CoreError>;
}
