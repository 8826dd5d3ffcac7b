//! `bollard`-backed `RuntimeAdapter`, targeting a single local Docker daemon
//! (§4.1's "added" note in the spec: Docker's commit/volumes/exec primitives
//! map directly onto the required prepare/commit/mount and start/stop/exec
//! vocabulary). Grounded on the teacher's direct `bollard::Docker` usage in
//! `apps/manager/src/features/images/dockerhub.rs`.
//!
//! Snapshot names double as both Docker image tags (for committed/version
//! snapshots) and a label on the container (for the writable snapshot, which
//! has no separate Docker object — it IS the container's bind-mounted
//! `host_path`).

use super::*;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, ListContainersOptions, LogOutput,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::{CreateImageOptions, RemoveImageOptions};
use bollard::models::HostConfig;
use bollard::Docker;
use futures::StreamExt;
use std::collections::HashMap;
use tokio::io::AsyncWriteExt;

pub struct DockerRuntime {
    docker: Docker,
    namespace: String,
    /// Root directory under which per-snapshot export directories and the
    /// live `host_path` directories live, mirroring `mcp.host_path_root`.
    host_path_root: String,
}

impl DockerRuntime {
    pub fn connect(socket_path: &str, namespace: &str, host_path_root: &str) -> Result<Self, CoreError> {
        let docker = Docker::connect_with_socket(socket_path, 120, bollard::API_DEFAULT_VERSION)
            .map_err(CoreError::from)?;
        Ok(Self {
            docker,
            namespace: namespace.to_string(),
            host_path_root: host_path_root.to_string(),
        })
    }

    fn namespaced(&self, name: &str) -> String {
        format!("{}.{}", self.namespace, name)
    }

    fn host_dir_for(&self, snapshot_key: &str) -> String {
        format!("{}/{}", self.host_path_root, snapshot_key)
    }
}

#[async_trait]
impl RuntimeAdapter for DockerRuntime {
    async fn pull_image(&self, reference: &str, _opts: PullImageOpts) -> Result<ImageInfo, CoreError> {
        let options = Some(CreateImageOptions {
            from_image: reference,
            ..Default::default()
        });
        let mut stream = self.docker.create_image(options, None, None);
        while let Some(progress) = stream.next().await {
            progress.map_err(CoreError::from)?;
        }
        Ok(ImageInfo {
            reference: reference.to_string(),
        })
    }

    async fn get_image(&self, reference: &str) -> Result<ImageInfo, CoreError> {
        self.docker.inspect_image(reference).await.map_err(CoreError::from)?;
        Ok(ImageInfo {
            reference: reference.to_string(),
        })
    }

    async fn list_images(&self) -> Result<Vec<ImageInfo>, CoreError> {
        let images = self.docker.list_images::<String>(None).await.map_err(CoreError::from)?;
        Ok(images
            .into_iter()
            .flat_map(|i| i.repo_tags.into_iter().map(|reference| ImageInfo { reference }))
            .collect())
    }

    async fn delete_image(&self, reference: &str, opts: DeleteImageOpts) -> Result<(), CoreError> {
        let options = Some(RemoveImageOptions {
            force: !opts.synchronous,
            ..Default::default()
        });
        self.docker
            .remove_image(reference, options, None)
            .await
            .map_err(CoreError::from)?;
        Ok(())
    }

    async fn create_container(&self, req: CreateContainerRequest) -> Result<ContainerInfo, CoreError> {
        let name = self.namespaced(&req.id);
        let binds: Vec<String> = req
            .spec_opts
            .mounts
            .iter()
            .map(|m| format!("{}:{}", m.host_path, m.container_path))
            .collect();
        let mut labels: HashMap<String, String> = req.labels.clone();
        labels.insert("memoh.snapshotter".to_string(), req.snapshotter.clone());
        let snapshot_key = req.snapshot_id.clone().unwrap_or_else(|| name.clone());
        labels.insert("memoh.snapshot_key".to_string(), snapshot_key.clone());

        let config = ContainerConfig {
            image: Some(req.image_ref.clone()),
            labels: Some(labels.clone()),
            host_config: Some(HostConfig {
                binds: Some(binds),
                ..Default::default()
            }),
            tty: Some(true),
            ..Default::default()
        };
        self.docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.clone(),
                    platform: None,
                }),
                config,
            )
            .await
            .map_err(CoreError::from)?;

        Ok(ContainerInfo {
            id: req.id,
            image_ref: req.image_ref,
            labels,
            snapshotter: req.snapshotter,
            snapshot_key,
        })
    }

    async fn get_container(&self, id: &str) -> Result<ContainerInfo, CoreError> {
        let name = self.namespaced(id);
        let inspect = self.docker.inspect_container(&name, None).await.map_err(CoreError::from)?;
        let config = inspect.config.unwrap_or_default();
        let labels = config.labels.unwrap_or_default();
        let snapshotter = labels
            .get("memoh.snapshotter")
            .cloned()
            .unwrap_or_else(|| "overlayfs".to_string());
        // The writable snapshot key is whatever `prepare_snapshot`/
        // `create_container` were given at creation time, not the
        // namespaced container name — read it back from the label set
        // there so it matches what `prepare_snapshot`/`commit_snapshot`
        // keyed their host directory on.
        let snapshot_key = labels
            .get("memoh.snapshot_key")
            .cloned()
            .unwrap_or_else(|| name.clone());
        Ok(ContainerInfo {
            id: id.to_string(),
            image_ref: config.image.unwrap_or_default(),
            labels,
            snapshotter,
            snapshot_key,
        })
    }

    async fn list_containers(&self) -> Result<Vec<ContainerInfo>, CoreError> {
        self.list_containers_by_label("memoh.namespace", Some(&self.namespace)).await
    }

    async fn list_containers_by_label(
        &self,
        key: &str,
        value: Option<&str>,
    ) -> Result<Vec<ContainerInfo>, CoreError> {
        let filter_value = match value {
            Some(v) => format!("{key}={v}"),
            None => key.to_string(),
        };
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![filter_value]);
        let options = Some(ListContainersOptions {
            all: true,
            filters,
            ..Default::default()
        });
        let summaries = self.docker.list_containers(options).await.map_err(CoreError::from)?;
        Ok(summaries
            .into_iter()
            .map(|s| {
                let labels = s.labels.unwrap_or_default();
                let snapshotter = labels
                    .get("memoh.snapshotter")
                    .cloned()
                    .unwrap_or_else(|| "overlayfs".to_string());
                let snapshot_key = labels.get("memoh.snapshot_key").cloned().unwrap_or_default();
                let id = s.names.unwrap_or_default().into_iter().next().unwrap_or_default();
                ContainerInfo {
                    id: id.trim_start_matches('/').to_string(),
                    image_ref: s.image.unwrap_or_default(),
                    labels,
                    snapshotter,
                    snapshot_key,
                }
            })
            .collect())
    }

    async fn delete_container(&self, id: &str, _opts: DeleteContainerOpts) -> Result<(), CoreError> {
        let name = self.namespaced(id);
        let options = Some(RemoveContainerOptions {
            force: true,
            ..Default::default()
        });
        match self.docker.remove_container(&name, options).await {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => Ok(()),
            Err(err) => Err(CoreError::from(err)),
        }
    }

    async fn start_task(&self, container_id: &str, _opts: StartTaskOpts) -> Result<TaskInfo, CoreError> {
        let name = self.namespaced(container_id);
        self.docker
            .start_container(&name, None::<StartContainerOptions<String>>)
            .await
            .map_err(CoreError::from)?;
        self.get_task(container_id).await
    }

    async fn get_task(&self, container_id: &str) -> Result<TaskInfo, CoreError> {
        let name = self.namespaced(container_id);
        let inspect = self.docker.inspect_container(&name, None).await.map_err(CoreError::from)?;
        let state = inspect.state.unwrap_or_default();
        Ok(TaskInfo {
            container_id: container_id.to_string(),
            pid: state.pid.unwrap_or_default() as u32,
            running: state.running.unwrap_or(false),
        })
    }

    async fn stop_task(&self, container_id: &str, opts: StopTaskOpts) -> Result<(), CoreError> {
        let name = self.namespaced(container_id);
        let options = Some(StopContainerOptions {
            t: opts.timeout.as_secs() as i64,
        });
        match self.docker.stop_container(&name, options).await {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 304, .. }) => Ok(()),
            Err(err) if opts.force => {
                tracing::warn!(container_id, error = %err, "graceful stop failed, killing");
                self.docker.kill_container::<String>(&name, None).await.map_err(CoreError::from)
            }
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 500, .. }) if !opts.force => {
                Err(CoreError::TaskStopTimeout(opts.timeout))
            }
            Err(err) => Err(CoreError::from(err)),
        }
    }

    async fn delete_task(&self, container_id: &str, opts: DeleteTaskOpts) -> Result<(), CoreError> {
        let name = self.namespaced(container_id);
        let options = Some(RemoveContainerOptions {
            force: opts.force,
            ..Default::default()
        });
        match self.docker.remove_container(&name, options).await {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => Ok(()),
            Err(err) => Err(CoreError::from(err)),
        }
    }

    async fn exec(&self, container_id: &str, opts: ExecOpts) -> Result<ExecResult, CoreError> {
        let name = self.namespaced(container_id);
        let exec = self
            .docker
            .create_exec(
                &name,
                CreateExecOptions {
                    cmd: Some(opts.args),
                    env: Some(opts.env),
                    working_dir: opts.work_dir,
                    tty: Some(opts.terminal),
                    attach_stdout: Some(opts.use_stdio),
                    attach_stderr: Some(opts.use_stdio),
                    ..Default::default()
                },
            )
            .await
            .map_err(CoreError::from)?;

        if let StartExecResults::Attached { mut output, .. } =
            self.docker.start_exec(&exec.id, None).await.map_err(CoreError::from)?
        {
            // Relay each chunk straight to this process's own stdio as it
            // arrives, rather than buffering, so a CLI caller's terminal
            // sees output live (§4.1 / §9).
            let mut stdout = tokio::io::stdout();
            let mut stderr = tokio::io::stderr();
            while let Some(chunk) = output.next().await {
                match chunk.map_err(CoreError::from)? {
                    LogOutput::StdOut { message } | LogOutput::Console { message } => {
                        stdout.write_all(&message).await.map_err(CoreError::from)?;
                        stdout.flush().await.map_err(CoreError::from)?;
                    }
                    LogOutput::StdErr { message } => {
                        stderr.write_all(&message).await.map_err(CoreError::from)?;
                        stderr.flush().await.map_err(CoreError::from)?;
                    }
                    LogOutput::StdIn { .. } => {}
                }
            }
        }

        let inspect = self.docker.inspect_exec(&exec.id).await.map_err(CoreError::from)?;
        Ok(ExecResult {
            exit_code: inspect.exit_code.unwrap_or(-1),
        })
    }

    async fn prepare_snapshot(
        &self,
        _snapshotter: &str,
        key: &str,
        _parent: Option<&str>,
    ) -> Result<(), CoreError> {
        let dir = self.host_dir_for(key);
        tokio::fs::create_dir_all(&dir).await.map_err(CoreError::from)?;
        Ok(())
    }

    async fn commit_snapshot(&self, _snapshotter: &str, name: &str, key: &str) -> Result<(), CoreError> {
        let src = self.host_dir_for(key);
        let dst = self.host_dir_for(name);
        copy_dir_recursive(std::path::Path::new(&src), std::path::Path::new(&dst))
            .await
            .map_err(CoreError::from)?;
        Ok(())
    }

    async fn snapshot_mounts(&self, _snapshotter: &str, key: &str) -> Result<Vec<MountInfo>, CoreError> {
        let dir = self.host_dir_for(key);
        if tokio::fs::metadata(&dir).await.is_err() {
            return Err(CoreError::not_found(format!("snapshot {key}")));
        }
        Ok(vec![MountInfo {
            source: dir,
            fs_type: "bind".to_string(),
            options: vec!["rbind".to_string()],
        }])
    }

    async fn delete_snapshot(&self, _snapshotter: &str, key: &str) -> Result<(), CoreError> {
        let dir = self.host_dir_for(key);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::from(e)),
        }
    }
}

fn copy_dir_recursive<'a>(
    src: &'a std::path::Path,
    dst: &'a std::path::Path,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + 'a>> {
    Box::pin(async move {
        tokio::fs::create_dir_all(dst).await?;
        let mut entries = tokio::fs::read_dir(src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let from = entry.path();
            let to = dst.join(entry.file_name());
            if file_type.is_dir() {
                copy_dir_recursive(&from, &to).await?;
            } else if file_type.is_file() {
                tokio::fs::copy(&from, &to).await?;
            }
        }
        Ok(())
    })
}
