//! CLI surface (§6): a peer external interface to the HTTP server, calling
//! directly into `memoh-core` — no HTTP hop. Grounded on the workspace's
//! `apps/` binary convention (a standalone crate under `apps/` depending on
//! the shared core crate) and on `clap`'s derive API, the idiomatic choice
//! for a multi-subcommand management tool.

mod commands;

use clap::Parser;
use commands::{Cli, Command};
use memoh_core::catalogue::Catalogue;
use memoh_core::runtime::docker::DockerRuntime;
use memoh_core::{manager, CoreError};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err}");
            let code = err
                .downcast_ref::<CoreError>()
                .map(CoreError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code as u8)
        }
    }
}

async fn build_core() -> anyhow::Result<manager::Core> {
    let config = Arc::new(memoh_core::Config::from_env()?);
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.postgres.connection_string())
        .await?;
    sqlx::migrate!("../../crates/memoh-core/migrations").run(&pool).await?;

    let runtime = Arc::new(DockerRuntime::connect(
        &config.containerd.socket_path,
        &config.containerd.namespace,
        &config.mcp.host_path_root,
    )?);
    let catalogue = Catalogue::new(pool);
    Ok(manager::Core::new(runtime, catalogue, config))
}

/// Runs the parsed command, returning the process exit code on success (0
/// for every subcommand except `exec`, which forwards the inner process's
/// exit code per §6).
async fn run(cli: Cli) -> anyhow::Result<u8> {
    match cli.command {
        Command::Init => {
            let core = build_core().await?;
            manager::init(&core).await?;
            println!("initialized");
            Ok(0)
        }
        Command::List => {
            let core = build_core().await?;
            let containers = core.runtime.list_containers().await?;
            for c in containers {
                let user = c.labels.get("user").cloned().unwrap_or_default();
                println!("{}\tuser={}\t{}", c.id, user, c.image_ref);
            }
            Ok(0)
        }
        Command::Create { user_id } => {
            let core = build_core().await?;
            let container = manager::ensure_user(&core, &user_id).await?;
            println!("{}", container.container_id);
            Ok(0)
        }
        Command::Start { user_id } => {
            let core = build_core().await?;
            manager::start(&core, &user_id).await?;
            println!("started");
            Ok(0)
        }
        Command::Stop { user_id, timeout } => {
            let core = build_core().await?;
            manager::stop(&core, &user_id, parse_duration(&timeout)?).await?;
            println!("stopped");
            Ok(0)
        }
        Command::Delete { user_id } => {
            let core = build_core().await?;
            manager::delete(&core, &user_id).await?;
            println!("deleted");
            Ok(0)
        }
        Command::Exec {
            user_id,
            cwd,
            tty,
            env,
            command,
        } => {
            let core = build_core().await?;
            let result = manager::exec(
                &core,
                &user_id,
                memoh_types::ExecRequest {
                    command,
                    env,
                    work_dir: cwd,
                    terminal: tty,
                },
            )
            .await?;
            Ok(result.exit_code.clamp(0, 255) as u8)
        }
        Command::VersionCreate { user_id } => {
            let core = build_core().await?;
            let version = manager::create_version(&core, &user_id).await?;
            println!("{}\t{}", version.version, version.snapshot_id);
            Ok(0)
        }
        Command::VersionList { user_id } => {
            let core = build_core().await?;
            for v in manager::list_versions(&core, &user_id).await? {
                println!("{}\t{}\t{}", v.version, v.snapshot_id, v.created_at);
            }
            Ok(0)
        }
        Command::VersionRollback { user_id, version } => {
            let core = build_core().await?;
            manager::rollback(&core, &user_id, version).await?;
            println!("rolled back to version {version}");
            Ok(0)
        }
    }
}

/// Parses a duration string such as `10s`, `500ms`, or `2m`; a bare number
/// is interpreted as seconds.
fn parse_duration(raw: &str) -> anyhow::Result<Duration> {
    let raw = raw.trim();
    for (suffix, unit_ms) in [("ms", 1), ("s", 1000), ("m", 60_000), ("h", 3_600_000)] {
        if let Some(value) = raw.strip_suffix(suffix) {
            let value: u64 = value.parse()?;
            return Ok(Duration::from_millis(value * unit_ms));
        }
    }
    let secs: u64 = raw.parse()?;
    Ok(Duration::from_secs(secs))
}
