mod docs;
mod error;
mod features;

use memoh_core::catalogue::Catalogue;
use memoh_core::runtime::docker::DockerRuntime;
use memoh_core::{manager, Config};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("warn,memoh_server=info,memoh_core=info")
            .add_directive("hyper_util=warn".parse().unwrap())
            .add_directive("sqlx=warn".parse().unwrap())
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Arc::new(Config::from_env()?);

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.postgres.connection_string())
        .await?;
    sqlx::migrate!("../../crates/memoh-core/migrations").run(&pool).await?;

    let runtime = Arc::new(DockerRuntime::connect(
        &config.containerd.socket_path,
        &config.containerd.namespace,
        &config.mcp.host_path_root,
    )?);

    let catalogue = Catalogue::new(pool);
    let core = manager::Core::new(runtime, catalogue, config.clone());
    manager::init(&core).await?;

    let app = features::router(core).merge(docs::router()).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .max_age(std::time::Duration::from_secs(3600)),
    );

    let bind = std::env::var("HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8088".to_string());
    info!(%bind, "memoh-server listening");
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
