use axum::{middleware, Extension, Router};
use memoh_core::manager::Core;

pub mod auth;
pub mod fs;

pub fn router(state: Core) -> Router {
    Router::new()
        .nest("/fs", fs::routes::router())
        .layer(middleware::from_fn(auth::middleware::auth_middleware))
        .layer(Extension(state))
}
