//! HTTP surface for FS operations (§6), grounded on the teacher's per-feature
//! `routes.rs` shape: free `async fn` handlers over axum extractors, each
//! documented with `#[utoipa::path]` and merged into the OpenAPI document in
//! `docs.rs`.

use crate::error::ApiError;
use crate::features::auth::middleware::AuthenticatedUser;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use memoh_core::manager::Core;
use memoh_core::{fsops, CoreError};
use memoh_types::{ApplyPatchReq, CommitResp, DiffResp, ListResp, ReadResp, WriteAtomicReq};
use serde::Deserialize;

pub fn router() -> Router {
    Router::new()
        .route("/read", get(read))
        .route("/list", get(list))
        .route("/write_atomic", put(write_atomic))
        .route("/apply_patch", post(apply_patch))
        .route("/commit", post(commit))
        .route("/diff", get(diff))
}

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub path: String,
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Deserialize)]
pub struct DiffQuery {
    pub path: String,
    pub version: i32,
}

#[utoipa::path(
    get,
    path = "/fs/read",
    params(("path" = String, Query, description = "container-relative path")),
    responses(
        (status = 200, description = "File read", body = ReadResp),
        (status = 400, description = "Invalid path"),
        (status = 404, description = "File not found"),
    ),
    tag = "FS"
)]
pub async fn read(
    Extension(core): Extension<Core>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(q): Query<PathQuery>,
) -> Result<Json<ReadResp>, ApiError> {
    Ok(Json(fsops::read(&core, &user.user_id, &q.path).await?))
}

#[utoipa::path(
    get,
    path = "/fs/list",
    params(
        ("path" = String, Query, description = "container-relative path"),
        ("recursive" = bool, Query, description = "walk subdirectories"),
    ),
    responses((status = 200, description = "Directory listed", body = ListResp)),
    tag = "FS"
)]
pub async fn list(
    Extension(core): Extension<Core>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(q): Query<ListQuery>,
) -> Result<Json<ListResp>, ApiError> {
    Ok(Json(
        fsops::list(&core, &user.user_id, &q.path, q.recursive).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/fs/write_atomic",
    request_body = WriteAtomicReq,
    responses(
        (status = 204, description = "File written"),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Parent container missing"),
        (status = 500, description = "Write failed"),
    ),
    tag = "FS"
)]
pub async fn write_atomic(
    Extension(core): Extension<Core>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(req): Json<WriteAtomicReq>,
) -> Result<StatusCode, ApiError> {
    fsops::write_atomic(
        &core,
        &user.user_id,
        &req.path,
        &req.content,
        req.encoding,
        req.mode,
        req.mtime,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/fs/apply_patch",
    request_body = ApplyPatchReq,
    responses(
        (status = 204, description = "Patch applied"),
        (status = 400, description = "Patch could not be applied"),
        (status = 404, description = "File missing"),
    ),
    tag = "FS"
)]
pub async fn apply_patch(
    Extension(core): Extension<Core>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(req): Json<ApplyPatchReq>,
) -> Result<StatusCode, ApiError> {
    fsops::apply_patch(&core, &user.user_id, &req.path, &req.patch).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/fs/commit",
    responses((status = 200, description = "Version created", body = CommitResp)),
    tag = "FS"
)]
pub async fn commit(
    Extension(core): Extension<Core>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<CommitResp>, ApiError> {
    Ok(Json(fsops::commit(&core, &user.user_id).await?))
}

#[utoipa::path(
    get,
    path = "/fs/diff",
    params(
        ("path" = String, Query, description = "container-relative path"),
        ("version" = i32, Query, description = "version to diff against"),
    ),
    responses(
        (status = 200, description = "Diff produced", body = DiffResp),
        (status = 404, description = "Version not found"),
    ),
    tag = "FS"
)]
pub async fn diff(
    Extension(core): Extension<Core>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(q): Query<DiffQuery>,
) -> Result<Json<DiffResp>, ApiError> {
    if q.version <= 0 {
        return Err(ApiError(CoreError::not_found(format!("version {}", q.version))));
    }
    Ok(Json(
        fsops::diff(&core, &user.user_id, &q.path, q.version).await?,
    ))
}
