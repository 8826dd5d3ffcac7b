//! OpenAPI document assembly, grounded on the teacher's `docs.rs`: a
//! `#[derive(OpenApi)]` struct naming every route and schema, merged with
//! `utoipa-swagger-ui` at `/docs`.

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::features::fs::routes::read,
        crate::features::fs::routes::list,
        crate::features::fs::routes::write_atomic,
        crate::features::fs::routes::apply_patch,
        crate::features::fs::routes::commit,
        crate::features::fs::routes::diff,
    ),
    components(schemas(
        memoh_types::ReadResp,
        memoh_types::ListResp,
        memoh_types::Entry,
        memoh_types::WriteAtomicReq,
        memoh_types::ApplyPatchReq,
        memoh_types::CommitResp,
        memoh_types::DiffResp,
        memoh_types::Encoding,
    )),
    tags((name = "FS", description = "Per-user container filesystem operations."))
)]
pub struct ApiDoc;

pub fn router() -> Router {
    Router::new().merge(SwaggerUi::new("/docs").url("/docs/openapi.json", ApiDoc::openapi()))
}
