use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::catalog::{CatalogSearchQuery, CatalogSearchResponse},
    error::{AppError, ErrorBody},
    routes::extract::AppQuery,
    services::catalog_service,
    state::SharedState,
};

pub fn router() -> Router<SharedState> {
    Router::new().route("/catalog/search", get(search))
}

/// Search tracks in the music catalog (at most ten results).
#[utoipa::path(
    get,
    path = "/api/catalog/search",
    tag = "catalog",
    params(CatalogSearchQuery),
    responses(
        (status = 200, description = "Matching tracks", body = CatalogSearchResponse),
        (status = 400, description = "Missing query", body = ErrorBody),
        (status = 503, description = "Catalog unavailable", body = ErrorBody)
    )
)]
pub async fn search(
    State(state): State<SharedState>,
    AppQuery(query): AppQuery<CatalogSearchQuery>,
) -> Result<Json<CatalogSearchResponse>, AppError> {
    let response = catalog_service::search(&state, query).await?;
    Ok(Json(response))
}
