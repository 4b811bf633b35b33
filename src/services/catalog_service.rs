use validator::Validate;

use crate::{
    dao::catalog::CatalogError,
    dto::catalog::{CatalogSearchQuery, CatalogSearchResponse},
    error::ServiceError,
    state::SharedState,
};

/// Search the configured music catalog.
pub async fn search(
    state: &SharedState,
    query: CatalogSearchQuery,
) -> Result<CatalogSearchResponse, ServiceError> {
    query
        .validate()
        .map_err(|err| ServiceError::InvalidInput(format!("validation failed: {err}")))?;
    let catalog = state.catalog().ok_or(CatalogError::NotConfigured)?;
    let tracks = catalog.search(query.q.trim().to_string()).await?;

    Ok(CatalogSearchResponse {
        tracks: tracks.into_iter().map(Into::into).collect(),
    })
}
