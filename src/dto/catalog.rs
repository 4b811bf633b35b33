use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{dao::catalog::CatalogTrack, dto::validation::validate_not_blank};

#[derive(Debug, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct CatalogSearchQuery {
    /// Free-text search query.
    #[validate(custom(function = validate_not_blank), length(max = 200))]
    pub q: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackSummary {
    pub catalog_id: String,
    pub title: String,
    pub artist: String,
    pub artwork_url: String,
    pub preview_url: Option<String>,
    pub duration_ms: u64,
}

impl From<CatalogTrack> for TrackSummary {
    fn from(value: CatalogTrack) -> Self {
        Self {
            catalog_id: value.catalog_id,
            title: value.title,
            artist: value.artist,
            artwork_url: value.artwork_url,
            preview_url: value.preview_url,
            duration_ms: value.duration_ms,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CatalogSearchResponse {
    pub tracks: Vec<TrackSummary>,
}
