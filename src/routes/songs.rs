use axum::{Json, Router, extract::State, routing::post};
use uuid::Uuid;

use crate::{
    dto::party::{CastVoteRequest, CastVoteResponse},
    error::{AppError, ErrorBody},
    routes::extract::{AppJson, AppPath},
    services::party_service,
    state::SharedState,
};

pub fn router() -> Router<SharedState> {
    Router::new().route("/songs/{id}/vote", post(cast_vote))
}

/// Cast or replace a vote on a song.
#[utoipa::path(
    post,
    path = "/api/songs/{id}/vote",
    tag = "songs",
    params(("id" = Uuid, Path, description = "Identifier of the song")),
    request_body = CastVoteRequest,
    responses(
        (status = 200, description = "Vote stored", body = CastVoteResponse),
        (status = 400, description = "Value is not 1 or -1", body = ErrorBody),
        (status = 403, description = "Caller is not a member of the song's party", body = ErrorBody),
        (status = 404, description = "Unknown song", body = ErrorBody),
        (status = 409, description = "Party has ended", body = ErrorBody)
    )
)]
pub async fn cast_vote(
    State(state): State<SharedState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<CastVoteRequest>,
) -> Result<Json<CastVoteResponse>, AppError> {
    let response = party_service::cast_vote(&state, id, payload).await?;
    Ok(Json(response))
}
