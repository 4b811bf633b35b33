use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::party::{
        AddSongRequest, AddSongResponse, AdvanceResponse, CreatePartyRequest,
        CreatePartyResponse, HostActionRequest, JoinPartyRequest, JoinPartyResponse,
        PartyResponse, StandingsResponse,
    },
    error::{AppError, ErrorBody},
    routes::extract::{AppJson, AppPath},
    services::party_service,
    state::SharedState,
};

/// Routes handling the party lifecycle and its queue.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/parties", post(create_party))
        .route("/parties/{code}", get(get_party))
        .route("/parties/{code}/join", post(join_party))
        .route("/parties/{code}/songs", post(add_song))
        .route("/parties/{code}/next", post(advance))
        .route("/parties/{code}/end", post(end_party))
}

/// Open a new party; the caller becomes its host.
#[utoipa::path(
    post,
    path = "/api/parties",
    tag = "parties",
    request_body = CreatePartyRequest,
    responses(
        (status = 200, description = "Party created", body = CreatePartyResponse),
        (status = 400, description = "Invalid payload", body = ErrorBody)
    )
)]
pub async fn create_party(
    State(state): State<SharedState>,
    AppJson(payload): AppJson<CreatePartyRequest>,
) -> Result<Json<CreatePartyResponse>, AppError> {
    let response = party_service::create_party(&state, payload).await?;
    Ok(Json(response))
}

/// Party with its participants and queue. Vote counts stay hidden.
#[utoipa::path(
    get,
    path = "/api/parties/{code}",
    tag = "parties",
    params(("code" = String, Path, description = "Party code")),
    responses(
        (status = 200, description = "Party found", body = PartyResponse),
        (status = 404, description = "Unknown party", body = ErrorBody)
    )
)]
pub async fn get_party(
    State(state): State<SharedState>,
    AppPath(code): AppPath<String>,
) -> Result<Json<PartyResponse>, AppError> {
    let response = party_service::get_party(&state, &code).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/parties/{code}/join",
    tag = "parties",
    params(("code" = String, Path, description = "Party code")),
    request_body = JoinPartyRequest,
    responses(
        (status = 200, description = "Participant admitted", body = JoinPartyResponse),
        (status = 400, description = "Display name missing", body = ErrorBody),
        (status = 404, description = "Unknown party", body = ErrorBody),
        (status = 409, description = "Party has ended", body = ErrorBody)
    )
)]
/// Join a party, as a spectator once the participant cap is reached.
pub async fn join_party(
    State(state): State<SharedState>,
    AppPath(code): AppPath<String>,
    AppJson(payload): AppJson<JoinPartyRequest>,
) -> Result<Json<JoinPartyResponse>, AppError> {
    let response = party_service::join_party(&state, &code, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/parties/{code}/songs",
    tag = "parties",
    params(("code" = String, Path, description = "Party code")),
    request_body = AddSongRequest,
    responses(
        (status = 200, description = "Song queued", body = AddSongResponse),
        (status = 400, description = "Invalid track", body = ErrorBody),
        (status = 403, description = "Caller is not a regular member", body = ErrorBody),
        (status = 404, description = "Unknown party", body = ErrorBody),
        (status = 409, description = "Party ended or a queue cap was reached", body = ErrorBody)
    )
)]
/// Append a song to the queue.
pub async fn add_song(
    State(state): State<SharedState>,
    AppPath(code): AppPath<String>,
    AppJson(payload): AppJson<AddSongRequest>,
) -> Result<Json<AddSongResponse>, AppError> {
    let response = party_service::add_song(&state, &code, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/parties/{code}/next",
    tag = "parties",
    params(("code" = String, Path, description = "Party code")),
    request_body = HostActionRequest,
    responses(
        (status = 200, description = "Next song started or party ended", body = AdvanceResponse),
        (status = 403, description = "Caller is not the host", body = ErrorBody),
        (status = 404, description = "Unknown party", body = ErrorBody),
        (status = 409, description = "Party has ended", body = ErrorBody)
    )
)]
/// Host-only: start the next unplayed song, ending the party when none is left.
pub async fn advance(
    State(state): State<SharedState>,
    AppPath(code): AppPath<String>,
    AppJson(payload): AppJson<HostActionRequest>,
) -> Result<Json<AdvanceResponse>, AppError> {
    let response = party_service::advance(&state, &code, payload.participant_id).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/parties/{code}/end",
    tag = "parties",
    params(("code" = String, Path, description = "Party code")),
    request_body = HostActionRequest,
    responses(
        (status = 200, description = "Final standings", body = StandingsResponse),
        (status = 403, description = "Caller is not the host", body = ErrorBody),
        (status = 404, description = "Unknown party", body = ErrorBody),
        (status = 409, description = "Party has ended", body = ErrorBody)
    )
)]
/// Host-only: end the party now.
pub async fn end_party(
    State(state): State<SharedState>,
    AppPath(code): AppPath<String>,
    AppJson(payload): AppJson<HostActionRequest>,
) -> Result<Json<StandingsResponse>, AppError> {
    let response = party_service::end_party(&state, &code, payload.participant_id).await?;
    Ok(Json(response))
}
