use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the party queue backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::parties::create_party,
        crate::routes::parties::get_party,
        crate::routes::parties::join_party,
        crate::routes::parties::add_song,
        crate::routes::parties::advance,
        crate::routes::parties::end_party,
        crate::routes::songs::cast_vote,
        crate::routes::catalog::search,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::dto::health::HealthResponse,
            crate::dto::party::CreatePartyRequest,
            crate::dto::party::JoinPartyRequest,
            crate::dto::party::AddSongRequest,
            crate::dto::party::CastVoteRequest,
            crate::dto::party::HostActionRequest,
            crate::dto::party::PartyStatusDto,
            crate::dto::party::ParticipantSummary,
            crate::dto::party::SongSummary,
            crate::dto::party::ScoredSong,
            crate::dto::party::PartySummary,
            crate::dto::party::VoteSummary,
            crate::dto::party::CreatePartyResponse,
            crate::dto::party::PartyResponse,
            crate::dto::party::JoinPartyResponse,
            crate::dto::party::AddSongResponse,
            crate::dto::party::CastVoteResponse,
            crate::dto::party::AdvanceResponse,
            crate::dto::party::StandingsResponse,
            crate::dto::catalog::TrackSummary,
            crate::dto::catalog::CatalogSearchResponse,
            crate::dto::ws::JoinRoom,
            crate::dto::ws::ServerEvent,
            crate::dto::events::PartyStateEvent,
            crate::dto::events::ParticipantJoinedEvent,
            crate::dto::events::ParticipantLeftEvent,
            crate::dto::events::QueueUpdatedEvent,
            crate::dto::events::SongPlayingEvent,
            crate::dto::events::PartyEndedEvent,
            crate::dto::events::ErrorEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "parties", description = "Party lifecycle and song queue"),
        (name = "songs", description = "Voting on queued songs"),
        (name = "catalog", description = "Music catalog search"),
        (name = "rooms", description = "WebSocket push channel per party"),
    )
)]
pub struct ApiDoc;
