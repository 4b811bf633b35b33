use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::party::{ParticipantSummary, PartySummary, ScoredSong, SongSummary};

/// Full snapshot sent once to a connection right after it joins a room.
#[derive(Debug, Serialize, ToSchema)]
pub struct PartyStateEvent {
    pub party: PartySummary,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ParticipantJoinedEvent {
    pub participant: ParticipantSummary,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantLeftEvent {
    pub participant_id: Uuid,
}

/// Whole queue ordered by position.
#[derive(Debug, Serialize, ToSchema)]
pub struct QueueUpdatedEvent {
    pub songs: Vec<SongSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SongPlayingEvent {
    pub song: SongSummary,
    /// Epoch milliseconds; the host schedules the next advance from it.
    pub started_at: u64,
}

/// Final standings.
#[derive(Debug, Serialize, ToSchema)]
pub struct PartyEndedEvent {
    pub songs: Vec<ScoredSong>,
}

/// Sent to a single connection when its frame cannot be honoured.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorEvent {
    pub message: String,
}
