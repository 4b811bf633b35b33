use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{ParticipantEntity, PartyEntity, PartyStatusEntity, SongEntity, VoteEntity},
    dto::{format_system_time, validation::validate_not_blank},
    state::scoring::Standing,
};

/// Payload used to open a new party; the caller becomes its host.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePartyRequest {
    #[validate(custom(function = validate_not_blank), length(max = 100))]
    pub name: String,
    /// Display name of the host.
    #[validate(custom(function = validate_not_blank), length(max = 50))]
    pub display_name: String,
    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_songs: Option<u32>,
    #[serde(default)]
    #[validate(range(min = 1))]
    pub songs_per_person: Option<u32>,
    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_participants: Option<u32>,
}

/// Longest display name a regular participant may pick.
pub const DISPLAY_NAME_MAX_CHARS: usize = 50;

/// Payload used to join an existing party.
///
/// The name is ignored when the party is full, the joiner then becomes a spectator.
/// It is checked only for regular admissions.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinPartyRequest {
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Track queued by a participant.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddSongRequest {
    pub participant_id: Uuid,
    #[validate(custom(function = validate_not_blank))]
    pub catalog_id: String,
    #[validate(custom(function = validate_not_blank))]
    pub title: String,
    #[validate(custom(function = validate_not_blank))]
    pub artist: String,
    #[serde(default)]
    pub artwork_url: String,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[validate(range(min = 1))]
    pub duration_ms: u64,
}

/// Vote cast on a song; `value` must be `1` or `-1`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteRequest {
    pub participant_id: Uuid,
    pub value: i64,
}

/// Body of the host-only `next` and `end` routes.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HostActionRequest {
    pub participant_id: Uuid,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PartyStatusDto {
    Waiting,
    Active,
    Ended,
}

impl From<PartyStatusEntity> for PartyStatusDto {
    fn from(value: PartyStatusEntity) -> Self {
        match value {
            PartyStatusEntity::Waiting => PartyStatusDto::Waiting,
            PartyStatusEntity::Active => PartyStatusDto::Active,
            PartyStatusEntity::Ended => PartyStatusDto::Ended,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    pub id: Uuid,
    pub party_id: Uuid,
    pub display_name: String,
    pub is_host: bool,
    pub is_spectator: bool,
    pub joined_at: String,
}

impl From<ParticipantEntity> for ParticipantSummary {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            id: value.id,
            party_id: value.party_id,
            display_name: value.display_name,
            is_host: value.is_host,
            is_spectator: value.is_spectator,
            joined_at: format_system_time(value.joined_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SongSummary {
    pub id: Uuid,
    pub party_id: Uuid,
    pub catalog_id: String,
    pub title: String,
    pub artist: String,
    pub artwork_url: String,
    pub preview_url: Option<String>,
    pub duration_ms: u64,
    pub added_by_id: Uuid,
    pub queue_position: u32,
    /// RFC 3339 timestamp; `null` while the song has not played.
    pub played_at: Option<String>,
    pub created_at: String,
}

impl From<SongEntity> for SongSummary {
    fn from(value: SongEntity) -> Self {
        Self {
            id: value.id,
            party_id: value.party_id,
            catalog_id: value.catalog_id,
            title: value.title,
            artist: value.artist,
            artwork_url: value.artwork_url,
            preview_url: value.preview_url,
            duration_ms: value.duration_ms,
            added_by_id: value.added_by_id,
            queue_position: value.queue_position,
            played_at: value.played_at.map(format_system_time),
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Song with its final score, as listed in the standings.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoredSong {
    #[serde(flatten)]
    pub song: SongSummary,
    pub upvotes: u32,
    pub downvotes: u32,
    pub score: i64,
}

impl From<Standing> for ScoredSong {
    fn from(value: Standing) -> Self {
        Self {
            song: value.song.into(),
            upvotes: value.tally.upvotes,
            downvotes: value.tally.downvotes,
            score: value.tally.score,
        }
    }
}

/// Public view of a party. Vote counts are never exposed here.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PartySummary {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub status: PartyStatusDto,
    pub max_songs: Option<u32>,
    pub songs_per_person: Option<u32>,
    pub max_participants: Option<u32>,
    pub current_song_id: Option<Uuid>,
    pub created_at: String,
    pub updated_at: String,
    pub participants: Vec<ParticipantSummary>,
    /// Ordered by queue position.
    pub songs: Vec<SongSummary>,
}

impl PartySummary {
    pub fn from_parts(
        party: PartyEntity,
        participants: Vec<ParticipantEntity>,
        songs: Vec<SongEntity>,
    ) -> Self {
        Self {
            id: party.id,
            code: party.code,
            name: party.name,
            status: party.status.into(),
            max_songs: party.max_songs,
            songs_per_person: party.songs_per_person,
            max_participants: party.max_participants,
            current_song_id: party.current_song_id,
            created_at: format_system_time(party.created_at),
            updated_at: format_system_time(party.updated_at),
            participants: participants.into_iter().map(Into::into).collect(),
            songs: songs.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteSummary {
    pub party_id: Uuid,
    pub song_id: Uuid,
    pub participant_id: Uuid,
    pub value: i8,
    pub updated_at: String,
}

impl From<VoteEntity> for VoteSummary {
    fn from(value: VoteEntity) -> Self {
        Self {
            party_id: value.party_id,
            song_id: value.song_id,
            participant_id: value.participant_id,
            value: value.value,
            updated_at: format_system_time(value.updated_at),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePartyResponse {
    pub party: PartySummary,
    /// Id of the host participant.
    pub participant_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PartyResponse {
    pub party: PartySummary,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinPartyResponse {
    pub participant_id: Uuid,
    pub participant: ParticipantSummary,
    pub is_spectator: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddSongResponse {
    pub song: SongSummary,
    pub songs: Vec<SongSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CastVoteResponse {
    pub vote: VoteSummary,
}

/// Outcome of `next`: either the song now playing or the final standings.
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum AdvanceResponse {
    Playing {
        song: SongSummary,
        /// Epoch milliseconds.
        #[serde(rename = "startedAt")]
        started_at: u64,
    },
    Ended { ended: bool, songs: Vec<ScoredSong> },
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StandingsResponse {
    pub songs: Vec<ScoredSong>,
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use serde_json::json;

    use super::*;

    fn song() -> SongEntity {
        SongEntity {
            id: Uuid::nil(),
            party_id: Uuid::nil(),
            catalog_id: "4uLU6hMCjMI75M1A2tKUQC".into(),
            title: "Title".into(),
            artist: "Artist".into(),
            artwork_url: String::new(),
            preview_url: None,
            duration_ms: 1_000,
            added_by_id: Uuid::nil(),
            queue_position: 3,
            played_at: None,
            created_at: SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn create_request_rejects_blank_names_and_zero_caps() {
        let request: CreatePartyRequest = serde_json::from_value(json!({
            "name": "  ",
            "displayName": "Host",
            "maxSongs": 0
        }))
        .unwrap();
        let errors = request.validate().unwrap_err();
        assert_eq!(errors.field_errors().len(), 2);
    }

    #[test]
    fn scored_song_flattens_song_fields() {
        let scored = ScoredSong {
            song: song().into(),
            upvotes: 4,
            downvotes: 1,
            score: 2,
        };
        let value = serde_json::to_value(&scored).unwrap();
        assert_eq!(value["queuePosition"], 3);
        assert_eq!(value["catalogId"], "4uLU6hMCjMI75M1A2tKUQC");
        assert_eq!(value["playedAt"], serde_json::Value::Null);
        assert_eq!(value["score"], 2);
        assert_eq!(value["createdAt"], "1970-01-01T00:00:00Z");
    }

    #[test]
    fn advance_response_shapes() {
        let playing = AdvanceResponse::Playing {
            song: song().into(),
            started_at: 42,
        };
        let value = serde_json::to_value(&playing).unwrap();
        assert_eq!(value["startedAt"], 42);
        assert!(value.get("ended").is_none());

        let ended = AdvanceResponse::Ended {
            ended: true,
            songs: Vec::new(),
        };
        assert_eq!(
            serde_json::to_value(&ended).unwrap(),
            json!({"ended": true, "songs": []})
        );
    }
}
