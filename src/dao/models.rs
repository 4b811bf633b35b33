use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Persisted lifecycle status of a party.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PartyStatusEntity {
    Waiting,
    Active,
    Ended,
}

/// Root aggregate describing a party; participants, songs and votes hang off its id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartyEntity {
    /// Primary key of the party.
    pub id: Uuid,
    /// Short shareable code, unique across parties.
    pub code: String,
    /// Display name of the party.
    pub name: String,
    /// Lifecycle status (only ever moves forward).
    pub status: PartyStatusEntity,
    /// Optional cap on the total number of songs in the queue.
    pub max_songs: Option<u32>,
    /// Optional cap on the number of songs each participant can add.
    pub songs_per_person: Option<u32>,
    /// Optional cap on the number of non-spectator participants.
    pub max_participants: Option<u32>,
    /// Song currently playing, set by the advance operation.
    pub current_song_id: Option<Uuid>,
    /// Monotonic counter bumped on every lifecycle transition.
    pub version: u64,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Last time the party entity was updated.
    pub updated_at: SystemTime,
}

/// Member of a party, either the host, a regular participant or a spectator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantEntity {
    pub id: Uuid,
    pub party_id: Uuid,
    pub display_name: String,
    pub is_host: bool,
    pub is_spectator: bool,
    pub joined_at: SystemTime,
}

/// Song queued in a party.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SongEntity {
    pub id: Uuid,
    pub party_id: Uuid,
    /// Identifier of the track in the external music catalog.
    pub catalog_id: String,
    pub title: String,
    pub artist: String,
    pub artwork_url: String,
    pub preview_url: Option<String>,
    pub duration_ms: u64,
    /// Participant who added the song.
    pub added_by_id: Uuid,
    /// Zero-based insertion index, unique within the party.
    pub queue_position: u32,
    /// When the song started playing; never cleared once set.
    pub played_at: Option<SystemTime>,
    pub created_at: SystemTime,
}

/// Vote of a participant on a song, unique per (song, participant).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteEntity {
    pub party_id: Uuid,
    pub song_id: Uuid,
    pub participant_id: Uuid,
    /// Either `1` or `-1`.
    pub value: i8,
    pub updated_at: SystemTime,
}
