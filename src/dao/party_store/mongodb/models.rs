use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    ParticipantEntity, PartyEntity, PartyStatusEntity, SongEntity, VoteEntity,
};

use super::error::{MongoDaoError, MongoResult};

pub const PARTY_COLLECTION_NAME: &str = "parties";
pub const PARTICIPANT_COLLECTION_NAME: &str = "participants";
pub const SONG_COLLECTION_NAME: &str = "songs";
pub const VOTE_COLLECTION_NAME: &str = "votes";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPartyDocument {
    #[serde(rename = "_id")]
    id: String,
    code: String,
    name: String,
    status: PartyStatusEntity,
    max_songs: Option<u32>,
    songs_per_person: Option<u32>,
    max_participants: Option<u32>,
    current_song_id: Option<String>,
    #[serde(default)]
    version: i64,
    created_at: DateTime,
    updated_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoParticipantDocument {
    #[serde(rename = "_id")]
    id: String,
    party_id: String,
    display_name: String,
    is_host: bool,
    is_spectator: bool,
    joined_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSongDocument {
    #[serde(rename = "_id")]
    id: String,
    party_id: String,
    catalog_id: String,
    title: String,
    artist: String,
    artwork_url: String,
    preview_url: Option<String>,
    duration_ms: i64,
    added_by_id: String,
    queue_position: i64,
    played_at: Option<DateTime>,
    created_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoVoteDocument {
    party_id: String,
    song_id: String,
    participant_id: String,
    value: i32,
    updated_at: DateTime,
}

impl From<PartyEntity> for MongoPartyDocument {
    fn from(value: PartyEntity) -> Self {
        Self {
            id: value.id.to_string(),
            code: value.code,
            name: value.name,
            status: value.status,
            max_songs: value.max_songs,
            songs_per_person: value.songs_per_person,
            max_participants: value.max_participants,
            current_song_id: value.current_song_id.map(|id| id.to_string()),
            version: value.version as i64,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl TryFrom<MongoPartyDocument> for PartyEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoPartyDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(PARTY_COLLECTION_NAME, &value.id)?,
            code: value.code,
            name: value.name,
            status: value.status,
            max_songs: value.max_songs,
            songs_per_person: value.songs_per_person,
            max_participants: value.max_participants,
            current_song_id: value
                .current_song_id
                .as_deref()
                .map(|id| parse_id(PARTY_COLLECTION_NAME, id))
                .transpose()?,
            version: value.version.max(0) as u64,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        })
    }
}

impl From<ParticipantEntity> for MongoParticipantDocument {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            id: value.id.to_string(),
            party_id: value.party_id.to_string(),
            display_name: value.display_name,
            is_host: value.is_host,
            is_spectator: value.is_spectator,
            joined_at: DateTime::from_system_time(value.joined_at),
        }
    }
}

impl TryFrom<MongoParticipantDocument> for ParticipantEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoParticipantDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(PARTICIPANT_COLLECTION_NAME, &value.id)?,
            party_id: parse_id(PARTICIPANT_COLLECTION_NAME, &value.party_id)?,
            display_name: value.display_name,
            is_host: value.is_host,
            is_spectator: value.is_spectator,
            joined_at: value.joined_at.to_system_time(),
        })
    }
}

impl From<SongEntity> for MongoSongDocument {
    fn from(value: SongEntity) -> Self {
        Self {
            id: value.id.to_string(),
            party_id: value.party_id.to_string(),
            catalog_id: value.catalog_id,
            title: value.title,
            artist: value.artist,
            artwork_url: value.artwork_url,
            preview_url: value.preview_url,
            duration_ms: value.duration_ms as i64,
            added_by_id: value.added_by_id.to_string(),
            queue_position: i64::from(value.queue_position),
            played_at: value.played_at.map(DateTime::from_system_time),
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoSongDocument> for SongEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoSongDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(SONG_COLLECTION_NAME, &value.id)?,
            party_id: parse_id(SONG_COLLECTION_NAME, &value.party_id)?,
            catalog_id: value.catalog_id,
            title: value.title,
            artist: value.artist,
            artwork_url: value.artwork_url,
            preview_url: value.preview_url,
            duration_ms: value.duration_ms.max(0) as u64,
            added_by_id: parse_id(SONG_COLLECTION_NAME, &value.added_by_id)?,
            queue_position: value.queue_position.clamp(0, i64::from(u32::MAX)) as u32,
            played_at: value.played_at.map(|at| at.to_system_time()),
            created_at: value.created_at.to_system_time(),
        })
    }
}

impl From<VoteEntity> for MongoVoteDocument {
    fn from(value: VoteEntity) -> Self {
        Self {
            party_id: value.party_id.to_string(),
            song_id: value.song_id.to_string(),
            participant_id: value.participant_id.to_string(),
            value: i32::from(value.value),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl TryFrom<MongoVoteDocument> for VoteEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoVoteDocument) -> MongoResult<Self> {
        Ok(Self {
            party_id: parse_id(VOTE_COLLECTION_NAME, &value.party_id)?,
            song_id: parse_id(VOTE_COLLECTION_NAME, &value.song_id)?,
            participant_id: parse_id(VOTE_COLLECTION_NAME, &value.participant_id)?,
            value: value.value.signum() as i8,
            updated_at: value.updated_at.to_system_time(),
        })
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

pub fn vote_key(song_id: Uuid, participant_id: Uuid) -> Document {
    doc! {"song_id": song_id.to_string(), "participant_id": participant_id.to_string()}
}

fn parse_id(collection: &'static str, value: &str) -> MongoResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| MongoDaoError::InvalidId {
        collection,
        value: value.to_owned(),
    })
}
