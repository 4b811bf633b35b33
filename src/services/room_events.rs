use std::time::SystemTime;

use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::models::{ParticipantEntity, SongEntity},
    dto::{
        epoch_millis,
        events::{
            ParticipantJoinedEvent, ParticipantLeftEvent, PartyEndedEvent, QueueUpdatedEvent,
            SongPlayingEvent,
        },
        ws::ServerEvent,
    },
    state::{SharedState, scoring::Standing},
};

pub const EVENT_PARTY_STATE: &str = "party:state";
pub const EVENT_PARTICIPANT_JOINED: &str = "participant:joined";
pub const EVENT_PARTICIPANT_LEFT: &str = "participant:left";
pub const EVENT_QUEUE_UPDATED: &str = "queue:updated";
pub const EVENT_SONG_PLAYING: &str = "song:playing";
pub const EVENT_PARTY_ENDED: &str = "party:ended";
pub const EVENT_ERROR: &str = "error";

/// Domain events produced by party operations, delivered to the party room.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    ParticipantJoined(ParticipantEntity),
    ParticipantLeft { participant_id: Uuid },
    /// Whole queue ordered by position.
    QueueUpdated(Vec<SongEntity>),
    SongPlaying {
        song: SongEntity,
        started_at: SystemTime,
    },
    PartyEnded(Vec<Standing>),
}

impl RoomEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RoomEvent::ParticipantJoined(_) => EVENT_PARTICIPANT_JOINED,
            RoomEvent::ParticipantLeft { .. } => EVENT_PARTICIPANT_LEFT,
            RoomEvent::QueueUpdated(_) => EVENT_QUEUE_UPDATED,
            RoomEvent::SongPlaying { .. } => EVENT_SONG_PLAYING,
            RoomEvent::PartyEnded(_) => EVENT_PARTY_ENDED,
        }
    }

    /// Render the event into the wire envelope.
    pub fn into_server_event(self) -> serde_json::Result<ServerEvent> {
        let name = self.name();
        match self {
            RoomEvent::ParticipantJoined(participant) => envelope(
                name,
                &ParticipantJoinedEvent {
                    participant: participant.into(),
                },
            ),
            RoomEvent::ParticipantLeft { participant_id } => {
                envelope(name, &ParticipantLeftEvent { participant_id })
            }
            RoomEvent::QueueUpdated(songs) => envelope(
                name,
                &QueueUpdatedEvent {
                    songs: songs.into_iter().map(Into::into).collect(),
                },
            ),
            RoomEvent::SongPlaying { song, started_at } => envelope(
                name,
                &SongPlayingEvent {
                    song: song.into(),
                    started_at: epoch_millis(started_at),
                },
            ),
            RoomEvent::PartyEnded(standings) => envelope(
                name,
                &PartyEndedEvent {
                    songs: standings.into_iter().map(Into::into).collect(),
                },
            ),
        }
    }
}

fn envelope<T: Serialize>(name: &str, payload: &T) -> serde_json::Result<ServerEvent> {
    ServerEvent::json(name, payload)
}

/// Deliver events to the room of `party_code`, in order.
///
/// Callers dispatch while holding the party gate so rooms observe mutations in commit order.
pub fn dispatch(state: &SharedState, party_code: &str, events: Vec<RoomEvent>) {
    for event in events {
        let name = event.name();
        match event.into_server_event() {
            Ok(server_event) => {
                let receivers = state.rooms().broadcast(party_code, server_event);
                debug!(party_code, event = name, receivers, "room event dispatched");
            }
            Err(err) => {
                warn!(party_code, event = name, error = %err, "failed to serialize room event");
            }
        }
    }
}
