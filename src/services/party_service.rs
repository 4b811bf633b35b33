//! Party operations: every mutation runs under the party gate, persists through the
//! store, then dispatches its room events before the gate is released.

use std::{sync::Arc, time::SystemTime};

use rand::Rng;
use tokio::sync::{OwnedMutexGuard, broadcast};
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::{
        models::{ParticipantEntity, PartyEntity, PartyStatusEntity, SongEntity, VoteEntity},
        party_store::PartyStore,
        storage::StorageError,
    },
    dto::{
        epoch_millis,
        party::{
            AddSongRequest, AddSongResponse, AdvanceResponse, CastVoteRequest, CastVoteResponse,
            CreatePartyRequest, CreatePartyResponse, DISPLAY_NAME_MAX_CHARS, JoinPartyRequest,
            JoinPartyResponse, PartyResponse, PartySummary, StandingsResponse,
        },
        ws::ServerEvent,
    },
    error::ServiceError,
    services::room_events::{RoomEvent, dispatch},
    state::{
        PartySlot, SharedState,
        queue::{Admission, QueuePolicy, VoteValue, mark_played, next_unplayed},
        scoring::{Standing, standings},
        state_machine::{FinishReason, PartyEvent, PartyStateMachine, Plan},
        transitions::run_transition,
    },
};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Party codes are matched case-insensitively and stored uppercase.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Random uppercase alphanumeric code of `length` characters.
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Open a party and register its host.
pub async fn create_party(
    state: &SharedState,
    request: CreatePartyRequest,
) -> Result<CreatePartyResponse, ServiceError> {
    validate(&request)?;
    let store = state.require_party_store().await?;
    let config = state.config();

    for attempt in 0..config.code_attempts() {
        let code = generate_code(config.code_length());
        if store.party_code_exists(code.clone()).await? {
            debug!(attempt, "party code collision; regenerating");
            continue;
        }

        let now = SystemTime::now();
        let party = PartyEntity {
            id: Uuid::new_v4(),
            code,
            name: request.name.trim().to_string(),
            status: PartyStatusEntity::Waiting,
            max_songs: request.max_songs,
            songs_per_person: request.songs_per_person,
            max_participants: request.max_participants,
            current_song_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        let host = ParticipantEntity {
            id: Uuid::new_v4(),
            party_id: party.id,
            display_name: request.display_name.trim().to_string(),
            is_host: true,
            is_spectator: false,
            joined_at: now,
        };

        match store.insert_party(party.clone(), host.clone()).await {
            Ok(()) => {
                info!(party_code = %party.code, party_id = %party.id, "party created");
                let participant_id = host.id;
                return Ok(CreatePartyResponse {
                    party: PartySummary::from_parts(party, vec![host], Vec::new()),
                    participant_id,
                });
            }
            Err(StorageError::Integrity { message }) => {
                debug!(attempt, %message, "party code taken concurrently; regenerating");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(ServiceError::InvalidState(format!(
        "no free party code after {} attempts",
        config.code_attempts()
    )))
}

/// Party with its participants and its queue ordered by position.
pub async fn get_party(state: &SharedState, code: &str) -> Result<PartyResponse, ServiceError> {
    let store = state.require_party_store().await?;
    let code = normalize_code(code);
    let party = store
        .find_party_by_code(code.clone())
        .await?
        .ok_or_else(|| party_not_found(&code))?;

    Ok(PartyResponse {
        party: load_summary(&store, party).await?,
    })
}

/// Admit a participant, as a spectator once the participant cap is reached.
pub async fn join_party(
    state: &SharedState,
    code: &str,
    request: JoinPartyRequest,
) -> Result<JoinPartyResponse, ServiceError> {
    let store = state.require_party_store().await?;
    let code = normalize_code(code);
    let (_slot, party) = lock_existing(state, &store, &code).await?;
    ensure_not_ended(&party)?;

    let participants = store.list_participants(party.id).await?;
    let (display_name, is_spectator) =
        match QueuePolicy::from(&party).admit_participant(&participants) {
            Admission::Spectator => (state.config().spectator_name().to_string(), true),
            Admission::Regular => (regular_display_name(request.display_name.as_deref())?, false),
        };

    let participant = ParticipantEntity {
        id: Uuid::new_v4(),
        party_id: party.id,
        display_name,
        is_host: false,
        is_spectator,
        joined_at: SystemTime::now(),
    };
    store.insert_participant(participant.clone()).await?;
    info!(
        party_code = %party.code,
        participant_id = %participant.id,
        is_spectator,
        "participant joined"
    );

    dispatch(
        state,
        &party.code,
        vec![RoomEvent::ParticipantJoined(participant.clone())],
    );

    Ok(JoinPartyResponse {
        participant_id: participant.id,
        is_spectator,
        participant: participant.into(),
    })
}

/// Append a song at the end of the queue.
pub async fn add_song(
    state: &SharedState,
    code: &str,
    request: AddSongRequest,
) -> Result<AddSongResponse, ServiceError> {
    validate(&request)?;
    let store = state.require_party_store().await?;
    let code = normalize_code(code);
    let (_slot, party) = lock_existing(state, &store, &code).await?;
    ensure_not_ended(&party)?;

    let participant = find_member(&store, &party, request.participant_id).await?;
    if participant.is_spectator {
        return Err(ServiceError::Forbidden("spectators cannot add songs".into()));
    }

    let mut songs = store.list_songs(party.id).await?;
    let queue_position = QueuePolicy::from(&party).admit_song(&songs, participant.id)?;

    let song = SongEntity {
        id: Uuid::new_v4(),
        party_id: party.id,
        catalog_id: request.catalog_id.trim().to_string(),
        title: request.title.trim().to_string(),
        artist: request.artist.trim().to_string(),
        artwork_url: request.artwork_url,
        preview_url: request.preview_url.filter(|url| !url.trim().is_empty()),
        duration_ms: request.duration_ms,
        added_by_id: participant.id,
        queue_position,
        played_at: None,
        created_at: SystemTime::now(),
    };
    store.insert_song(song.clone()).await?;
    songs.push(song.clone());
    info!(
        party_code = %party.code,
        song_id = %song.id,
        queue_position,
        "song queued"
    );

    dispatch(state, &party.code, vec![RoomEvent::QueueUpdated(songs.clone())]);

    Ok(AddSongResponse {
        song: song.into(),
        songs: songs.into_iter().map(Into::into).collect(),
    })
}

/// Create or overwrite the caller's vote on a song. Votes are not broadcast.
pub async fn cast_vote(
    state: &SharedState,
    song_id: Uuid,
    request: CastVoteRequest,
) -> Result<CastVoteResponse, ServiceError> {
    let value = VoteValue::try_from(request.value).map_err(|value| {
        ServiceError::InvalidInput(format!("vote value must be 1 or -1 (got {value})"))
    })?;
    let store = state.require_party_store().await?;

    let song = store
        .find_song(song_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("song `{song_id}` not found")))?;
    let owner = store
        .find_party(song.party_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("party of song `{song_id}` not found")))?;

    let (_slot, party) = lock_existing(state, &store, &owner.code).await?;
    let participant = find_member(&store, &party, request.participant_id).await?;
    ensure_not_ended(&party)?;

    let vote = store
        .upsert_vote(VoteEntity {
            party_id: party.id,
            song_id: song.id,
            participant_id: participant.id,
            value: value.as_i8(),
            updated_at: SystemTime::now(),
        })
        .await?;
    debug!(
        party_code = %party.code,
        song_id = %song.id,
        participant_id = %participant.id,
        value = vote.value,
        "vote stored"
    );

    Ok(CastVoteResponse { vote: vote.into() })
}

/// Start the next unplayed song, or end the party when none is left.
pub async fn advance(
    state: &SharedState,
    code: &str,
    participant_id: Uuid,
) -> Result<AdvanceResponse, ServiceError> {
    let store = state.require_party_store().await?;
    let code = normalize_code(code);
    let (mut slot, party) = lock_existing(state, &store, &code).await?;
    require_host(&store, &party, participant_id).await?;
    ensure_not_ended(&party)?;

    let songs = store.list_songs(party.id).await?;
    let started_at = current_started_at(&party, &songs);
    let machine = slot.machine(&party, started_at);

    let Some(next) = next_unplayed(&songs).cloned() else {
        let ranked = finish(state, &store, machine, party, songs, FinishReason::QueueExhausted)
            .await?;
        return Ok(AdvanceResponse::Ended {
            ended: true,
            songs: ranked.into_iter().map(Into::into).collect(),
        });
    };

    let now = SystemTime::now();
    let event = PartyEvent::SongStarted {
        song_id: next.id,
        started_at: now,
    };
    let (song, _) = run_transition(machine, event, |plan| {
        let store = store.clone();
        async move {
            let mut song = next;
            mark_played(&mut song, now);
            store
                .start_song(apply_plan(party, &plan, now), song.clone())
                .await?;
            Ok(song)
        }
    })
    .await?;
    info!(party_code = %code, song_id = %song.id, "song started");

    dispatch(
        state,
        &code,
        vec![RoomEvent::SongPlaying {
            song: song.clone(),
            started_at: now,
        }],
    );

    Ok(AdvanceResponse::Playing {
        song: song.into(),
        started_at: epoch_millis(now),
    })
}

/// End the party on the host's request and return the final standings.
pub async fn end_party(
    state: &SharedState,
    code: &str,
    participant_id: Uuid,
) -> Result<StandingsResponse, ServiceError> {
    let store = state.require_party_store().await?;
    let code = normalize_code(code);
    let (mut slot, party) = lock_existing(state, &store, &code).await?;
    require_host(&store, &party, participant_id).await?;
    ensure_not_ended(&party)?;

    let songs = store.list_songs(party.id).await?;
    let started_at = current_started_at(&party, &songs);
    let machine = slot.machine(&party, started_at);
    let ranked = finish(state, &store, machine, party, songs, FinishReason::HostEnded).await?;

    Ok(StandingsResponse {
        songs: ranked.into_iter().map(Into::into).collect(),
    })
}

/// Subscribe a member's connection to the party room and take its `party:state` snapshot.
///
/// Both happen under the party gate, so the receiver yields exactly the events
/// committed after the snapshot.
pub async fn join_room(
    state: &SharedState,
    code: &str,
    participant_id: Uuid,
) -> Result<(broadcast::Receiver<ServerEvent>, PartySummary), ServiceError> {
    let store = state.require_party_store().await?;
    let code = normalize_code(code);
    let (slot, party) = lock_existing(state, &store, &code).await?;
    find_member(&store, &party, participant_id).await?;

    let summary = load_summary(&store, party).await?;
    let receiver = state.rooms().subscribe(&code);
    drop(slot);

    Ok((receiver, summary))
}

/// Announce that a connection left its room.
pub async fn leave_room(state: &SharedState, code: &str, participant_id: Uuid) {
    let slot = state.lock_party(code).await;
    dispatch(state, code, vec![RoomEvent::ParticipantLeft { participant_id }]);
    drop(slot);
    state.discard_party_gate(code);
    debug!(party_code = code, gates = state.party_gate_count(), "room left");
}

/// Compute standings, persist the terminal phase, then emit `party:ended`.
async fn finish(
    state: &SharedState,
    store: &Arc<dyn PartyStore>,
    machine: &mut PartyStateMachine,
    party: PartyEntity,
    songs: Vec<SongEntity>,
    reason: FinishReason,
) -> Result<Vec<Standing>, ServiceError> {
    let code = party.code.clone();
    let participants = store.list_participants(party.id).await?;
    let votes = store.list_votes(party.id).await?;
    let ranked = standings(&songs, &participants, &votes);

    let now = SystemTime::now();
    run_transition(machine, PartyEvent::Finish(reason), |plan| {
        let store = store.clone();
        async move {
            store.update_party(apply_plan(party, &plan, now)).await?;
            Ok(())
        }
    })
    .await?;
    dispatch(state, &code, vec![RoomEvent::PartyEnded(ranked.clone())]);
    state.retire_party_gate(&code);
    info!(
        party_code = %code,
        ?reason,
        songs = ranked.len(),
        gates = state.party_gate_count(),
        "party ended"
    );
    Ok(ranked)
}

/// Party entity as it will be persisted once the plan is applied.
fn apply_plan(mut party: PartyEntity, plan: &Plan, now: SystemTime) -> PartyEntity {
    party.status = plan.to.status();
    party.current_song_id = plan.to.current_song_id();
    party.version = plan.version_next;
    party.updated_at = now;
    party
}

/// Take the party gate and load the party under it.
async fn lock_existing(
    state: &SharedState,
    store: &Arc<dyn PartyStore>,
    code: &str,
) -> Result<(OwnedMutexGuard<PartySlot>, PartyEntity), ServiceError> {
    let slot = state.lock_party(code).await;
    match store.find_party_by_code(code.to_string()).await {
        Ok(Some(party)) => {
            if party.status == PartyStatusEntity::Ended {
                state.retire_party_gate(code);
            }
            Ok((slot, party))
        }
        Ok(None) => {
            drop(slot);
            state.discard_party_gate(code);
            Err(party_not_found(code))
        }
        Err(err) => Err(err.into()),
    }
}

async fn load_summary(
    store: &Arc<dyn PartyStore>,
    party: PartyEntity,
) -> Result<PartySummary, ServiceError> {
    let participants = store.list_participants(party.id).await?;
    let songs = store.list_songs(party.id).await?;
    Ok(PartySummary::from_parts(party, participants, songs))
}

async fn find_member(
    store: &Arc<dyn PartyStore>,
    party: &PartyEntity,
    participant_id: Uuid,
) -> Result<ParticipantEntity, ServiceError> {
    store
        .find_participant(participant_id)
        .await?
        .filter(|participant| participant.party_id == party.id)
        .ok_or_else(|| ServiceError::Forbidden("participant is not a member of this party".into()))
}

async fn require_host(
    store: &Arc<dyn PartyStore>,
    party: &PartyEntity,
    participant_id: Uuid,
) -> Result<(), ServiceError> {
    match find_member(store, party, participant_id).await {
        Ok(participant) if participant.is_host => Ok(()),
        Ok(_) | Err(ServiceError::Forbidden(_)) => Err(ServiceError::Forbidden(
            "only the host can control the party".into(),
        )),
        Err(err) => Err(err),
    }
}

/// Trimmed, non-empty name of at most [`DISPLAY_NAME_MAX_CHARS`] characters.
fn regular_display_name(name: Option<&str>) -> Result<String, ServiceError> {
    let name = name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ServiceError::InvalidInput("displayName is required".into()))?;
    if name.chars().count() > DISPLAY_NAME_MAX_CHARS {
        return Err(ServiceError::InvalidInput(format!(
            "displayName must be at most {DISPLAY_NAME_MAX_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

fn ensure_not_ended(party: &PartyEntity) -> Result<(), ServiceError> {
    if party.status == PartyStatusEntity::Ended {
        return Err(ServiceError::Ended);
    }
    Ok(())
}

fn current_started_at(party: &PartyEntity, songs: &[SongEntity]) -> Option<SystemTime> {
    let current = party.current_song_id?;
    songs
        .iter()
        .find(|song| song.id == current)
        .and_then(|song| song.played_at)
}

fn party_not_found(code: &str) -> ServiceError {
    ServiceError::NotFound(format!("party `{code}` not found"))
}

fn validate<T: Validate>(request: &T) -> Result<(), ServiceError> {
    request
        .validate()
        .map_err(|err| ServiceError::InvalidInput(format!("validation failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_uppercase_alphanumeric() {
        for _ in 0..100 {
            let code = generate_code(6);
            assert_eq!(code.len(), 6);
            assert!(
                code.chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            );
        }
    }

    #[test]
    fn regular_names_are_trimmed_and_bounded() {
        assert_eq!(regular_display_name(Some("  Alice ")).unwrap(), "Alice");
        assert!(regular_display_name(Some("   ")).is_err());
        assert!(regular_display_name(None).is_err());
        assert!(regular_display_name(Some(&"é".repeat(DISPLAY_NAME_MAX_CHARS))).is_ok());
        assert!(regular_display_name(Some(&"B".repeat(DISPLAY_NAME_MAX_CHARS + 1))).is_err());
    }

    #[test]
    fn codes_are_normalized_before_lookup() {
        assert_eq!(normalize_code(" ab12cd "), "AB12CD");
    }
}
