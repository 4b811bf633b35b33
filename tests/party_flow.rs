use std::{
    collections::HashSet,
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::future::{BoxFuture, join_all};
use tokio::sync::broadcast::{self, error::TryRecvError};
use uuid::Uuid;

use party_queue_back::{
    config::AppConfig,
    dao::{
        models::{ParticipantEntity, PartyEntity, SongEntity, VoteEntity},
        party_store::{MemoryPartyStore, PartyStore},
        storage::{StorageError, StorageResult},
    },
    dto::{
        party::{
            AddSongRequest, AdvanceResponse, CastVoteRequest, CreatePartyRequest,
            CreatePartyResponse, JoinPartyRequest, PartyStatusDto,
        },
        ws::ServerEvent,
    },
    error::ServiceError,
    services::party_service,
    state::{AppState, SharedState},
};

async fn memory_state() -> SharedState {
    let state = AppState::new(AppConfig::default(), None);
    state
        .install_party_store(Arc::new(MemoryPartyStore::new()))
        .await;
    state
}

async fn create(state: &SharedState, max_participants: Option<u32>) -> CreatePartyResponse {
    party_service::create_party(
        state,
        CreatePartyRequest {
            name: "Friday night".into(),
            display_name: "Host".into(),
            max_songs: None,
            songs_per_person: None,
            max_participants,
        },
    )
    .await
    .unwrap()
}

async fn join(state: &SharedState, code: &str, name: &str) -> Uuid {
    party_service::join_party(
        state,
        code,
        JoinPartyRequest {
            display_name: Some(name.into()),
        },
    )
    .await
    .unwrap()
    .participant_id
}

fn track(participant_id: Uuid, title: &str) -> AddSongRequest {
    AddSongRequest {
        participant_id,
        catalog_id: format!("catalog-{title}"),
        title: title.into(),
        artist: "Artist".into(),
        artwork_url: String::new(),
        preview_url: None,
        duration_ms: 200_000,
    }
}

async fn vote(state: &SharedState, song_id: Uuid, participant_id: Uuid, value: i64) {
    party_service::cast_vote(
        state,
        song_id,
        CastVoteRequest {
            participant_id,
            value,
        },
    )
    .await
    .unwrap();
}

fn drain(receiver: &mut broadcast::Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Empty) => return events,
            Err(err) => panic!("room receiver failed: {err}"),
        }
    }
}

fn names(events: &[ServerEvent]) -> Vec<&str> {
    events.iter().map(|event| event.event.as_str()).collect()
}

#[tokio::test]
async fn full_party_admits_a_spectator_under_the_placeholder_name() {
    let state = memory_state().await;
    let created = create(&state, Some(1)).await;
    let code = created.party.code.clone();

    let joined = party_service::join_party(
        &state,
        &code,
        JoinPartyRequest {
            display_name: Some("Alice".into()),
        },
    )
    .await
    .unwrap();
    assert!(joined.is_spectator);
    assert_eq!(joined.participant.display_name, "Spectator");

    let err = party_service::add_song(&state, &code, track(joined.participant_id, "nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let party = party_service::get_party(&state, &code).await.unwrap().party;
    assert_eq!(party.participants.len(), 2);
    assert!(party.songs.is_empty());
}

#[tokio::test]
async fn codes_are_accepted_in_any_case() {
    let state = memory_state().await;
    let created = create(&state, None).await;
    let lowercase = created.party.code.to_ascii_lowercase();

    let party = party_service::get_party(&state, &lowercase).await.unwrap().party;
    assert_eq!(party.id, created.party.id);
}

#[tokio::test]
async fn concurrent_additions_get_dense_positions() {
    let state = memory_state().await;
    let created = create(&state, None).await;
    let code = created.party.code.clone();
    let guest = join(&state, &code, "Guest").await;

    let tasks = (0..12).map(|index| {
        let state = state.clone();
        let code = code.clone();
        let participant_id = if index % 2 == 0 {
            created.participant_id
        } else {
            guest
        };
        tokio::spawn(async move {
            party_service::add_song(&state, &code, track(participant_id, &index.to_string())).await
        })
    });
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let positions: Vec<u32> = party_service::get_party(&state, &code)
        .await
        .unwrap()
        .party
        .songs
        .iter()
        .map(|song| song.queue_position)
        .collect();
    assert_eq!(positions, (0..12).collect::<Vec<u32>>());
}

#[tokio::test]
async fn concurrent_joins_never_exceed_the_participant_cap() {
    let state = memory_state().await;
    let created = create(&state, Some(3)).await;
    let code = created.party.code.clone();

    let tasks = (0..10).map(|index| {
        let state = state.clone();
        let code = code.clone();
        tokio::spawn(async move {
            party_service::join_party(
                &state,
                &code,
                JoinPartyRequest {
                    display_name: Some(format!("Guest {index}")),
                },
            )
            .await
        })
    });
    let joined: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|result| result.unwrap().unwrap())
        .collect();

    assert_eq!(joined.iter().filter(|joined| !joined.is_spectator).count(), 2);
    assert_eq!(joined.iter().filter(|joined| joined.is_spectator).count(), 8);

    let party = party_service::get_party(&state, &code).await.unwrap().party;
    let regulars = party
        .participants
        .iter()
        .filter(|participant| !participant.is_spectator)
        .count();
    assert_eq!(regulars, 3);
}

#[tokio::test]
async fn queue_caps_are_enforced() {
    let state = memory_state().await;
    let created = party_service::create_party(
        &state,
        CreatePartyRequest {
            name: "Capped".into(),
            display_name: "Host".into(),
            max_songs: Some(3),
            songs_per_person: Some(2),
            max_participants: None,
        },
    )
    .await
    .unwrap();
    let code = created.party.code.clone();
    let host = created.participant_id;
    let guest = join(&state, &code, "Guest").await;

    party_service::add_song(&state, &code, track(host, "a")).await.unwrap();
    party_service::add_song(&state, &code, track(host, "b")).await.unwrap();
    let err = party_service::add_song(&state, &code, track(host, "c"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::PerPersonLimitReached));

    party_service::add_song(&state, &code, track(guest, "d")).await.unwrap();
    let err = party_service::add_song(&state, &code, track(guest, "e"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::QueueFull));
}

#[tokio::test]
async fn spectator_votes_are_dampened_in_the_final_standings() {
    let state = memory_state().await;
    let created = create(&state, Some(3)).await;
    let code = created.party.code.clone();
    let host = created.participant_id;
    let alice = join(&state, &code, "Alice").await;
    let bob = join(&state, &code, "Bob").await;
    let watcher_one = join(&state, &code, "Watcher").await;
    let watcher_two = join(&state, &code, "Watcher").await;

    let song = party_service::add_song(&state, &code, track(host, "anthem"))
        .await
        .unwrap()
        .song;

    vote(&state, song.id, host, 1).await;
    vote(&state, song.id, alice, 1).await;
    vote(&state, song.id, bob, -1).await;
    vote(&state, song.id, watcher_one, 1).await;
    vote(&state, song.id, watcher_two, 1).await;

    let standings = party_service::end_party(&state, &code, host)
        .await
        .unwrap()
        .songs;
    assert_eq!(standings.len(), 1);
    assert_eq!(standings[0].score, 2);
    assert_eq!(standings[0].upvotes, 4);
    assert_eq!(standings[0].downvotes, 1);
}

#[tokio::test]
async fn recasting_a_vote_replaces_the_previous_one() {
    let state = memory_state().await;
    let created = create(&state, None).await;
    let code = created.party.code.clone();
    let host = created.participant_id;
    let song = party_service::add_song(&state, &code, track(host, "flip"))
        .await
        .unwrap()
        .song;

    vote(&state, song.id, host, 1).await;
    vote(&state, song.id, host, -1).await;

    let standings = party_service::end_party(&state, &code, host)
        .await
        .unwrap()
        .songs;
    assert_eq!(standings[0].score, -1);
    assert_eq!(standings[0].upvotes, 0);
    assert_eq!(standings[0].downvotes, 1);
}

#[tokio::test]
async fn invalid_votes_are_rejected() {
    let state = memory_state().await;
    let created = create(&state, None).await;
    let code = created.party.code.clone();
    let song = party_service::add_song(&state, &code, track(created.participant_id, "x"))
        .await
        .unwrap()
        .song;

    let err = party_service::cast_vote(
        &state,
        song.id,
        CastVoteRequest {
            participant_id: created.participant_id,
            value: 2,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    let other = create(&state, None).await;
    let err = party_service::cast_vote(
        &state,
        song.id,
        CastVoteRequest {
            participant_id: other.participant_id,
            value: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn advancing_plays_the_queue_in_order_then_ends_the_party() {
    let state = memory_state().await;
    let created = create(&state, None).await;
    let code = created.party.code.clone();
    let host = created.participant_id;
    let guest = join(&state, &code, "Guest").await;

    let first = party_service::add_song(&state, &code, track(host, "first"))
        .await
        .unwrap()
        .song;
    let second = party_service::add_song(&state, &code, track(guest, "second"))
        .await
        .unwrap()
        .song;
    vote(&state, second.id, host, 1).await;

    let (mut receiver, snapshot) = party_service::join_room(&state, &code, guest)
        .await
        .unwrap();
    assert_eq!(snapshot.songs.len(), 2);

    let err = party_service::advance(&state, &code, guest).await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    for expected in [first.id, second.id] {
        match party_service::advance(&state, &code, host).await.unwrap() {
            AdvanceResponse::Playing { song, .. } => assert_eq!(song.id, expected),
            other => panic!("expected a song to start, got {other:?}"),
        }
        let party = party_service::get_party(&state, &code).await.unwrap().party;
        assert_eq!(party.status, PartyStatusDto::Active);
        assert_eq!(party.current_song_id, Some(expected));
    }

    let AdvanceResponse::Ended { ended, songs } =
        party_service::advance(&state, &code, host).await.unwrap()
    else {
        panic!("expected the party to end");
    };
    assert!(ended);
    let ranked: Vec<Uuid> = songs.iter().map(|scored| scored.song.id).collect();
    assert_eq!(ranked, vec![second.id, first.id]);
    assert!(songs.iter().all(|scored| scored.song.played_at.is_some()));

    let events = drain(&mut receiver);
    assert_eq!(
        names(&events),
        vec!["song:playing", "song:playing", "party:ended"]
    );
    assert!(events[0].data["startedAt"].is_u64());
    assert_eq!(events[2].data["songs"].as_array().map(Vec::len), Some(2));

    let party = party_service::get_party(&state, &code).await.unwrap().party;
    assert_eq!(party.status, PartyStatusDto::Ended);
}

#[tokio::test]
async fn ended_parties_reject_further_operations_without_new_events() {
    let state = memory_state().await;
    let created = create(&state, None).await;
    let code = created.party.code.clone();
    let host = created.participant_id;
    let song = party_service::add_song(&state, &code, track(host, "last"))
        .await
        .unwrap()
        .song;

    let (mut receiver, _) = party_service::join_room(&state, &code, host).await.unwrap();
    party_service::end_party(&state, &code, host).await.unwrap();
    assert_eq!(names(&drain(&mut receiver)), vec!["party:ended"]);

    let err = party_service::advance(&state, &code, host).await.unwrap_err();
    assert!(matches!(err, ServiceError::Ended));
    let err = party_service::end_party(&state, &code, host).await.unwrap_err();
    assert!(matches!(err, ServiceError::Ended));
    let err = party_service::add_song(&state, &code, track(host, "late"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Ended));
    let err = party_service::join_party(&state, &code, JoinPartyRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Ended));
    let err = party_service::cast_vote(
        &state,
        song.id,
        CastVoteRequest {
            participant_id: host,
            value: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Ended));

    assert!(drain(&mut receiver).is_empty());
}

#[tokio::test]
async fn rooms_only_receive_their_own_party_events() {
    let state = memory_state().await;
    let first = create(&state, None).await;
    let second = create(&state, None).await;

    let (mut first_room, _) =
        party_service::join_room(&state, &first.party.code, first.participant_id)
            .await
            .unwrap();
    let (mut second_room, _) =
        party_service::join_room(&state, &second.party.code, second.participant_id)
            .await
            .unwrap();

    join(&state, &first.party.code, "Guest").await;
    party_service::add_song(&state, &first.party.code, track(first.participant_id, "a"))
        .await
        .unwrap();

    assert_eq!(
        names(&drain(&mut first_room)),
        vec!["participant:joined", "queue:updated"]
    );
    assert!(drain(&mut second_room).is_empty());
}

#[tokio::test]
async fn non_members_cannot_subscribe_to_a_room() {
    let state = memory_state().await;
    let created = create(&state, None).await;

    let err = party_service::join_room(&state, &created.party.code, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
    assert_eq!(state.rooms().subscriber_count(&created.party.code), 0);
}

#[tokio::test]
async fn unknown_parties_are_not_found() {
    let state = memory_state().await;

    let err = party_service::get_party(&state, "NOPE42").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
    let err = party_service::advance(&state, "NOPE42", Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn operations_fail_fast_without_a_store() {
    let state = AppState::new(AppConfig::default(), None);

    let err = party_service::get_party(&state, "ABC123").await.unwrap_err();
    assert!(matches!(err, ServiceError::Degraded));
}

/// Memory store whose lifecycle writes can be switched to fail.
#[derive(Clone, Default)]
struct FlakyStore {
    inner: MemoryPartyStore,
    /// Fails every party write, song starts included.
    fail_updates: Arc<AtomicBool>,
    /// Fails only the combined party and song write of a song start.
    fail_song_starts: Arc<AtomicBool>,
}

fn injected_failure(message: &str) -> StorageError {
    StorageError::unavailable(message.into(), io::Error::other("injected failure"))
}

impl PartyStore for FlakyStore {
    fn insert_party(
        &self,
        party: PartyEntity,
        host: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.insert_party(party, host)
    }

    fn update_party(&self, party: PartyEntity) -> BoxFuture<'static, StorageResult<()>> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Box::pin(async { Err(injected_failure("party write rejected")) });
        }
        self.inner.update_party(party)
    }

    fn start_song(
        &self,
        party: PartyEntity,
        song: SongEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        if self.fail_updates.load(Ordering::SeqCst) || self.fail_song_starts.load(Ordering::SeqCst)
        {
            return Box::pin(async { Err(injected_failure("song write rejected")) });
        }
        self.inner.start_song(party, song)
    }

    fn find_party(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PartyEntity>>> {
        self.inner.find_party(id)
    }

    fn find_party_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<PartyEntity>>> {
        self.inner.find_party_by_code(code)
    }

    fn party_code_exists(&self, code: String) -> BoxFuture<'static, StorageResult<bool>> {
        self.inner.party_code_exists(code)
    }

    fn insert_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.insert_participant(participant)
    }

    fn find_participant(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        self.inner.find_participant(id)
    }

    fn list_participants(
        &self,
        party_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        self.inner.list_participants(party_id)
    }

    fn insert_song(&self, song: SongEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.insert_song(song)
    }

    fn find_song(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SongEntity>>> {
        self.inner.find_song(id)
    }

    fn list_songs(&self, party_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<SongEntity>>> {
        self.inner.list_songs(party_id)
    }

    fn upsert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<VoteEntity>> {
        self.inner.upsert_vote(vote)
    }

    fn list_votes(&self, party_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>> {
        self.inner.list_votes(party_id)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}

#[tokio::test]
async fn failed_transitions_broadcast_nothing_and_can_be_retried() {
    let state = AppState::new(AppConfig::default(), None);
    let store = FlakyStore::default();
    state.install_party_store(Arc::new(store.clone())).await;

    let created = create(&state, None).await;
    let code = created.party.code.clone();
    let host = created.participant_id;
    let song = party_service::add_song(&state, &code, track(host, "retry"))
        .await
        .unwrap()
        .song;
    let (mut receiver, _) = party_service::join_room(&state, &code, host).await.unwrap();

    store.fail_updates.store(true, Ordering::SeqCst);
    let err = party_service::advance(&state, &code, host).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unavailable(_)));
    let err = party_service::end_party(&state, &code, host).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unavailable(_)));
    assert!(drain(&mut receiver).is_empty());

    let party = party_service::get_party(&state, &code).await.unwrap().party;
    assert_eq!(party.status, PartyStatusDto::Waiting);
    assert!(party.songs[0].played_at.is_none());

    store.fail_updates.store(false, Ordering::SeqCst);
    match party_service::advance(&state, &code, host).await.unwrap() {
        AdvanceResponse::Playing { song: playing, .. } => assert_eq!(playing.id, song.id),
        other => panic!("expected the song to start, got {other:?}"),
    }
    assert_eq!(names(&drain(&mut receiver)), vec!["song:playing"]);
}

#[tokio::test]
async fn each_party_gets_a_distinct_code() {
    let state = memory_state().await;
    let mut codes = HashSet::new();
    for _ in 0..20 {
        codes.insert(create(&state, None).await.party.code);
    }
    assert_eq!(codes.len(), 20);
}

#[tokio::test]
async fn failed_song_start_leaves_no_half_started_party() {
    let state = AppState::new(AppConfig::default(), None);
    let store = FlakyStore::default();
    state.install_party_store(Arc::new(store.clone())).await;

    let created = create(&state, None).await;
    let code = created.party.code.clone();
    let host = created.participant_id;
    party_service::add_song(&state, &code, track(host, "stuck"))
        .await
        .unwrap();
    let (mut receiver, _) = party_service::join_room(&state, &code, host).await.unwrap();

    store.fail_song_starts.store(true, Ordering::SeqCst);
    let err = party_service::advance(&state, &code, host).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unavailable(_)));

    let (_, snapshot) = party_service::join_room(&state, &code, host).await.unwrap();
    assert_eq!(snapshot.status, PartyStatusDto::Waiting);
    assert_eq!(snapshot.current_song_id, None);
    assert!(snapshot.songs[0].played_at.is_none());
    assert!(drain(&mut receiver).is_empty());

    let standings = party_service::end_party(&state, &code, host)
        .await
        .unwrap()
        .songs;
    assert_eq!(standings.len(), 1);
    assert!(standings[0].song.played_at.is_none());
    assert_eq!(names(&drain(&mut receiver)), vec!["party:ended"]);
}

#[tokio::test]
async fn advancing_an_empty_queue_ends_the_party() {
    let state = memory_state().await;
    let created = create(&state, None).await;
    let code = created.party.code.clone();
    let host = created.participant_id;
    let (mut receiver, _) = party_service::join_room(&state, &code, host).await.unwrap();

    match party_service::advance(&state, &code, host).await.unwrap() {
        AdvanceResponse::Ended { ended, songs } => {
            assert!(ended);
            assert!(songs.is_empty());
        }
        other => panic!("expected the party to end, got {other:?}"),
    }

    let events = drain(&mut receiver);
    assert_eq!(names(&events), vec!["party:ended"]);
    assert_eq!(events[0].data["songs"].as_array().map(Vec::len), Some(0));

    let party = party_service::get_party(&state, &code).await.unwrap().party;
    assert_eq!(party.status, PartyStatusDto::Ended);
    assert_eq!(party.current_song_id, None);
}

#[tokio::test]
async fn full_party_ignores_the_name_of_a_spectator() {
    let state = memory_state().await;
    let created = create(&state, Some(1)).await;
    let code = created.party.code.clone();

    let joined = party_service::join_party(
        &state,
        &code,
        JoinPartyRequest {
            display_name: Some("B".repeat(60)),
        },
    )
    .await
    .unwrap();
    assert!(joined.is_spectator);
    assert_eq!(joined.participant.display_name, "Spectator");

    let open = create(&state, None).await;
    let err = party_service::join_party(
        &state,
        &open.party.code,
        JoinPartyRequest {
            display_name: Some("B".repeat(60)),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

#[tokio::test]
async fn party_gates_are_released_when_rooms_empty_and_parties_end() {
    let state = memory_state().await;
    let created = create(&state, None).await;
    let code = created.party.code.clone();
    let host = created.participant_id;

    let (_receiver, _) = party_service::join_room(&state, &code, host).await.unwrap();
    assert_eq!(state.party_gate_count(), 1);
    party_service::leave_room(&state, &code, host).await;
    assert_eq!(state.party_gate_count(), 0);

    party_service::add_song(&state, &code, track(host, "last"))
        .await
        .unwrap();
    party_service::end_party(&state, &code, host).await.unwrap();
    assert_eq!(state.party_gate_count(), 0);

    let err = party_service::advance(&state, &code, host).await.unwrap_err();
    assert!(matches!(err, ServiceError::Ended));
    assert_eq!(state.party_gate_count(), 0);
}
