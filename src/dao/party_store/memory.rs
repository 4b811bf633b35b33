//! Process-local [`PartyStore`] used when no database is configured and by the test suites.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::dao::{
    models::{ParticipantEntity, PartyEntity, SongEntity, VoteEntity},
    party_store::PartyStore,
    storage::{StorageError, StorageResult},
};

/// In-memory store keeping each party together with everything it owns.
#[derive(Clone, Default)]
pub struct MemoryPartyStore {
    inner: Arc<RwLock<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    parties: HashMap<Uuid, PartyRecord>,
    codes: HashMap<String, Uuid>,
    participant_index: HashMap<Uuid, Uuid>,
    song_index: HashMap<Uuid, Uuid>,
}

/// A party and the children whose lifetime it bounds.
struct PartyRecord {
    party: PartyEntity,
    participants: IndexMap<Uuid, ParticipantEntity>,
    songs: IndexMap<Uuid, SongEntity>,
    positions: HashSet<u32>,
    votes: HashMap<(Uuid, Uuid), VoteEntity>,
}

impl MemoryPartyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryInner {
    fn record_mut(&mut self, party_id: Uuid) -> StorageResult<&mut PartyRecord> {
        self.parties
            .get_mut(&party_id)
            .ok_or_else(|| StorageError::integrity(format!("party `{party_id}` does not exist")))
    }
}

impl PartyStore for MemoryPartyStore {
    fn insert_party(
        &self,
        party: PartyEntity,
        host: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.write().await;
            if guard.codes.contains_key(&party.code) {
                return Err(StorageError::integrity(format!(
                    "party code `{}` already taken",
                    party.code
                )));
            }
            if host.party_id != party.id {
                return Err(StorageError::integrity(
                    "host participant belongs to another party",
                ));
            }

            guard.codes.insert(party.code.clone(), party.id);
            guard.participant_index.insert(host.id, party.id);
            let mut participants = IndexMap::new();
            participants.insert(host.id, host);
            guard.parties.insert(
                party.id,
                PartyRecord {
                    party,
                    participants,
                    songs: IndexMap::new(),
                    positions: HashSet::new(),
                    votes: HashMap::new(),
                },
            );
            Ok(())
        })
    }

    fn update_party(&self, party: PartyEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.write().await;
            let record = guard.record_mut(party.id)?;
            if record.party.code != party.code {
                return Err(StorageError::integrity("party code is immutable"));
            }
            record.party = party;
            Ok(())
        })
    }

    fn start_song(
        &self,
        party: PartyEntity,
        song: SongEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.write().await;
            if song.party_id != party.id {
                return Err(StorageError::integrity(format!(
                    "song `{}` belongs to another party",
                    song.id
                )));
            }
            let record = guard.record_mut(party.id)?;
            if record.party.code != party.code {
                return Err(StorageError::integrity("party code is immutable"));
            }
            let Some(existing) = record.songs.get_mut(&song.id) else {
                return Err(StorageError::integrity(format!(
                    "song `{}` does not exist",
                    song.id
                )));
            };
            if existing.queue_position != song.queue_position {
                return Err(StorageError::integrity("queue positions are never renumbered"));
            }

            *existing = song;
            record.party = party;
            Ok(())
        })
    }

    fn find_party(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PartyEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(inner
                .read()
                .await
                .parties
                .get(&id)
                .map(|record| record.party.clone()))
        })
    }

    fn find_party_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<PartyEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.read().await;
            Ok(guard
                .codes
                .get(&code)
                .and_then(|id| guard.parties.get(id))
                .map(|record| record.party.clone()))
        })
    }

    fn party_code_exists(&self, code: String) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.read().await.codes.contains_key(&code)) })
    }

    fn insert_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.write().await;
            let party_id = participant.party_id;
            let participant_id = participant.id;
            let record = guard.record_mut(party_id)?;
            if record.participants.contains_key(&participant_id) {
                return Err(StorageError::integrity(format!(
                    "participant `{participant_id}` already exists"
                )));
            }
            record.participants.insert(participant_id, participant);
            guard.participant_index.insert(participant_id, party_id);
            Ok(())
        })
    }

    fn find_participant(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.read().await;
            Ok(guard
                .participant_index
                .get(&id)
                .and_then(|party_id| guard.parties.get(party_id))
                .and_then(|record| record.participants.get(&id))
                .cloned())
        })
    }

    fn list_participants(
        &self,
        party_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.read().await;
            Ok(guard
                .parties
                .get(&party_id)
                .map(|record| record.participants.values().cloned().collect())
                .unwrap_or_default())
        })
    }

    fn insert_song(&self, song: SongEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.write().await;
            let party_id = song.party_id;
            let song_id = song.id;
            let record = guard.record_mut(party_id)?;
            if !record.positions.insert(song.queue_position) {
                return Err(StorageError::integrity(format!(
                    "queue position {} already used in party `{party_id}`",
                    song.queue_position
                )));
            }
            record.songs.insert(song_id, song);
            guard.song_index.insert(song_id, party_id);
            Ok(())
        })
    }

    fn find_song(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SongEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.read().await;
            Ok(guard
                .song_index
                .get(&id)
                .and_then(|party_id| guard.parties.get(party_id))
                .and_then(|record| record.songs.get(&id))
                .cloned())
        })
    }

    fn list_songs(&self, party_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<SongEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.read().await;
            let mut songs: Vec<SongEntity> = guard
                .parties
                .get(&party_id)
                .map(|record| record.songs.values().cloned().collect())
                .unwrap_or_default();
            songs.sort_by_key(|song| song.queue_position);
            Ok(songs)
        })
    }

    fn upsert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<VoteEntity>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.write().await;
            let record = guard.record_mut(vote.party_id)?;
            if !record.songs.contains_key(&vote.song_id) {
                return Err(StorageError::integrity(format!(
                    "song `{}` does not belong to party `{}`",
                    vote.song_id, vote.party_id
                )));
            }
            record
                .votes
                .insert((vote.song_id, vote.participant_id), vote.clone());
            Ok(vote)
        })
    }

    fn list_votes(&self, party_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.read().await;
            Ok(guard
                .parties
                .get(&party_id)
                .map(|record| record.votes.values().cloned().collect())
                .unwrap_or_default())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::dao::models::PartyStatusEntity;

    fn party(code: &str) -> (PartyEntity, ParticipantEntity) {
        let now = SystemTime::now();
        let party = PartyEntity {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: "Friday".into(),
            status: PartyStatusEntity::Waiting,
            max_songs: None,
            songs_per_person: None,
            max_participants: None,
            current_song_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        let host = ParticipantEntity {
            id: Uuid::new_v4(),
            party_id: party.id,
            display_name: "Host".into(),
            is_host: true,
            is_spectator: false,
            joined_at: now,
        };
        (party, host)
    }

    fn song(party_id: Uuid, added_by_id: Uuid, queue_position: u32) -> SongEntity {
        SongEntity {
            id: Uuid::new_v4(),
            party_id,
            catalog_id: format!("track-{queue_position}"),
            title: "Title".into(),
            artist: "Artist".into(),
            artwork_url: String::new(),
            preview_url: None,
            duration_ms: 180_000,
            added_by_id,
            queue_position,
            played_at: None,
            created_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_codes_are_rejected() {
        let store = MemoryPartyStore::new();
        let (first, first_host) = party("ABC123");
        let (second, second_host) = party("ABC123");

        store.insert_party(first, first_host).await.unwrap();
        assert!(store.party_code_exists("ABC123".into()).await.unwrap());
        assert!(store.insert_party(second, second_host).await.is_err());
    }

    #[tokio::test]
    async fn songs_are_listed_by_queue_position_and_positions_are_unique() {
        let store = MemoryPartyStore::new();
        let (party, host) = party("QUEUE1");
        let (party_id, host_id) = (party.id, host.id);
        store.insert_party(party, host).await.unwrap();

        store.insert_song(song(party_id, host_id, 1)).await.unwrap();
        store.insert_song(song(party_id, host_id, 0)).await.unwrap();
        assert!(store.insert_song(song(party_id, host_id, 1)).await.is_err());

        let positions: Vec<u32> = store
            .list_songs(party_id)
            .await
            .unwrap()
            .into_iter()
            .map(|song| song.queue_position)
            .collect();
        assert_eq!(positions, vec![0, 1]);
    }

    #[tokio::test]
    async fn rejected_song_start_leaves_the_party_untouched() {
        let store = MemoryPartyStore::new();
        let (party, host) = party("START1");
        let (party_id, host_id) = (party.id, host.id);
        store.insert_party(party.clone(), host).await.unwrap();

        let mut active = party.clone();
        active.status = PartyStatusEntity::Active;
        active.version = 1;
        let missing = song(party_id, host_id, 0);
        active.current_song_id = Some(missing.id);

        assert!(store.start_song(active, missing).await.is_err());
        assert_eq!(store.find_party(party_id).await.unwrap(), Some(party));
    }

    #[tokio::test]
    async fn song_start_writes_party_and_song_together() {
        let store = MemoryPartyStore::new();
        let (party, host) = party("START2");
        let (party_id, host_id) = (party.id, host.id);
        store.insert_party(party.clone(), host).await.unwrap();
        let mut queued = song(party_id, host_id, 0);
        store.insert_song(queued.clone()).await.unwrap();

        let mut active = party;
        active.status = PartyStatusEntity::Active;
        active.current_song_id = Some(queued.id);
        active.version = 1;
        queued.played_at = Some(SystemTime::now());
        store.start_song(active.clone(), queued.clone()).await.unwrap();

        assert_eq!(store.find_party(party_id).await.unwrap(), Some(active));
        assert_eq!(store.find_song(queued.id).await.unwrap(), Some(queued));
    }

    #[tokio::test]
    async fn votes_are_upserted_per_song_and_participant() {
        let store = MemoryPartyStore::new();
        let (party, host) = party("VOTES1");
        let (party_id, host_id) = (party.id, host.id);
        store.insert_party(party, host).await.unwrap();
        let queued = song(party_id, host_id, 0);
        let song_id = queued.id;
        store.insert_song(queued).await.unwrap();

        for value in [1, -1] {
            store
                .upsert_vote(VoteEntity {
                    party_id,
                    song_id,
                    participant_id: host_id,
                    value,
                    updated_at: SystemTime::now(),
                })
                .await
                .unwrap();
        }

        let votes = store.list_votes(party_id).await.unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].value, -1);
    }
}
