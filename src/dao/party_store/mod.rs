pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{ParticipantEntity, PartyEntity, SongEntity, VoteEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

pub use memory::MemoryPartyStore;

/// Abstraction over the persistence layer for parties and their children.
///
/// Every call is a single CRUD-style operation; atomicity across calls is the
/// caller's concern (the service layer serializes per party).
pub trait PartyStore: Send + Sync {
    fn insert_party(
        &self,
        party: PartyEntity,
        host: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn update_party(&self, party: PartyEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Write the party and its newly started song as one unit: either both land or neither does.
    fn start_song(
        &self,
        party: PartyEntity,
        song: SongEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn find_party(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PartyEntity>>>;
    fn find_party_by_code(&self, code: String)
    -> BoxFuture<'static, StorageResult<Option<PartyEntity>>>;
    fn party_code_exists(&self, code: String) -> BoxFuture<'static, StorageResult<bool>>;

    fn insert_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn find_participant(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>>;
    fn list_participants(
        &self,
        party_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>>;

    fn insert_song(&self, song: SongEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_song(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SongEntity>>>;
    /// Songs of a party ordered by ascending queue position.
    fn list_songs(&self, party_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<SongEntity>>>;

    /// Create or overwrite the vote keyed by (song, participant).
    fn upsert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<VoteEntity>>;
    fn list_votes(&self, party_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>>;

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
