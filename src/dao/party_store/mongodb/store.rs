use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Document, doc},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::open_database,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoParticipantDocument, MongoPartyDocument, MongoSongDocument, MongoVoteDocument,
        PARTICIPANT_COLLECTION_NAME, PARTY_COLLECTION_NAME, SONG_COLLECTION_NAME,
        VOTE_COLLECTION_NAME, doc_id, vote_key,
    },
};
use crate::dao::{
    models::{ParticipantEntity, PartyEntity, SongEntity, VoteEntity},
    party_store::PartyStore,
    storage::StorageResult,
};

#[derive(Clone)]
pub struct MongoPartyStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = open_database(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoPartyStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = open_database(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let indexes: [(&'static str, &'static str, Document, bool); 5] = [
            (PARTY_COLLECTION_NAME, "code", doc! {"code": 1}, true),
            (
                PARTICIPANT_COLLECTION_NAME,
                "party_id",
                doc! {"party_id": 1},
                false,
            ),
            (
                SONG_COLLECTION_NAME,
                "party_id,queue_position",
                doc! {"party_id": 1, "queue_position": 1},
                true,
            ),
            (
                VOTE_COLLECTION_NAME,
                "song_id,participant_id",
                doc! {"song_id": 1, "participant_id": 1},
                true,
            ),
            (VOTE_COLLECTION_NAME, "party_id", doc! {"party_id": 1}, false),
        ];

        for (collection, index, keys, unique) in indexes {
            let model = IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(Some(format!("{collection}_{}_idx", index.replace(',', "_"))))
                        .unique(Some(unique))
                        .build(),
                )
                .build();

            database
                .collection::<Document>(collection)
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn parties(&self) -> Collection<MongoPartyDocument> {
        self.database().await.collection(PARTY_COLLECTION_NAME)
    }

    async fn participants(&self) -> Collection<MongoParticipantDocument> {
        self.database().await.collection(PARTICIPANT_COLLECTION_NAME)
    }

    async fn songs(&self) -> Collection<MongoSongDocument> {
        self.database().await.collection(SONG_COLLECTION_NAME)
    }

    async fn votes(&self) -> Collection<MongoVoteDocument> {
        self.database().await.collection(VOTE_COLLECTION_NAME)
    }

    async fn insert_party(&self, party: PartyEntity, host: ParticipantEntity) -> MongoResult<()> {
        let party_id = party.id;
        self.parties()
            .await
            .insert_one(MongoPartyDocument::from(party))
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: PARTY_COLLECTION_NAME,
                id: party_id.to_string(),
                source,
            })?;

        self.insert_participant(host).await
    }

    async fn update_party(&self, party: PartyEntity) -> MongoResult<()> {
        let id = party.id;
        self.parties()
            .await
            .replace_one(doc_id(id), MongoPartyDocument::from(party))
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: PARTY_COLLECTION_NAME,
                id: id.to_string(),
                source,
            })?;
        Ok(())
    }

    async fn find_party(&self, id: Uuid) -> MongoResult<Option<PartyEntity>> {
        let document = self
            .parties()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: PARTY_COLLECTION_NAME,
                source,
            })?;

        document.map(TryInto::try_into).transpose()
    }

    async fn find_party_by_code(&self, code: String) -> MongoResult<Option<PartyEntity>> {
        let document = self
            .parties()
            .await
            .find_one(doc! {"code": code})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: PARTY_COLLECTION_NAME,
                source,
            })?;

        document.map(TryInto::try_into).transpose()
    }

    async fn party_code_exists(&self, code: String) -> MongoResult<bool> {
        let count = self
            .parties()
            .await
            .count_documents(doc! {"code": code})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: PARTY_COLLECTION_NAME,
                source,
            })?;
        Ok(count > 0)
    }

    async fn insert_participant(&self, participant: ParticipantEntity) -> MongoResult<()> {
        let id = participant.id;
        self.participants()
            .await
            .insert_one(MongoParticipantDocument::from(participant))
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: PARTICIPANT_COLLECTION_NAME,
                id: id.to_string(),
                source,
            })?;
        Ok(())
    }

    async fn find_participant(&self, id: Uuid) -> MongoResult<Option<ParticipantEntity>> {
        let document = self
            .participants()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: PARTICIPANT_COLLECTION_NAME,
                source,
            })?;

        document.map(TryInto::try_into).transpose()
    }

    async fn list_participants(&self, party_id: Uuid) -> MongoResult<Vec<ParticipantEntity>> {
        let documents: Vec<MongoParticipantDocument> = self
            .participants()
            .await
            .find(doc! {"party_id": party_id.to_string()})
            .sort(doc! {"joined_at": 1})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: PARTICIPANT_COLLECTION_NAME,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: PARTICIPANT_COLLECTION_NAME,
                source,
            })?;

        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn insert_song(&self, song: SongEntity) -> MongoResult<()> {
        let id = song.id;
        self.songs()
            .await
            .insert_one(MongoSongDocument::from(song))
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: SONG_COLLECTION_NAME,
                id: id.to_string(),
                source,
            })?;
        Ok(())
    }

    /// Replace the party and song documents inside one transaction.
    async fn start_song(&self, party: PartyEntity, song: SongEntity) -> MongoResult<()> {
        let client = {
            let guard = self.inner.state.read().await;
            guard.client.clone()
        };
        let (party_id, song_id) = (party.id, song.id);

        let mut session = client
            .start_session()
            .await
            .map_err(|source| MongoDaoError::Transaction { source })?;
        session
            .start_transaction()
            .await
            .map_err(|source| MongoDaoError::Transaction { source })?;

        self.parties()
            .await
            .replace_one(doc_id(party_id), MongoPartyDocument::from(party))
            .session(&mut session)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: PARTY_COLLECTION_NAME,
                id: party_id.to_string(),
                source,
            })?;
        self.songs()
            .await
            .replace_one(doc_id(song_id), MongoSongDocument::from(song))
            .session(&mut session)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: SONG_COLLECTION_NAME,
                id: song_id.to_string(),
                source,
            })?;

        // Dropping the session on an early return aborts the transaction.
        session
            .commit_transaction()
            .await
            .map_err(|source| MongoDaoError::Transaction { source })
    }

    async fn find_song(&self, id: Uuid) -> MongoResult<Option<SongEntity>> {
        let document = self
            .songs()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: SONG_COLLECTION_NAME,
                source,
            })?;

        document.map(TryInto::try_into).transpose()
    }

    async fn list_songs(&self, party_id: Uuid) -> MongoResult<Vec<SongEntity>> {
        let documents: Vec<MongoSongDocument> = self
            .songs()
            .await
            .find(doc! {"party_id": party_id.to_string()})
            .sort(doc! {"queue_position": 1})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: SONG_COLLECTION_NAME,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: SONG_COLLECTION_NAME,
                source,
            })?;

        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn upsert_vote(&self, vote: VoteEntity) -> MongoResult<VoteEntity> {
        let key = vote_key(vote.song_id, vote.participant_id);
        let id = format!("{}:{}", vote.song_id, vote.participant_id);
        self.votes()
            .await
            .replace_one(key, MongoVoteDocument::from(vote.clone()))
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: VOTE_COLLECTION_NAME,
                id,
                source,
            })?;
        Ok(vote)
    }

    async fn list_votes(&self, party_id: Uuid) -> MongoResult<Vec<VoteEntity>> {
        let documents: Vec<MongoVoteDocument> = self
            .votes()
            .await
            .find(doc! {"party_id": party_id.to_string()})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: VOTE_COLLECTION_NAME,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: VOTE_COLLECTION_NAME,
                source,
            })?;

        documents.into_iter().map(TryInto::try_into).collect()
    }
}

impl PartyStore for MongoPartyStore {
    fn insert_party(
        &self,
        party: PartyEntity,
        host: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_party(party, host).await.map_err(Into::into) })
    }

    fn update_party(&self, party: PartyEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.update_party(party).await.map_err(Into::into) })
    }

    fn start_song(
        &self,
        party: PartyEntity,
        song: SongEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.start_song(party, song).await.map_err(Into::into) })
    }

    fn find_party(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PartyEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_party(id).await.map_err(Into::into) })
    }

    fn find_party_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<PartyEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_party_by_code(code).await.map_err(Into::into) })
    }

    fn party_code_exists(&self, code: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.party_code_exists(code).await.map_err(Into::into) })
    }

    fn insert_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .insert_participant(participant)
                .await
                .map_err(Into::into)
        })
    }

    fn find_participant(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_participant(id).await.map_err(Into::into) })
    }

    fn list_participants(
        &self,
        party_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_participants(party_id).await.map_err(Into::into) })
    }

    fn insert_song(&self, song: SongEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_song(song).await.map_err(Into::into) })
    }

    fn find_song(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SongEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_song(id).await.map_err(Into::into) })
    }

    fn list_songs(&self, party_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<SongEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_songs(party_id).await.map_err(Into::into) })
    }

    fn upsert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<VoteEntity>> {
        let store = self.clone();
        Box::pin(async move { store.upsert_vote(vote).await.map_err(Into::into) })
    }

    fn list_votes(&self, party_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_votes(party_id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
