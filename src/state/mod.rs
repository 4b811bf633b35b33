pub mod membership;
pub mod queue;
pub mod rooms;
pub mod scoring;
pub mod state_machine;
pub mod transitions;

use std::{sync::Arc, time::SystemTime};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, watch};

use crate::{
    config::AppConfig,
    dao::{catalog::TrackCatalog, models::PartyEntity, party_store::PartyStore},
    error::ServiceError,
};

pub use self::membership::{Membership, MembershipRegistry};
pub use self::rooms::RoomHub;
pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId};
use self::state_machine::PartyStateMachine;

pub type SharedState = Arc<AppState>;

/// Per-party critical section. Holding the lock serializes every mutation of that party.
#[derive(Debug, Default)]
pub struct PartySlot {
    machine: Option<PartyStateMachine>,
}

impl PartySlot {
    /// Lifecycle machine of the party, rebuilt whenever the persisted version moved.
    pub fn machine(
        &mut self,
        party: &PartyEntity,
        started_at: Option<SystemTime>,
    ) -> &mut PartyStateMachine {
        let stale = self
            .machine
            .as_ref()
            .is_none_or(|machine| machine.version() != party.version);
        if stale {
            self.machine = Some(PartyStateMachine::restore(party, started_at));
        }
        self.machine
            .get_or_insert_with(|| PartyStateMachine::restore(party, started_at))
    }
}

/// Central application state storing live connections, party gates and the store handle.
pub struct AppState {
    party_store: RwLock<Option<Arc<dyn PartyStore>>>,
    catalog: Option<Arc<dyn TrackCatalog>>,
    config: Arc<AppConfig>,
    parties: DashMap<String, Arc<Mutex<PartySlot>>>,
    membership: MembershipRegistry,
    rooms: RoomHub,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, catalog: Option<Arc<dyn TrackCatalog>>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let rooms = RoomHub::new(config.room_capacity());
        Arc::new(Self {
            party_store: RwLock::new(None),
            catalog,
            config: Arc::new(config),
            parties: DashMap::new(),
            membership: MembershipRegistry::new(),
            rooms,
            degraded: degraded_tx,
        })
    }

    /// Obtain a handle to the current party store, if one is installed.
    pub async fn party_store(&self) -> Option<Arc<dyn PartyStore>> {
        let guard = self.party_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current party store, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_party_store(&self) -> Result<Arc<dyn PartyStore>, ServiceError> {
        self.party_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new party store implementation and leave degraded mode.
    pub async fn install_party_store(&self, store: Arc<dyn PartyStore>) {
        {
            let mut guard = self.party_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current party store and enter degraded mode.
    pub async fn clear_party_store(&self) {
        {
            let mut guard = self.party_store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    pub fn catalog(&self) -> Option<Arc<dyn TrackCatalog>> {
        self.catalog.clone()
    }

    /// Registry of identified push-channel connections.
    pub fn membership(&self) -> &MembershipRegistry {
        &self.membership
    }

    /// Per-party broadcast channels.
    pub fn rooms(&self) -> &RoomHub {
        &self.rooms
    }

    /// Acquire the gate of a party, creating it on first use.
    pub async fn lock_party(&self, party_code: &str) -> OwnedMutexGuard<PartySlot> {
        let slot = self
            .parties
            .entry(party_code.to_string())
            .or_default()
            .clone();
        slot.lock_owned().await
    }

    /// Forget a gate nobody holds or waits on. The next operation recreates it from persisted state.
    pub fn discard_party_gate(&self, party_code: &str) {
        self.parties
            .remove_if(party_code, |_, slot| Arc::strong_count(slot) == 1);
    }

    /// Forget the gate of an ended party, even while held.
    ///
    /// Ended is terminal, so current holders and waiters only find a party they can no longer change.
    pub fn retire_party_gate(&self, party_code: &str) {
        self.parties.remove(party_code);
    }

    /// Number of parties with a live gate.
    pub fn party_gate_count(&self) -> usize {
        self.parties.len()
    }
}
