use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{party_store::PartyStore, storage::StorageError},
    state::SharedState,
};

/// Timing knobs of the supervisor loop.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub health_poll_interval: Duration,
    /// Reconnect attempts on an installed store before connecting from scratch.
    pub max_reconnect_attempts: u32,
}

impl Default for SupervisorPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_secs(10),
            health_poll_interval: Duration::from_secs(5),
            max_reconnect_attempts: 3,
        }
    }
}

impl SupervisorPolicy {
    fn backoff(&self, delay: Duration) -> Duration {
        (delay * 2).min(self.max_delay)
    }
}

/// Reconnect to the storage backend and keep the shared state in degraded mode when it is unavailable.
pub async fn run<F, Fut>(state: SharedState, policy: SupervisorPolicy, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn PartyStore>, StorageError>> + Send,
{
    let mut delay = policy.initial_delay;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_party_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = policy.initial_delay;

                watch_health(&state, &policy, store.as_ref()).await;
                state.clear_party_store().await;
                warn!("exhausted storage reconnect attempts; connecting from scratch");
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
            }
        }

        sleep(delay).await;
        delay = policy.backoff(delay);
    }
}

/// Poll an installed store until it fails and cannot be revived in place.
async fn watch_health(state: &SharedState, policy: &SupervisorPolicy, store: &dyn PartyStore) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded().await {
                    info!("storage healthy again; leaving degraded mode");
                    state.update_degraded(false).await;
                }
            }
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                if !reconnect(state, policy, store).await {
                    return;
                }
                state.update_degraded(false).await;
            }
        }
        sleep(policy.health_poll_interval).await;
    }
}

async fn reconnect(state: &SharedState, policy: &SupervisorPolicy, store: &dyn PartyStore) -> bool {
    let mut delay = policy.initial_delay;

    for attempt in 0..policy.max_reconnect_attempts {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded after health check failure");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(
                        attempt, error = %err,
                        "storage reconnect first attempt failed; entering degraded mode"
                    );
                    state.update_degraded(true).await;
                } else {
                    warn!(attempt, error = %err, "storage reconnect attempt failed");
                }
                sleep(delay).await;
                delay = policy.backoff(delay);
            }
        }
    }

    false
}
