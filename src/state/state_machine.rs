use std::time::SystemTime;

use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::{PartyEntity, PartyStatusEntity};

/// Lifecycle phases of a party. Phases only move forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartyPhase {
    /// Accepting joins and songs; nothing has played yet.
    Waiting,
    /// A song is playing.
    Active {
        /// The one song currently playing.
        current_song_id: Uuid,
        /// When that song was stamped as played.
        started_at: SystemTime,
    },
    /// Terminal; reads stay available.
    Ended,
}

impl PartyPhase {
    /// Persisted status matching this phase.
    pub fn status(&self) -> PartyStatusEntity {
        match self {
            PartyPhase::Waiting => PartyStatusEntity::Waiting,
            PartyPhase::Active { .. } => PartyStatusEntity::Active,
            PartyPhase::Ended => PartyStatusEntity::Ended,
        }
    }

    /// Song currently playing, if any.
    pub fn current_song_id(&self) -> Option<Uuid> {
        match self {
            PartyPhase::Active {
                current_song_id, ..
            } => Some(*current_song_id),
            _ => None,
        }
    }

    pub fn is_ended(&self) -> bool {
        matches!(self, PartyPhase::Ended)
    }
}

/// Indicates why a party ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// `advance` found no unplayed song left.
    QueueExhausted,
    /// The host ended the party.
    HostEnded,
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartyEvent {
    /// A song was picked by `advance` and starts playing.
    SongStarted {
        song_id: Uuid,
        started_at: SystemTime,
    },
    /// The party is over.
    Finish(FinishReason),
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: PartyPhase,
    /// The event that cannot be applied from this phase.
    pub event: PartyEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch { expected: PlanId, got: PlanId },
    /// State machine phase changed since the plan was created.
    PhaseMismatch {
        expected: PartyPhase,
        actual: PartyPhase,
    },
    /// State machine version changed since the plan was created.
    VersionMismatch { expected: u64, actual: u64 },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch { expected: PlanId, got: PlanId },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A planned state machine transition that has been validated but not yet applied.
#[derive(Debug, Clone)]
pub struct Plan {
    pub id: PlanId,
    pub from: PartyPhase,
    pub to: PartyPhase,
    pub event: PartyEvent,
    /// Version number after applying this transition; persisted with the party.
    pub version_next: u64,
}

/// Per-party lifecycle machine: `Waiting -> Active -> Ended`.
#[derive(Debug, Clone)]
pub struct PartyStateMachine {
    phase: PartyPhase,
    version: u64,
    pending: Option<Plan>,
}

impl Default for PartyStateMachine {
    fn default() -> Self {
        Self {
            phase: PartyPhase::Waiting,
            version: 0,
            pending: None,
        }
    }
}

impl PartyStateMachine {
    /// Create a new state machine for a freshly created party.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the machine from a persisted party.
    ///
    /// `started_at` is the `played_at` of the current song; an active party
    /// whose current song cannot be resolved falls back to `Waiting`.
    pub fn restore(party: &PartyEntity, started_at: Option<SystemTime>) -> Self {
        let phase = match (party.status, party.current_song_id, started_at) {
            (PartyStatusEntity::Ended, _, _) => PartyPhase::Ended,
            (PartyStatusEntity::Active, Some(current_song_id), Some(started_at)) => {
                PartyPhase::Active {
                    current_song_id,
                    started_at,
                }
            }
            _ => PartyPhase::Waiting,
        };

        Self {
            phase,
            version: party.version,
            pending: None,
        }
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> PartyPhase {
        self.phase.clone()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Plan a transition by validating that the event can be applied from the current phase.
    /// Returns a Plan that can later be applied or aborted.
    pub fn plan(&mut self, event: PartyEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event.clone())
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase.clone(),
            to: next,
            event,
            version_next: self.version + 1,
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition, moving the state machine to the next phase.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<PartyPhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase.clone(),
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.phase = plan.to;
        self.version = plan.version_next;

        Ok(self.phase.clone())
    }

    /// Abort a planned transition without applying it.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    fn compute_transition(&self, event: PartyEvent) -> Result<PartyPhase, InvalidTransition> {
        let next = match (&self.phase, event) {
            (
                PartyPhase::Waiting | PartyPhase::Active { .. },
                PartyEvent::SongStarted {
                    song_id,
                    started_at,
                },
            ) => PartyPhase::Active {
                current_song_id: song_id,
                started_at,
            },
            (PartyPhase::Waiting | PartyPhase::Active { .. }, PartyEvent::Finish(_)) => {
                PartyPhase::Ended
            }
            (from, event) => {
                return Err(InvalidTransition {
                    from: from.clone(),
                    event,
                });
            }
        };

        Ok(next)
    }
}
