//! Queue and roster admission rules for a single party.

use std::time::SystemTime;

use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::{ParticipantEntity, PartyEntity, SongEntity};

/// Reasons a song cannot be appended to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueRejection {
    #[error("the queue has reached its {max} song limit")]
    QueueFull { max: u32 },
    #[error("participant has already added {max} songs")]
    PerPersonLimitReached { max: u32 },
}

/// How a joiner is admitted to the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Full participant keeping the requested display name.
    Regular,
    /// Capacity reached; admitted with the spectator placeholder name.
    Spectator,
}

/// A validated vote value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteValue {
    Up,
    Down,
}

impl VoteValue {
    pub fn as_i8(self) -> i8 {
        match self {
            VoteValue::Up => 1,
            VoteValue::Down => -1,
        }
    }
}

impl TryFrom<i64> for VoteValue {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(VoteValue::Up),
            -1 => Ok(VoteValue::Down),
            other => Err(other),
        }
    }
}

/// Capacity settings of a party.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueuePolicy {
    pub max_songs: Option<u32>,
    pub songs_per_person: Option<u32>,
    pub max_participants: Option<u32>,
}

impl From<&PartyEntity> for QueuePolicy {
    fn from(party: &PartyEntity) -> Self {
        Self {
            max_songs: party.max_songs,
            songs_per_person: party.songs_per_person,
            max_participants: party.max_participants,
        }
    }
}

impl QueuePolicy {
    /// Check the caps for a new song added by `participant_id` and return its queue position.
    ///
    /// Positions are append-only: the new song gets the current song count.
    pub fn admit_song(
        &self,
        songs: &[SongEntity],
        participant_id: Uuid,
    ) -> Result<u32, QueueRejection> {
        let count = songs.len() as u32;
        if let Some(max) = self.max_songs.filter(|max| count >= *max) {
            return Err(QueueRejection::QueueFull { max });
        }

        if let Some(max) = self.songs_per_person {
            let added = songs
                .iter()
                .filter(|song| song.added_by_id == participant_id)
                .count() as u32;
            if added >= max {
                return Err(QueueRejection::PerPersonLimitReached { max });
            }
        }

        Ok(count)
    }

    /// Decide whether the next joiner is a regular participant or a spectator.
    pub fn admit_participant(&self, participants: &[ParticipantEntity]) -> Admission {
        let Some(max) = self.max_participants else {
            return Admission::Regular;
        };
        let regulars = participants.iter().filter(|p| !p.is_spectator).count() as u32;
        if regulars >= max {
            Admission::Spectator
        } else {
            Admission::Regular
        }
    }
}

/// First song by queue position that has not been played yet.
pub fn next_unplayed(songs: &[SongEntity]) -> Option<&SongEntity> {
    songs
        .iter()
        .filter(|song| song.played_at.is_none())
        .min_by_key(|song| song.queue_position)
}

/// Stamp a song as started. An already stamped song keeps its original timestamp.
pub fn mark_played(song: &mut SongEntity, at: SystemTime) -> SystemTime {
    *song.played_at.get_or_insert(at)
}
