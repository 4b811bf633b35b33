//! Vote aggregation: per-song score with spectator dampening and final standings.

use std::{cmp::Ordering, collections::HashMap};

use uuid::Uuid;

use crate::dao::models::{ParticipantEntity, SongEntity, VoteEntity};

/// Voter class, decided once when the participant joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoterClass {
    Regular,
    Spectator,
}

/// A single counted vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ballot {
    pub class: VoterClass,
    /// Either `1` or `-1`.
    pub value: i8,
}

/// Aggregated result of the votes cast on one song.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    /// Regular sum plus the sign of the spectator sum.
    pub score: i64,
    /// Raw number of `+1` votes, spectators included.
    pub upvotes: u32,
    /// Raw number of `-1` votes, spectators included.
    pub downvotes: u32,
}

/// A song together with its final tally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub song: SongEntity,
    pub tally: Tally,
}

/// Aggregate a song's ballots.
///
/// Spectators collectively weigh at most one unit: their net sum only
/// contributes its sign. Display counts ignore the dampening.
pub fn tally<I>(ballots: I) -> Tally
where
    I: IntoIterator<Item = Ballot>,
{
    let mut regular: i64 = 0;
    let mut spectator: i64 = 0;
    let mut upvotes = 0;
    let mut downvotes = 0;

    for ballot in ballots {
        let value = i64::from(ballot.value.signum());
        match ballot.class {
            VoterClass::Regular => regular += value,
            VoterClass::Spectator => spectator += value,
        }
        match value.cmp(&0) {
            Ordering::Greater => upvotes += 1,
            Ordering::Less => downvotes += 1,
            Ordering::Equal => {}
        }
    }

    Tally {
        score: regular + spectator.signum(),
        upvotes,
        downvotes,
    }
}

/// Rank every song of a party: score descending, then queue position ascending.
///
/// Votes cast by ids missing from `participants` are ignored.
pub fn standings(
    songs: &[SongEntity],
    participants: &[ParticipantEntity],
    votes: &[VoteEntity],
) -> Vec<Standing> {
    let classes: HashMap<Uuid, VoterClass> = participants
        .iter()
        .map(|participant| {
            let class = if participant.is_spectator {
                VoterClass::Spectator
            } else {
                VoterClass::Regular
            };
            (participant.id, class)
        })
        .collect();

    let mut ballots: HashMap<Uuid, Vec<Ballot>> = HashMap::new();
    for vote in votes {
        let Some(class) = classes.get(&vote.participant_id) else {
            continue;
        };
        ballots.entry(vote.song_id).or_default().push(Ballot {
            class: *class,
            value: vote.value,
        });
    }

    let mut ranked: Vec<Standing> = songs
        .iter()
        .map(|song| Standing {
            song: song.clone(),
            tally: tally(ballots.remove(&song.id).unwrap_or_default()),
        })
        .collect();

    ranked.sort_by(compare);
    ranked
}

fn compare(a: &Standing, b: &Standing) -> Ordering {
    b.tally
        .score
        .cmp(&a.tally.score)
        .then_with(|| a.song.queue_position.cmp(&b.song.queue_position))
}
