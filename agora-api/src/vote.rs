use std::{collections::HashSet, fmt, str::FromStr};

use uuid::Uuid;

use crate::{Error, UserId};

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum VoteDirection {
    Up,
    Down,
}

impl FromStr for VoteDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<VoteDirection, Error> {
        match s {
            "up" => Ok(VoteDirection::Up),
            "down" => Ok(VoteDirection::Down),
            _ => Err(Error::InvalidVoteDirection(String::from(s))),
        }
    }
}

impl fmt::Display for VoteDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteDirection::Up => write!(f, "up"),
            VoteDirection::Down => write!(f, "down"),
        }
    }
}

/// Post-operation counts echoed back to the caller of a vote operation
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Tally {
    pub up_count: usize,
    pub down_count: usize,
}

impl Tally {
    pub fn score(&self) -> i64 {
        self.up_count as i64 - self.down_count as i64
    }
}

/// The two voter sets of a votable entity.
///
/// A user appears in at most one of the two sets; `apply` is the only
/// mutation path and maintains that invariant.
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct VoteSets {
    pub up_voters: HashSet<UserId>,
    pub down_voters: HashSet<UserId>,
}

impl VoteSets {
    pub fn new() -> VoteSets {
        VoteSets::default()
    }

    /// Records `voter`'s vote in `direction`.
    ///
    /// Casting the direction the voter already holds retracts the vote;
    /// anything else clears any opposite vote and records the new one.
    pub fn apply(&mut self, voter: UserId, direction: VoteDirection) -> Tally {
        let (chosen, other) = match direction {
            VoteDirection::Up => (&mut self.up_voters, &mut self.down_voters),
            VoteDirection::Down => (&mut self.down_voters, &mut self.up_voters),
        };
        if !chosen.remove(&voter) {
            other.remove(&voter);
            chosen.insert(voter);
        }
        debug_assert!(self.is_disjoint());
        self.tally()
    }

    pub fn tally(&self) -> Tally {
        Tally {
            up_count: self.up_voters.len(),
            down_count: self.down_voters.len(),
        }
    }

    pub fn score(&self) -> i64 {
        self.tally().score()
    }

    pub fn is_disjoint(&self) -> bool {
        self.up_voters.is_disjoint(&self.down_voters)
    }
}

/// Seam between vote accounting and the entities that carry vote sets
pub trait Votable {
    fn vote_key(&self) -> Uuid;
    fn vote_sets(&self) -> &VoteSets;
    fn is_tombstoned(&self) -> bool {
        false
    }
}
