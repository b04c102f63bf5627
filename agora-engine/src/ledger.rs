use std::{collections::HashMap, sync::Arc};

use parking_lot::{Mutex, RwLock};

use crate::api::{Error, Tally, UserId, Uuid, Votable, VoteDirection, VoteSets};

/// Live vote state, one entry per votable entity.
///
/// Each entry sits behind its own mutex, so two votes on the same entity
/// serialize into a clean read-modify-write while votes on different
/// entities proceed in parallel; the outer map lock is only held long
/// enough to look an entry up.
#[derive(Debug, Default)]
pub struct VoteLedger {
    entries: RwLock<HashMap<Uuid, Arc<Mutex<Entry>>>>,
}

#[derive(Debug)]
struct Entry {
    deleted: bool,
    votes: VoteSets,
}

impl VoteLedger {
    pub fn new() -> VoteLedger {
        VoteLedger::default()
    }

    /// Starts tracking an entity, seeding from its persisted vote sets.
    /// Already-tracked entities are left alone: live state wins over a
    /// re-read of a possibly stale record.
    pub fn track(&self, entity: &impl Votable) {
        self.entries
            .write()
            .entry(entity.vote_key())
            .or_insert_with(|| {
                Arc::new(Mutex::new(Entry {
                    deleted: entity.is_tombstoned(),
                    votes: entity.vote_sets().clone(),
                }))
            });
    }

    /// Drops an entity's entry entirely (hard deletion)
    pub fn forget(&self, entity: Uuid) {
        self.entries.write().remove(&entity);
    }

    /// Flags or unflags an entity as tombstoned; votes on flagged entities
    /// are rejected while the tallies stay readable
    pub fn set_deleted(&self, entity: Uuid, deleted: bool) -> Result<(), Error> {
        self.entry(entity)?.lock().deleted = deleted;
        Ok(())
    }

    /// Applies one vote and returns the post-operation tally.
    ///
    /// Casting the direction the voter already holds retracts it; the
    /// opposite direction switches sides. The whole step runs under the
    /// entity's lock, so concurrent voters never overwrite each other.
    pub fn apply_vote(
        &self,
        entity: Uuid,
        voter: UserId,
        direction: VoteDirection,
    ) -> Result<Tally, Error> {
        let entry = self.entry(entity)?;
        let mut entry = entry.lock();
        if entry.deleted {
            return Err(Error::VotingOnDeletedEntity(entity));
        }
        Ok(entry.votes.apply(voter, direction))
    }

    pub fn tally(&self, entity: Uuid) -> Result<Tally, Error> {
        Ok(self.entry(entity)?.lock().votes.tally())
    }

    /// Clones the current vote sets out, e.g. for persisting back onto the
    /// entity's record
    pub fn snapshot(&self, entity: Uuid) -> Result<VoteSets, Error> {
        Ok(self.entry(entity)?.lock().votes.clone())
    }

    fn entry(&self, entity: Uuid) -> Result<Arc<Mutex<Entry>>, Error> {
        self.entries
            .read()
            .get(&entity)
            .cloned()
            .ok_or(Error::EntityNotFound(entity))
    }
}
