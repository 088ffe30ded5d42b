use crate::creature::OwnerId;
use crate::errors::{CollectorError, CollectorResult, NotFoundError, PreconditionError};
use serde::{Deserialize, Serialize};

pub const TEAM_SIZE: usize = 6;

/// Six slots (1-6) holding ids from the owner's collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub owner_id: OwnerId,
    pub slots: [Option<u32>; TEAM_SIZE],
}

impl Team {
    pub fn new(owner: &str) -> Self {
        Team {
            owner_id: owner.to_string(),
            slots: [None; TEAM_SIZE],
        }
    }

    /// Put creature `creature_id` into `slot`. `collection_len` is the size of
    /// the owner's collection, so any id in `1..=collection_len` exists.
    pub fn add(&mut self, slot: u8, creature_id: u32, collection_len: usize) -> CollectorResult<()> {
        let index = slot_index(slot)?;
        if self.slots[index].is_some() {
            return Err(PreconditionError::SlotOccupied(slot).into());
        }
        if self.contains(creature_id) {
            return Err(PreconditionError::AlreadyOnTeam(creature_id).into());
        }
        if creature_id == 0 || creature_id as usize > collection_len {
            return Err(NotFoundError::Creature {
                owner: self.owner_id.clone(),
                id: creature_id,
            }
            .into());
        }
        self.slots[index] = Some(creature_id);
        Ok(())
    }

    /// Empty `slot`, returning the id it held.
    pub fn remove(&mut self, slot: u8) -> CollectorResult<u32> {
        let index = slot_index(slot)?;
        self.slots[index]
            .take()
            .ok_or_else(|| PreconditionError::SlotEmpty(slot).into())
    }

    pub fn contains(&self, creature_id: u32) -> bool {
        self.slots.contains(&Some(creature_id))
    }

    /// (slot, creature id) for each filled slot
    pub fn members(&self) -> impl Iterator<Item = (u8, u32)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.map(|id| (i as u8 + 1, id)))
    }

    /// Follow the ledger after it removed `removed_id`: the slot holding it
    /// is emptied and higher ids shift down by one.
    pub fn reconcile_removal(&mut self, removed_id: u32) {
        for slot in self.slots.iter_mut() {
            match *slot {
                Some(id) if id == removed_id => *slot = None,
                Some(id) if id > removed_id => *slot = Some(id - 1),
                _ => {}
            }
        }
    }

    /// Apply several removals made in one ledger call. Ids are the
    /// numbering before the call.
    pub fn reconcile_removals(&mut self, removed_ids: &[u32]) {
        let mut ids = removed_ids.to_vec();
        ids.sort_unstable_by(|a, b| b.cmp(a));
        ids.dedup();
        for id in ids {
            self.reconcile_removal(id);
        }
    }
}

fn slot_index(slot: u8) -> CollectorResult<usize> {
    if (1..=TEAM_SIZE as u8).contains(&slot) {
        Ok(slot as usize - 1)
    } else {
        Err(CollectorError::invalid(format!(
            "team slot {} outside 1..={}",
            slot, TEAM_SIZE
        )))
    }
}
