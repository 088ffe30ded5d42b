//! Per-owner creature collections.
//!
//! Every mutating operation leaves each owner's ids as exactly `1..=n` in
//! list order, and at most one creature per owner carries `selected`.

use crate::creature::{Creature, OwnerId};
use crate::errors::{CollectorError, CollectorResult, NotFoundError, PreconditionError};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct CollectionLedger {
    collections: HashMap<OwnerId, Vec<Creature>>,
}

impl CollectionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `owner` has a collection, empty if it is new.
    pub fn open(&mut self, owner: &str) {
        self.collections.entry(owner.to_string()).or_default();
    }

    /// Install a collection read back from storage. Stored ids must already
    /// be contiguous and at most one creature may be selected.
    pub fn install(&mut self, owner: &str, creatures: Vec<Creature>) -> CollectorResult<()> {
        for (index, creature) in creatures.iter().enumerate() {
            if creature.id as usize != index + 1 {
                return Err(CollectorError::integrity(format!(
                    "collection of {} has id {} at position {}",
                    owner,
                    creature.id,
                    index + 1
                )));
            }
        }
        if creatures.iter().filter(|c| c.selected).count() > 1 {
            return Err(CollectorError::integrity(format!(
                "collection of {} has more than one selected creature",
                owner
            )));
        }
        self.collections.insert(owner.to_string(), creatures);
        Ok(())
    }

    pub fn contains_owner(&self, owner: &str) -> bool {
        self.collections.contains_key(owner)
    }

    pub fn owners(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// The owner's creatures in id order; empty for unknown owners.
    pub fn list(&self, owner: &str) -> &[Creature] {
        self.collections.get(owner).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self, owner: &str) -> usize {
        self.list(owner).len()
    }

    pub fn get(&self, owner: &str, id: u32) -> CollectorResult<&Creature> {
        id.checked_sub(1)
            .and_then(|index| self.list(owner).get(index as usize))
            .ok_or_else(|| missing(owner, id))
    }

    pub fn get_mut(&mut self, owner: &str, id: u32) -> CollectorResult<&mut Creature> {
        id.checked_sub(1)
            .and_then(|index| {
                self.collections
                    .get_mut(owner)
                    .and_then(|list| list.get_mut(index as usize))
            })
            .ok_or_else(|| missing(owner, id))
    }

    /// Add a creature at the end of the owner's list and return its new id.
    /// The creature arrives unselected and owned by `owner`.
    pub fn append(&mut self, owner: &str, mut creature: Creature) -> u32 {
        let list = self.collections.entry(owner.to_string()).or_default();
        creature.id = list.len() as u32 + 1;
        creature.owner_id = owner.to_string();
        creature.selected = false;
        let id = creature.id;
        list.push(creature);
        debug!(owner = %owner, creature_id = id, "creature appended");
        id
    }

    /// Remove one creature and renumber the rest.
    pub fn remove(&mut self, owner: &str, id: u32) -> CollectorResult<Creature> {
        self.get(owner, id)?;
        let list = self
            .collections
            .get_mut(owner)
            .ok_or_else(|| missing(owner, id))?;
        let creature = list.remove(id as usize - 1);
        renumber(list);
        debug!(owner = %owner, creature_id = id, remaining = list.len(), "creature removed");
        Ok(creature)
    }

    /// Remove several creatures at once. Ids refer to the numbering before
    /// the call. Either every id is valid and all are removed, or nothing
    /// changes. The removed creatures come back in ascending id order.
    pub fn remove_many(&mut self, owner: &str, ids: &[u32]) -> CollectorResult<Vec<Creature>> {
        let wanted = self.validate_ids(owner, ids)?;

        let list = self.collections.entry(owner.to_string()).or_default();
        let (removed, kept): (Vec<Creature>, Vec<Creature>) =
            list.drain(..).partition(|c| wanted.contains(&c.id));
        *list = kept;
        renumber(list);
        debug!(owner = %owner, count = removed.len(), "creatures removed");
        Ok(removed)
    }

    /// Move a creature to another owner. It gets a fresh id at the end of
    /// the recipient's list; the original trainer is kept.
    pub fn transfer(&mut self, from: &str, to: &str, id: u32) -> CollectorResult<u32> {
        if from == to {
            return Err(PreconditionError::SelfTarget.into());
        }
        let creature = self.remove(from, id)?;
        let new_id = self.append(to, creature);
        debug!(from = %from, to = %to, old_id = id, new_id, "creature transferred");
        Ok(new_id)
    }

    /// Transfer several creatures, all or nothing. Returns the recipient ids.
    pub fn transfer_many(&mut self, from: &str, to: &str, ids: &[u32]) -> CollectorResult<Vec<u32>> {
        if from == to {
            return Err(PreconditionError::SelfTarget.into());
        }
        let moved = self.remove_many(from, ids)?;
        Ok(moved
            .into_iter()
            .map(|creature| self.append(to, creature))
            .collect())
    }

    /// Make `id` the owner's only selected creature.
    pub fn select(&mut self, owner: &str, id: u32) -> CollectorResult<()> {
        self.get(owner, id)?;
        if let Some(list) = self.collections.get_mut(owner) {
            for creature in list.iter_mut() {
                creature.selected = creature.id == id;
            }
        }
        debug!(owner = %owner, creature_id = id, "creature selected");
        Ok(())
    }

    pub fn selected(&self, owner: &str) -> Option<&Creature> {
        self.list(owner).iter().find(|c| c.selected)
    }

    pub fn selected_mut(&mut self, owner: &str) -> Option<&mut Creature> {
        self.collections
            .get_mut(owner)
            .and_then(|list| list.iter_mut().find(|c| c.selected))
    }

    /// The selected creature, or `NotFound(SelectedCreature)`.
    pub fn require_selected(&self, owner: &str) -> CollectorResult<&Creature> {
        self.selected(owner)
            .ok_or_else(|| NotFoundError::SelectedCreature(owner.to_string()).into())
    }

    pub fn require_selected_mut(&mut self, owner: &str) -> CollectorResult<&mut Creature> {
        self.selected_mut(owner)
            .ok_or_else(|| NotFoundError::SelectedCreature(owner.to_string()).into())
    }

    /// Drop an owner's whole collection.
    pub fn forget(&mut self, owner: &str) -> Vec<Creature> {
        self.collections.remove(owner).unwrap_or_default()
    }

    fn validate_ids(&self, owner: &str, ids: &[u32]) -> CollectorResult<BTreeSet<u32>> {
        if ids.is_empty() {
            return Err(CollectorError::invalid("no creature ids given"));
        }
        let mut wanted = BTreeSet::new();
        for &id in ids {
            self.get(owner, id)?;
            if !wanted.insert(id) {
                return Err(CollectorError::invalid(format!("creature #{} listed twice", id)));
            }
        }
        Ok(wanted)
    }
}

fn renumber(list: &mut [Creature]) {
    for (index, creature) in list.iter_mut().enumerate() {
        creature.id = index as u32 + 1;
    }
}

fn missing(owner: &str, id: u32) -> CollectorError {
    NotFoundError::Creature {
        owner: owner.to_string(),
        id,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creature::test_support::sample_creature;
    use crate::species::SpeciesCatalog;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn ledger_with(owner: &str, species: &[&str]) -> CollectionLedger {
        let catalog = SpeciesCatalog::builtin().unwrap();
        let mut ledger = CollectionLedger::new();
        for name in species {
            ledger.append(owner, sample_creature(&catalog, name, owner));
        }
        ledger
    }

    fn species_of(ledger: &CollectionLedger, owner: &str) -> Vec<String> {
        ledger.list(owner).iter().map(|c| c.species.clone()).collect()
    }

    fn ids_of(ledger: &CollectionLedger, owner: &str) -> Vec<u32> {
        ledger.list(owner).iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_append_assigns_next_id() {
        let ledger = ledger_with("ash", &["Pikachu", "Pidgey", "Caterpie"]);
        assert_eq!(ids_of(&ledger, "ash"), vec![1, 2, 3]);
        assert_eq!(ledger.get("ash", 2).unwrap().species, "Pidgey");
    }

    #[test]
    fn test_remove_renumbers_in_order() {
        let mut ledger = ledger_with("ash", &["Pikachu", "Pidgey", "Caterpie", "Onix"]);
        let removed = ledger.remove("ash", 2).unwrap();

        assert_eq!(removed.species, "Pidgey");
        assert_eq!(ids_of(&ledger, "ash"), vec![1, 2, 3]);
        assert_eq!(species_of(&ledger, "ash"), vec!["Pikachu", "Caterpie", "Onix"]);
    }

    #[test]
    fn test_remove_missing_id_fails() {
        let mut ledger = ledger_with("ash", &["Pikachu"]);
        assert_eq!(
            ledger.remove("ash", 0).unwrap_err(),
            NotFoundError::Creature {
                owner: "ash".to_string(),
                id: 0
            }
            .into()
        );
        assert!(ledger.remove("ash", 2).is_err());
        assert!(ledger.remove("brock", 1).is_err());
        assert_eq!(ledger.len("ash"), 1);
    }

    #[test]
    fn test_remove_many_is_all_or_nothing() {
        let mut ledger = ledger_with("ash", &["Pikachu", "Pidgey", "Caterpie", "Onix"]);

        assert!(ledger.remove_many("ash", &[1, 9]).is_err());
        assert!(ledger.remove_many("ash", &[3, 3]).is_err());
        assert_eq!(ledger.len("ash"), 4);

        let removed = ledger.remove_many("ash", &[4, 1]).unwrap();
        let removed: Vec<_> = removed.iter().map(|c| c.species.as_str()).collect();
        assert_eq!(removed, vec!["Pikachu", "Onix"]);
        assert_eq!(species_of(&ledger, "ash"), vec!["Pidgey", "Caterpie"]);
        assert_eq!(ids_of(&ledger, "ash"), vec![1, 2]);
    }

    #[test]
    fn test_transfer_keeps_original_trainer() {
        let mut ledger = ledger_with("ash", &["Pikachu", "Pidgey"]);
        ledger.append("gary", sample_creature(&SpeciesCatalog::builtin().unwrap(), "Eevee", "gary"));

        let new_id = ledger.transfer("ash", "gary", 1).unwrap();
        assert_eq!(new_id, 2);

        let moved = ledger.get("gary", 2).unwrap();
        assert_eq!(moved.species, "Pikachu");
        assert_eq!(moved.owner_id, "gary");
        assert_eq!(moved.original_trainer_id, "ash");
        assert_eq!(ids_of(&ledger, "ash"), vec![1]);
    }

    #[test]
    fn test_transfer_to_self_is_refused() {
        let mut ledger = ledger_with("ash", &["Pikachu"]);
        assert_eq!(
            ledger.transfer("ash", "ash", 1).unwrap_err(),
            PreconditionError::SelfTarget.into()
        );
    }

    #[test]
    fn test_transfer_clears_selection() {
        let mut ledger = ledger_with("ash", &["Pikachu", "Pidgey"]);
        ledger.select("ash", 1).unwrap();
        ledger.transfer("ash", "misty", 1).unwrap();

        assert!(ledger.selected("ash").is_none());
        assert!(ledger.selected("misty").is_none());
    }

    #[test]
    fn test_transfer_many_appends_in_order() {
        let mut ledger = ledger_with("ash", &["Pikachu", "Pidgey", "Onix"]);
        let ids = ledger.transfer_many("ash", "brock", &[3, 1]).unwrap();

        assert_eq!(ids, vec![1, 2]);
        assert_eq!(species_of(&ledger, "brock"), vec!["Pikachu", "Onix"]);
        assert_eq!(species_of(&ledger, "ash"), vec!["Pidgey"]);
    }

    #[test]
    fn test_select_is_exclusive() {
        let mut ledger = ledger_with("ash", &["Pikachu", "Pidgey", "Onix"]);
        ledger.select("ash", 1).unwrap();
        ledger.select("ash", 3).unwrap();

        let selected: Vec<u32> = ledger
            .list("ash")
            .iter()
            .filter(|c| c.selected)
            .map(|c| c.id)
            .collect();
        assert_eq!(selected, vec![3]);
        assert_eq!(ledger.require_selected("ash").unwrap().species, "Onix");
    }

    #[test]
    fn test_select_missing_leaves_selection_alone() {
        let mut ledger = ledger_with("ash", &["Pikachu"]);
        ledger.select("ash", 1).unwrap();
        assert!(ledger.select("ash", 5).is_err());
        assert_eq!(ledger.selected("ash").unwrap().id, 1);
    }

    #[test]
    fn test_require_selected_without_selection() {
        let ledger = ledger_with("ash", &["Pikachu"]);
        assert_eq!(
            ledger.require_selected("ash").unwrap_err(),
            NotFoundError::SelectedCreature("ash".to_string()).into()
        );
    }

    #[test]
    fn test_install_rejects_gaps() {
        let source = ledger_with("ash", &["Pikachu", "Pidgey"]);
        let mut broken = source.list("ash").to_vec();
        broken[1].id = 5;

        let mut ledger = CollectionLedger::new();
        assert!(matches!(
            ledger.install("ash", broken),
            Err(CollectorError::DataIntegrity(_))
        ));
        ledger.install("ash", source.list("ash").to_vec()).unwrap();
        assert_eq!(ledger.len("ash"), 2);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Append(usize),
        Remove(usize, u32),
        Transfer(usize, usize, u32),
        Select(usize, u32),
        RemoveMany(usize, Vec<u32>),
    }

    const OWNERS: [&str; 3] = ["ash", "misty", "brock"];

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..3usize).prop_map(Op::Append),
            (0..3usize, 0..8u32).prop_map(|(o, id)| Op::Remove(o, id)),
            (0..3usize, 0..3usize, 0..8u32).prop_map(|(a, b, id)| Op::Transfer(a, b, id)),
            (0..3usize, 0..8u32).prop_map(|(o, id)| Op::Select(o, id)),
            (0..3usize, prop::collection::vec(0..8u32, 1..4)).prop_map(|(o, ids)| Op::RemoveMany(o, ids)),
        ]
    }

    proptest! {
        #[test]
        fn prop_ids_stay_contiguous_and_selection_single(ops in prop::collection::vec(arb_op(), 1..60)) {
            let catalog = SpeciesCatalog::builtin().unwrap();
            let mut ledger = CollectionLedger::new();

            for op in ops {
                match op {
                    Op::Append(o) => {
                        ledger.append(OWNERS[o], sample_creature(&catalog, "Magikarp", OWNERS[o]));
                    }
                    Op::Remove(o, id) => {
                        let _ = ledger.remove(OWNERS[o], id);
                    }
                    Op::Transfer(a, b, id) => {
                        let _ = ledger.transfer(OWNERS[a], OWNERS[b], id);
                    }
                    Op::Select(o, id) => {
                        if ledger.select(OWNERS[o], id).is_ok() {
                            prop_assert_eq!(ledger.selected(OWNERS[o]).map(|c| c.id), Some(id));
                        }
                    }
                    Op::RemoveMany(o, ids) => {
                        let _ = ledger.remove_many(OWNERS[o], &ids);
                    }
                }

                for owner in OWNERS {
                    let ids: Vec<u32> = ledger.list(owner).iter().map(|c| c.id).collect();
                    let expected: Vec<u32> = (1..=ids.len() as u32).collect();
                    prop_assert_eq!(ids, expected);
                    prop_assert!(ledger.list(owner).iter().filter(|c| c.selected).count() <= 1);
                    prop_assert!(ledger.list(owner).iter().all(|c| c.owner_id == owner));
                }
            }
        }
    }
}
