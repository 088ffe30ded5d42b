use crate::attributes::AttributeSet;
use crate::errors::{CollectorError, CollectorResult};
use crate::species::SpeciesDataProvider;
use crate::stats::{derive_stats, iv_percentage, validate_ivs, DerivedStats, Evs, Ivs};
use rand::seq::IndexedRandom;
use rand::Rng;
use schema::{Gender, Nature, SpeciesData};
use serde::{Deserialize, Serialize};

/// Opaque identifier of a user as handed over by the front-end
pub type OwnerId = String;

pub const MAX_LEVEL: u8 = 100;
pub const MAX_MOVES: usize = 4;
pub const DEFAULT_MOVE: &str = "Tackle";
/// Experience needed per level to reach the next one
const EXPERIENCE_PER_LEVEL: u32 = 7;

/// One owned creature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creature {
    /// Position in the owner's collection, 1-based and contiguous.
    /// Zero until the ledger assigns it.
    pub id: u32,
    pub species: String,
    pub nickname: Option<String>,
    pub level: u8,
    pub ivs: Ivs, // HP, ATK, DEF, SP.ATK, SP.DEF, SPD
    pub evs: Evs, // HP, ATK, DEF, SP.ATK, SP.DEF, SPD
    pub nature: Nature,
    pub ability: String,
    pub gender: Gender,
    pub current_hp: u16,
    pub selected: bool,
    pub owner_id: OwnerId,
    pub original_trainer_id: OwnerId,
    pub moves: Vec<String>,
    pub experience: u32,
    pub experience_cap: u32,
    pub held_item: Option<String>,
}

impl Creature {
    /// Build a freshly captured creature at full HP. The ledger assigns
    /// the id when the creature is appended to a collection.
    pub fn capture<P: SpeciesDataProvider + ?Sized>(
        provider: &P,
        species_name: &str,
        attributes: AttributeSet,
        level: u8,
        owner: &str,
        moves: Vec<String>,
    ) -> CollectorResult<Self> {
        if level == 0 || level > MAX_LEVEL {
            return Err(CollectorError::invalid(format!(
                "level {} outside 1..={}",
                level, MAX_LEVEL
            )));
        }
        validate_ivs(&attributes.ivs)?;

        let species = provider.get_species(species_name)?;
        let moves = if moves.is_empty() {
            vec![DEFAULT_MOVE.to_string()]
        } else {
            moves.into_iter().take(MAX_MOVES).collect()
        };

        let mut creature = Creature {
            id: 0,
            species: species.name.clone(),
            nickname: None,
            level,
            ivs: attributes.ivs,
            evs: attributes.evs,
            nature: attributes.nature,
            ability: attributes.ability,
            gender: attributes.gender,
            current_hp: 0,
            selected: false,
            owner_id: owner.to_string(),
            original_trainer_id: owner.to_string(),
            moves,
            experience: 0,
            experience_cap: level as u32 * EXPERIENCE_PER_LEVEL,
            held_item: None,
        };
        creature.current_hp = creature.max_hp(provider)?;
        Ok(creature)
    }

    /// Name shown to players: nickname if set, else species
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.species)
    }

    pub fn derived_stats<P: SpeciesDataProvider + ?Sized>(
        &self,
        provider: &P,
    ) -> CollectorResult<DerivedStats> {
        let base = provider.get_base_stats(&self.species)?;
        Ok(derive_stats(&base, &self.ivs, &self.evs, self.level, self.nature))
    }

    pub fn max_hp<P: SpeciesDataProvider + ?Sized>(&self, provider: &P) -> CollectorResult<u16> {
        Ok(self.derived_stats(provider)?.hp)
    }

    pub fn iv_percentage(&self) -> u8 {
        iv_percentage(&self.ivs)
    }

    pub fn is_fainted(&self) -> bool {
        self.current_hp == 0
    }

    /// Apply damage, flooring HP at zero. Returns true if the creature fainted.
    pub fn take_damage(&mut self, damage: u16) -> bool {
        self.current_hp = self.current_hp.saturating_sub(damage);
        self.is_fainted()
    }

    pub fn restore_hp<P: SpeciesDataProvider + ?Sized>(&mut self, provider: &P) -> CollectorResult<()> {
        self.current_hp = self.max_hp(provider)?;
        Ok(())
    }
}

/// Pick the moves a new capture knows: two distinct moves from the
/// species' list, the single move twice, or Tackle when the list is empty.
pub fn roll_capture_moves<R: Rng + ?Sized>(species: &SpeciesData, rng: &mut R) -> Vec<String> {
    match species.moves.len() {
        0 => vec![DEFAULT_MOVE.to_string(), DEFAULT_MOVE.to_string()],
        1 => vec![species.moves[0].clone(), species.moves[0].clone()],
        _ => species
            .moves
            .choose_multiple(rng, 2)
            .cloned()
            .collect(),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::sample_creature;
    use super::*;
    use crate::species::SpeciesCatalog;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_capture_starts_at_full_hp() {
        let catalog = SpeciesCatalog::builtin().unwrap();
        let creature = sample_creature(&catalog, "bulbasaur", "ash");

        assert_eq!(creature.species, "Bulbasaur");
        assert_eq!(creature.current_hp, 120);
        assert_eq!(creature.owner_id, "ash");
        assert_eq!(creature.original_trainer_id, "ash");
        assert_eq!(creature.iv_percentage(), 100);
        assert_eq!(creature.experience_cap, 350);
        assert!(!creature.selected);
    }

    #[test]
    fn test_capture_rejects_bad_level_and_ivs() {
        let catalog = SpeciesCatalog::builtin().unwrap();
        let attributes = AttributeSet {
            ivs: [31; 6],
            evs: [0; 6],
            nature: Nature::Bold,
            gender: Gender::Female,
            ability: "Static".to_string(),
        };

        let level_zero = Creature::capture(&catalog, "Pikachu", attributes.clone(), 0, "misty", vec![]);
        assert!(matches!(level_zero, Err(CollectorError::InvalidArgument(_))));

        let mut broken = attributes;
        broken.ivs[2] = 40;
        let bad_ivs = Creature::capture(&catalog, "Pikachu", broken, 10, "misty", vec![]);
        assert!(matches!(bad_ivs, Err(CollectorError::DataIntegrity(_))));
    }

    #[test]
    fn test_capture_without_moves_knows_tackle() {
        let catalog = SpeciesCatalog::builtin().unwrap();
        let attributes = AttributeSet {
            ivs: [0; 6],
            evs: [0; 6],
            nature: Nature::Quirky,
            gender: Gender::Genderless,
            ability: "Pressure".to_string(),
        };
        let creature = Creature::capture(&catalog, "Mewtwo", attributes, 70, "giovanni", vec![]).unwrap();
        assert_eq!(creature.moves, vec!["Tackle".to_string()]);
    }

    #[test]
    fn test_take_damage_floors_at_zero() {
        let catalog = SpeciesCatalog::builtin().unwrap();
        let mut creature = sample_creature(&catalog, "Pikachu", "ash");

        assert!(!creature.take_damage(10));
        assert!(creature.take_damage(u16::MAX));
        assert_eq!(creature.current_hp, 0);
        assert!(creature.is_fainted());

        creature.restore_hp(&catalog).unwrap();
        assert_eq!(creature.current_hp, creature.max_hp(&catalog).unwrap());
    }

    #[test]
    fn test_roll_capture_moves() {
        let catalog = SpeciesCatalog::builtin().unwrap();
        let mut rng = StdRng::seed_from_u64(4);

        let squirtle = catalog.get_species("Squirtle").unwrap();
        let moves = roll_capture_moves(squirtle, &mut rng);
        assert_eq!(moves.len(), 2);
        assert_ne!(moves[0], moves[1]);
        assert!(moves.iter().all(|m| squirtle.moves.contains(m)));

        let chansey = catalog.get_species("Chansey").unwrap();
        assert_eq!(roll_capture_moves(chansey, &mut rng), vec!["Pound", "Pound"]);
    }

    #[test]
    fn test_display_name_prefers_nickname() {
        let catalog = SpeciesCatalog::builtin().unwrap();
        let mut creature = sample_creature(&catalog, "Eevee", "gary");
        assert_eq!(creature.display_name(), "Eevee");
        creature.nickname = Some("Sparky".to_string());
        assert_eq!(creature.display_name(), "Sparky");
    }
}
