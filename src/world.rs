use crate::errors::{CollectorError, CollectorResult};
use crate::expedition::EncounterTable;
use crate::species::SpeciesDataProvider;
use crate::trivia::TriviaQuestion;
use serde::{Deserialize, Serialize};
use std::path::Path;

const BUILTIN_WORLD: &str = include_str!("../data/world.ron");

/// Static game tables that are not per-species.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldData {
    pub starters: Vec<String>,
    pub raid_bosses: Vec<String>,
    pub encounters: EncounterTable,
    pub trivia: Vec<TriviaQuestion>,
}

impl WorldData {
    pub fn builtin() -> CollectorResult<Self> {
        Self::from_ron_str(BUILTIN_WORLD)
    }

    pub fn from_ron_str(text: &str) -> CollectorResult<Self> {
        ron::from_str(text).map_err(|e| CollectorError::integrity(format!("malformed world data: {}", e)))
    }

    pub fn load(path: &Path) -> CollectorResult<Self> {
        Self::from_ron_str(&std::fs::read_to_string(path)?)
    }

    /// Check that every species the tables name exists in `provider`.
    pub fn validate<P: SpeciesDataProvider + ?Sized>(&self, provider: &P) -> CollectorResult<()> {
        let encounter_species = self
            .encounters
            .rates
            .values()
            .flat_map(|levels| levels.values())
            .flat_map(|weights| weights.keys());

        for name in self
            .starters
            .iter()
            .chain(self.raid_bosses.iter())
            .chain(encounter_species)
        {
            provider.get_species(name).map_err(|_| {
                CollectorError::integrity(format!("world data names unknown species '{}'", name))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expedition::Location;
    use crate::species::SpeciesCatalog;
    use crate::trivia::Difficulty;
    use strum::IntoEnumIterator;

    #[test]
    fn test_builtin_world_is_consistent() {
        let world = WorldData::builtin().unwrap();
        let catalog = SpeciesCatalog::builtin().unwrap();
        world.validate(&catalog).unwrap();

        assert!(!world.starters.is_empty());
        assert!(!world.raid_bosses.is_empty());
        for location in Location::iter() {
            assert!(world.encounters.rates.contains_key(&location), "{location} has no table");
        }
        for difficulty in Difficulty::iter() {
            assert!(world.trivia.iter().any(|q| q.difficulty == difficulty));
        }
    }

    #[test]
    fn test_unknown_species_fails_validation() {
        let world = WorldData {
            starters: vec!["Agumon".to_string()],
            ..Default::default()
        };
        let catalog = SpeciesCatalog::builtin().unwrap();
        assert!(matches!(
            world.validate(&catalog),
            Err(CollectorError::DataIntegrity(_))
        ));
    }
}
