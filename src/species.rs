use crate::errors::{CollectorError, CollectorResult, NotFoundError};
use schema::{Abilities, BaseStats, MoveData, SpeciesData};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

const BUILTIN_SPECIES: &str = include_str!("../data/species.ron");
const BUILTIN_MOVES: &str = include_str!("../data/moves.ron");

/// Source of per-species base data. The core never fetches species data
/// itself; whoever embeds it supplies an implementation.
pub trait SpeciesDataProvider {
    /// Full record, used by the pokedex lookup and capture move rolls
    fn get_species(&self, species_name: &str) -> CollectorResult<&SpeciesData>;

    fn get_base_stats(&self, species_name: &str) -> CollectorResult<BaseStats> {
        Ok(self.get_species(species_name)?.base_stats)
    }

    fn get_abilities(&self, species_name: &str) -> CollectorResult<Abilities> {
        Ok(self.get_species(species_name)?.abilities.clone())
    }

    fn get_gender_rate(&self, species_name: &str) -> CollectorResult<i8> {
        Ok(self.get_species(species_name)?.gender_rate)
    }
}

/// In-memory species table keyed by lowercase name.
#[derive(Debug, Clone, Default)]
pub struct SpeciesCatalog {
    species: HashMap<String, SpeciesData>,
}

impl SpeciesCatalog {
    pub fn new(entries: Vec<SpeciesData>) -> Self {
        let species = entries
            .into_iter()
            .map(|data| (data.name.to_lowercase(), data))
            .collect();
        SpeciesCatalog { species }
    }

    /// The species table compiled into the crate
    pub fn builtin() -> CollectorResult<Self> {
        Self::from_ron_str(BUILTIN_SPECIES)
    }

    /// Parse a RON list of species records
    pub fn from_ron_str(text: &str) -> CollectorResult<Self> {
        let entries: Vec<SpeciesData> = ron::from_str(text)
            .map_err(|e| CollectorError::integrity(format!("malformed species data: {}", e)))?;
        Ok(Self::new(entries))
    }

    /// Load every `*.ron` file in `dir`, each holding one species record
    pub fn load_dir(dir: &Path) -> CollectorResult<Self> {
        if !dir.exists() {
            return Err(CollectorError::Storage(format!(
                "species data directory not found: {}",
                dir.display()
            )));
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) == Some("ron") {
                let content = fs::read_to_string(&path)?;
                let species: SpeciesData = ron::from_str(&content).map_err(|e| {
                    CollectorError::integrity(format!("{}: {}", path.display(), e))
                })?;
                entries.push(species);
            }
        }

        // Sort by pokedex number
        entries.sort_by(|a, b| a.pokedex_number.cmp(&b.pokedex_number));
        debug!(count = entries.len(), dir = %dir.display(), "loaded species data");
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.species.values().map(|s| s.name.as_str())
    }
}

impl SpeciesDataProvider for SpeciesCatalog {
    fn get_species(&self, species_name: &str) -> CollectorResult<&SpeciesData> {
        self.species
            .get(&species_name.to_lowercase())
            .ok_or_else(|| NotFoundError::Species(species_name.to_string()).into())
    }
}

/// Move name to base power table used by battles.
#[derive(Debug, Clone, Default)]
pub struct MoveBook {
    moves: HashMap<String, u16>,
}

impl MoveBook {
    pub fn new(entries: Vec<MoveData>) -> Self {
        let moves = entries
            .into_iter()
            .map(|m| (m.name.to_lowercase(), m.power))
            .collect();
        MoveBook { moves }
    }

    pub fn builtin() -> CollectorResult<Self> {
        Self::from_ron_str(BUILTIN_MOVES)
    }

    pub fn from_ron_str(text: &str) -> CollectorResult<Self> {
        let entries: Vec<MoveData> = ron::from_str(text)
            .map_err(|e| CollectorError::integrity(format!("malformed move data: {}", e)))?;
        Ok(Self::new(entries))
    }

    pub fn power(&self, move_name: &str) -> CollectorResult<u16> {
        self.moves
            .get(&move_name.to_lowercase())
            .copied()
            .ok_or_else(|| NotFoundError::Move(move_name.to_string()).into())
    }
}
