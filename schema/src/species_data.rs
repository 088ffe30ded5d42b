use crate::{PokemonType, Stat};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseStats {
    pub hp: u8,
    pub attack: u8,
    pub defense: u8,
    pub sp_attack: u8,
    pub sp_defense: u8,
    pub speed: u8,
}

impl BaseStats {
    /// Base stats as an array in canonical stat order.
    pub fn to_array(&self) -> [u8; 6] {
        [
            self.hp,
            self.attack,
            self.defense,
            self.sp_attack,
            self.sp_defense,
            self.speed,
        ]
    }

    pub fn get(&self, stat: Stat) -> u8 {
        self.to_array()[stat.index()]
    }

    /// Base stat total.
    pub fn total(&self) -> u16 {
        self.to_array().iter().map(|&b| b as u16).sum()
    }
}

/// Abilities a species can roll at capture time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Abilities {
    pub regular: Vec<String>,
    #[serde(default)]
    pub hidden: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesData {
    pub pokedex_number: u16,
    pub name: String,
    pub types: Vec<PokemonType>,
    pub base_stats: BaseStats,
    pub abilities: Abilities,
    /// Chance of a male in eighths: -1 genderless, 0 always female,
    /// 8 always male, 1..=7 male with probability rate/8.
    pub gender_rate: i8,
    /// Moves a freshly captured creature can roll.
    #[serde(default)]
    pub moves: Vec<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveData {
    pub name: String,
    pub power: u16,
}
