use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{EnumIter, EnumString};

/// The six combat statistics, in the canonical order used by every
/// six-element stat array in the crate: HP, ATK, DEF, SP.ATK, SP.DEF, SPD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Stat {
    #[strum(serialize = "hp")]
    Hp,
    #[strum(serialize = "attack", serialize = "atk")]
    Attack,
    #[strum(serialize = "defense", serialize = "def")]
    Defense,
    #[strum(serialize = "spatk", serialize = "special_attack", serialize = "spa")]
    SpecialAttack,
    #[strum(serialize = "spdef", serialize = "special_defense", serialize = "spd")]
    SpecialDefense,
    #[strum(serialize = "speed", serialize = "spe")]
    Speed,
}

impl Stat {
    /// Position of this stat inside a six-element stat array.
    pub const fn index(self) -> usize {
        match self {
            Stat::Hp => 0,
            Stat::Attack => 1,
            Stat::Defense => 2,
            Stat::SpecialAttack => 3,
            Stat::SpecialDefense => 4,
            Stat::Speed => 5,
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stat::Hp => "HP",
            Stat::Attack => "Attack",
            Stat::Defense => "Defense",
            Stat::SpecialAttack => "Sp. Atk",
            Stat::SpecialDefense => "Sp. Def",
            Stat::Speed => "Speed",
        };
        write!(f, "{}", label)
    }
}

/// The 25 natures. Each non-neutral nature raises one stat by 10% and
/// lowers another by 10%.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, EnumString, strum::Display,
)]
#[strum(ascii_case_insensitive)]
pub enum Nature {
    Hardy,
    Lonely,
    Brave,
    Adamant,
    Naughty,
    Bold,
    Docile,
    Relaxed,
    Impish,
    Lax,
    Timid,
    Hasty,
    Serious,
    Jolly,
    Naive,
    Modest,
    Mild,
    Quiet,
    Bashful,
    Rash,
    Calm,
    Gentle,
    Sassy,
    Careful,
    Quirky,
}

impl Nature {
    /// Returns `(boosted, penalized)` for this nature, or `None` for the
    /// five neutral natures.
    pub const fn modifiers(self) -> Option<(Stat, Stat)> {
        use Nature::*;
        use Stat::*;

        match self {
            Hardy | Docile | Serious | Bashful | Quirky => None,

            Lonely => Some((Attack, Defense)),
            Brave => Some((Attack, Speed)),
            Adamant => Some((Attack, SpecialAttack)),
            Naughty => Some((Attack, SpecialDefense)),

            Bold => Some((Defense, Attack)),
            Relaxed => Some((Defense, Speed)),
            Impish => Some((Defense, SpecialAttack)),
            Lax => Some((Defense, SpecialDefense)),

            Timid => Some((Speed, Attack)),
            Hasty => Some((Speed, Defense)),
            Jolly => Some((Speed, SpecialAttack)),
            Naive => Some((Speed, SpecialDefense)),

            Modest => Some((SpecialAttack, Attack)),
            Mild => Some((SpecialAttack, Defense)),
            Quiet => Some((SpecialAttack, Speed)),
            Rash => Some((SpecialAttack, SpecialDefense)),

            Calm => Some((SpecialDefense, Attack)),
            Gentle => Some((SpecialDefense, Defense)),
            Sassy => Some((SpecialDefense, Speed)),
            Careful => Some((SpecialDefense, SpecialAttack)),
        }
    }

    pub fn is_neutral(self) -> bool {
        self.modifiers().is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Genderless,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Gender::Male => "♂",
            Gender::Female => "♀",
            Gender::Genderless => "-",
        };
        write!(f, "{}", symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_nature_table_shape() {
        let natures: Vec<Nature> = Nature::iter().collect();
        assert_eq!(natures.len(), 25);

        let neutral = natures.iter().filter(|n| n.is_neutral()).count();
        assert_eq!(neutral, 5);

        // No nature touches HP, and none boosts and lowers the same stat
        for nature in natures {
            if let Some((up, down)) = nature.modifiers() {
                assert_ne!(up, Stat::Hp);
                assert_ne!(down, Stat::Hp);
                assert_ne!(up, down, "{nature} boosts and lowers the same stat");
            }
        }
    }

    #[test]
    fn test_nature_parsing_is_case_insensitive() {
        assert_eq!(Nature::from_str("adamant").unwrap(), Nature::Adamant);
        assert_eq!(Nature::from_str("CAREFUL").unwrap(), Nature::Careful);
        assert!(Nature::from_str("Grumpy").is_err());
    }

    #[test]
    fn test_stat_indices_follow_canonical_order() {
        let indices: Vec<usize> = Stat::iter().map(Stat::index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(Stat::from_str("spatk").unwrap(), Stat::SpecialAttack);
    }
}
