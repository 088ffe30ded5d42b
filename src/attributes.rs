//! Hidden attribute generation for newly acquired creatures.

use crate::errors::{CollectorError, CollectorResult};
use crate::species::SpeciesDataProvider;
use crate::stats::{Evs, Ivs, MAX_IV};
use rand::seq::{IndexedRandom, IteratorRandom};
use rand::Rng;
use schema::{Abilities, Gender, Nature};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// Default probability of rolling a hidden ability when the species has one
pub const DEFAULT_HIDDEN_ABILITY_CHANCE: f64 = 0.33;

/// How IVs are rolled at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IvRoll {
    /// Six independent draws from 0..=31
    #[default]
    Independent,
    /// One draw from 0..=31 copied into all six stats
    Shared,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSet {
    pub ivs: Ivs,
    pub evs: Evs,
    pub nature: Nature,
    pub gender: Gender,
    pub ability: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributeGenerator {
    pub hidden_ability_chance: f64,
    pub iv_roll: IvRoll,
}

impl Default for AttributeGenerator {
    fn default() -> Self {
        AttributeGenerator {
            hidden_ability_chance: DEFAULT_HIDDEN_ABILITY_CHANCE,
            iv_roll: IvRoll::Independent,
        }
    }
}

impl AttributeGenerator {
    pub fn new(hidden_ability_chance: f64, iv_roll: IvRoll) -> Self {
        AttributeGenerator {
            hidden_ability_chance,
            iv_roll,
        }
    }

    /// Roll IVs, nature, gender and ability for a new member of `species_name`.
    /// EVs always start at zero.
    pub fn generate<P, R>(
        &self,
        provider: &P,
        species_name: &str,
        rng: &mut R,
    ) -> CollectorResult<AttributeSet>
    where
        P: SpeciesDataProvider + ?Sized,
        R: Rng + ?Sized,
    {
        let gender_rate = provider.get_gender_rate(species_name)?;
        let abilities = provider.get_abilities(species_name)?;

        let ivs = roll_ivs(self.iv_roll, rng);
        let nature = roll_nature(rng)?;
        let gender = roll_gender(gender_rate, rng)?;
        let ability = roll_ability(&abilities, self.hidden_ability_chance, rng)
            .map_err(|e| match e {
                CollectorError::DataIntegrity(details) => {
                    CollectorError::DataIntegrity(format!("{}: {}", species_name, details))
                }
                other => other,
            })?;

        Ok(AttributeSet {
            ivs,
            evs: [0; 6],
            nature,
            gender,
            ability,
        })
    }
}

pub fn roll_ivs<R: Rng + ?Sized>(mode: IvRoll, rng: &mut R) -> Ivs {
    match mode {
        IvRoll::Independent => std::array::from_fn(|_| rng.random_range(0..=MAX_IV)),
        IvRoll::Shared => [rng.random_range(0..=MAX_IV); 6],
    }
}

pub fn roll_nature<R: Rng + ?Sized>(rng: &mut R) -> CollectorResult<Nature> {
    Nature::iter()
        .choose(rng)
        .ok_or_else(|| CollectorError::integrity("nature table is empty"))
}

/// Gender from a rate in eighths: -1 genderless, 0 always female,
/// 8 always male, otherwise male with probability rate/8.
pub fn roll_gender<R: Rng + ?Sized>(gender_rate: i8, rng: &mut R) -> CollectorResult<Gender> {
    match gender_rate {
        -1 => Ok(Gender::Genderless),
        0 => Ok(Gender::Female),
        8 => Ok(Gender::Male),
        1..=7 => {
            if rng.random_range(0..8) < gender_rate {
                Ok(Gender::Male)
            } else {
                Ok(Gender::Female)
            }
        }
        other => Err(CollectorError::integrity(format!(
            "gender rate {} outside -1..=8",
            other
        ))),
    }
}

/// With probability `hidden_chance` pick a hidden ability if the species has
/// any, otherwise pick a regular one.
pub fn roll_ability<R: Rng + ?Sized>(
    abilities: &Abilities,
    hidden_chance: f64,
    rng: &mut R,
) -> CollectorResult<String> {
    let wants_hidden = rng.random_bool(hidden_chance.clamp(0.0, 1.0));

    let pool = if (wants_hidden && !abilities.hidden.is_empty()) || abilities.regular.is_empty() {
        &abilities.hidden
    } else {
        &abilities.regular
    };

    pool.choose(rng)
        .cloned()
        .ok_or_else(|| CollectorError::integrity("species has no abilities"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::NotFoundError;
    use crate::species::SpeciesCatalog;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rstest::rstest;

    fn abilities(regular: &[&str], hidden: &[&str]) -> Abilities {
        Abilities {
            regular: regular.iter().map(|s| s.to_string()).collect(),
            hidden: hidden.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_generate_produces_legal_attributes() {
        let catalog = SpeciesCatalog::builtin().unwrap();
        let generator = AttributeGenerator::default();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..200 {
            let attrs = generator.generate(&catalog, "Bulbasaur", &mut rng).unwrap();
            assert!(attrs.ivs.iter().all(|&iv| iv <= 31));
            assert_eq!(attrs.evs, [0; 6]);
            assert!(attrs.gender != Gender::Genderless);
            assert!(attrs.ability == "Overgrow" || attrs.ability == "Chlorophyll");
        }
    }

    #[test]
    fn test_generate_unknown_species_fails() {
        let catalog = SpeciesCatalog::builtin().unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let err = AttributeGenerator::default()
            .generate(&catalog, "Agumon", &mut rng)
            .unwrap_err();
        assert_eq!(err, NotFoundError::Species("Agumon".to_string()).into());
    }

    #[test]
    fn test_shared_roll_copies_one_value() {
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..50 {
            let ivs = roll_ivs(IvRoll::Shared, &mut rng);
            assert!(ivs.iter().all(|&iv| iv == ivs[0]));
        }
    }

    #[test]
    fn test_independent_roll_varies() {
        let mut rng = StdRng::seed_from_u64(3);
        let varied = (0..50)
            .map(|_| roll_ivs(IvRoll::Independent, &mut rng))
            .any(|ivs| ivs.iter().any(|&iv| iv != ivs[0]));
        assert!(varied);
    }

    #[rstest]
    #[case(-1, Gender::Genderless)]
    #[case(0, Gender::Female)]
    #[case(8, Gender::Male)]
    fn test_fixed_gender_rates(#[case] rate: i8, #[case] expected: Gender) {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..20 {
            assert_eq!(roll_gender(rate, &mut rng).unwrap(), expected);
        }
    }

    #[test]
    fn test_mixed_gender_rate_follows_eighths() {
        let mut rng = StdRng::seed_from_u64(5);
        let males = (0..8000)
            .filter(|_| roll_gender(6, &mut rng).unwrap() == Gender::Male)
            .count();
        // 6/8 = 75% male
        assert!((5600..6400).contains(&males), "got {males} males");
    }

    #[test]
    fn test_invalid_gender_rate_is_integrity_error() {
        let mut rng = StdRng::seed_from_u64(5);
        assert!(matches!(
            roll_gender(9, &mut rng),
            Err(CollectorError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_ability_falls_back_to_regular_without_hidden() {
        let mut rng = StdRng::seed_from_u64(2);
        let pool = abilities(&["Cursed Body"], &[]);
        for _ in 0..20 {
            assert_eq!(roll_ability(&pool, 1.0, &mut rng).unwrap(), "Cursed Body");
        }
    }

    #[test]
    fn test_ability_always_hidden_at_full_chance() {
        let mut rng = StdRng::seed_from_u64(2);
        let pool = abilities(&["Static"], &["Lightning Rod"]);
        for _ in 0..20 {
            assert_eq!(roll_ability(&pool, 1.0, &mut rng).unwrap(), "Lightning Rod");
            assert_eq!(roll_ability(&pool, 0.0, &mut rng).unwrap(), "Static");
        }
    }

    #[test]
    fn test_species_without_abilities_is_integrity_error() {
        let mut rng = StdRng::seed_from_u64(2);
        let result = roll_ability(&abilities(&[], &[]), 0.5, &mut rng);
        assert!(matches!(result, Err(CollectorError::DataIntegrity(_))));
    }
}
