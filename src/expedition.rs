//! Safari expeditions: timed trips that keep turning up wild creatures.

use crate::creature::OwnerId;
use crate::errors::{CollectorError, CollectorResult};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::{Duration, Instant};
use strum::{Display, EnumIter, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, EnumString, EnumIter, Display,
)]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum Location {
    Forest,
    Mountain,
    Cave,
}

impl Location {
    pub fn parse(text: &str) -> CollectorResult<Self> {
        Location::from_str(text.trim()).map_err(|_| {
            CollectorError::invalid(format!(
                "unknown safari location '{}', choose forest, mountain or cave",
                text
            ))
        })
    }
}

/// Species weights per location and expedition level
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncounterTable {
    pub rates: BTreeMap<Location, BTreeMap<u8, BTreeMap<String, u32>>>,
}

impl EncounterTable {
    /// Pick a species for `location` at `level`. Levels above the highest
    /// configured one use that highest table.
    pub fn roll<R: Rng + ?Sized>(&self, location: Location, level: u8, rng: &mut R) -> CollectorResult<String> {
        let by_level = self
            .rates
            .get(&location)
            .ok_or_else(|| CollectorError::integrity(format!("no encounters for {}", location)))?;
        let weights = by_level
            .range(..=level)
            .next_back()
            .or_else(|| by_level.iter().next())
            .map(|(_, weights)| weights)
            .ok_or_else(|| CollectorError::integrity(format!("no encounters for {}", location)))?;

        let species: Vec<&String> = weights.keys().collect();
        let dist = WeightedIndex::new(weights.values().copied())
            .map_err(|e| CollectorError::integrity(format!("encounter weights for {}: {}", location, e)))?;
        Ok(species[dist.sample(rng)].clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expedition {
    pub user: OwnerId,
    pub location: Location,
    pub level: u8,
    pub started: Instant,
    pub encounters: u32,
}

impl Expedition {
    pub fn new(user: &str, location: Location, level: u8, now: Instant) -> Self {
        Expedition {
            user: user.to_string(),
            location,
            level,
            started: now,
            encounters: 0,
        }
    }

    pub fn is_finished(&self, now: Instant, duration: Duration) -> bool {
        now.saturating_duration_since(self.started) >= duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rstest::rstest;

    fn table() -> EncounterTable {
        let forest = BTreeMap::from([
            (1, BTreeMap::from([("Caterpie".to_string(), 70), ("Pikachu".to_string(), 30)])),
            (3, BTreeMap::from([("Pikachu".to_string(), 1)])),
        ]);
        let cave = BTreeMap::from([(1, BTreeMap::from([("Onix".to_string(), 0)]))]);
        EncounterTable {
            rates: BTreeMap::from([(Location::Forest, forest), (Location::Cave, cave)]),
        }
    }

    #[rstest]
    #[case("forest", Location::Forest)]
    #[case("Mountain", Location::Mountain)]
    #[case("CAVE", Location::Cave)]
    fn test_parse_location(#[case] text: &str, #[case] expected: Location) {
        assert_eq!(Location::parse(text).unwrap(), expected);
    }

    #[test]
    fn test_unknown_location_is_invalid() {
        assert!(matches!(
            Location::parse("ocean"),
            Err(CollectorError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_roll_follows_weights() {
        let table = table();
        let mut rng = StdRng::seed_from_u64(8);
        let caterpies = (0..1000)
            .filter(|_| table.roll(Location::Forest, 1, &mut rng).unwrap() == "Caterpie")
            .count();
        assert!((600..800).contains(&caterpies), "got {caterpies}");
    }

    #[test]
    fn test_roll_uses_highest_level_at_or_below() {
        let table = table();
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..20 {
            assert_eq!(table.roll(Location::Forest, 9, &mut rng).unwrap(), "Pikachu");
        }
    }

    #[test]
    fn test_missing_or_zero_tables_are_integrity_errors() {
        let table = table();
        let mut rng = StdRng::seed_from_u64(8);
        assert!(matches!(
            table.roll(Location::Mountain, 1, &mut rng),
            Err(CollectorError::DataIntegrity(_))
        ));
        assert!(matches!(
            table.roll(Location::Cave, 1, &mut rng),
            Err(CollectorError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_finishes_after_duration() {
        let start = Instant::now();
        let trip = Expedition::new("ash", Location::Forest, 1, start);
        let half_hour = Duration::from_secs(1800);
        assert!(!trip.is_finished(start + Duration::from_secs(60), half_hour));
        assert!(trip.is_finished(start + half_hour, half_hour));
    }
}
