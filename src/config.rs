//! Tunable game settings.
//!
//! Loaded from a RON file; any field left out keeps its default.

use crate::attributes::{IvRoll, DEFAULT_HIDDEN_ABILITY_CHANCE};
use crate::errors::{CollectorError, CollectorResult};
use crate::trivia::Difficulty;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// How often raids and expeditions advance
    #[serde(with = "seconds")]
    pub tick_interval: Duration,
    /// Challenge answers, battle turns, trivia answers, trade confirmation
    #[serde(with = "seconds")]
    pub prompt_timeout: Duration,
    /// Market listing confirmation
    #[serde(with = "seconds")]
    pub market_prompt_timeout: Duration,
    pub hidden_ability_chance: f64,
    pub iv_roll: IvRoll,
    pub raid_level_range: RangeInclusive<u8>,
    pub raid_hp_per_level: u32,
    #[serde(with = "seconds")]
    pub expedition_duration: Duration,
    pub capture_level_range: RangeInclusive<u8>,
    pub starter_level: u8,
    pub market_page_size: usize,
    pub trivia_rewards: BTreeMap<Difficulty, u64>,
    /// Item name -> token price
    pub shop: BTreeMap<String, u64>,
    pub default_region: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            tick_interval: Duration::from_secs(30),
            prompt_timeout: Duration::from_secs(30),
            market_prompt_timeout: Duration::from_secs(60),
            hidden_ability_chance: DEFAULT_HIDDEN_ABILITY_CHANCE,
            iv_roll: IvRoll::Independent,
            raid_level_range: 1..=5,
            raid_hp_per_level: 100,
            expedition_duration: Duration::from_secs(30 * 60),
            capture_level_range: 1..=30,
            starter_level: 5,
            market_page_size: 10,
            trivia_rewards: BTreeMap::from([
                (Difficulty::Easy, 100),
                (Difficulty::Medium, 200),
                (Difficulty::Hard, 500),
            ]),
            shop: BTreeMap::from([
                ("Poke Ball".to_string(), 200),
                ("Potion".to_string(), 300),
                ("Rare Candy".to_string(), 4800),
                ("Everstone".to_string(), 3000),
            ]),
            default_region: "Kanto".to_string(),
        }
    }
}

impl GameConfig {
    pub fn from_ron_str(text: &str) -> CollectorResult<Self> {
        let config: GameConfig = ron::from_str(text)
            .map_err(|e| CollectorError::integrity(format!("invalid game config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> CollectorResult<Self> {
        let text = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "loading game config");
        Self::from_ron_str(&text)
    }

    /// Reject settings no game could run with.
    pub fn validate(&self) -> CollectorResult<()> {
        if !(0.0..=1.0).contains(&self.hidden_ability_chance) {
            return Err(CollectorError::integrity(format!(
                "hidden_ability_chance {} outside 0..=1",
                self.hidden_ability_chance
            )));
        }
        for (name, range) in [
            ("raid_level_range", &self.raid_level_range),
            ("capture_level_range", &self.capture_level_range),
        ] {
            if range.is_empty() || *range.start() == 0 || *range.end() > crate::creature::MAX_LEVEL {
                return Err(CollectorError::integrity(format!(
                    "{} {:?} must lie within 1..=100",
                    name, range
                )));
            }
        }
        if !(1..=crate::creature::MAX_LEVEL).contains(&self.starter_level) {
            return Err(CollectorError::integrity("starter_level outside 1..=100"));
        }
        if self.market_page_size == 0 {
            return Err(CollectorError::integrity("market_page_size must be positive"));
        }
        if self.raid_hp_per_level == 0 {
            return Err(CollectorError::integrity("raid_hp_per_level must be positive"));
        }
        for (name, duration) in [
            ("tick_interval", self.tick_interval),
            ("prompt_timeout", self.prompt_timeout),
            ("market_prompt_timeout", self.market_prompt_timeout),
            ("expedition_duration", self.expedition_duration),
        ] {
            if duration.is_zero() {
                return Err(CollectorError::integrity(format!("{} must be positive", name)));
            }
        }
        Ok(())
    }

    pub fn trivia_reward(&self, difficulty: Difficulty) -> u64 {
        self.trivia_rewards.get(&difficulty).copied().unwrap_or(0)
    }
}

/// Durations as whole seconds in config files
mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
