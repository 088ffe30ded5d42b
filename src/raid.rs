use crate::creature::OwnerId;
use crate::errors::{CollectorError, CollectorResult, PreconditionError};
use rand::seq::IndexedRandom;
use rand::Rng;
use std::ops::RangeInclusive;
use tracing::{debug, info};

/// A boss fight shared by everyone in one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raid {
    pub boss: String,
    pub level: u8,
    pub hp: u32,
    pub max_hp: u32,
    pub participants: Vec<OwnerId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaidStrike {
    pub damage: u32,
    pub boss_hp_after: u32,
    pub defeated: bool,
}

impl Raid {
    /// Pick a boss and level; hp is level times `hp_per_level`.
    pub fn spawn<R: Rng + ?Sized>(
        bosses: &[String],
        levels: RangeInclusive<u8>,
        hp_per_level: u32,
        rng: &mut R,
    ) -> CollectorResult<Self> {
        let boss = bosses
            .choose(rng)
            .cloned()
            .ok_or_else(|| CollectorError::integrity("no raid bosses configured"))?;
        if levels.is_empty() {
            return Err(CollectorError::integrity("empty raid level range"));
        }
        let level = rng.random_range(levels);
        let max_hp = (level as u32)
            .checked_mul(hp_per_level)
            .ok_or_else(|| CollectorError::integrity(format!("raid hp overflows at level {}", level)))?;
        info!(boss = %boss, level, hp = max_hp, "raid boss appeared");
        Ok(Raid {
            boss,
            level,
            hp: max_hp,
            max_hp,
            participants: Vec::new(),
        })
    }

    pub fn join(&mut self, user: &str) -> CollectorResult<()> {
        if self.is_participant(user) {
            return Err(PreconditionError::AlreadyJoined(user.to_string()).into());
        }
        self.participants.push(user.to_string());
        debug!(user = %user, boss = %self.boss, "joined raid");
        Ok(())
    }

    pub fn is_participant(&self, user: &str) -> bool {
        self.participants.iter().any(|p| p == user)
    }

    pub fn is_defeated(&self) -> bool {
        self.hp == 0
    }

    /// Hit the boss with a creature whose attack stat is `attack`.
    pub fn strike<R: Rng + ?Sized>(&mut self, attack: u16, rng: &mut R) -> RaidStrike {
        let damage = raid_damage(attack, rng);
        self.hp = self.hp.saturating_sub(damage);
        RaidStrike {
            damage,
            boss_hp_after: self.hp,
            defeated: self.is_defeated(),
        }
    }
}

/// Uniform damage in `attack/2..=attack`.
pub fn raid_damage<R: Rng + ?Sized>(attack: u16, rng: &mut R) -> u32 {
    rng.random_range(attack as u32 / 2..=attack as u32)
}
