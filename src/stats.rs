//! Derived combat statistics.
//!
//! Converts species base stats, individual values, effort values, level and
//! nature into the six stats used in battle. Everything here is pure.

use crate::errors::{CollectorError, CollectorResult};
use schema::{BaseStats, Nature, Stat};
use serde::{Deserialize, Serialize};

pub const MAX_IV: u8 = 31;
/// Sum of six perfect IVs
pub const MAX_IV_TOTAL: u16 = 6 * MAX_IV as u16;

/// Individual values in canonical stat order, each in 0..=31
pub type Ivs = [u8; 6];
/// Effort values in canonical stat order
pub type Evs = [u16; 6];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DerivedStats {
    pub hp: u16,
    pub attack: u16,
    pub defense: u16,
    pub sp_attack: u16,
    pub sp_defense: u16,
    pub speed: u16,
}

impl DerivedStats {
    pub fn from_array(values: [u16; 6]) -> Self {
        DerivedStats {
            hp: values[0],
            attack: values[1],
            defense: values[2],
            sp_attack: values[3],
            sp_defense: values[4],
            speed: values[5],
        }
    }

    pub fn to_array(&self) -> [u16; 6] {
        [
            self.hp,
            self.attack,
            self.defense,
            self.sp_attack,
            self.sp_defense,
            self.speed,
        ]
    }

    pub fn get(&self, stat: Stat) -> u16 {
        self.to_array()[stat.index()]
    }
}

/// Calculate the six derived stats.
///
/// HP = floor((2*Base + IV + floor(EV/4)) * Level / 100) + Level + 10
/// Other = floor((2*Base + IV + floor(EV/4)) * Level / 100) + 5
///
/// The nature is applied last: the boosted stat is scaled by 11/10 and the
/// penalized stat by 9/10, both rounded down.
pub fn derive_stats(
    base_stats: &BaseStats,
    ivs: &Ivs,
    evs: &Evs,
    level: u8,
    nature: Nature,
) -> DerivedStats {
    let base = base_stats.to_array();
    let level = level as u32;
    let mut stats = [0u16; 6];

    for i in 0..6 {
        let core = (2 * base[i] as u32 + ivs[i] as u32 + evs[i] as u32 / 4) * level / 100;
        let value = if i == Stat::Hp.index() {
            core + level + 10
        } else {
            core + 5
        };
        stats[i] = value.min(u16::MAX as u32) as u16;
    }

    if let Some((boosted, penalized)) = nature.modifiers() {
        let up = &mut stats[boosted.index()];
        *up = ((*up as u32 * 11) / 10).min(u16::MAX as u32) as u16;
        let down = &mut stats[penalized.index()];
        *down = ((*down as u32 * 9) / 10) as u16;
    }

    DerivedStats::from_array(stats)
}

/// IV quality as a rounded percentage of the 186 maximum.
pub fn iv_percentage(ivs: &Ivs) -> u8 {
    let total: u32 = ivs.iter().map(|&iv| iv as u32).sum();
    // Round half up; an exact .5 cannot occur with a denominator of 186
    ((total * 100 + MAX_IV_TOTAL as u32 / 2) / MAX_IV_TOTAL as u32) as u8
}

/// Reject IV sets holding values above 31.
pub fn validate_ivs(ivs: &Ivs) -> CollectorResult<()> {
    match ivs.iter().position(|&iv| iv > MAX_IV) {
        Some(i) => Err(CollectorError::integrity(format!(
            "IV {} at position {} exceeds {}",
            ivs[i], i, MAX_IV
        ))),
        None => Ok(()),
    }
}
