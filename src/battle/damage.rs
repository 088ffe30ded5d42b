use crate::creature::Creature;
use crate::errors::{CollectorError, CollectorResult};
use crate::species::SpeciesDataProvider;
use serde::{Deserialize, Serialize};

/// The numbers one side of an exchange brings into `resolve_attack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combatant {
    pub attack: u16,
    pub defense: u16,
    pub current_hp: u16,
}

impl Combatant {
    /// Snapshot a creature using its level and nature derived stats.
    pub fn from_creature<P: SpeciesDataProvider + ?Sized>(
        creature: &Creature,
        provider: &P,
    ) -> CollectorResult<Self> {
        let stats = creature.derived_stats(provider)?;
        Ok(Combatant {
            attack: stats.attack,
            defense: stats.defense,
            current_hp: creature.current_hp,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackResult {
    pub damage: u32,
    pub defender_hp_after: u16,
    pub fainted: bool,
}

/// Resolve one attack: damage = floor(attack * power / defense).
///
/// A defender with zero defense can only come from corrupt data and is
/// reported as a data integrity failure.
pub fn resolve_attack(
    attacker: &Combatant,
    defender: &Combatant,
    move_power: u16,
) -> CollectorResult<AttackResult> {
    if defender.defense == 0 {
        return Err(CollectorError::integrity("defender has a defense stat of 0"));
    }

    let damage = attacker.attack as u32 * move_power as u32 / defender.defense as u32;
    let defender_hp_after = (defender.current_hp as u32).saturating_sub(damage) as u16;

    Ok(AttackResult {
        damage,
        defender_hp_after,
        fainted: defender_hp_after == 0,
    })
}
