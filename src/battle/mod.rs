pub mod damage;
pub mod session;

pub use damage::{resolve_attack, AttackResult, Combatant};
pub use session::{BattleEnd, BattlePhase, BattleSession};
