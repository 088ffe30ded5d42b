// In: src/lib.rs

//! Pokemon Collector Core
//!
//! The game core of a chat-platform creature collecting bot: capture-time
//! attribute generation, stat calculation, one-on-one battles, per-user
//! collections, the player market, raids, safari expeditions and trivia.
//! Front-ends drive it through [`Game`] and supply a [`Store`].

// --- MODULE DECLARATIONS ---
pub mod attributes;
pub mod battle;
pub mod collection;
pub mod config;
pub mod creature;
pub mod effort;
pub mod errors;
pub mod expedition;
pub mod game;
pub mod market;
pub mod persistence;
pub mod profile;
pub mod prompt;
pub mod raid;
pub mod runtime;
pub mod sessions;
pub mod species;
pub mod stats;
pub mod team;
pub mod trivia;
pub mod world;

// --- PUBLIC API RE-EXPORTS ---

// --- From the `schema` crate ---
pub use schema::{Abilities, BaseStats, Gender, MoveData, Nature, PokemonType, SpeciesData, Stat};

// --- From this crate's modules (`src/`) ---

// Attribute generation and stats.
pub use attributes::{AttributeGenerator, AttributeSet, IvRoll};
pub use stats::{derive_stats, iv_percentage, DerivedStats, Evs, Ivs};

// Battles.
pub use battle::{resolve_attack, AttackResult, BattleEnd, BattlePhase, BattleSession, Combatant};

// Ownership.
pub use collection::CollectionLedger;
pub use creature::{Creature, OwnerId};
pub use team::Team;

// Coordinator, configuration and collaborators.
pub use config::GameConfig;
pub use errors::{CollectorError, CollectorResult, NotFoundError, PreconditionError};
pub use game::Game;
pub use persistence::{JsonDirStore, MemoryStore, Store};
pub use prompt::Outcome;
pub use runtime::{run_ticker, SharedGame};
pub use species::{MoveBook, SpeciesCatalog, SpeciesDataProvider};
pub use world::WorldData;
