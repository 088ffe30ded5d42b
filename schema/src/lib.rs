// Pokemon Collector Schema - Shared type definitions
// This crate contains the plain data enums and records shared between the
// collector core and its RON data files.

// Re-export the main types
pub use pokemon_types::*;
pub use species_data::*;
pub use stat_types::*;

pub mod pokemon_types;
pub mod species_data;
pub mod stat_types;
