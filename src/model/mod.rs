//! Normalized input model: species, risk tiers and disease entries.

mod entry;
pub mod risk;
mod species;

pub use entry::DiseaseEntry;
pub use risk::{classify, severity_from_value, RiskTier, DEFAULT_SEVERITY};
pub use species::{Species, SpeciesInference};
