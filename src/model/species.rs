use serde::{Deserialize, Serialize};

/// Animal a disease entry applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    Dog,
    Cat,
}

/// Outcome of species inference; `defaulted` is set when no token matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeciesInference {
    pub species: Species,
    pub defaulted: bool,
}

impl Species {
    /// Fallback for unrecognized species text.
    pub const DEFAULT: Species = Species::Dog;

    /// Infer the species by substring match on the lowercased text.
    ///
    /// Dog tokens are checked first, so "dog and cat" resolves to dog.
    pub fn infer(raw: Option<&str>) -> SpeciesInference {
        let text = raw.unwrap_or("").to_lowercase();
        if text.contains("dog") || text.contains("canine") {
            SpeciesInference { species: Species::Dog, defaulted: false }
        } else if text.contains("cat") || text.contains("feline") {
            SpeciesInference { species: Species::Cat, defaulted: false }
        } else {
            SpeciesInference { species: Self::DEFAULT, defaulted: true }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Species::Dog => "dog",
            Species::Cat => "cat",
        }
    }

    /// Row id of the species in the runtime's `animal` table.
    pub fn animal_id(&self) -> i64 {
        match self {
            Species::Dog => 1,
            Species::Cat => 2,
        }
    }
}

impl std::fmt::Display for Species {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
