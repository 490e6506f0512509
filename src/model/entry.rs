use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{classify, RiskTier, Species};

/// Canonical disease record produced by the normalizer.
///
/// Names are already truncated; text fields are raw and get escaped by the
/// emitters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseEntry {
    pub species: Species,
    pub severity_score: Option<f64>,
    pub name: String,
    pub name_localized: String,
    pub summary: String,
    pub first_aid: String,
    pub medications: String,
    pub nutrition_text: String,
    pub nutrition_advice: Option<Value>,
    pub images: Option<Value>,
    pub nutrition_id: Option<String>,
    pub needs_image: bool,
}

impl DiseaseEntry {
    /// Minimal entry, mostly useful for building graphs by hand.
    pub fn new(name: impl Into<String>, species: Species) -> Self {
        let name = name.into();
        Self {
            species,
            severity_score: None,
            name_localized: name.clone(),
            name,
            summary: String::new(),
            first_aid: String::new(),
            medications: String::new(),
            nutrition_text: String::new(),
            nutrition_advice: None,
            images: None,
            nutrition_id: None,
            needs_image: false,
        }
    }

    pub fn with_severity(mut self, score: f64) -> Self {
        self.severity_score = Some(score);
        self
    }

    pub fn risk_tier(&self) -> RiskTier {
        classify(self.severity_score)
    }
}
