//! Record normalization: loosely-typed enrichment records to [`DiseaseEntry`].
//!
//! Producers disagree on key names (the AI enricher, spreadsheet imports and
//! hand-edited files all differ), so every field is looked up through an
//! alias list and the first present, non-null key wins.

use serde_json::{Map, Value};

use crate::config::NormalizeConfig;
use crate::error::{Result, TriageError};
use crate::model::{severity_from_value, DiseaseEntry, Species, DEFAULT_SEVERITY};

const NAME_KEYS: &[&str] = &["disease_name", "name", "original_disease_name"];
const LOCALIZED_NAME_KEYS: &[&str] = &["disease_name_vi", "name_vi", "name_localized"];
const SPECIES_KEYS: &[&str] = &["species", "pet_type"];
const SEVERITY_KEYS: &[&str] = &["severity_score"];
const SUMMARY_KEYS: &[&str] = &["summary_vi", "problem_text_vi", "summary", "problem_text"];
const FIRST_AID_KEYS: &[&str] = &["first_aid_text_vi", "first_aid_text", "first_aid"];
const MEDICATION_KEYS: &[&str] = &["medications_text_vi", "medications_text", "medications"];
const NUTRITION_TEXT_KEYS: &[&str] = &["diet_vi_string", "nutrition_text_vi", "nutrition_text"];
const NUTRITION_ADVICE_KEYS: &[&str] = &["nutrition_advice"];
const IMAGE_KEYS: &[&str] = &["images_json", "images"];
const NUTRITION_ID_KEYS: &[&str] = &["nutrition_id"];
const NEEDS_IMAGE_KEYS: &[&str] = &["needs_image"];

/// A record that did not make it into the batch.
#[derive(Debug, Clone)]
pub struct RejectedRecord {
    /// Position in the input array.
    pub index: usize,
    pub reason: String,
}

/// Entries in input order plus whatever was skipped.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub entries: Vec<DiseaseEntry>,
    pub rejected: Vec<RejectedRecord>,
}

fn lookup<'a>(record: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| record.get(*k))
        .find(|v| !v.is_null())
}

/// Scalars become text; containers and null are treated as absent.
fn text_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text_field(record: &Map<String, Value>, keys: &[&str]) -> String {
    text_of(lookup(record, keys)).unwrap_or_default()
}

fn non_blank(record: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| text_of(record.get(*k)))
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

fn flag_of(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().map_or(false, |v| v != 0),
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1"),
        _ => false,
    }
}

/// Truncate to at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// Normalize a single record.
///
/// Fails only when the record is not an object or carries no usable name.
/// Unknown species and unusable severities fall back to their defaults and
/// are logged.
pub fn normalize_record(record: &Value, config: &NormalizeConfig) -> Result<DiseaseEntry> {
    let record = record
        .as_object()
        .ok_or_else(|| TriageError::Validation("record is not a JSON object".to_string()))?;

    let raw_name = non_blank(record, NAME_KEYS).ok_or_else(|| {
        TriageError::Validation(format!("record has no usable name (looked for {:?})", NAME_KEYS))
    })?;
    let name = truncate_chars(&raw_name, config.name_max_chars);

    let name_localized = non_blank(record, LOCALIZED_NAME_KEYS)
        .map(|s| truncate_chars(&s, config.name_max_chars))
        .unwrap_or_else(|| name.clone());

    let species_text = text_of(lookup(record, SPECIES_KEYS));
    let inferred = Species::infer(species_text.as_deref());
    if inferred.defaulted {
        log::warn!(
            "Unrecognized species {:?} for '{}', defaulting to {}",
            species_text.as_deref().unwrap_or(""),
            name,
            inferred.species
        );
    }

    let severity_value = lookup(record, SEVERITY_KEYS);
    let severity_score = severity_from_value(severity_value);
    match (severity_value, severity_score) {
        (Some(raw), None) => log::warn!(
            "Unparsable severity_score {} for '{}', using {}",
            raw,
            name,
            DEFAULT_SEVERITY
        ),
        (None, _) => log::debug!("No severity_score for '{}', using {}", name, DEFAULT_SEVERITY),
        _ => {}
    }

    Ok(DiseaseEntry {
        species: inferred.species,
        severity_score,
        name,
        name_localized,
        summary: text_field(record, SUMMARY_KEYS),
        first_aid: text_field(record, FIRST_AID_KEYS),
        medications: text_field(record, MEDICATION_KEYS),
        nutrition_text: text_field(record, NUTRITION_TEXT_KEYS),
        nutrition_advice: lookup(record, NUTRITION_ADVICE_KEYS).cloned(),
        images: lookup(record, IMAGE_KEYS).cloned(),
        nutrition_id: text_of(lookup(record, NUTRITION_ID_KEYS)),
        needs_image: flag_of(lookup(record, NEEDS_IMAGE_KEYS)),
    })
}

/// Normalize a batch, preserving input order.
///
/// With `skip_invalid_records` unset, the first rejected record fails the
/// whole batch.
pub fn normalize_batch(records: &[Value], config: &NormalizeConfig) -> Result<NormalizedBatch> {
    let mut batch = NormalizedBatch::default();

    for (index, record) in records.iter().enumerate() {
        match normalize_record(record, config) {
            Ok(entry) => batch.entries.push(entry),
            Err(TriageError::Validation(reason)) if config.skip_invalid_records => {
                log::warn!("Skipping record #{}: {}", index, reason);
                batch.rejected.push(RejectedRecord { index, reason });
            }
            Err(TriageError::Validation(reason)) => {
                return Err(TriageError::Validation(format!("record #{}: {}", index, reason)));
            }
            Err(e) => return Err(e),
        }
    }

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> NormalizeConfig {
        NormalizeConfig::default()
    }

    #[test]
    fn test_seed_shape_record() {
        let record = json!({
            "disease_name": "Parvovirus",
            "disease_name_vi": "Bệnh Parvovirus",
            "species": "Canine",
            "severity_score": 9,
            "summary_vi": "Tiêu chảy ra máu nặng",
            "first_aid_text_vi": "Giữ nước",
            "medications_text_vi": "Thuốc chống nôn",
            "diet_vi_string": "Cháo trắng",
            "nutrition_advice": {"should_eat": ["rice"], "avoid": ["fat"]},
            "images_json": [{"url": "a.png"}]
        });
        let entry = normalize_record(&record, &config()).unwrap();
        assert_eq!(entry.species, Species::Dog);
        assert_eq!(entry.severity_score, Some(9.0));
        assert_eq!(entry.name, "Parvovirus");
        assert_eq!(entry.name_localized, "Bệnh Parvovirus");
        assert_eq!(entry.summary, "Tiêu chảy ra máu nặng");
        assert_eq!(entry.nutrition_text, "Cháo trắng");
        assert_eq!(entry.nutrition_advice.unwrap()["avoid"][0], "fat");
        assert!(entry.images.unwrap().is_array());
        assert!(!entry.needs_image);
    }

    #[test]
    fn test_enricher_shape_record() {
        let record = json!({
            "pet_type": "cat",
            "disease_name": "Flea Allergy",
            "name_vi": "Dị ứng bọ chét",
            "problem_text_vi": "Ngứa",
            "nutrition_text_vi": "Omega 3",
            "needs_image": true,
            "nutrition_id": "NUT-00001"
        });
        let entry = normalize_record(&record, &config()).unwrap();
        assert_eq!(entry.species, Species::Cat);
        assert_eq!(entry.severity_score, None);
        assert_eq!(entry.summary, "Ngứa");
        assert_eq!(entry.nutrition_id.as_deref(), Some("NUT-00001"));
        assert!(entry.needs_image);
    }

    #[test]
    fn test_missing_name_is_validation_error() {
        let err = normalize_record(&json!({"species": "dog", "disease_name": "   "}), &config())
            .unwrap_err();
        assert!(matches!(err, TriageError::Validation(_)));

        let err = normalize_record(&json!("Parvovirus"), &config()).unwrap_err();
        assert!(matches!(err, TriageError::Validation(_)));
    }

    #[test]
    fn test_name_falls_back_through_aliases() {
        let entry = normalize_record(&json!({"disease_name": "", "name": "Ringworm"}), &config())
            .unwrap();
        assert_eq!(entry.name, "Ringworm");
        assert_eq!(entry.name_localized, "Ringworm");
    }

    #[test]
    fn test_unknown_species_defaults_to_dog() {
        let entry = normalize_record(&json!({"disease_name": "Mites", "species": "rabbit"}), &config())
            .unwrap();
        assert_eq!(entry.species, Species::Dog);
    }

    #[test]
    fn test_names_truncated_by_chars() {
        let long = "é".repeat(450);
        let entry = normalize_record(&json!({"disease_name": long}), &config()).unwrap();
        assert_eq!(entry.name.chars().count(), 400);
        assert_eq!(entry.name_localized.chars().count(), 400);
    }

    #[test]
    fn test_text_fields_not_truncated() {
        let long = "x".repeat(5000);
        let entry = normalize_record(&json!({"disease_name": "A", "summary": long}), &config())
            .unwrap();
        assert_eq!(entry.summary.len(), 5000);
    }

    #[test]
    fn test_truncate_chars_short_input() {
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abcdef", 3), "abc");
    }

    #[test]
    fn test_batch_skips_invalid_in_order() {
        let records = vec![
            json!({"disease_name": "A"}),
            json!({"species": "cat"}),
            json!({"disease_name": "B", "species": "cat"}),
        ];
        let batch = normalize_batch(&records, &config()).unwrap();
        assert_eq!(batch.entries.len(), 2);
        assert_eq!(batch.entries[0].name, "A");
        assert_eq!(batch.entries[1].name, "B");
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].index, 1);
    }

    #[test]
    fn test_batch_strict_mode_fails() {
        let strict = NormalizeConfig {
            skip_invalid_records: false,
            ..NormalizeConfig::default()
        };
        let records = vec![json!({"disease_name": "A"}), json!({})];
        let err = normalize_batch(&records, &strict).unwrap_err();
        assert!(err.to_string().contains("record #1"));
    }
}
