use crate::config::LabelConfig;
use crate::error::Result;
use crate::model::Species;

use super::{IdAllocator, Namespace, NodeId, SymptomNode};

fn group_description(species: Species, labels: &LabelConfig) -> String {
    match species {
        Species::Dog => labels.dog_group.clone(),
        Species::Cat => labels.cat_group.clone(),
    }
}

/// One entry point per species, in the order species first appeared.
pub fn group_symptoms(
    first_per_species: &[(Species, NodeId)],
    ids: &mut IdAllocator,
    labels: &LabelConfig,
) -> Result<Vec<SymptomNode>> {
    let mut symptoms = Vec::with_capacity(first_per_species.len());
    for &(species, initial_node_id) in first_per_species {
        let id = ids.allocate(Namespace::EntryPoint)?;
        log::debug!("Entry point {} for {} -> {}", id, species, initial_node_id);
        symptoms.push(SymptomNode {
            id,
            species,
            description: group_description(species, labels),
            initial_node_id,
        });
    }
    Ok(symptoms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::IdFloors;

    #[test]
    fn test_groups_in_given_order() {
        let mut ids = IdAllocator::new(IdFloors::default());
        let labels = LabelConfig::default();
        let symptoms = group_symptoms(
            &[(Species::Cat, NodeId(10_002)), (Species::Dog, NodeId(10_005))],
            &mut ids,
            &labels,
        )
        .unwrap();

        assert_eq!(symptoms.len(), 2);
        assert_eq!(symptoms[0].id, NodeId(5_000));
        assert_eq!(symptoms[0].species, Species::Cat);
        assert_eq!(symptoms[0].description, labels.cat_group);
        assert_eq!(symptoms[0].initial_node_id, NodeId(10_002));
        assert_eq!(symptoms[1].id, NodeId(5_001));
        assert_eq!(symptoms[1].initial_node_id, NodeId(10_005));
    }

    #[test]
    fn test_empty_input_allocates_nothing() {
        let mut ids = IdAllocator::new(IdFloors::default());
        let symptoms = group_symptoms(&[], &mut ids, &LabelConfig::default()).unwrap();
        assert!(symptoms.is_empty());
        assert_eq!(ids.peek(Namespace::EntryPoint), NodeId(5_000));
    }
}
