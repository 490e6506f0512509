//! Structural checks run on a finished graph before anything is emitted.

use std::collections::HashSet;

use crate::error::{Result, TriageError};

use super::{Graph, GraphNode, Namespace, Next};

/// Check id uniqueness, reference integrity and per-disease shape.
///
/// Returns the first violation found.
pub fn verify_graph(graph: &Graph) -> Result<()> {
    let mut action_ids = HashSet::new();
    let mut entry_ids = HashSet::new();

    for node in graph.nodes() {
        let fresh = match node.namespace() {
            Namespace::EntryPoint => entry_ids.insert(node.id()),
            _ => action_ids.insert(node.id()),
        };
        if !fresh {
            return Err(TriageError::Graph(format!(
                "duplicate {} id {}",
                node.namespace().as_str(),
                node.id()
            )));
        }
    }

    for question in graph.questions() {
        for option in &question.options {
            if let Next::Node(target) = option.next {
                if !action_ids.contains(&target) {
                    return Err(TriageError::Graph(format!(
                        "question {} option '{}' points at missing node {}",
                        question.id, option.label, target
                    )));
                }
            }
        }
    }

    let mut seen_species = HashSet::new();
    for symptom in graph.entry_points() {
        if !seen_species.insert(symptom.species) {
            return Err(TriageError::Graph(format!(
                "more than one entry point for {}",
                symptom.species
            )));
        }
        match graph.action_node(symptom.initial_node_id) {
            Some(GraphNode::Result(_)) => {}
            _ => {
                return Err(TriageError::Graph(format!(
                    "entry point {} does not start at a result (node {})",
                    symptom.id, symptom.initial_node_id
                )))
            }
        }
    }

    let results = graph.results().count();
    let questions = graph.questions().count();
    if questions != results * 2 {
        return Err(TriageError::Graph(format!(
            "{} questions for {} results",
            questions, results
        )));
    }

    Ok(())
}
