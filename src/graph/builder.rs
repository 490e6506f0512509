use serde_json::Value;

use crate::config::LabelConfig;
use crate::error::Result;
use crate::model::{DiseaseEntry, Species};

use super::{
    group_symptoms, AnswerOption, Graph, GraphNode, IdAllocator, Namespace, Next, NodeId,
    QuestionNode, ResultNode,
};

/// Incremental graph construction over one batch.
///
/// Entries must be added in input order; the first Result of each species
/// becomes that species' entry target.
pub struct GraphBuilder<'a> {
    ids: &'a mut IdAllocator,
    labels: &'a LabelConfig,
    graph: Graph,
    first_per_species: Vec<(Species, NodeId)>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(ids: &'a mut IdAllocator, labels: &'a LabelConfig) -> Self {
        Self {
            ids,
            labels,
            graph: Graph::default(),
            first_per_species: Vec::new(),
        }
    }

    fn options(&self, yes: NodeId) -> Vec<AnswerOption> {
        vec![
            AnswerOption { label: self.labels.yes.clone(), next: Next::Node(yes) },
            AnswerOption { label: self.labels.no.clone(), next: Next::Terminate },
        ]
    }

    /// Add one disease as Q1 → Q2 → Result. Returns the Result id.
    pub fn add_entry(&mut self, entry: DiseaseEntry) -> Result<NodeId> {
        let q1 = self.ids.allocate(Namespace::Action)?;
        let q2 = self.ids.allocate(Namespace::Action)?;
        let result_id = self.ids.allocate(Namespace::Action)?;

        let symptom_question = QuestionNode {
            id: q1,
            text: self.labels.symptom_question_for(&entry.name),
            options: self.options(q2),
        };
        let severity_question = QuestionNode {
            id: q2,
            text: self.labels.severity_question.clone(),
            options: self.options(result_id),
        };

        let reference_images = match &entry.images {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        let species = entry.species;
        let risk = entry.risk_tier();
        let needs_image = entry.needs_image;

        log::debug!(
            "'{}' ({}): q1={} q2={} result={} risk={:?}",
            entry.name,
            species,
            q1,
            q2,
            result_id,
            risk
        );

        self.graph.push(GraphNode::Question(symptom_question));
        self.graph.push(GraphNode::Question(severity_question));
        self.graph.push(GraphNode::Result(ResultNode {
            id: result_id,
            risk,
            entry,
            reference_images,
        }));

        if needs_image {
            self.graph.request_image(result_id);
        }

        if !self.first_per_species.iter().any(|(s, _)| *s == species) {
            self.first_per_species.push((species, result_id));
        }

        Ok(result_id)
    }

    /// Append the per-species entry points and return the graph.
    pub fn finish(mut self) -> Result<Graph> {
        for symptom in group_symptoms(&self.first_per_species, self.ids, self.labels)? {
            self.graph.push(GraphNode::Symptom(symptom));
        }
        Ok(self.graph)
    }
}

/// Build the whole graph for a batch of entries.
pub fn build_graph(
    entries: Vec<DiseaseEntry>,
    ids: &mut IdAllocator,
    labels: &LabelConfig,
) -> Result<Graph> {
    let mut builder = GraphBuilder::new(ids, labels);
    for entry in entries {
        builder.add_entry(entry)?;
    }
    builder.finish()
}
