//! Triage decision graph: node model, id allocation and construction.
//!
//! A graph holds, per disease, a linear path Question → Question → Result,
//! followed by one Symptom entry point per species that points at the first
//! Result of that species.

mod builder;
mod grouper;
mod ids;
mod verify;

pub use builder::{build_graph, GraphBuilder};
pub use grouper::group_symptoms;
pub use ids::{IdAllocator, IdFloors, Namespace};
pub use verify::verify_graph;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{DiseaseEntry, RiskTier, Species};

/// Identifier of a node within its namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl NodeId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an answer leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Node(NodeId),
    /// End of the flow, no further navigation.
    Terminate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOption {
    pub label: String,
    pub next: Next,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionNode {
    pub id: NodeId,
    pub text: String,
    pub options: Vec<AnswerOption>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultNode {
    pub id: NodeId,
    pub risk: RiskTier,
    pub entry: DiseaseEntry,
    pub reference_images: Vec<Value>,
}

/// Per-species entry point into the flows.
#[derive(Debug, Clone, PartialEq)]
pub struct SymptomNode {
    pub id: NodeId,
    pub species: Species,
    pub description: String,
    pub initial_node_id: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphNode {
    Question(QuestionNode),
    Result(ResultNode),
    Symptom(SymptomNode),
}

impl GraphNode {
    pub fn id(&self) -> NodeId {
        match self {
            GraphNode::Question(q) => q.id,
            GraphNode::Result(r) => r.id,
            GraphNode::Symptom(s) => s.id,
        }
    }

    /// Namespace the node's id was drawn from.
    pub fn namespace(&self) -> Namespace {
        match self {
            GraphNode::Question(_) | GraphNode::Result(_) => Namespace::Action,
            GraphNode::Symptom(_) => Namespace::EntryPoint,
        }
    }
}

/// One batch worth of nodes, in construction order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    nodes: Vec<GraphNode>,
    image_requests: Vec<NodeId>,
}

impl Graph {
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn questions(&self) -> impl Iterator<Item = &QuestionNode> {
        self.nodes.iter().filter_map(|n| match n {
            GraphNode::Question(q) => Some(q),
            _ => None,
        })
    }

    pub fn results(&self) -> impl Iterator<Item = &ResultNode> {
        self.nodes.iter().filter_map(|n| match n {
            GraphNode::Result(r) => Some(r),
            _ => None,
        })
    }

    pub fn entry_points(&self) -> impl Iterator<Item = &SymptomNode> {
        self.nodes.iter().filter_map(|n| match n {
            GraphNode::Symptom(s) => Some(s),
            _ => None,
        })
    }

    /// Result ids whose images still need a storage slot.
    pub fn image_requests(&self) -> &[NodeId] {
        &self.image_requests
    }

    /// Look up a Question or Result by id.
    pub fn action_node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes
            .iter()
            .find(|n| n.namespace() == Namespace::Action && n.id() == id)
    }

    /// Highest id in the given namespace, if any node uses it.
    pub fn max_id(&self, namespace: Namespace) -> Option<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.namespace() == namespace)
            .map(GraphNode::id)
            .max()
    }

    pub(crate) fn push(&mut self, node: GraphNode) {
        self.nodes.push(node);
    }

    pub(crate) fn request_image(&mut self, id: NodeId) {
        self.image_requests.push(id);
    }
}
