//! Document-runtime encoding: a flat array of tagged Question/Result nodes.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, TriageError};
use crate::graph::{Graph, GraphNode, Next, QuestionNode, ResultNode};

use super::atomic::{commit, rotate_backup, stage};

/// `next_action_id` value the runtime reads as "stop here".
pub const TERMINATE_ID: i64 = 0;

#[derive(Serialize)]
#[serde(tag = "type")]
enum JsonNode<'a> {
    Question { id: i64, question: JsonQuestion<'a> },
    Result { id: i64, result: JsonResult<'a> },
}

#[derive(Serialize)]
struct JsonQuestion<'a> {
    text: &'a str,
    options: Vec<JsonOption<'a>>,
}

#[derive(Serialize)]
struct JsonOption<'a> {
    text: &'a str,
    next_action_id: i64,
}

#[derive(Serialize)]
struct JsonRiskCategory {
    id: i64,
    name: &'static str,
    desc: &'static str,
    rating: &'static str,
}

#[derive(Serialize)]
struct JsonResult<'a> {
    pet_type: &'static str,
    disease_name: &'a str,
    name_vi: &'a str,
    problem_text: &'a str,
    first_aid_text: &'a str,
    medications_text: &'a str,
    nutrition_text: &'a str,
    nutrition_advice: Option<&'a Value>,
    nutrition_id: Option<&'a str>,
    severity_score: Option<f64>,
    risk_category: JsonRiskCategory,
    reference_images: &'a [Value],
    needs_image: bool,
}

fn question_node(q: &QuestionNode) -> JsonNode<'_> {
    JsonNode::Question {
        id: q.id.get(),
        question: JsonQuestion {
            text: &q.text,
            options: q
                .options
                .iter()
                .map(|o| JsonOption {
                    text: &o.label,
                    next_action_id: match o.next {
                        Next::Node(id) => id.get(),
                        Next::Terminate => TERMINATE_ID,
                    },
                })
                .collect(),
        },
    }
}

fn result_node(r: &ResultNode) -> JsonNode<'_> {
    let e = &r.entry;
    JsonNode::Result {
        id: r.id.get(),
        result: JsonResult {
            pet_type: e.species.as_str(),
            disease_name: &e.name,
            name_vi: &e.name_localized,
            problem_text: &e.summary,
            first_aid_text: &e.first_aid,
            medications_text: &e.medications,
            nutrition_text: &e.nutrition_text,
            nutrition_advice: e.nutrition_advice.as_ref(),
            nutrition_id: e.nutrition_id.as_deref(),
            severity_score: e.severity_score,
            risk_category: JsonRiskCategory {
                id: r.risk.category_id(),
                name: r.risk.name(),
                desc: r.risk.description(),
                rating: r.risk.rating(),
            },
            reference_images: &r.reference_images,
            needs_image: e.needs_image,
        },
    }
}

/// Encode Question and Result nodes in graph order.
///
/// Entry points have no representation in the document runtime and are
/// skipped.
pub fn emit_nodes(graph: &Graph) -> Result<Vec<Value>> {
    let mut out = Vec::with_capacity(graph.nodes().len());
    for node in graph.nodes() {
        let encoded = match node {
            GraphNode::Question(q) => question_node(q),
            GraphNode::Result(r) => result_node(r),
            GraphNode::Symptom(_) => continue,
        };
        out.push(serde_json::to_value(encoded)?);
    }
    Ok(out)
}

/// Outcome of [`JsonStore::append`].
#[derive(Debug, Clone, Default)]
pub struct AppendOutcome {
    pub appended: usize,
    pub total: usize,
    pub backup: Option<PathBuf>,
}

/// The persisted node array plus its backup folder.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
    backup_dir: PathBuf,
}

impl JsonStore {
    pub fn new<P: AsRef<Path>, B: AsRef<Path>>(path: P, backup_dir: B) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            backup_dir: backup_dir.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the existing node array. A missing file is an empty store.
    ///
    /// Anything that does not parse as a JSON array (including an empty
    /// file left by an interrupted write) is reported as corrupt.
    pub fn load(&self) -> Result<Vec<Value>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let corrupt = |reason: String| TriageError::CorruptStore {
            path: self.path.clone(),
            reason,
        };
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Array(nodes)) => Ok(nodes),
            Ok(_) => Err(corrupt("top-level value is not an array".to_string())),
            Err(e) => Err(corrupt(e.to_string())),
        }
    }

    /// Highest integer `id` among persisted nodes.
    pub fn max_id(nodes: &[Value]) -> Option<i64> {
        nodes.iter().filter_map(|n| n.get("id")?.as_i64()).max()
    }

    /// Persist `existing` followed by `new_nodes`.
    ///
    /// Existing nodes are written back untouched. The combined array is staged
    /// and fsynced, the previous file is copied to the backup folder, then the
    /// staged file replaces it atomically. Appending nothing leaves the store
    /// alone.
    pub fn append(&self, existing: Vec<Value>, new_nodes: Vec<Value>) -> Result<AppendOutcome> {
        if new_nodes.is_empty() {
            log::info!("Nothing to append to {}", self.path.display());
            return Ok(AppendOutcome {
                appended: 0,
                total: existing.len(),
                backup: None,
            });
        }

        let appended = new_nodes.len();
        let mut nodes = existing;
        nodes.extend(new_nodes);

        let bytes = serde_json::to_vec_pretty(&nodes)?;
        let staged = stage(&self.path, &bytes)?;
        let backup = rotate_backup(&self.path, &self.backup_dir)?;
        commit(staged, &self.path)?;

        log::info!(
            "Appended {} nodes to {} ({} total)",
            appended,
            self.path.display(),
            nodes.len()
        );
        Ok(AppendOutcome {
            appended,
            total: nodes.len(),
            backup,
        })
    }
}
