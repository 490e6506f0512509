//! Relational encoding: idempotent INSERT statements for the runtime schema.
//!
//! Each Question/Result becomes an `actionable` row plus one `response` row;
//! questions add a `question` row and one `option` row per answer, results a
//! `result` row. Entry points become `symptom` rows.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::Local;
use serde_json::Value;

use crate::error::{Result, TriageError};
use crate::graph::{Graph, GraphNode, IdAllocator, IdFloors, Namespace, Next, NodeId};

/// Target SQL flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    fn relax_constraints(&self) -> &'static str {
        match self {
            Dialect::Postgres => "SET session_replication_role = replica;",
            Dialect::Sqlite => "PRAGMA foreign_keys = OFF;",
        }
    }

    fn restore_constraints(&self) -> &'static str {
        match self {
            Dialect::Postgres => "SET session_replication_role = DEFAULT;",
            Dialect::Sqlite => "PRAGMA foreign_keys = ON;",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }
}

impl FromStr for Dialect {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            other => Err(TriageError::InvalidInput(format!("unknown SQL dialect: {}", other))),
        }
    }
}

/// Quote a text literal: single quotes doubled, NUL characters dropped.
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\0', "").replace('\'', "''"))
}

/// A rendered-on-demand seed script.
///
/// `prologue` relaxes referential enforcement and `epilogue` restores it;
/// statements are grouped per table in dependency order.
#[derive(Debug, Clone)]
pub struct SqlScript {
    pub dialect: Dialect,
    pub header: Vec<String>,
    pub prologue: Vec<String>,
    pub sections: Vec<(&'static str, Vec<String>)>,
    pub epilogue: Vec<String>,
}

impl SqlScript {
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.sections
            .iter()
            .flat_map(|(_, stmts)| stmts.iter().map(String::as_str))
    }

    pub fn statement_count(&self) -> usize {
        self.sections.iter().map(|(_, s)| s.len()).sum()
    }

    /// Rows per table, in emission order.
    pub fn table_counts(&self) -> Vec<(&'static str, usize)> {
        self.sections.iter().map(|(t, s)| (*t, s.len())).collect()
    }

    pub fn render(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        lines.extend(self.header.iter().map(|h| format!("-- {}", h)));
        lines.push(String::new());
        lines.extend(self.prologue.iter().cloned());
        lines.push(String::new());
        for (table, stmts) in &self.sections {
            if stmts.is_empty() {
                continue;
            }
            lines.push(format!("-- {} ({} rows)", table, stmts.len()));
            lines.extend(stmts.iter().cloned());
            lines.push(String::new());
        }
        lines.extend(self.epilogue.iter().cloned());
        lines.push(String::new());
        lines.join("\n")
    }
}

/// Encodes a graph as idempotent inserts.
///
/// Response ids come from a counter private to each [`emit`](Self::emit)
/// call, so emitting the same graph twice yields the same rows.
#[derive(Debug, Clone)]
pub struct RelationalEmitter {
    dialect: Dialect,
    response_start: NodeId,
}

impl RelationalEmitter {
    pub fn new(dialect: Dialect, response_start: NodeId) -> Self {
        Self { dialect, response_start }
    }

    /// Start response ids where `ids` would hand out its next one.
    pub fn from_allocator(dialect: Dialect, ids: &IdAllocator) -> Self {
        Self::new(dialect, ids.peek(Namespace::Response))
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn json_literal(&self, value: Option<&Value>) -> Result<String> {
        let Some(value) = value else {
            return Ok("NULL".to_string());
        };
        let text = serde_json::to_string(value)?;
        Ok(match self.dialect {
            Dialect::Postgres => format!("{}::jsonb", quote_literal(&text)),
            Dialect::Sqlite => quote_literal(&text),
        })
    }

    pub fn emit(&self, graph: &Graph) -> Result<SqlScript> {
        let mut responses = IdAllocator::new(IdFloors {
            action: 1,
            response: self.response_start.get(),
            entry_point: 1,
        });

        let mut response_of: HashMap<NodeId, NodeId> = HashMap::new();
        let mut actionable = Vec::new();
        let mut response = Vec::new();
        let mut question = Vec::new();
        let mut option = Vec::new();
        let mut result = Vec::new();
        let mut symptom = Vec::new();

        for node in graph.nodes() {
            let kind = match node {
                GraphNode::Question(_) => "Question",
                GraphNode::Result(_) => "Result",
                GraphNode::Symptom(_) => continue,
            };
            let a_id = node.id();
            let r_id = responses.allocate(Namespace::Response)?;
            response_of.insert(a_id, r_id);
            actionable.push(format!(
                "INSERT INTO actionable (id, type) VALUES ({}, '{}') ON CONFLICT DO NOTHING;",
                a_id, kind
            ));
            response.push(format!(
                "INSERT INTO response (id, action_id) VALUES ({}, {}) ON CONFLICT DO NOTHING;",
                r_id, a_id
            ));
        }

        let response_for = |id: NodeId| {
            response_of
                .get(&id)
                .copied()
                .ok_or_else(|| TriageError::Graph(format!("no response allocated for node {}", id)))
        };

        for node in graph.nodes() {
            match node {
                GraphNode::Question(q) => {
                    let r_id = response_for(q.id)?;
                    question.push(format!(
                        "INSERT INTO question (actionable_id, text) VALUES ({}, {}) ON CONFLICT DO NOTHING;",
                        q.id,
                        quote_literal(&q.text)
                    ));
                    for opt in &q.options {
                        let next = match opt.next {
                            Next::Node(id) => id.to_string(),
                            Next::Terminate => "NULL".to_string(),
                        };
                        option.push(format!(
                            "INSERT INTO option (response_id, text, next_action_id) VALUES ({}, {}, {}) ON CONFLICT DO NOTHING;",
                            r_id,
                            quote_literal(&opt.label),
                            next
                        ));
                    }
                }
                GraphNode::Result(r) => {
                    let e = &r.entry;
                    result.push(format!(
                        "INSERT INTO result (response_id, risk_category_id, problem_text, first_aid_text, \
                         disease_name, name_vi, medications_text, nutrition_text, nutrition_advice, images_json) \
                         VALUES ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}) ON CONFLICT DO NOTHING;",
                        response_for(r.id)?,
                        r.risk.category_id(),
                        quote_literal(&e.summary),
                        quote_literal(&e.first_aid),
                        quote_literal(&e.name),
                        quote_literal(&e.name_localized),
                        quote_literal(&e.medications),
                        quote_literal(&e.nutrition_text),
                        self.json_literal(e.nutrition_advice.as_ref())?,
                        self.json_literal(e.images.as_ref())?,
                    ));
                }
                GraphNode::Symptom(s) => {
                    symptom.push(format!(
                        "INSERT INTO symptom (id, animal_id, description, initial_action_id) \
                         VALUES ({}, {}, {}, {}) ON CONFLICT DO NOTHING;",
                        s.id,
                        s.species.animal_id(),
                        quote_literal(&s.description),
                        s.initial_node_id
                    ));
                }
            }
        }

        let diseases = result.len();
        let header = vec![
            "============================================================".to_string(),
            format!("Auto-generated: {}", Local::now().format("%Y-%m-%d %H:%M:%S")),
            format!("Dialect: {}", self.dialect.as_str()),
            format!("Total diseases: {}", diseases),
            format!("Entry points: {}", symptom.len()),
            "============================================================".to_string(),
        ];

        Ok(SqlScript {
            dialect: self.dialect,
            header,
            prologue: vec![self.dialect.relax_constraints().to_string()],
            sections: vec![
                ("actionable", actionable),
                ("response", response),
                ("question", question),
                ("option", option),
                ("result", result),
                ("symptom", symptom),
            ],
            epilogue: vec![self.dialect.restore_constraints().to_string()],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LabelConfig;
    use crate::graph::build_graph;
    use crate::model::{DiseaseEntry, Species};
    use serde_json::json;

    fn graph() -> Graph {
        let mut dog = DiseaseEntry::new("Parvovirus", Species::Dog).with_severity(9.0);
        dog.summary = "Owner's note: bloody\0 diarrhea".to_string();
        dog.nutrition_advice = Some(json!({"avoid": ["fat"]}));
        let cat = DiseaseEntry::new("Flea Allergy", Species::Cat).with_severity(2.0);
        let mut ids = IdAllocator::new(IdFloors::default());
        build_graph(vec![dog, cat], &mut ids, &LabelConfig::default()).unwrap()
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("it's"), "'it''s'");
        assert_eq!(quote_literal("a\0b"), "'ab'");
        assert_eq!(quote_literal(""), "''");
    }

    #[test]
    fn test_table_counts_and_order() {
        let script = RelationalEmitter::new(Dialect::Postgres, NodeId(10_000))
            .emit(&graph())
            .unwrap();
        assert_eq!(
            script.table_counts(),
            vec![
                ("actionable", 6),
                ("response", 6),
                ("question", 4),
                ("option", 8),
                ("result", 2),
                ("symptom", 2),
            ]
        );
        assert!(script.statements().all(|s| s.ends_with("ON CONFLICT DO NOTHING;")));
    }

    #[test]
    fn test_prologue_and_epilogue_bracket_script() {
        let rendered = RelationalEmitter::new(Dialect::Postgres, NodeId(10_000))
            .emit(&graph())
            .unwrap()
            .render();
        let relax = rendered.find("SET session_replication_role = replica;").unwrap();
        let first_insert = rendered.find("INSERT INTO").unwrap();
        let restore = rendered.find("SET session_replication_role = DEFAULT;").unwrap();
        let last_insert = rendered.rfind("INSERT INTO").unwrap();
        assert!(relax < first_insert);
        assert!(restore > last_insert);

        let sqlite = RelationalEmitter::new(Dialect::Sqlite, NodeId(10_000))
            .emit(&Graph::default())
            .unwrap();
        assert_eq!(sqlite.prologue, vec!["PRAGMA foreign_keys = OFF;"]);
        assert_eq!(sqlite.epilogue, vec!["PRAGMA foreign_keys = ON;"]);
        assert_eq!(sqlite.statement_count(), 0);
    }

    #[test]
    fn test_option_rows_reference_own_response() {
        let script = RelationalEmitter::new(Dialect::Sqlite, NodeId(20_000))
            .emit(&graph())
            .unwrap();
        let options: Vec<&str> = script.sections[3].1.iter().map(String::as_str).collect();
        assert_eq!(
            options[0],
            "INSERT INTO option (response_id, text, next_action_id) VALUES (20000, 'Yes', 10001) ON CONFLICT DO NOTHING;"
        );
        assert!(options[1].contains("(20000, 'No', NULL)"));
        assert!(options[2].contains("(20001, 'Yes', 10002)"));
    }

    #[test]
    fn test_result_row_escaping_and_json() {
        let pg = RelationalEmitter::new(Dialect::Postgres, NodeId(10_000))
            .emit(&graph())
            .unwrap();
        let first_result = &pg.sections[4].1[0];
        assert!(first_result.starts_with("INSERT INTO result (response_id, risk_category_id"));
        assert!(first_result.contains("VALUES (10002, 1, 'Owner''s note: bloody diarrhea'"));
        assert!(first_result.contains("'{\"avoid\":[\"fat\"]}'::jsonb, NULL)"));

        let lite = RelationalEmitter::new(Dialect::Sqlite, NodeId(10_000))
            .emit(&graph())
            .unwrap();
        assert!(!lite.render().contains("::jsonb"));
    }

    #[test]
    fn test_symptom_rows() {
        let script = RelationalEmitter::new(Dialect::Postgres, NodeId(10_000))
            .emit(&graph())
            .unwrap();
        let symptoms = &script.sections[5].1;
        assert!(symptoms[0].contains("VALUES (5000, 1, 'All disease symptoms (Dog)', 10002)"));
        assert!(symptoms[1].contains("VALUES (5001, 2, 'All disease symptoms (Cat)', 10005)"));
    }

    #[test]
    fn test_emit_is_repeatable() {
        let emitter = RelationalEmitter::new(Dialect::Sqlite, NodeId(10_000));
        let g = graph();
        let a: Vec<String> = emitter.emit(&g).unwrap().statements().map(String::from).collect();
        let b: Vec<String> = emitter.emit(&g).unwrap().statements().map(String::from).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("PostgreSQL".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("sqlite".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert!("mysql".parse::<Dialect>().is_err());
    }
}
