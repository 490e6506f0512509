use crate::config::IdConfig;
use crate::error::{Result, TriageError};

use super::NodeId;

/// Independent id sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Question and Result nodes (`actionable` rows).
    Action,
    /// Relational `response` rows, one per actionable.
    Response,
    /// Symptom entry points.
    EntryPoint,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Action => "action",
            Namespace::Response => "response",
            Namespace::EntryPoint => "entry_point",
        }
    }
}

/// Lowest id each namespace may hand out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdFloors {
    pub action: i64,
    pub response: i64,
    pub entry_point: i64,
}

impl Default for IdFloors {
    fn default() -> Self {
        Self::from(&IdConfig::default())
    }
}

impl From<&IdConfig> for IdFloors {
    fn from(config: &IdConfig) -> Self {
        Self {
            action: config.action_floor,
            response: config.response_floor,
            entry_point: config.entry_point_floor,
        }
    }
}

/// Monotonic per-namespace counters.
///
/// Owned by whoever builds a graph and passed down by `&mut`; ids are never
/// reused within one allocator's lifetime.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next_action: i64,
    next_response: i64,
    next_entry_point: i64,
}

impl IdAllocator {
    pub fn new(floors: IdFloors) -> Self {
        Self {
            next_action: floors.action,
            next_response: floors.response,
            next_entry_point: floors.entry_point,
        }
    }

    fn slot(&mut self, namespace: Namespace) -> &mut i64 {
        match namespace {
            Namespace::Action => &mut self.next_action,
            Namespace::Response => &mut self.next_response,
            Namespace::EntryPoint => &mut self.next_entry_point,
        }
    }

    /// Raise the counter above an id already present in the target store.
    pub fn observe(&mut self, namespace: Namespace, existing_max: i64) {
        let slot = self.slot(namespace);
        let floor = existing_max.saturating_add(1);
        if floor > *slot {
            log::debug!(
                "Raising {} counter from {} to {} (store max {})",
                namespace.as_str(),
                *slot,
                floor,
                existing_max
            );
            *slot = floor;
        }
    }

    /// Next id that would be handed out, without consuming it.
    pub fn peek(&self, namespace: Namespace) -> NodeId {
        NodeId(match namespace {
            Namespace::Action => self.next_action,
            Namespace::Response => self.next_response,
            Namespace::EntryPoint => self.next_entry_point,
        })
    }

    pub fn allocate(&mut self, namespace: Namespace) -> Result<NodeId> {
        let slot = self.slot(namespace);
        let id = *slot;
        *slot = id
            .checked_add(1)
            .ok_or(TriageError::IdExhausted(namespace.as_str()))?;
        Ok(NodeId(id))
    }
}
