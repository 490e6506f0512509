//! Image-pipeline seam: storage slots for results that need visual aids.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::graph::{Graph, NodeId};

/// Reserves a storage location keyed by a Result id.
pub trait ImageSlots {
    fn reserve(&mut self, result_id: NodeId) -> Result<()>;
}

/// One directory per result under a public image root.
pub struct DirectoryImageSlots {
    root: PathBuf,
}

impl DirectoryImageSlots {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn slot_path(&self, result_id: NodeId) -> PathBuf {
        self.root.join(result_id.to_string())
    }
}

impl ImageSlots for DirectoryImageSlots {
    fn reserve(&mut self, result_id: NodeId) -> Result<()> {
        let dir = self.slot_path(result_id);
        std::fs::create_dir_all(&dir)?;
        log::debug!("Reserved image folder {}", dir.display());
        Ok(())
    }
}

/// Forward every image request of `graph` to `slots`. Returns how many were sent.
pub fn reserve_image_slots(graph: &Graph, slots: &mut dyn ImageSlots) -> Result<usize> {
    for id in graph.image_requests() {
        slots.reserve(*id)?;
    }
    Ok(graph.image_requests().len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LabelConfig;
    use crate::graph::{build_graph, IdAllocator, IdFloors};
    use crate::model::{DiseaseEntry, Species};
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder(Vec<NodeId>);

    impl ImageSlots for Recorder {
        fn reserve(&mut self, result_id: NodeId) -> Result<()> {
            self.0.push(result_id);
            Ok(())
        }
    }

    fn graph() -> Graph {
        let mut mange = DiseaseEntry::new("Mange", Species::Dog);
        mange.needs_image = true;
        let mut ids = IdAllocator::new(IdFloors::default());
        build_graph(
            vec![DiseaseEntry::new("Otitis", Species::Dog), mange],
            &mut ids,
            &LabelConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_only_flagged_results_are_reserved() {
        let mut recorder = Recorder::default();
        let sent = reserve_image_slots(&graph(), &mut recorder).unwrap();
        assert_eq!(sent, 1);
        assert_eq!(recorder.0, vec![NodeId(10_005)]);
    }

    #[test]
    fn test_directory_slots_created() {
        let temp_dir = TempDir::new().unwrap();
        let mut slots = DirectoryImageSlots::new(temp_dir.path().join("images"));
        reserve_image_slots(&graph(), &mut slots).unwrap();
        assert!(slots.slot_path(NodeId(10_005)).is_dir());
        assert!(!slots.slot_path(NodeId(10_002)).exists());
    }
}
