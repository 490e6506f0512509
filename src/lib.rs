pub mod config;
pub mod error;
pub mod model;
pub mod ingest;
pub mod graph;
pub mod emit;
pub mod db;
pub mod images;
pub mod pipeline;

pub use config::Config;
pub use error::{TriageError, Result};
pub use graph::{build_graph, verify_graph, Graph, IdAllocator};
