//! Graph encoders and their persistence.
//!
//! Both encoders are pure functions of a finished [`Graph`](crate::graph::Graph);
//! writing the output is a separate step.

pub mod atomic;
pub mod json;
pub mod sql;

pub use atomic::{rotate_backup, write_atomic};
pub use json::{emit_nodes, JsonStore};
pub use sql::{Dialect, RelationalEmitter, SqlScript};
