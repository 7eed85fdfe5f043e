//! DAG Module - dependency storage and compilation
//!
//! Contains the graph representation and the algorithms over it:
//! - `registry`: DependencyRegistry, the arena-indexed node set and edges
//! - `compile`: topological order with cycle diagnosis
//! - `plan`: ExecutionPlan, the serializable compiled order
//!
//! Nothing here knows about the context stack; `Flow` wraps a registry and
//! adds names, locking and implicit registration.

mod compile;
mod plan;
mod registry;

// Re-export public types
pub use compile::{topological_order, Cycle};
pub use plan::{ExecutionPlan, PlannedTask};
pub use registry::{DependencyRegistry, NameConflict, Registration};
