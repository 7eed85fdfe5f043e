//! Weft - flow definition and scheduling core
//!
//! ## Module Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        DOMAIN MODEL                          │
//! │  task/      Task, TaskId, Action (+ function/param/const)    │
//! │  ast/       YAML → FlowDefinition → Flow                     │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      APPLICATION LAYER                       │
//! │  flow/      Flow container, thread-local context stack       │
//! │  dag/       DependencyRegistry, topological compiler, plan   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`task`] | Identified units of work carrying an opaque action |
//! | [`flow`] | Declaration API, implicit registration, compiled order |
//! | [`dag`] | Arena-indexed edges, Kahn's algorithm, cycle tracing |
//! | [`ast`] | Flow definition files |
//! | [`error`] | Error types with codes and fix suggestions |
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use weft::{Flow, Task};
//!
//! let flow = Flow::new("etl").unwrap();
//! flow.scope(|_| -> weft::Result<()> {
//!     let extract = Task::constant("extract", json!([1, 2, 3]))?;
//!     let load = Task::constant("load", json!(null))?;
//!     extract.runs_before(&load)?;
//!     Ok(())
//! })
//! .unwrap();
//!
//! let order: Vec<_> = flow.sorted_tasks().unwrap().iter().map(|t| t.name().to_string()).collect();
//! assert_eq!(order, ["extract", "load"]);
//! ```

// ═══════════════════════════════════════════════════════════════
// DOMAIN MODEL
// ═══════════════════════════════════════════════════════════════
pub mod ast;
pub mod task;

// ═══════════════════════════════════════════════════════════════
// APPLICATION LAYER
// ═══════════════════════════════════════════════════════════════
pub mod dag;
pub mod flow;

// ═══════════════════════════════════════════════════════════════
// CROSS-CUTTING
// ═══════════════════════════════════════════════════════════════
pub mod error;

// ═══════════════════════════════════════════════════════════════
// PUBLIC API RE-EXPORTS
// ═══════════════════════════════════════════════════════════════

pub use error::{FixSuggestion, Result, WeftError};

pub use ast::{FlowDefinition, SCHEMA_V01};
pub use dag::{ExecutionPlan, PlannedTask};
pub use flow::{Flow, FlowGuard};
pub use task::{Action, ConstantAction, FunctionAction, Inputs, ParameterAction, Task, TaskId};
