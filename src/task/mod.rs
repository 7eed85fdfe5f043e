//! Task Module - units of work and their actions
//!
//! - `handle`: Task, TaskId, implicit registration, runs_before/runs_after
//! - `action`: Action trait and its concrete variants

mod action;
mod handle;

pub use action::{Action, ConstantAction, FunctionAction, Inputs, ParameterAction};
pub use handle::{Task, TaskId};
