//! ExecutionPlan - serializable compiled order
//!
//! The handoff to the execution layer: tasks by name, in compiled order, each
//! with its direct upstream names.

use serde::{Deserialize, Serialize};

use super::compile::{topological_order, Cycle};
use super::registry::DependencyRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub flow: String,
    pub tasks: Vec<PlannedTask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedTask {
    /// Zero-based position in the execution order
    pub position: usize,
    pub name: String,
    /// Direct predecessors, in registration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upstream: Vec<String>,
}

impl ExecutionPlan {
    /// Compile `registry` into a plan for the flow called `flow`
    pub fn build(flow: &str, registry: &DependencyRegistry) -> Result<Self, Cycle> {
        let order = topological_order(registry)?;
        let tasks = order
            .into_iter()
            .enumerate()
            .map(|(position, slot)| PlannedTask {
                position,
                name: registry.task(slot).name().to_string(),
                upstream: registry
                    .predecessors(slot)
                    .map(|pred| registry.task(pred).name().to_string())
                    .collect(),
            })
            .collect();

        Ok(Self {
            flow: flow.to_string(),
            tasks,
        })
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Task names in execution order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.name.as_str())
    }

    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.name == name)
    }
}
