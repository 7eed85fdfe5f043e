//! Flow Definition - YAML description of a flow
//!
//! ```yaml
//! schema: weft/flow@0.1
//! name: nightly-etl
//! tasks:
//!   - name: extract
//!   - name: threshold
//!     parameter: { default: 10 }
//!   - name: transform
//!     after: [extract, threshold]
//!   - name: load
//!     value: done
//! edges:
//!   - source: transform
//!     target: load
//! ```
//!
//! Building a definition opens the new flow and constructs every task with
//! `Task::new`, so tasks attach through implicit registration in file order.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, WeftError};
use crate::flow::Flow;
use crate::task::Task;

/// Expected schema version for flow definitions
pub const SCHEMA_V01: &str = "weft/flow@0.1";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlowDefinition {
    pub schema: String,
    /// Kept untyped so a missing or non-string name is reported as an
    /// invalid argument rather than a parse error
    #[serde(default)]
    pub name: Option<serde_yaml::Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tasks: Vec<TaskDefinition>,
    #[serde(default)]
    pub edges: Vec<EdgeDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskDefinition {
    pub name: String,
    #[serde(default)]
    pub parameter: Option<ParameterDefinition>,
    #[serde(default)]
    pub value: Option<Value>,
    /// Tasks that must run before this one
    #[serde(default)]
    pub after: Vec<String>,
    /// Tasks that must run after this one
    #[serde(default)]
    pub before: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterDefinition {
    #[serde(default)]
    pub default: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct EdgeDefinition {
    pub source: EdgeEndpoint,
    pub target: EdgeEndpoint,
}

/// Handles string OR array for source/target
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum EdgeEndpoint {
    Single(String),
    Multiple(Vec<String>),
}

impl EdgeEndpoint {
    pub fn as_vec(&self) -> Vec<&str> {
        match self {
            EdgeEndpoint::Single(s) => vec![s.as_str()],
            EdgeEndpoint::Multiple(v) => v.iter().map(String::as_str).collect(),
        }
    }
}

impl FlowDefinition {
    /// Parse YAML and check the schema tag
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let definition: Self = serde_yaml::from_str(yaml)?;
        definition.validate_schema()?;
        Ok(definition)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&yaml)
    }

    pub fn validate_schema(&self) -> Result<()> {
        if self.schema != SCHEMA_V01 {
            return Err(WeftError::InvalidSchema {
                expected: SCHEMA_V01.to_string(),
                actual: self.schema.clone(),
            });
        }
        Ok(())
    }

    /// The declared flow name, which must be present and a string
    pub fn flow_name(&self) -> Result<&str> {
        match &self.name {
            None | Some(serde_yaml::Value::Null) => {
                Err(WeftError::invalid_argument("Flow name is required"))
            }
            Some(serde_yaml::Value::String(name)) => Ok(name),
            Some(other) => Err(WeftError::invalid_argument(format!(
                "Name must be a string, got {}",
                yaml_kind(other)
            ))),
        }
    }

    /// Build the flow: tasks in file order, then `after`/`before`, then `edges`
    pub fn build(&self) -> Result<Flow> {
        let flow = Flow::new(self.flow_name()?)?;
        flow.scope(|flow| self.populate(flow))?;
        debug!(
            flow = %flow.name(),
            tasks = flow.len(),
            edges = flow.edge_count(),
            "built flow from definition"
        );
        Ok(flow)
    }

    fn populate(&self, flow: &Flow) -> Result<()> {
        let tasks = self
            .tasks
            .iter()
            .map(TaskDefinition::declare)
            .collect::<Result<Vec<_>>>()?;

        for (definition, task) in self.tasks.iter().zip(&tasks) {
            for upstream in &definition.after {
                resolve(flow, task.name(), upstream)?.runs_before(task)?;
            }
            for downstream in &definition.before {
                task.runs_before(&resolve(flow, task.name(), downstream)?)?;
            }
        }

        for edge in &self.edges {
            for source in edge.source.as_vec() {
                for target in edge.target.as_vec() {
                    let upstream = resolve(flow, target, source)?;
                    let downstream = resolve(flow, source, target)?;
                    upstream.runs_before(&downstream)?;
                }
            }
        }
        Ok(())
    }
}

impl TaskDefinition {
    /// Construct the task; it registers with the innermost open flow
    pub fn declare(&self) -> Result<Task> {
        match (&self.parameter, &self.value) {
            (Some(_), Some(_)) => Err(WeftError::invalid_argument(format!(
                "Task '{}' declares both parameter and value",
                self.name
            ))),
            (Some(parameter), None) => Task::parameter(&self.name, parameter.default.clone()),
            (None, value) => Task::constant(&self.name, value.clone().unwrap_or(Value::Null)),
        }
    }
}

fn resolve(flow: &Flow, referrer: &str, name: &str) -> Result<Task> {
    flow.get_task(name)
        .map_err(|_| WeftError::MissingDependency {
            task: referrer.to_string(),
            dependency: name.to_string(),
        })
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a boolean",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a list",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}
