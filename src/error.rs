//! Weft Error Types with Error Codes
//!
//! Error code ranges:
//! - WEFT-000-009: Definition errors (arguments, parsing, schema, IO)
//! - WEFT-010-019: Registration errors (names, context, lookup, ownership)
//! - WEFT-020-029: DAG errors (cycles, dangling references)

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WeftError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

fn format_cycle(cycle: &[String]) -> String {
    cycle.join(" -> ")
}

/// All error variants are part of the public API.
#[derive(Error, Debug)]
pub enum WeftError {
    // ═══════════════════════════════════════════
    // DEFINITION ERRORS (000-009)
    // ═══════════════════════════════════════════
    #[error("[WEFT-001] Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("[WEFT-002] Failed to parse flow definition: {details}")]
    ParseError { details: String },

    #[error("[WEFT-003] Invalid schema: expected '{expected}', got '{actual}'")]
    InvalidSchema { expected: String, actual: String },

    #[error("[WEFT-004] IO error: {0}")]
    Io(#[from] std::io::Error),

    // ═══════════════════════════════════════════
    // REGISTRATION ERRORS (010-019)
    // ═══════════════════════════════════════════
    #[error("[WEFT-010] Flow '{flow}' already has a different task named '{name}'")]
    DuplicateName { name: String, flow: String },

    #[error("[WEFT-011] No active flow for task '{task}': open a flow or register the task first")]
    NoActiveFlow { task: String },

    #[error("[WEFT-012] Task '{name}' not found in flow '{flow}'")]
    TaskNotFound { name: String, flow: String },

    #[error("[WEFT-013] Task '{task}' belongs to flow '{owner}' and cannot join flow '{flow}'")]
    ForeignTask {
        task: String,
        owner: String,
        flow: String,
    },

    // ═══════════════════════════════════════════
    // DAG ERRORS (020-029)
    // ═══════════════════════════════════════════
    #[error("[WEFT-020] Cycle detected in flow '{flow}': {}", format_cycle(.cycle))]
    CycleDetected { flow: String, cycle: Vec<String> },

    #[error("[WEFT-021] Missing dependency: task '{task}' references unknown task '{dependency}'")]
    MissingDependency { task: String, dependency: String },
}

impl WeftError {
    /// Get the error code (e.g., "WEFT-001")
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "WEFT-001",
            Self::ParseError { .. } => "WEFT-002",
            Self::InvalidSchema { .. } => "WEFT-003",
            Self::Io(_) => "WEFT-004",
            Self::DuplicateName { .. } => "WEFT-010",
            Self::NoActiveFlow { .. } => "WEFT-011",
            Self::TaskNotFound { .. } => "WEFT-012",
            Self::ForeignTask { .. } => "WEFT-013",
            Self::CycleDetected { .. } => "WEFT-020",
            Self::MissingDependency { .. } => "WEFT-021",
        }
    }

    pub(crate) fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }
}

impl From<serde_yaml::Error> for WeftError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::ParseError {
            details: err.to_string(),
        }
    }
}

impl FixSuggestion for WeftError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            WeftError::InvalidArgument { .. } => {
                Some("Give the flow a non-empty string name and each task at most one action")
            }
            WeftError::ParseError { .. } => Some("Check YAML syntax: indentation and quoting"),
            WeftError::InvalidSchema { .. } => Some("Use 'weft/flow@0.1' as the schema version"),
            WeftError::Io(_) => Some("Check file path and permissions"),
            WeftError::DuplicateName { .. } => {
                Some("Rename one of the tasks, or reuse the existing task object")
            }
            WeftError::NoActiveFlow { .. } => {
                Some("Declare edges inside Flow::scope, or add one of the tasks to a flow first")
            }
            WeftError::TaskNotFound { .. } => Some("Verify the task name matches exactly"),
            WeftError::ForeignTask { .. } => {
                Some("Link tasks of the same flow, or build a new task inside this flow")
            }
            WeftError::CycleDetected { .. } => {
                Some("Remove one of the edges in the reported cycle")
            }
            WeftError::MissingDependency { .. } => {
                Some("Declare the referenced task in the tasks: list")
            }
        }
    }
}
