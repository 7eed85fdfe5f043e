//! AST Module - YAML flow definitions
//!
//! Contains parsed Rust types from YAML flow definition files:
//! - `definition`: FlowDefinition, TaskDefinition, EdgeDefinition, EdgeEndpoint
//!
//! These types represent the "what" - static structure parsed from YAML.
//! `FlowDefinition::build` turns them into a live `Flow`.

mod definition;

// Re-export all public types
pub use definition::{
    EdgeDefinition, EdgeEndpoint, FlowDefinition, ParameterDefinition, TaskDefinition, SCHEMA_V01,
};
