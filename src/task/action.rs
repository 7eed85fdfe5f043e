//! Task actions - the opaque work a task carries
//!
//! The scheduling core only stores actions; the execution layer invokes them
//! once it has a compiled order.

use std::fmt;

use anyhow::anyhow;
use serde_json::{Map, Value};

/// Named inputs handed to an action by the execution layer
pub type Inputs = Map<String, Value>;

/// Single-method executable capability behind every task
pub trait Action: Send + Sync {
    fn invoke(&self, inputs: &Inputs) -> anyhow::Result<Value>;
}

/// Action backed by a closure
pub struct FunctionAction<F> {
    func: F,
}

impl<F> FunctionAction<F>
where
    F: Fn(&Inputs) -> anyhow::Result<Value> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Action for FunctionAction<F>
where
    F: Fn(&Inputs) -> anyhow::Result<Value> + Send + Sync,
{
    fn invoke(&self, inputs: &Inputs) -> anyhow::Result<Value> {
        (self.func)(inputs)
    }
}

impl<F> fmt::Debug for FunctionAction<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FunctionAction")
    }
}

/// Action that yields a caller-supplied value
///
/// Looks up `name` in the inputs, falls back to `default`, and fails when
/// neither is present.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterAction {
    name: String,
    default: Option<Value>,
}

impl ParameterAction {
    pub fn new(name: impl Into<String>, default: Option<Value>) -> Self {
        Self {
            name: name.into(),
            default,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

impl Action for ParameterAction {
    fn invoke(&self, inputs: &Inputs) -> anyhow::Result<Value> {
        inputs
            .get(&self.name)
            .or(self.default.as_ref())
            .cloned()
            .ok_or_else(|| anyhow!("parameter '{}' has no value and no default", self.name))
    }
}

/// Action that always yields the same value
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantAction(pub Value);

impl Action for ConstantAction {
    fn invoke(&self, _inputs: &Inputs) -> anyhow::Result<Value> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn function_action_sees_inputs() {
        let action = FunctionAction::new(|inputs: &Inputs| {
            let n = inputs.get("n").and_then(Value::as_i64).unwrap_or(0);
            Ok(json!(n * 2))
        });

        let mut inputs = Inputs::new();
        inputs.insert("n".into(), json!(21));
        assert_eq!(action.invoke(&inputs).unwrap(), json!(42));
    }

    #[test]
    fn parameter_prefers_supplied_value() {
        let action = ParameterAction::new("limit", Some(json!(10)));

        let mut inputs = Inputs::new();
        assert_eq!(action.invoke(&inputs).unwrap(), json!(10));

        inputs.insert("limit".into(), json!(99));
        assert_eq!(action.invoke(&inputs).unwrap(), json!(99));
    }

    #[test]
    fn parameter_without_default_fails() {
        let action = ParameterAction::new("token", None);
        let err = action.invoke(&Inputs::new()).unwrap_err();
        assert!(err.to_string().contains("token"));
    }

    #[test]
    fn constant_ignores_inputs() {
        let action = ConstantAction(json!("done"));
        let mut inputs = Inputs::new();
        inputs.insert("x".into(), json!(1));
        assert_eq!(action.invoke(&inputs).unwrap(), json!("done"));
    }
}
