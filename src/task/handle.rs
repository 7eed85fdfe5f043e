//! Task - identified, named unit of work
//!
//! A `Task` is a cheap handle (`Arc`). Identity is the [`TaskId`] allocated at
//! construction, never the name: two tasks called "load" are different tasks.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;

use super::action::{Action, ConstantAction, FunctionAction, Inputs, ParameterAction};
use crate::error::{Result, WeftError};
use crate::flow::{self, Flow, FlowShared};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique task identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

struct TaskInner {
    id: TaskId,
    name: String,
    action: Box<dyn Action>,
    /// The one flow this task is scheduled in; used to resolve edges and
    /// to refuse registration with a second live flow
    owner: Mutex<Weak<FlowShared>>,
}

impl Task {
    /// Create a task and register it with the innermost open flow, if any
    ///
    /// Fails with `DuplicateName` when the open flow already holds a
    /// different task with this name.
    pub fn new(name: impl Into<String>, action: impl Action + 'static) -> Result<Self> {
        let task = Self::detached(name, action);
        if let Some(flow) = flow::current_flow() {
            flow.add_task(&task)?;
        }
        Ok(task)
    }

    /// Create a task without consulting the context stack
    pub fn detached(name: impl Into<String>, action: impl Action + 'static) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                id: TaskId::next(),
                name: name.into(),
                action: Box::new(action),
                owner: Mutex::new(Weak::new()),
            }),
        }
    }

    /// Function-backed task
    pub fn from_fn<F>(name: impl Into<String>, func: F) -> Result<Self>
    where
        F: Fn(&Inputs) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self::new(name, FunctionAction::new(func))
    }

    /// Parameter task: yields the input supplied under its own name
    pub fn parameter(name: impl Into<String>, default: Option<Value>) -> Result<Self> {
        let name = name.into();
        let action = ParameterAction::new(name.clone(), default);
        Self::new(name, action)
    }

    pub fn constant(name: impl Into<String>, value: Value) -> Result<Self> {
        Self::new(name, ConstantAction(value))
    }

    #[inline]
    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn action(&self) -> &dyn Action {
        self.inner.action.as_ref()
    }

    /// Flow this task is registered with, while that flow is alive
    pub fn flow(&self) -> Option<Flow> {
        self.owner().upgrade().map(Flow::from_shared)
    }

    /// Make `flow` the owner
    ///
    /// Fails with the current owner when a different flow is still alive.
    /// A dropped owner no longer counts.
    pub(crate) fn claim(&self, flow: &Flow) -> std::result::Result<(), Flow> {
        let mut owner = self.owner();
        if let Some(current) = owner.upgrade().map(Flow::from_shared) {
            if !current.ptr_eq(flow) {
                return Err(current);
            }
        }
        *owner = flow.downgrade();
        Ok(())
    }

    // Only ever holds a `Weak`, so a poisoned lock is still consistent.
    fn owner(&self) -> MutexGuard<'_, Weak<FlowShared>> {
        self.inner
            .owner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Declare that this task must run before `downstream`
    pub fn runs_before(&self, downstream: &Task) -> Result<()> {
        declare_precedes(self, downstream)
    }

    /// Declare that this task must run after `upstream`
    pub fn runs_after(&self, upstream: &Task) -> Result<()> {
        declare_precedes(upstream, self)
    }
}

/// Resolve the flow for an edge and record it there
///
/// The owner of either task wins over the innermost open flow, so an edge
/// never drags an owned task into a second flow.
fn declare_precedes(upstream: &Task, downstream: &Task) -> Result<()> {
    let flow = upstream
        .flow()
        .or_else(|| downstream.flow())
        .or_else(flow::current_flow)
        .ok_or_else(|| WeftError::NoActiveFlow {
            task: downstream.name().to_string(),
        })?;
    flow.add_edge(upstream, downstream)
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Task {}

impl Hash for Task {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish()
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_is_not_the_name() {
        let a = Task::detached("same", ConstantAction(Value::Null));
        let b = Task::detached("same", ConstantAction(Value::Null));

        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
        assert_eq!(a, a.clone());
    }

    #[test]
    fn ids_increase() {
        let a = Task::detached("a", ConstantAction(Value::Null));
        let b = Task::detached("b", ConstantAction(Value::Null));
        assert!(b.id() > a.id());
        assert!(a.id().to_string().starts_with("task#"));
    }

    #[test]
    fn new_without_open_flow_stays_unregistered() {
        let task = Task::constant("lonely", json!(1)).unwrap();
        assert!(task.flow().is_none());
    }

    #[test]
    fn edge_without_any_flow_fails() {
        let a = Task::detached("a", ConstantAction(Value::Null));
        let b = Task::detached("b", ConstantAction(Value::Null));

        let err = a.runs_before(&b).unwrap_err();
        assert!(matches!(err, WeftError::NoActiveFlow { ref task } if task == "b"));
    }

    #[test]
    fn edge_outside_scope_uses_owner_flow() {
        let flow = Flow::new("owner").unwrap();
        let a = Task::detached("a", ConstantAction(Value::Null));
        let b = Task::detached("b", ConstantAction(Value::Null));
        flow.add_task(&a).unwrap();

        b.runs_after(&a).unwrap();

        assert!(flow.contains(&b));
        assert_eq!(flow.upstream_tasks(&b).unwrap(), vec![a]);
    }

    #[test]
    fn second_live_flow_is_refused() {
        let first = Flow::new("first").unwrap();
        let second = Flow::new("second").unwrap();
        let task = Task::detached("t", ConstantAction(Value::Null));

        first.add_task(&task).unwrap();
        let err = second.add_task(&task).unwrap_err();

        assert_eq!(err.code(), "WEFT-013");
        assert!(task.flow().unwrap().ptr_eq(&first));
        assert!(second.is_empty());
    }

    #[test]
    fn claim_reports_current_owner() {
        let first = Flow::new("first").unwrap();
        let second = Flow::new("second").unwrap();
        let task = Task::detached("t", ConstantAction(Value::Null));

        assert!(task.claim(&first).is_ok());
        assert!(task.claim(&first).is_ok());
        let owner = task.claim(&second).unwrap_err();
        assert!(owner.ptr_eq(&first));
    }

    #[test]
    fn edge_inside_other_scope_uses_owner() {
        let owner = Flow::new("owner").unwrap();
        let other = Flow::new("other").unwrap();
        let a = Task::detached("a", ConstantAction(Value::Null));
        let b = Task::detached("b", ConstantAction(Value::Null));
        owner.add_task(&a).unwrap();

        other.scope(|_| a.runs_before(&b)).unwrap();

        assert!(owner.contains(&b));
        assert!(other.is_empty());
    }

    #[test]
    fn owner_is_weak() {
        let task = Task::detached("t", ConstantAction(Value::Null));
        {
            let flow = Flow::new("short-lived").unwrap();
            flow.add_task(&task).unwrap();
            assert!(task.flow().is_some());
        }
        assert!(task.flow().is_none());

        let next = Flow::new("next").unwrap();
        next.add_task(&task).unwrap();
        assert!(task.flow().unwrap().ptr_eq(&next));
    }

    #[test]
    fn parameter_task_action_uses_its_name() {
        let task = Task::parameter("limit", Some(json!(5))).unwrap();
        let mut inputs = Inputs::new();
        inputs.insert("limit".into(), json!(7));
        assert_eq!(task.action().invoke(&inputs).unwrap(), json!(7));
    }
}
