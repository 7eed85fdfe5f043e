//! Flow - named container of tasks and their dependency edges
//!
//! `Flow` is a cheap handle to shared state. The registry sits behind a
//! `RwLock`: construction is single-writer, while compiles and queries take
//! read locks and may run from several threads at once.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use tracing::debug;

use super::context::{self, FlowGuard};
use crate::dag::{topological_order, Cycle, DependencyRegistry, ExecutionPlan};
use crate::error::{Result, WeftError};
use crate::task::{Task, TaskId};

#[derive(Clone)]
pub struct Flow {
    shared: Arc<FlowShared>,
}

pub(crate) struct FlowShared {
    name: String,
    registry: RwLock<DependencyRegistry>,
}

impl Flow {
    /// Create an empty flow
    ///
    /// The name must contain at least one non-whitespace character.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(WeftError::invalid_argument(
                "Flow name must be a non-empty string",
            ));
        }

        debug!(flow = %name, "created flow");
        Ok(Self {
            shared: Arc::new(FlowShared {
                name,
                registry: RwLock::new(DependencyRegistry::new()),
            }),
        })
    }

    pub(crate) fn from_shared(shared: Arc<FlowShared>) -> Self {
        Self { shared }
    }

    pub(crate) fn downgrade(&self) -> Weak<FlowShared> {
        Arc::downgrade(&self.shared)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// True when both handles point at the same flow
    pub fn ptr_eq(&self, other: &Flow) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    // ═══════════════════════════════════════════
    // SCOPES
    // ═══════════════════════════════════════════

    /// Make this the innermost open flow on the current thread
    ///
    /// Tasks constructed with [`Task::new`] while the guard lives register
    /// here.
    pub fn open(&self) -> FlowGuard {
        context::enter(self)
    }

    /// Run `build` with this flow open, closing it on every exit path
    pub fn scope<R>(&self, build: impl FnOnce(&Flow) -> R) -> R {
        let _guard = self.open();
        build(self)
    }

    // ═══════════════════════════════════════════
    // DECLARATION
    // ═══════════════════════════════════════════

    /// Register `task`; a no-op if it is already a member
    ///
    /// Fails with `DuplicateName` when a different task holds the name, and
    /// with `ForeignTask` when another live flow owns the task.
    pub fn add_task(&self, task: &Task) -> Result<()> {
        self.declare(&[task], &[])
    }

    /// Declare that `upstream` must run before `downstream`
    ///
    /// Registers either task if needed. Cycles are not checked here; they
    /// surface from [`Flow::sorted_tasks`].
    pub fn add_edge(&self, upstream: &Task, downstream: &Task) -> Result<()> {
        self.declare(&[upstream, downstream], &[(upstream, downstream)])
    }

    /// Declare all edges around `task` at once
    pub fn set_dependencies(
        &self,
        task: &Task,
        upstream: &[Task],
        downstream: &[Task],
    ) -> Result<()> {
        let tasks: Vec<&Task> = std::iter::once(task)
            .chain(upstream)
            .chain(downstream)
            .collect();
        let edges: Vec<(&Task, &Task)> = upstream
            .iter()
            .map(|up| (up, task))
            .chain(downstream.iter().map(|down| (task, down)))
            .collect();
        self.declare(&tasks, &edges)
    }

    /// Register `tasks` in order, then record `edges`
    ///
    /// Nothing is mutated unless every task is admitted.
    fn declare(&self, tasks: &[&Task], edges: &[(&Task, &Task)]) -> Result<()> {
        let mut registry = self.write();
        self.admit(&registry, tasks)?;

        for &task in tasks {
            self.register(&mut registry, task)?;
        }
        for &(upstream, downstream) in edges {
            let up = self.slot_of(&registry, upstream)?;
            let down = self.slot_of(&registry, downstream)?;
            if registry.add_predecessor(down, up) {
                debug!(
                    flow = %self.name(),
                    upstream = %upstream.name(),
                    downstream = %downstream.name(),
                    "declared edge"
                );
            }
        }
        Ok(())
    }

    fn admit(&self, registry: &DependencyRegistry, tasks: &[&Task]) -> Result<()> {
        // names claimed by tasks that are not members yet
        let mut incoming: HashMap<&str, TaskId> = HashMap::new();
        for &task in tasks {
            let member = registry
                .check(task)
                .map_err(|_| self.duplicate(task))?
                .is_some();
            if member {
                continue;
            }
            if let Some(owner) = task.flow().filter(|owner| !owner.ptr_eq(self)) {
                return Err(self.foreign(task, &owner));
            }
            if *incoming.entry(task.name()).or_insert(task.id()) != task.id() {
                return Err(self.duplicate(task));
            }
        }
        Ok(())
    }

    fn register(&self, registry: &mut DependencyRegistry, task: &Task) -> Result<()> {
        if registry.slot_of(task.id()).is_some() {
            return Ok(());
        }
        task.claim(self).map_err(|owner| self.foreign(task, &owner))?;
        let slot = registry
            .register(task)
            .map_err(|_| self.duplicate(task))?
            .slot();
        debug!(flow = %self.name(), task = %task.name(), slot, "registered task");
        Ok(())
    }

    // ═══════════════════════════════════════════
    // LOOKUP & QUERIES
    // ═══════════════════════════════════════════

    /// Task registered under exactly `name`
    pub fn get_task(&self, name: &str) -> Result<Task> {
        let registry = self.read();
        registry
            .slot_by_name(name)
            .map(|slot| registry.task(slot).clone())
            .ok_or_else(|| self.not_found(name))
    }

    pub fn contains(&self, task: &Task) -> bool {
        self.read().slot_of(task.id()).is_some()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.read().edge_count()
    }

    /// Members in registration order
    pub fn tasks(&self) -> Vec<Task> {
        self.read().tasks().to_vec()
    }

    /// `(upstream, downstream)` pairs, grouped by downstream in registration order
    pub fn edges(&self) -> Vec<(Task, Task)> {
        let registry = self.read();
        registry
            .edges()
            .map(|(up, down)| (registry.task(up).clone(), registry.task(down).clone()))
            .collect()
    }

    /// Direct predecessors of `task`
    pub fn upstream_tasks(&self, task: &Task) -> Result<Vec<Task>> {
        let registry = self.read();
        let slot = self.slot_of(&registry, task)?;
        Ok(registry
            .predecessors(slot)
            .map(|pred| registry.task(pred).clone())
            .collect())
    }

    /// Direct dependents of `task`
    pub fn downstream_tasks(&self, task: &Task) -> Result<Vec<Task>> {
        let registry = self.read();
        let slot = self.slot_of(&registry, task)?;
        Ok(registry
            .tasks()
            .iter()
            .enumerate()
            .filter(|&(other, _)| registry.predecessors(other).any(|pred| pred == slot))
            .map(|(_, t)| t.clone())
            .collect())
    }

    /// Tasks without predecessors
    pub fn root_tasks(&self) -> Vec<Task> {
        let registry = self.read();
        registry
            .tasks()
            .iter()
            .enumerate()
            .filter(|&(slot, _)| registry.in_degree(slot) == 0)
            .map(|(_, t)| t.clone())
            .collect()
    }

    /// Tasks nothing depends on
    pub fn terminal_tasks(&self) -> Vec<Task> {
        let registry = self.read();
        registry
            .dependents()
            .iter()
            .zip(registry.tasks())
            .filter(|(dependents, _)| dependents.is_empty())
            .map(|(_, t)| t.clone())
            .collect()
    }

    /// Tasks that can run once the named tasks have completed
    ///
    /// Completed tasks are excluded; the rest are returned in registration
    /// order when all their predecessors are in `completed`.
    pub fn ready_tasks(&self, completed: &HashSet<String>) -> Vec<Task> {
        let registry = self.read();
        let done = |slot: usize| completed.contains(registry.task(slot).name());
        (0..registry.len())
            .filter(|&slot| !done(slot))
            .filter(|&slot| registry.predecessors(slot).all(done))
            .map(|slot| registry.task(slot).clone())
            .collect()
    }

    // ═══════════════════════════════════════════
    // COMPILATION
    // ═══════════════════════════════════════════

    /// Execution order: every task after all of its predecessors
    ///
    /// Deterministic for an unmodified flow; ties follow registration order.
    /// Fails with `CycleDetected` naming one cycle.
    pub fn sorted_tasks(&self) -> Result<Vec<Task>> {
        let registry = self.read();
        let order = topological_order(&registry)
            .map_err(|cycle| self.cycle_error(&registry, &cycle))?;
        debug!(flow = %self.name(), tasks = order.len(), "compiled execution order");
        Ok(order
            .into_iter()
            .map(|slot| registry.task(slot).clone())
            .collect())
    }

    /// Check the flow compiles without keeping the order
    pub fn validate(&self) -> Result<()> {
        self.sorted_tasks().map(|_| ())
    }

    /// Compiled order as a serializable plan for the execution layer
    pub fn plan(&self) -> Result<ExecutionPlan> {
        let registry = self.read();
        ExecutionPlan::build(self.name(), &registry)
            .map_err(|cycle| self.cycle_error(&registry, &cycle))
    }

    // ═══════════════════════════════════════════
    // INTERNALS
    // ═══════════════════════════════════════════

    // Every mutation leaves the registry consistent, so a poisoned lock is
    // still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, DependencyRegistry> {
        self.shared
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DependencyRegistry> {
        self.shared
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn slot_of(&self, registry: &DependencyRegistry, task: &Task) -> Result<usize> {
        registry
            .slot_of(task.id())
            .ok_or_else(|| self.not_found(task.name()))
    }

    fn not_found(&self, name: &str) -> WeftError {
        WeftError::TaskNotFound {
            name: name.to_string(),
            flow: self.name().to_string(),
        }
    }

    fn duplicate(&self, task: &Task) -> WeftError {
        WeftError::DuplicateName {
            name: task.name().to_string(),
            flow: self.name().to_string(),
        }
    }

    fn foreign(&self, task: &Task, owner: &Flow) -> WeftError {
        WeftError::ForeignTask {
            task: task.name().to_string(),
            owner: owner.name().to_string(),
            flow: self.name().to_string(),
        }
    }

    fn cycle_error(&self, registry: &DependencyRegistry, cycle: &Cycle) -> WeftError {
        WeftError::CycleDetected {
            flow: self.name().to_string(),
            cycle: cycle.names(registry),
        }
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("name", &self.name())
            .field("tasks", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::ConstantAction;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn task(name: &str) -> Task {
        Task::detached(name, ConstantAction(Value::Null))
    }

    fn names(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(Task::name).collect()
    }

    #[test]
    fn blank_name_is_invalid() {
        for name in ["", "   "] {
            let err = Flow::new(name).unwrap_err();
            assert_eq!(err.code(), "WEFT-001");
        }
        assert_eq!(Flow::new("test").unwrap().name(), "test");
    }

    #[test]
    fn add_task_is_idempotent() {
        let flow = Flow::new("f").unwrap();
        let a = task("a");
        flow.add_task(&a).unwrap();
        flow.add_task(&a).unwrap();
        assert_eq!(flow.len(), 1);
    }

    #[test]
    fn duplicate_name_rejected() {
        let flow = Flow::new("f").unwrap();
        flow.add_task(&task("a")).unwrap();

        let err = flow.add_task(&task("a")).unwrap_err();
        assert!(matches!(err, WeftError::DuplicateName { ref name, .. } if name == "a"));
        assert_eq!(flow.len(), 1);
    }

    #[test]
    fn add_edge_registers_both_ends() {
        let flow = Flow::new("f").unwrap();
        let a = task("a");
        let b = task("b");

        flow.add_edge(&a, &b).unwrap();

        assert_eq!(names(&flow.tasks()), vec!["a", "b"]);
        assert_eq!(flow.edge_count(), 1);
        assert_eq!(flow.edges(), vec![(a.clone(), b.clone())]);
        assert!(a.flow().unwrap().ptr_eq(&flow));
    }

    #[test]
    fn failed_edge_changes_nothing() {
        let flow = Flow::new("f").unwrap();
        flow.add_task(&task("b")).unwrap();
        let a = task("a");
        let b_dup = task("b");

        let err = flow.add_edge(&a, &b_dup).unwrap_err();

        assert_eq!(err.code(), "WEFT-010");
        assert_eq!(flow.len(), 1);
        assert_eq!(flow.edge_count(), 0);
        assert!(!flow.contains(&a));
        assert!(a.flow().is_none());
        assert!(b_dup.flow().is_none());
    }

    #[test]
    fn edge_between_new_namesakes_rejected() {
        let flow = Flow::new("f").unwrap();
        let (first, second) = (task("same"), task("same"));

        let err = flow.add_edge(&first, &second).unwrap_err();

        assert!(matches!(err, WeftError::DuplicateName { .. }));
        assert!(flow.is_empty());
        assert!(first.flow().is_none());
    }

    #[test]
    fn failed_set_dependencies_changes_nothing() {
        let owner = Flow::new("owner").unwrap();
        let taken = task("taken");
        owner.add_task(&taken).unwrap();

        let flow = Flow::new("f").unwrap();
        let (hub, up) = (task("hub"), task("up"));
        let err = flow
            .set_dependencies(&hub, &[up.clone()], &[taken.clone()])
            .unwrap_err();

        assert!(matches!(err, WeftError::ForeignTask { ref owner, .. } if owner == "owner"));
        assert!(flow.is_empty());
        assert!(hub.flow().is_none());
        assert!(up.flow().is_none());
        assert!(taken.flow().unwrap().ptr_eq(&owner));
    }

    #[test]
    fn self_edge_registers_once() {
        let flow = Flow::new("f").unwrap();
        let a = task("a");

        flow.add_edge(&a, &a).unwrap();

        assert_eq!(flow.len(), 1);
        assert_eq!(flow.edge_count(), 1);
    }

    #[test]
    fn get_task_exact_match_only() {
        let flow = Flow::new("f").unwrap();
        let load = task("load");
        flow.add_task(&load).unwrap();

        assert_eq!(flow.get_task("load").unwrap(), load);
        assert!(flow.get_task("loa").is_err());
        assert!(flow.get_task("Load").is_err());
    }

    #[test]
    fn neighbours_roots_and_terminals() {
        let flow = Flow::new("f").unwrap();
        let (a, b, c, d) = (task("a"), task("b"), task("c"), task("d"));
        flow.set_dependencies(&b, &[a.clone()], &[c.clone(), d.clone()])
            .unwrap();

        assert_eq!(names(&flow.upstream_tasks(&b).unwrap()), vec!["a"]);
        assert_eq!(names(&flow.downstream_tasks(&b).unwrap()), vec!["c", "d"]);
        assert_eq!(names(&flow.root_tasks()), vec!["a"]);
        assert_eq!(names(&flow.terminal_tasks()), vec!["c", "d"]);
        assert!(flow.upstream_tasks(&task("stranger")).is_err());
    }

    #[test]
    fn ready_tasks_follow_completion() {
        let flow = Flow::new("f").unwrap();
        let (a, b, c) = (task("a"), task("b"), task("c"));
        flow.add_edge(&a, &c).unwrap();
        flow.add_edge(&b, &c).unwrap();

        let mut done = HashSet::new();
        assert_eq!(names(&flow.ready_tasks(&done)), vec!["a", "b"]);

        done.insert("a".to_string());
        assert_eq!(names(&flow.ready_tasks(&done)), vec!["b"]);

        done.insert("b".to_string());
        assert_eq!(names(&flow.ready_tasks(&done)), vec!["c"]);
    }

    #[test]
    fn sorted_tasks_and_plan_agree() {
        let flow = Flow::new("f").unwrap();
        let (a, b, c) = (task("a"), task("b"), task("c"));
        flow.add_edge(&c, &a).unwrap();
        flow.add_edge(&b, &a).unwrap();

        let sorted = flow.sorted_tasks().unwrap();
        let plan = flow.plan().unwrap();
        assert_eq!(names(&sorted), plan.names().collect::<Vec<_>>());
        assert_eq!(names(&sorted), vec!["c", "b", "a"]);
    }

    #[test]
    fn cycle_error_names_flow_and_tasks() {
        let flow = Flow::new("loop").unwrap();
        let (a, b) = (task("a"), task("b"));
        flow.add_edge(&a, &b).unwrap();
        flow.add_edge(&b, &a).unwrap();

        let err = flow.validate().unwrap_err();
        match err {
            WeftError::CycleDetected { flow, cycle } => {
                assert_eq!(flow, "loop");
                assert_eq!(cycle, vec!["a", "b", "a"]);
            }
            other => panic!("expected cycle, got {other}"),
        }
        assert!(flow.plan().is_err());
    }

    #[test]
    fn concurrent_readers_compile() {
        let flow = Flow::new("shared").unwrap();
        let mut previous = task("t0");
        flow.add_task(&previous).unwrap();
        for i in 1..50 {
            let next = task(&format!("t{i}"));
            flow.add_edge(&previous, &next).unwrap();
            previous = next;
        }

        let expected = names(&flow.sorted_tasks().unwrap())
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let flow = flow.clone();
                std::thread::spawn(move || {
                    flow.sorted_tasks()
                        .unwrap()
                        .iter()
                        .map(|t| t.name().to_string())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }
}
