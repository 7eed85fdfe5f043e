//! DependencyRegistry - arena-indexed task graph for one flow
//!
//! Every registered task gets a dense slot equal to its registration
//! sequence number. Predecessor sets are `BTreeSet<usize>`, so every
//! iteration (edges, dependents, tie-breaks) follows registration order and
//! never hashing order.

use std::collections::{BTreeSet, HashMap};

use crate::task::{Task, TaskId};

/// Outcome of registering a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Task was new and now occupies this slot
    Added(usize),
    /// Task was already a member at this slot
    Existing(usize),
}

impl Registration {
    pub fn slot(self) -> usize {
        match self {
            Self::Added(slot) | Self::Existing(slot) => slot,
        }
    }
}

/// A different task already holds the requested name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameConflict {
    /// Slot of the task that owns the name
    pub existing: usize,
}

/// Node set, name index and predecessor sets of a flow
#[derive(Debug, Default)]
pub struct DependencyRegistry {
    /// slot -> task (registration order)
    tasks: Vec<Task>,
    /// task identity -> slot
    slots: HashMap<TaskId, usize>,
    /// task name -> slot
    names: HashMap<String, usize>,
    /// slot -> slots that must run first
    predecessors: Vec<BTreeSet<usize>>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Register a task with an empty predecessor set
    ///
    /// Re-registering the same task object is a no-op. A different task
    /// carrying a name that is already indexed is rejected.
    pub fn register(&mut self, task: &Task) -> Result<Registration, NameConflict> {
        if let Some(slot) = self.check(task)? {
            return Ok(Registration::Existing(slot));
        }

        let slot = self.tasks.len();
        self.tasks.push(task.clone());
        self.slots.insert(task.id(), slot);
        self.names.insert(task.name().to_string(), slot);
        self.predecessors.push(BTreeSet::new());
        Ok(Registration::Added(slot))
    }

    /// What [`register`](Self::register) would do, without mutating
    ///
    /// `Some(slot)` for a member, `None` for a task that can be added.
    pub fn check(&self, task: &Task) -> Result<Option<usize>, NameConflict> {
        if let Some(&slot) = self.slots.get(&task.id()) {
            return Ok(Some(slot));
        }
        match self.names.get(task.name()) {
            Some(&existing) => Err(NameConflict { existing }),
            None => Ok(None),
        }
    }

    /// Record that `predecessor` must run before `slot`
    ///
    /// Returns `false` when the edge was already present. Self-edges are
    /// stored like any other edge.
    ///
    /// # Panics
    ///
    /// Panics if either slot is out of range.
    pub fn add_predecessor(&mut self, slot: usize, predecessor: usize) -> bool {
        assert!(predecessor < self.tasks.len(), "predecessor slot out of range");
        self.predecessors[slot].insert(predecessor)
    }

    #[inline]
    pub fn slot_of(&self, id: TaskId) -> Option<usize> {
        self.slots.get(&id).copied()
    }

    #[inline]
    pub fn slot_by_name(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    /// Task at `slot`
    ///
    /// # Panics
    ///
    /// Panics if `slot` is out of range.
    #[inline]
    pub fn task(&self, slot: usize) -> &Task {
        &self.tasks[slot]
    }

    /// All tasks in registration order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Direct predecessors of `slot`, ascending
    pub fn predecessors(&self, slot: usize) -> impl Iterator<Item = usize> + '_ {
        self.predecessors[slot].iter().copied()
    }

    #[inline]
    pub fn in_degree(&self, slot: usize) -> usize {
        self.predecessors[slot].len()
    }

    /// Reverse adjacency: slot -> slots that list it as a predecessor
    ///
    /// Built in one pass; each list is ascending.
    pub fn dependents(&self) -> Vec<Vec<usize>> {
        let mut dependents = vec![Vec::new(); self.tasks.len()];
        for (slot, preds) in self.predecessors.iter().enumerate() {
            for &pred in preds {
                dependents[pred].push(slot);
            }
        }
        dependents
    }

    /// `(predecessor, dependent)` pairs ordered by dependent, then predecessor
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.predecessors
            .iter()
            .enumerate()
            .flat_map(|(slot, preds)| preds.iter().map(move |&pred| (pred, slot)))
    }

    pub fn edge_count(&self) -> usize {
        self.predecessors.iter().map(BTreeSet::len).sum()
    }
}
