//! Topological compiler - execution order or cycle diagnosis
//!
//! Kahn's algorithm over a [`DependencyRegistry`]. The ready set is a
//! min-heap of slots, so among tasks that become runnable together the one
//! registered first always comes out first. Repeated calls on the same
//! registry return identical orders.
//!
//! When the ready set drains while tasks remain, every remaining task sits on
//! or behind a cycle. One concrete cycle is traced by walking remaining
//! predecessors until a slot repeats.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::registry::DependencyRegistry;

/// A closed dependency chain found by the compiler
///
/// Slots are in execution direction: each one is a predecessor of the next,
/// and the last is a predecessor of the first. The lowest slot comes first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    slots: Vec<usize>,
}

impl Cycle {
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }

    /// Task names along the cycle, closed by repeating the first name
    pub fn names(&self, registry: &DependencyRegistry) -> Vec<String> {
        self.slots
            .iter()
            .chain(self.slots.first())
            .map(|&slot| registry.task(slot).name().to_string())
            .collect()
    }
}

/// Compute a deterministic execution order as registry slots
///
/// Every slot appears exactly once, after all of its direct and transitive
/// predecessors. Ties break on registration order.
pub fn topological_order(registry: &DependencyRegistry) -> Result<Vec<usize>, Cycle> {
    let dependents = registry.dependents();
    let mut in_degree: Vec<usize> = (0..registry.len())
        .map(|slot| registry.in_degree(slot))
        .collect();

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(slot, _)| Reverse(slot))
        .collect();
    let mut order = Vec::with_capacity(registry.len());

    while let Some(Reverse(slot)) = ready.pop() {
        order.push(slot);
        for &dependent in &dependents[slot] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    if order.len() == registry.len() {
        Ok(order)
    } else {
        Err(trace_cycle(registry, &in_degree))
    }
}

/// Walk predecessors among unemitted slots until one repeats
///
/// A slot with remaining in-degree always has at least one unemitted
/// predecessor, so the walk stays inside the leftover set and must close.
fn trace_cycle(registry: &DependencyRegistry, in_degree: &[usize]) -> Cycle {
    let stuck = |slot: usize| in_degree[slot] > 0;

    let mut seen_at: Vec<Option<usize>> = vec![None; in_degree.len()];
    let mut path: Vec<usize> = Vec::new();
    let mut current = (0..in_degree.len()).find(|&slot| stuck(slot));

    while let Some(slot) = current {
        if let Some(start) = seen_at[slot] {
            // path runs dependent -> predecessor; flip to execution direction
            let mut slots = path.split_off(start);
            slots.reverse();
            let lowest = slots
                .iter()
                .enumerate()
                .min_by_key(|&(_, &slot)| slot)
                .map_or(0, |(pos, _)| pos);
            slots.rotate_left(lowest);
            return Cycle { slots };
        }
        seen_at[slot] = Some(path.len());
        path.push(slot);
        current = registry.predecessors(slot).find(|&pred| stuck(pred));
    }

    Cycle { slots: path }
}
