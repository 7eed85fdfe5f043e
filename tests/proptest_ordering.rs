//! Property-Based Testing for flow compilation
//!
//! Random forward-edge graphs are acyclic by construction; the compiled
//! order must contain every task once and respect every edge.

use proptest::prelude::*;
use serde_json::Value;
use weft::{Flow, Task};

prop_compose! {
    /// Task count plus edges `(from, to)` with `from < to`
    fn arb_dag()(size in 1usize..24)(
        size in Just(size),
        pairs in prop::collection::vec((0..size, 0..size), 0..64),
    ) -> (usize, Vec<(usize, usize)>) {
        let edges = pairs
            .into_iter()
            .filter(|(a, b)| a != b)
            .map(|(a, b)| (a.min(b), a.max(b)))
            .collect();
        (size, edges)
    }
}

fn build(size: usize, edges: &[(usize, usize)], reversed: bool) -> (Flow, Vec<Task>) {
    let flow = Flow::new("generated").unwrap();
    let tasks: Vec<Task> = flow.scope(|_| {
        (0..size)
            .map(|i| Task::constant(format!("t{i}"), Value::Null).unwrap())
            .collect()
    });
    for &(from, to) in edges {
        // `reversed` declares the same DAG with nodes renumbered back to front
        let (from, to) = if reversed { (size - 1 - to, size - 1 - from) } else { (from, to) };
        flow.add_edge(&tasks[from], &tasks[to]).unwrap();
    }
    (flow, tasks)
}

proptest! {
    /// Property: every task appears once, after all of its predecessors
    #[test]
    fn test_order_respects_edges((size, edges) in arb_dag(), reversed in any::<bool>()) {
        let (flow, tasks) = build(size, &edges, reversed);
        let order = flow.sorted_tasks().unwrap();
        prop_assert_eq!(order.len(), size);

        let position = |task: &Task| order.iter().position(|t| t == task).unwrap();
        for (up, down) in flow.edges() {
            prop_assert!(position(&up) < position(&down));
        }
        for task in &tasks {
            prop_assert_eq!(order.iter().filter(|t| *t == task).count(), 1);
        }
    }

    /// Property: compiling twice gives the same order
    #[test]
    fn test_order_is_deterministic((size, edges) in arb_dag()) {
        let (flow, _) = build(size, &edges, true);
        let first = flow.sorted_tasks().unwrap();
        let second = flow.sorted_tasks().unwrap();
        prop_assert_eq!(first, second);
    }

    /// Property: closing any path back on itself is reported as a cycle
    #[test]
    fn test_back_edge_is_cycle((size, edges) in arb_dag()) {
        prop_assume!(!edges.is_empty());
        let (flow, tasks) = build(size, &edges, false);
        let (from, to) = edges[0];
        flow.add_edge(&tasks[to], &tasks[from]).unwrap();

        let err = flow.sorted_tasks().unwrap_err();
        prop_assert_eq!(err.code(), "WEFT-020");
    }
}
