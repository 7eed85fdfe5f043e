//! Flow context stack - thread-local scopes for implicit registration
//!
//! `Flow::open` pushes the flow and hands back a [`FlowGuard`]; dropping the
//! guard pops it. Drop runs on normal exit, early `?` return and panic unwind
//! alike, so the stack always returns to its depth before the scope.
//!
//! The stack is per thread. A flow opened on one thread is invisible to
//! tasks constructed on another.

use std::cell::RefCell;
use std::marker::PhantomData;

use tracing::{debug, warn};

use super::container::Flow;

thread_local! {
    static OPEN_FLOWS: RefCell<Vec<Flow>> = const { RefCell::new(Vec::new()) };
}

/// Keeps a flow open on the current thread until dropped
///
/// Guards must be dropped innermost first. Dropping an outer guard early
/// also closes every scope opened after it.
#[must_use = "the flow closes as soon as the guard is dropped"]
pub struct FlowGuard {
    flow: Flow,
    depth: usize,
    // pinned to the thread whose stack it pushed onto
    _not_send: PhantomData<*const ()>,
}

impl FlowGuard {
    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    /// Stack depth including this scope (outermost scope is 1)
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Drop for FlowGuard {
    fn drop(&mut self) {
        let closed = OPEN_FLOWS.try_with(|stack| {
            let mut stack = stack.borrow_mut();
            let in_place = stack.len() == self.depth
                && stack.last().is_some_and(|top| top.ptr_eq(&self.flow));
            if !in_place {
                warn!(
                    flow = %self.flow.name(),
                    depth = self.depth,
                    stack_len = stack.len(),
                    "flow scope closed out of order"
                );
            }
            let keep = (self.depth - 1).min(stack.len());
            stack.split_off(keep)
        });
        // popped handles are released after the RefCell borrow ends
        drop(closed);
        debug!(flow = %self.flow.name(), depth = self.depth, "closed flow scope");
    }
}

pub(super) fn enter(flow: &Flow) -> FlowGuard {
    let depth = OPEN_FLOWS.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.push(flow.clone());
        stack.len()
    });
    debug!(flow = %flow.name(), depth, "opened flow scope");
    FlowGuard {
        flow: flow.clone(),
        depth,
        _not_send: PhantomData,
    }
}

/// Innermost open flow on this thread
pub fn current_flow() -> Option<Flow> {
    OPEN_FLOWS
        .try_with(|stack| stack.borrow().last().cloned())
        .ok()
        .flatten()
}

/// Number of open flow scopes on this thread
pub fn depth() -> usize {
    OPEN_FLOWS
        .try_with(|stack| stack.borrow().len())
        .unwrap_or(0)
}
