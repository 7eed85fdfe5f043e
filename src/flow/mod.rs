//! Flow Module - flows and the context stack
//!
//! - `container`: Flow, the named container with declaration and compile APIs
//! - `context`: thread-local stack of open flows, FlowGuard

mod container;
mod context;

pub use container::Flow;
pub(crate) use container::FlowShared;
pub use context::{current_flow, depth, FlowGuard};
