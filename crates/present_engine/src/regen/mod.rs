//! Resource regeneration graph
//!
//! Swapchain-dependent GPU objects are modelled as nodes in a tree. Each node
//! knows how to create and destroy its own resources; the graph knows the order.
//! When the surface changes, the subtree under the changed node is destroyed
//! leaf-first and rebuilt root-first.

mod graph;

pub use graph::{
    NodeId, NodeState, Regenerable, RegenError, RegenResult, RegenerationChain,
    RegenerationGraph, MAX_CHAIN_DEPTH,
};
