//! Arena-backed regeneration graph
//!
//! Nodes live in a `Vec` and refer to their parent by index. A parent must
//! already be in the arena when a child is added, so the graph is acyclic by
//! construction; the hop bound still guards every parent walk.

use std::collections::VecDeque;
use std::fmt;

use thiserror::Error;

use crate::render::vulkan::VulkanError;

/// Maximum number of parent hops from any node to its root
///
/// The Vulkan tree is six levels deep at most; the bound leaves headroom for
/// application nodes hung below the command buffers.
pub const MAX_CHAIN_DEPTH: usize = 8;

/// Index of a node inside a [`RegenerationGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in insertion order
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Resources exist and may be read by children
    Live,
    /// Resources have been released
    Destroyed,
}

/// A unit of GPU state with a create/destroy pair
///
/// `create` may assume every ancestor is live. `destroy` may assume every
/// descendant has not been destroyed yet in this pass, and is only called on a
/// live node.
pub trait Regenerable<C> {
    /// Short stable name used in logs and errors
    fn label(&self) -> &'static str;

    /// Acquire resources, reading whatever inputs changed since the last pass
    fn create(&mut self, ctx: &mut C) -> Result<(), VulkanError>;

    /// Release resources
    fn destroy(&mut self, ctx: &mut C);
}

/// Regeneration errors
#[derive(Error, Debug)]
pub enum RegenError {
    /// The id does not belong to this graph
    #[error("Unknown regeneration node {0}")]
    UnknownNode(NodeId),

    /// Parent walk exceeded the hop bound
    #[error("Dependency chain of node {node} exceeds {limit} hops")]
    ChainTooDeep {
        /// Node whose ancestry is too long
        node: NodeId,
        /// The hop bound
        limit: usize,
    },

    /// A node failed to create its resources
    #[error("Failed to create `{label}`: {source}")]
    NodeCreation {
        /// Label of the failing node
        label: &'static str,
        /// Underlying device error
        #[source]
        source: VulkanError,
    },

    /// Operation requires a live node
    #[error("Node `{label}` is not live")]
    NotLive {
        /// Label of the offending node
        label: &'static str,
    },

    /// A device call outside any node failed
    #[error("Device error during regeneration: {0}")]
    Device(#[from] VulkanError),
}

/// Result type for regeneration operations
pub type RegenResult<T> = Result<T, RegenError>;

/// Nodes of one subtree in dependency order, root first
///
/// Creation walks the list forward and destruction walks it backward, so every
/// child is created after and destroyed before its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegenerationChain {
    nodes: Vec<NodeId>,
}

impl RegenerationChain {
    /// Nodes in creation order
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Creation order iterator
    pub fn creation_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    /// Destruction order iterator, the exact reverse of creation
    pub fn destruction_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().rev().copied()
    }

    /// Whether the chain includes `id`
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    /// Number of nodes in the chain
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the chain is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

struct NodeEntry<C> {
    node: Box<dyn Regenerable<C>>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    depth: usize,
    state: NodeState,
}

/// Dependency graph of regenerable resources
///
/// The graph owns the nodes and their ordering but no GPU handles; the context
/// `C` is threaded through every create/destroy call.
pub struct RegenerationGraph<C> {
    entries: Vec<NodeEntry<C>>,
    passes: u64,
}

impl<C> Default for RegenerationGraph<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> RegenerationGraph<C> {
    /// Create an empty graph
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            passes: 0,
        }
    }

    /// Insert a root node and create it
    pub fn add_root(
        &mut self,
        node: impl Regenerable<C> + 'static,
        ctx: &mut C,
    ) -> RegenResult<NodeId> {
        self.insert(None, Box::new(node), ctx)
    }

    /// Insert a node below `parent` and create it
    ///
    /// The parent must be live: the new node's `create` reads its outputs.
    pub fn add_node(
        &mut self,
        parent: NodeId,
        node: impl Regenerable<C> + 'static,
        ctx: &mut C,
    ) -> RegenResult<NodeId> {
        self.insert(Some(parent), Box::new(node), ctx)
    }

    fn insert(
        &mut self,
        parent: Option<NodeId>,
        mut node: Box<dyn Regenerable<C>>,
        ctx: &mut C,
    ) -> RegenResult<NodeId> {
        let id = NodeId(self.entries.len());

        let depth = match parent {
            Some(parent_id) => {
                let parent_entry = self.entry(parent_id)?;
                if parent_entry.state != NodeState::Live {
                    return Err(RegenError::NotLive {
                        label: parent_entry.node.label(),
                    });
                }
                let depth = parent_entry.depth + 1;
                if depth > MAX_CHAIN_DEPTH {
                    return Err(RegenError::ChainTooDeep {
                        node: id,
                        limit: MAX_CHAIN_DEPTH,
                    });
                }
                depth
            }
            None => 0,
        };

        let label = node.label();
        node.create(ctx)
            .map_err(|source| RegenError::NodeCreation { label, source })?;
        log::trace!("Created `{label}` ({id}) at depth {depth}");

        if let Some(parent_id) = parent {
            self.entries[parent_id.0].children.push(id);
        }
        self.entries.push(NodeEntry {
            node,
            parent,
            children: Vec::new(),
            depth,
            state: NodeState::Live,
        });

        Ok(id)
    }

    fn entry(&self, id: NodeId) -> RegenResult<&NodeEntry<C>> {
        self.entries.get(id.0).ok_or(RegenError::UnknownNode(id))
    }

    /// Current state of a node
    pub fn state(&self, id: NodeId) -> Option<NodeState> {
        self.entries.get(id.0).map(|entry| entry.state)
    }

    /// Label of a node
    pub fn label(&self, id: NodeId) -> Option<&'static str> {
        self.entries.get(id.0).map(|entry| entry.node.label())
    }

    /// Parent of a node, `None` for roots and unknown ids
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.entries.get(id.0).and_then(|entry| entry.parent)
    }

    /// Path from the root down to `id`, inclusive
    pub fn ancestry(&self, id: NodeId) -> RegenResult<Vec<NodeId>> {
        self.entry(id)?;

        let mut path = vec![id];
        let mut current = id;
        while let Some(parent) = self.entry(current)?.parent {
            if path.len() > MAX_CHAIN_DEPTH {
                return Err(RegenError::ChainTooDeep {
                    node: id,
                    limit: MAX_CHAIN_DEPTH,
                });
            }
            path.push(parent);
            current = parent;
        }

        path.reverse();
        Ok(path)
    }

    /// Subtree rooted at `trigger`, breadth-first
    ///
    /// Nodes at the same depth keep their insertion order, so siblings are
    /// created in the order they were added.
    pub fn chain(&self, trigger: NodeId) -> RegenResult<RegenerationChain> {
        let root_depth = self.entry(trigger)?.depth;

        let mut nodes = Vec::new();
        let mut queue = VecDeque::from([trigger]);
        while let Some(id) = queue.pop_front() {
            let entry = self.entry(id)?;
            if entry.depth - root_depth > MAX_CHAIN_DEPTH {
                return Err(RegenError::ChainTooDeep {
                    node: id,
                    limit: MAX_CHAIN_DEPTH,
                });
            }
            nodes.push(id);
            queue.extend(entry.children.iter().copied());
        }

        Ok(RegenerationChain { nodes })
    }

    /// Destroy and recreate every node in the subtree of `trigger`
    ///
    /// The caller guarantees the device is idle. A creation failure aborts the
    /// pass with the remaining nodes destroyed; there is no rollback.
    pub fn regenerate(&mut self, trigger: NodeId, ctx: &mut C) -> RegenResult<RegenerationChain> {
        let chain = self.chain(trigger)?;
        log::debug!(
            "Regeneration pass {} from `{}`: {} node(s)",
            self.passes + 1,
            self.entries[trigger.0].node.label(),
            chain.len()
        );

        for id in chain.destruction_order() {
            self.destroy_node(id, ctx);
        }

        for id in chain.creation_order() {
            let entry = &mut self.entries[id.0];
            let label = entry.node.label();
            entry
                .node
                .create(ctx)
                .map_err(|source| RegenError::NodeCreation { label, source })?;
            entry.state = NodeState::Live;
            log::trace!("Created `{label}` ({id})");
        }

        self.passes += 1;
        Ok(chain)
    }

    /// Destroy every live node, leaves first
    ///
    /// Used at shutdown after the device has gone idle. Nodes stay in the
    /// arena in the destroyed state.
    pub fn teardown(&mut self, ctx: &mut C) {
        let mut order: Vec<NodeId> = (0..self.entries.len()).map(NodeId).collect();
        order.sort_by_key(|id| (self.entries[id.0].depth, id.0));

        for id in order.into_iter().rev() {
            self.destroy_node(id, ctx);
        }
    }

    fn destroy_node(&mut self, id: NodeId, ctx: &mut C) {
        let entry = &mut self.entries[id.0];
        if entry.state == NodeState::Live {
            entry.node.destroy(ctx);
            entry.state = NodeState::Destroyed;
            log::trace!("Destroyed `{}` ({id})", entry.node.label());
        }
    }

    /// Number of nodes in the arena
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the arena is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of live nodes
    pub fn live_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.state == NodeState::Live)
            .count()
    }

    /// Completed regeneration passes
    pub const fn pass_count(&self) -> u64 {
        self.passes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Op {
        Create,
        Destroy,
    }

    #[derive(Default)]
    struct Journal {
        events: Vec<(Op, &'static str)>,
        live: HashMap<&'static str, i32>,
        creates: u32,
        destroys: u32,
        fail_on: Option<&'static str>,
    }

    impl Journal {
        fn position(&self, op: Op, label: &str) -> usize {
            self.events
                .iter()
                .position(|&(o, l)| o == op && l == label)
                .unwrap()
        }
    }

    struct TestNode(&'static str);

    impl Regenerable<Journal> for TestNode {
        fn label(&self) -> &'static str {
            self.0
        }

        fn create(&mut self, ctx: &mut Journal) -> Result<(), VulkanError> {
            if ctx.fail_on == Some(self.0) {
                return Err(VulkanError::InvalidOperation {
                    reason: format!("{} refused", self.0),
                });
            }
            ctx.events.push((Op::Create, self.0));
            *ctx.live.entry(self.0).or_default() += 1;
            ctx.creates += 1;
            Ok(())
        }

        fn destroy(&mut self, ctx: &mut Journal) {
            ctx.events.push((Op::Destroy, self.0));
            *ctx.live.entry(self.0).or_default() -= 1;
            ctx.destroys += 1;
        }
    }

    struct Tree {
        graph: RegenerationGraph<Journal>,
        journal: Journal,
        surface: NodeId,
        swapchain: NodeId,
        render_pass: NodeId,
        framebuffers: NodeId,
        commands: NodeId,
        pipeline: NodeId,
        descriptors: NodeId,
    }

    /// Siblings under the swapchain and the render pass
    fn branching_tree() -> Tree {
        let mut graph = RegenerationGraph::new();
        let mut journal = Journal::default();
        let surface = graph.add_root(TestNode("surface"), &mut journal).unwrap();
        let swapchain = graph.add_node(surface, TestNode("swapchain"), &mut journal).unwrap();
        let render_pass = graph.add_node(swapchain, TestNode("render-pass"), &mut journal).unwrap();
        let descriptors = graph.add_node(swapchain, TestNode("descriptors"), &mut journal).unwrap();
        let framebuffers = graph
            .add_node(render_pass, TestNode("framebuffers"), &mut journal)
            .unwrap();
        let pipeline = graph.add_node(render_pass, TestNode("pipeline"), &mut journal).unwrap();
        let commands = graph
            .add_node(framebuffers, TestNode("commands"), &mut journal)
            .unwrap();
        journal.events.clear();

        Tree {
            graph,
            journal,
            surface,
            swapchain,
            render_pass,
            framebuffers,
            commands,
            pipeline,
            descriptors,
        }
    }

    /// Same shape as the swapchain chain: one path, command buffers last
    fn swapchain_path() -> Tree {
        let mut graph = RegenerationGraph::new();
        let mut journal = Journal::default();
        let surface = graph.add_root(TestNode("surface"), &mut journal).unwrap();
        let swapchain = graph.add_node(surface, TestNode("swapchain"), &mut journal).unwrap();
        let render_pass = graph.add_node(swapchain, TestNode("render-pass"), &mut journal).unwrap();
        let descriptors = graph
            .add_node(render_pass, TestNode("descriptors"), &mut journal)
            .unwrap();
        let pipeline = graph.add_node(descriptors, TestNode("pipeline"), &mut journal).unwrap();
        let framebuffers = graph
            .add_node(pipeline, TestNode("framebuffers"), &mut journal)
            .unwrap();
        let commands = graph
            .add_node(framebuffers, TestNode("commands"), &mut journal)
            .unwrap();
        journal.events.clear();

        Tree {
            graph,
            journal,
            surface,
            swapchain,
            render_pass,
            framebuffers,
            commands,
            pipeline,
            descriptors,
        }
    }

    #[test]
    fn test_insertion_creates_node() {
        let mut graph = RegenerationGraph::new();
        let mut journal = Journal::default();
        let root = graph.add_root(TestNode("root"), &mut journal).unwrap();

        assert_eq!(graph.state(root), Some(NodeState::Live));
        assert_eq!(journal.events, vec![(Op::Create, "root")]);
        assert_eq!(graph.live_count(), 1);
        assert_eq!(graph.pass_count(), 0);
    }

    #[test]
    fn test_chain_is_breadth_first_in_insertion_order() {
        let tree = branching_tree();
        let chain = tree.graph.chain(tree.surface).unwrap();

        assert_eq!(
            chain.nodes(),
            &[
                tree.surface,
                tree.swapchain,
                tree.render_pass,
                tree.descriptors,
                tree.framebuffers,
                tree.pipeline,
                tree.commands,
            ]
        );
    }

    #[test]
    fn test_chain_of_inner_node_is_its_subtree() {
        let tree = branching_tree();
        let chain = tree.graph.chain(tree.render_pass).unwrap();

        assert_eq!(
            chain.nodes(),
            &[tree.render_pass, tree.framebuffers, tree.pipeline, tree.commands]
        );
        assert!(!chain.contains(tree.swapchain));
        assert!(!chain.contains(tree.descriptors));
    }

    #[test]
    fn test_pipeline_and_descriptor_rebuilds_reach_command_buffers() {
        let tree = swapchain_path();

        for trigger in [tree.descriptors, tree.pipeline, tree.framebuffers] {
            let chain = tree.graph.chain(trigger).unwrap();
            assert!(chain.contains(tree.commands));
            assert_eq!(chain.destruction_order().next(), Some(tree.commands));
        }
        let ancestry = tree.graph.ancestry(tree.commands).unwrap();
        assert!(ancestry.contains(&tree.pipeline));
        assert!(ancestry.contains(&tree.descriptors));
        assert!(ancestry.len() - 1 <= MAX_CHAIN_DEPTH);
    }

    #[test]
    fn test_pipeline_rebuild_rerecords_commands() {
        let mut tree = swapchain_path();
        tree.graph.regenerate(tree.pipeline, &mut tree.journal).unwrap();

        assert_eq!(
            tree.journal.events,
            vec![
                (Op::Destroy, "commands"),
                (Op::Destroy, "framebuffers"),
                (Op::Destroy, "pipeline"),
                (Op::Create, "pipeline"),
                (Op::Create, "framebuffers"),
                (Op::Create, "commands"),
            ]
        );
        assert_eq!(tree.graph.state(tree.descriptors), Some(NodeState::Live));
        assert_eq!(tree.graph.live_count(), 7);
        assert!(tree.graph.chain(tree.surface).unwrap().contains(tree.swapchain));
        assert!(!tree.graph.chain(tree.pipeline).unwrap().contains(tree.render_pass));
    }

    #[test]
    fn test_destroy_order_is_reverse_of_create_order() {
        let mut tree = branching_tree();
        tree.graph.regenerate(tree.surface, &mut tree.journal).unwrap();

        let destroyed: Vec<_> = tree
            .journal
            .events
            .iter()
            .filter(|(op, _)| *op == Op::Destroy)
            .map(|&(_, label)| label)
            .collect();
        let mut created: Vec<_> = tree
            .journal
            .events
            .iter()
            .filter(|(op, _)| *op == Op::Create)
            .map(|&(_, label)| label)
            .collect();
        created.reverse();

        assert_eq!(destroyed.len(), 7);
        assert_eq!(destroyed, created);
        // Every destroy of the pass happens before the first create
        assert!(tree.journal.events[..7].iter().all(|(op, _)| *op == Op::Destroy));
    }

    #[test]
    fn test_children_created_after_parents() {
        let mut tree = branching_tree();
        tree.graph.regenerate(tree.surface, &mut tree.journal).unwrap();

        for id in tree.graph.chain(tree.surface).unwrap().creation_order() {
            if let Some(parent) = tree.graph.parent(id) {
                let child_label = tree.graph.label(id).unwrap();
                let parent_label = tree.graph.label(parent).unwrap();
                assert!(
                    tree.journal.position(Op::Create, parent_label)
                        < tree.journal.position(Op::Create, child_label),
                    "{parent_label} must be created before {child_label}"
                );
                assert!(
                    tree.journal.position(Op::Destroy, child_label)
                        < tree.journal.position(Op::Destroy, parent_label),
                    "{child_label} must be destroyed before {parent_label}"
                );
            }
        }
    }

    #[test]
    fn test_repeated_regeneration_is_balanced() {
        let mut tree = branching_tree();
        let mut previous_creates = tree.journal.creates;

        for pass in 1..=5 {
            tree.graph.regenerate(tree.surface, &mut tree.journal).unwrap();

            assert!(tree.journal.live.values().all(|&count| count == 1));
            assert_eq!(tree.journal.creates - tree.journal.destroys, 7);
            assert!(tree.journal.creates >= previous_creates);
            assert_eq!(tree.graph.pass_count(), pass);
            assert_eq!(tree.graph.live_count(), 7);
            previous_creates = tree.journal.creates;
        }
    }

    #[test]
    fn test_subtree_regeneration_leaves_ancestors_alone() {
        let mut tree = branching_tree();
        tree.graph.regenerate(tree.framebuffers, &mut tree.journal).unwrap();

        assert_eq!(
            tree.journal.events,
            vec![
                (Op::Destroy, "commands"),
                (Op::Destroy, "framebuffers"),
                (Op::Create, "framebuffers"),
                (Op::Create, "commands"),
            ]
        );
    }

    #[test]
    fn test_creation_failure_is_fatal_without_rollback() {
        let mut tree = branching_tree();
        tree.journal.fail_on = Some("framebuffers");

        let err = tree
            .graph
            .regenerate(tree.surface, &mut tree.journal)
            .unwrap_err();

        assert!(matches!(err, RegenError::NodeCreation { label: "framebuffers", .. }));
        assert_eq!(tree.graph.state(tree.render_pass), Some(NodeState::Live));
        assert_eq!(tree.graph.state(tree.framebuffers), Some(NodeState::Destroyed));
        assert_eq!(tree.graph.state(tree.commands), Some(NodeState::Destroyed));
        assert_eq!(tree.graph.pass_count(), 0);
    }

    #[test]
    fn test_failed_insertion_leaves_graph_unchanged() {
        let mut graph = RegenerationGraph::new();
        let mut journal = Journal {
            fail_on: Some("child"),
            ..Journal::default()
        };
        let root = graph.add_root(TestNode("root"), &mut journal).unwrap();

        assert!(graph.add_node(root, TestNode("child"), &mut journal).is_err());
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.chain(root).unwrap().len(), 1);
    }

    #[test]
    fn test_ancestry_walks_to_root() {
        let tree = branching_tree();
        assert_eq!(
            tree.graph.ancestry(tree.commands).unwrap(),
            vec![
                tree.surface,
                tree.swapchain,
                tree.render_pass,
                tree.framebuffers,
                tree.commands,
            ]
        );
        assert_eq!(tree.graph.ancestry(tree.surface).unwrap(), vec![tree.surface]);
    }

    #[test]
    fn test_depth_bound_enforced() {
        let mut graph = RegenerationGraph::new();
        let mut journal = Journal::default();
        let mut tip = graph.add_root(TestNode("level"), &mut journal).unwrap();
        for _ in 0..MAX_CHAIN_DEPTH {
            tip = graph.add_node(tip, TestNode("level"), &mut journal).unwrap();
        }

        let err = graph.add_node(tip, TestNode("level"), &mut journal).unwrap_err();
        assert!(matches!(err, RegenError::ChainTooDeep { limit: MAX_CHAIN_DEPTH, .. }));
        assert_eq!(graph.len(), MAX_CHAIN_DEPTH + 1);
    }

    #[test]
    fn test_unknown_node_rejected() {
        let mut tree = branching_tree();
        let foreign = NodeId(99);

        assert!(matches!(tree.graph.chain(foreign), Err(RegenError::UnknownNode(_))));
        assert!(matches!(
            tree.graph.add_node(foreign, TestNode("orphan"), &mut tree.journal),
            Err(RegenError::UnknownNode(_))
        ));
        assert_eq!(tree.graph.state(foreign), None);
    }

    #[test]
    fn test_teardown_destroys_leaves_first() {
        let mut tree = branching_tree();
        tree.graph.teardown(&mut tree.journal);

        assert_eq!(tree.graph.live_count(), 0);
        assert!(tree.journal.live.values().all(|&count| count == 0));
        assert_eq!(tree.journal.events.first(), Some(&(Op::Destroy, "commands")));
        assert_eq!(tree.journal.events.last(), Some(&(Op::Destroy, "surface")));

        // A second teardown has nothing left to release
        tree.graph.teardown(&mut tree.journal);
        assert_eq!(tree.journal.destroys, 7);
    }

    #[test]
    fn test_add_below_destroyed_parent_rejected() {
        let mut tree = branching_tree();
        tree.graph.teardown(&mut tree.journal);

        let err = tree
            .graph
            .add_node(tree.swapchain, TestNode("late"), &mut tree.journal)
            .unwrap_err();
        assert!(matches!(err, RegenError::NotLive { label: "swapchain" }));
    }
}
