//! Search tree storage.
//!
//! Nodes live in a per-task arena and refer to each other by [`NodeId`].
//! The parent link is a plain index used only to walk back to the root.

use std::collections::HashSet;
use std::sync::Arc;

use alder_core::{ActionKind, Artifacts, NodeSnapshot, SearchPath, Stage};

use crate::error::SearchError;

/// Index of a node in its [`SearchTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// SQL samples returned by one oracle invocation, shared by the nodes built
/// from them so each can be scored against its siblings.
#[derive(Debug, Clone)]
pub struct SampleGroup {
    pub samples: Arc<[String]>,
    /// Position of this node's own sample in `samples`.
    pub own: usize,
}

impl SampleGroup {
    /// Every sample except this node's own.
    pub fn siblings(&self) -> impl Iterator<Item = &str> {
        self.samples
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != self.own)
            .map(|(_, sql)| sql.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct SearchNode {
    pub stage: Stage,
    pub parent: Option<NodeId>,
    pub parent_action: Option<ActionKind>,
    pub depth: usize,
    pub artifacts: Artifacts,
    /// Cumulative reward.
    pub q: f64,
    /// Visit count.
    pub n: u64,
    pub sample_group: Option<SampleGroup>,
    children: Option<Vec<NodeId>>,
}

impl SearchNode {
    /// Whether children have been populated (possibly with none).
    #[must_use]
    pub const fn is_expanded(&self) -> bool {
        self.children.is_some()
    }

    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// END, or expanded without producing any child.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.stage.is_end() || self.children.as_ref().is_some_and(Vec::is_empty)
    }

    #[must_use]
    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            depth: self.depth,
            stage: self.stage,
            parent_action: self.parent_action,
            artifacts: self.artifacts.clone(),
            q: self.q,
            n: self.n,
        }
    }
}

/// Arena owning every node of one task's search.
#[derive(Debug)]
pub struct SearchTree {
    nodes: Vec<SearchNode>,
}

impl SearchTree {
    /// A tree holding only the ROOT node.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![SearchNode {
                stage: Stage::Root,
                parent: None,
                parent_action: None,
                depth: 0,
                artifacts: Artifacts::default(),
                q: 0.0,
                n: 0,
                sample_group: None,
                children: None,
            }],
        }
    }

    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// # Panics
    ///
    /// Panics if `id` was not produced by this tree.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &SearchNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut SearchNode {
        &mut self.nodes[id.0]
    }

    /// Allocate a child of `parent` produced by `action`. The child is not
    /// visible from `parent` until [`Self::attach`] is called.
    pub fn alloc(&mut self, parent: NodeId, action: ActionKind, artifacts: Artifacts) -> NodeId {
        let depth = self.nodes[parent.0].depth + 1;
        let id = NodeId(self.nodes.len());
        self.nodes.push(SearchNode {
            stage: action.target_stage(),
            parent: Some(parent),
            parent_action: Some(action),
            depth,
            artifacts,
            q: 0.0,
            n: 0,
            sample_group: None,
            children: None,
        });
        id
    }

    /// Populate the children of `parent`. Allowed once per node.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::AlreadyExpanded`] on a second call.
    pub fn attach(&mut self, parent: NodeId, children: Vec<NodeId>) -> Result<(), SearchError> {
        let node = &mut self.nodes[parent.0];
        if node.children.is_some() {
            return Err(SearchError::AlreadyExpanded(parent.0));
        }
        node.children = Some(children);
        Ok(())
    }

    /// Node ids from ROOT to `id`, inclusive.
    #[must_use]
    pub fn path_to(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(parent) = self.nodes[current.0].parent {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }

    /// Action kinds already taken between ROOT and `id`.
    #[must_use]
    pub fn used_actions(&self, id: NodeId) -> HashSet<ActionKind> {
        self.path_to(id)
            .into_iter()
            .filter_map(|n| self.nodes[n.0].parent_action)
            .collect()
    }

    /// Every node id, in creation order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + use<> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Every END node, in creation order.
    #[must_use]
    pub fn end_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.stage.is_end())
            .map(|(i, _)| NodeId(i))
            .collect()
    }

    /// Snapshots of the ROOT → `id` path.
    #[must_use]
    pub fn snapshot_path(&self, id: NodeId) -> SearchPath {
        self.path_to(id)
            .into_iter()
            .map(|n| self.nodes[n.0].snapshot())
            .collect()
    }
}

impl Default for SearchTree {
    fn default() -> Self {
        Self::new()
    }
}
