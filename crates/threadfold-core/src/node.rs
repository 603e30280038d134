//! Input nodes and subtree sizing.
//!
//! A [`Node`] is one reply in a thread as handed over by the tree supplier.
//! The allocator only ever looks at one sibling level at a time; `children`
//! rides along untouched so the renderer can recurse into it later.
//!
//! # Sizing
//!
//! The *own size* of a node is `1 + deep_count`, where `deep_count` is the
//! number of strict descendants. Suppliers usually know that number from
//! storage and pass it in; when they don't, it is derived from the
//! materialized children (missing counts below count as zero).

use std::fmt;
use std::sync::Arc;

/// Opaque sibling identifier.
///
/// Cloning is a reference-count bump, so states can carry ids freely.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "state-persistence",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct NodeId(Arc<str>);

impl NodeId {
    /// Create an id from any string-like value.
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self::new(id.to_string())
    }
}

/// A reply node supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "state-persistence",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Node {
    /// `None` marks a malformed node: it is never matched across syncs and
    /// can never be the target of collapse or expand.
    id: Option<NodeId>,
    children_deep_count: Option<usize>,
    children: Arc<[Node]>,
}

impl Node {
    /// Create a leaf node with the given id.
    #[must_use]
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: Some(id.into()),
            children_deep_count: None,
            children: Arc::from(Vec::new()),
        }
    }

    /// Create a node without identity.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            id: None,
            children_deep_count: None,
            children: Arc::from(Vec::new()),
        }
    }

    /// Set the supplied strict-descendant count.
    #[must_use]
    pub fn with_deep_count(mut self, count: usize) -> Self {
        self.children_deep_count = Some(count);
        self
    }

    /// Attach materialized children, replacing any already attached.
    ///
    /// This is the bulk path: the children are collected once.
    #[must_use]
    pub fn with_children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = Node>,
    {
        self.children = children.into_iter().collect();
        self
    }

    /// Append one materialized child.
    ///
    /// Copies the existing children; prefer [`with_children`](Self::with_children)
    /// for wide levels.
    #[must_use]
    pub fn child(mut self, node: Node) -> Self {
        let mut children = self.children.to_vec();
        children.push(node);
        self.children = Arc::from(children);
        self
    }

    /// The node id, if it has one.
    #[must_use]
    pub fn id(&self) -> Option<&NodeId> {
        self.id.as_ref()
    }

    /// Whether this node carries the given id.
    #[must_use]
    pub fn has_id(&self, id: &NodeId) -> bool {
        self.id.as_ref() == Some(id)
    }

    /// The supplied descendant count, without derivation.
    #[must_use]
    pub fn supplied_deep_count(&self) -> Option<usize> {
        self.children_deep_count
    }

    /// Materialized children.
    #[must_use]
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Strict descendant count: supplied, or derived from the children.
    #[must_use]
    pub fn deep_count(&self) -> usize {
        match self.children_deep_count {
            Some(count) => count,
            None => self
                .children
                .iter()
                .fold(0usize, |acc, child| acc.saturating_add(child.own_size())),
        }
    }

    /// Size of this node's subtree including itself.
    #[must_use]
    pub fn own_size(&self) -> usize {
        self.deep_count().saturating_add(1)
    }

    /// Descendants counted in `deep_count` that are not materialized as
    /// `children` subtrees.
    #[must_use]
    pub fn unloaded_count(&self) -> usize {
        let loaded = self
            .children
            .iter()
            .fold(0usize, |acc, child| acc.saturating_add(child.own_size()));
        self.deep_count().saturating_sub(loaded)
    }
}

/// Own size of a node (`1 + deep_count`).
#[inline]
#[must_use]
pub fn own_size(node: &Node) -> usize {
    node.own_size()
}

/// Sum of own sizes across a sibling list.
#[must_use]
pub fn total_size(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .fold(0usize, |acc, node| acc.saturating_add(node.own_size()))
}
