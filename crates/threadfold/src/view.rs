//! Multi-level thread view.
//!
//! Each visible reply with materialized children gets its own
//! [`FoldStore`], keyed by the reply's id; the top level is keyed by `None`.
//! A reply showing `e` nodes hands `e - 1` down to its children. Nodes
//! revealed by expand are granted to the level they were opened in, so the
//! number of visible posts never exceeds the root budget plus
//! [`ThreadView::granted`] (a pinned path may add one per level).
//!
//! Ids must be unique across the whole thread, not just among siblings;
//! [`ThreadView::sync`] rejects a tree that breaks this without touching the
//! current view.
//!
//! ```
//! use threadfold::{FoldConfig, Node, Row, ThreadView};
//!
//! let thread = vec![
//!     Node::new("a").child(Node::new("a1")).child(Node::new("a2")),
//!     Node::new("b"),
//! ];
//! let mut view = ThreadView::new(FoldConfig::new(3));
//! view.sync(thread).unwrap();
//! assert_eq!(view.visible_posts(), 3);
//! assert!(view.rows().contains(&Row::ShowMore {
//!     depth: 1,
//!     head: Some("a2".into()),
//!     hidden: 1,
//! }));
//! ```

use crate::Result;
use rustc_hash::{FxHashMap, FxHashSet};
use threadfold_core::{Budget, FoldConfig, FoldError, FoldStore, Node, NodeId, ensure_unique_ids};

type LevelKey = Option<NodeId>;

/// One line of the flattened view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    /// A visible reply.
    Post { depth: usize, id: Option<NodeId> },
    /// A "show N more" affordance for a collapsed run.
    ShowMore {
        depth: usize,
        head: Option<NodeId>,
        hidden: usize,
    },
    /// Descendants counted by the supplier but not handed over yet.
    Unloaded {
        depth: usize,
        parent: Option<NodeId>,
        count: usize,
    },
}

impl Row {
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Post { depth, .. } | Self::ShowMore { depth, .. } | Self::Unloaded { depth, .. } => {
                *depth
            }
        }
    }
}

/// Interactive fold state for a whole reply tree.
#[derive(Debug, Default)]
pub struct ThreadView {
    config: FoldConfig,
    roots: Vec<Node>,
    levels: FxHashMap<LevelKey, FoldStore>,
    /// Level that lists each id.
    owner: FxHashMap<NodeId, LevelKey>,
    pinned: Option<NodeId>,
}

impl ThreadView {
    #[must_use]
    pub fn new(config: FoldConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn config(&self) -> &FoldConfig {
        &self.config
    }

    /// Replace the tree and reconcile every visible level against it.
    ///
    /// # Errors
    ///
    /// Fails if an id appears twice anywhere in `roots`. The view is left
    /// exactly as it was.
    pub fn sync(&mut self, roots: Vec<Node>) -> Result<()> {
        validate_thread(&roots)?;
        let previous = std::mem::replace(&mut self.roots, roots);
        if let Err(err) = self.refresh() {
            self.roots = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Keep the reply `id` and its ancestors visible (e.g. a permalink).
    ///
    /// # Errors
    ///
    /// See [`sync`](Self::sync).
    pub fn pin(&mut self, id: impl Into<NodeId>) -> Result<()> {
        self.pinned = Some(id.into());
        self.refresh()
    }

    /// # Errors
    ///
    /// See [`sync`](Self::sync).
    pub fn unpin(&mut self) -> Result<()> {
        self.pinned = None;
        self.refresh()
    }

    /// Fold the reply `id` away. Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// See [`sync`](Self::sync).
    pub fn collapse(&mut self, id: &NodeId) -> Result<bool> {
        let changed = match self.store_for(id) {
            Some(store) => store.collapse(id),
            None => false,
        };
        if changed {
            self.refresh()?;
        }
        Ok(changed)
    }

    /// Expand the reply `id` by the configured step.
    ///
    /// # Errors
    ///
    /// See [`sync`](Self::sync).
    pub fn expand(&mut self, id: &NodeId) -> Result<bool> {
        self.expand_by(id, self.config.expand_step.get())
    }

    /// Expand the reply `id` by `additional` nodes at its level.
    ///
    /// # Errors
    ///
    /// See [`sync`](Self::sync).
    pub fn expand_by(&mut self, id: &NodeId, additional: usize) -> Result<bool> {
        let changed = match self.store_for(id) {
            Some(store) => store.expand_by(id, additional),
            None => false,
        };
        if changed {
            self.refresh()?;
        }
        Ok(changed)
    }

    /// The store holding the level that lists `id`.
    #[must_use]
    pub fn level_of(&self, id: &NodeId) -> Option<&FoldStore> {
        let key = self.owner.get(id)?;
        self.levels.get(key)
    }

    /// Visible nodes granted by expand across all levels.
    #[must_use]
    pub fn granted(&self) -> usize {
        self.levels.values().map(FoldStore::granted).sum()
    }

    /// Number of live per-level stores.
    #[must_use]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Flatten the view, depth first, in sibling order.
    #[must_use]
    pub fn rows(&self) -> Vec<Row> {
        let mut rows = Vec::new();
        self.push_rows(&None, 0, &mut rows);
        rows
    }

    /// Number of visible replies.
    #[must_use]
    pub fn visible_posts(&self) -> usize {
        self.rows()
            .iter()
            .filter(|row| matches!(row, Row::Post { .. }))
            .count()
    }

    fn store_for(&mut self, id: &NodeId) -> Option<&mut FoldStore> {
        let key = self.owner.get(id)?;
        self.levels.get_mut(key)
    }

    fn refresh(&mut self) -> Result<()> {
        let pin_path = match &self.pinned {
            Some(id) => path_to(&self.roots, id).unwrap_or_default(),
            None => Vec::new(),
        };
        // Built on the side so a failed level leaves the view untouched.
        let mut levels = self.levels.clone();
        let mut walk = Walk {
            config: self.config,
            levels: &mut levels,
            owner: FxHashMap::default(),
            visited: FxHashSet::default(),
            pin_path: &pin_path,
        };
        walk.sync_level(None, &self.roots, self.config.budget, 0)?;

        let Walk { owner, visited, .. } = walk;
        // Keep decisions for levels one fold away from being visible again.
        levels.retain(|key, _| match key {
            None => true,
            Some(id) => visited.contains(key) || owner.contains_key(id),
        });
        self.levels = levels;
        self.owner = owner;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            message = "thread.refresh",
            levels = self.levels.len(),
            visited = visited.len(),
        );
        Ok(())
    }

    fn push_rows(&self, key: &LevelKey, depth: usize, rows: &mut Vec<Row>) {
        let Some(store) = self.levels.get(key) else {
            return;
        };
        for state in store.states() {
            if let Some(hidden) = state.collapsed_size {
                rows.push(Row::ShowMore {
                    depth,
                    head: state.id().cloned(),
                    hidden,
                });
            }
            if state.is_collapsed() {
                continue;
            }
            let id = state.id().cloned();
            rows.push(Row::Post {
                depth,
                id: id.clone(),
            });
            let node = &state.node;
            if id.is_some() && !node.children().is_empty() {
                self.push_rows(&id, depth + 1, rows);
            } else if id.is_none() && node.deep_count() > 0 {
                rows.push(Row::Unloaded {
                    depth: depth + 1,
                    parent: None,
                    count: node.deep_count(),
                });
                continue;
            }
            let unloaded = node.unloaded_count();
            if unloaded > 0 {
                rows.push(Row::Unloaded {
                    depth: depth + 1,
                    parent: id,
                    count: unloaded,
                });
            }
        }
    }
}

/// Recursive level sync over a borrowed tree.
struct Walk<'a> {
    config: FoldConfig,
    levels: &'a mut FxHashMap<LevelKey, FoldStore>,
    owner: FxHashMap<NodeId, LevelKey>,
    visited: FxHashSet<LevelKey>,
    pin_path: &'a [NodeId],
}

impl Walk<'_> {
    fn sync_level(
        &mut self,
        key: LevelKey,
        nodes: &[Node],
        budget: Budget,
        depth: usize,
    ) -> Result<()> {
        let config = self.config;
        let store = self
            .levels
            .entry(key.clone())
            .or_insert_with(|| FoldStore::new(config));
        match self.pin_path.get(depth) {
            Some(id) => store.pin(id.clone()),
            None => store.unpin(),
        }
        store.sync_with_budget(nodes, budget)?;
        let snapshot = store.snapshot();
        self.visited.insert(key.clone());

        for state in snapshot.iter() {
            let Some(id) = state.id() else {
                continue;
            };
            self.owner.insert(id.clone(), key.clone());
            if state.is_collapsed() || state.node.children().is_empty() {
                continue;
            }
            let child_budget = match budget {
                Budget::Unlimited => Budget::Unlimited,
                Budget::Limited(_) => Budget::Limited(state.expanded_size - 1),
            };
            self.sync_level(
                Some(id.clone()),
                state.node.children(),
                child_budget,
                depth + 1,
            )?;
        }
        Ok(())
    }
}

/// Reject trees where an id appears twice, among siblings or across levels.
fn validate_thread(roots: &[Node]) -> std::result::Result<(), FoldError> {
    let mut seen: FxHashMap<&NodeId, Option<&NodeId>> = FxHashMap::default();
    check_level(roots, None, &mut seen)
}

fn check_level<'a>(
    nodes: &'a [Node],
    parent: Option<&'a NodeId>,
    seen: &mut FxHashMap<&'a NodeId, Option<&'a NodeId>>,
) -> std::result::Result<(), FoldError> {
    ensure_unique_ids(nodes)?;
    for node in nodes {
        let Some(id) = node.id() else {
            continue;
        };
        if let Some(first_parent) = seen.insert(id, parent) {
            return Err(FoldError::DuplicateThreadId {
                id: id.clone(),
                first_parent: first_parent.cloned(),
                second_parent: parent.cloned(),
            });
        }
        check_level(node.children(), Some(id), seen)?;
    }
    Ok(())
}

/// Ids from a root down to `target`, inclusive.
fn path_to(nodes: &[Node], target: &NodeId) -> Option<Vec<NodeId>> {
    for node in nodes {
        let Some(id) = node.id() else {
            continue;
        };
        if id == target {
            return Some(vec![id.clone()]);
        }
        if let Some(mut path) = path_to(node.children(), target) {
            path.insert(0, id.clone());
            return Some(path);
        }
    }
    None
}
