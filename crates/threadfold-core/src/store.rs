//! Per-level holder of the current annotated state.
//!
//! A [`FoldStore`] is the only stateful piece: it keeps the latest snapshot
//! for one sibling level and replaces it wholesale after every operation.
//! Snapshots are shared `Arc<[NodeState]>`, so a renderer holding one never
//! sees it change underneath.
//!
//! Nodes revealed by an expand are granted on top of the configured budget,
//! so the level budget always covers what the user opened and a later sync
//! keeps `Σ expanded_size` within it.
//!
//! # Example
//!
//! ```
//! use threadfold_core::{FoldConfig, FoldStore, Node};
//!
//! let mut store = FoldStore::new(FoldConfig::new(2));
//! let replies = vec![Node::new("a"), Node::new("b"), Node::new("c")];
//! store.sync(&replies).unwrap();
//! assert_eq!(store.snapshot()[2].collapsed_size, Some(1));
//!
//! assert!(store.expand(&"c".into()));
//! assert_eq!(store.snapshot()[2].expanded_size, 1);
//! ```

use crate::collapse::collapse;
use crate::config::FoldConfig;
use crate::error::FoldError;
use crate::expand::expand_with;
use crate::node::{Node, NodeId};
use crate::reconcile::reconcile;
use crate::state::{AllocParams, Budget, NodeState, visible_total};
use std::sync::Arc;

/// Current fold state of one sibling level.
#[derive(Debug, Clone)]
pub struct FoldStore {
    config: FoldConfig,
    pinned: Option<NodeId>,
    states: Arc<[NodeState]>,
    /// Visible nodes added by expand on top of `config.budget`.
    granted: usize,
    generation: u64,
}

impl Default for FoldStore {
    fn default() -> Self {
        Self::new(FoldConfig::default())
    }
}

impl FoldStore {
    /// An empty store.
    #[must_use]
    pub fn new(config: FoldConfig) -> Self {
        Self {
            config,
            pinned: None,
            states: Arc::from(Vec::new()),
            granted: 0,
            generation: 0,
        }
    }

    #[must_use]
    pub fn config(&self) -> &FoldConfig {
        &self.config
    }

    /// Change the configured level budget; applies from the next sync.
    pub fn set_budget(&mut self, budget: Budget) {
        self.config.budget = budget;
    }

    /// Configured budget plus everything granted by expand.
    #[must_use]
    pub fn budget(&self) -> Budget {
        match self.config.budget {
            Budget::Unlimited => Budget::Unlimited,
            Budget::Limited(n) => Budget::Limited(n.saturating_add(self.granted)),
        }
    }

    /// Visible nodes granted by expand since the last reallocation.
    #[must_use]
    pub fn granted(&self) -> usize {
        self.granted
    }

    #[must_use]
    pub fn pinned(&self) -> Option<&NodeId> {
        self.pinned.as_ref()
    }

    /// Pin a sibling; applies from the next sync.
    pub fn pin(&mut self, id: impl Into<NodeId>) {
        self.pinned = Some(id.into());
    }

    pub fn unpin(&mut self) {
        self.pinned = None;
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<[NodeState]> {
        Arc::clone(&self.states)
    }

    /// Borrow the current states.
    #[must_use]
    pub fn states(&self) -> &[NodeState] {
        &self.states
    }

    /// Bumped every time the snapshot is replaced.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Reconcile a fresh sibling list against the current state.
    ///
    /// Kept decisions that no longer fit the level budget (it was lowered)
    /// are dropped and the level is allocated from scratch.
    ///
    /// Returns whether the snapshot changed.
    ///
    /// # Errors
    ///
    /// Returns [`FoldError::DuplicateId`] if two siblings share an id; the
    /// store is left untouched.
    pub fn sync(&mut self, nodes: &[Node]) -> Result<bool, FoldError> {
        let mut params = self.config.params(self.pinned.clone());
        params.budget = self.budget();
        let next = reconcile(nodes, &self.states, &params)?;
        if fits(&next, &params) {
            self.grant_overrun(&next, params.budget);
            return Ok(self.replace(next));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            message = "fold.store.realloc",
            budget = %self.config.budget,
            granted = self.granted,
            kept = visible_total(&next),
        );
        self.granted = 0;
        params.budget = self.config.budget;
        let next = reconcile(nodes, &[], &params)?;
        self.grant_overrun(&next, params.budget);
        Ok(self.replace(next))
    }

    /// A pin forced past the budget keeps its unit, so the level stays
    /// within [`budget`](Self::budget) once the pin is lifted.
    fn grant_overrun(&mut self, states: &[NodeState], budget: Budget) {
        if let Budget::Limited(limit) = budget {
            let over = visible_total(states).saturating_sub(limit);
            self.granted = self.granted.saturating_add(over);
        }
    }

    /// [`sync`](Self::sync) with a new level budget.
    ///
    /// # Errors
    ///
    /// See [`sync`](Self::sync).
    pub fn sync_with_budget(&mut self, nodes: &[Node], budget: Budget) -> Result<bool, FoldError> {
        self.config.budget = budget;
        self.sync(nodes)
    }

    /// Fold the sibling `id` away. Returns whether anything changed.
    pub fn collapse(&mut self, id: &NodeId) -> bool {
        let next = collapse(&self.states, id);
        self.replace(next)
    }

    /// Expand the sibling `id` by the configured step.
    pub fn expand(&mut self, id: &NodeId) -> bool {
        self.expand_by(id, self.config.expand_step.get())
    }

    /// Expand the sibling `id` by `additional` nodes.
    ///
    /// The nodes actually revealed are added to the level budget.
    pub fn expand_by(&mut self, id: &NodeId, additional: usize) -> bool {
        let before = visible_total(&self.states);
        let next = expand_with(&self.states, id, additional, self.config.min_subtree);
        let revealed = visible_total(&next).saturating_sub(before);
        if !self.replace(next) {
            return false;
        }
        self.granted = self.granted.saturating_add(revealed);
        true
    }

    /// Drop all state and grants; the next sync allocates from scratch.
    pub fn reset(&mut self) {
        self.granted = 0;
        self.replace(Vec::new());
    }

    fn replace(&mut self, next: Vec<NodeState>) -> bool {
        if *self.states == *next {
            return false;
        }
        self.states = Arc::from(next);
        self.generation += 1;
        #[cfg(feature = "tracing")]
        tracing::trace!(
            message = "fold.store.replace",
            generation = self.generation,
            siblings = self.states.len(),
        );
        true
    }
}

/// Whether `states` stay within the budget, allowing the pin its one unit.
fn fits(states: &[NodeState], params: &AllocParams) -> bool {
    let slack = usize::from(params.pinned.is_some());
    match params.budget {
        Budget::Unlimited => true,
        Budget::Limited(limit) => visible_total(states) <= limit.saturating_add(slack),
    }
}

// ============================================================================
// Stateful Persistence
// ============================================================================

/// Saved fold decisions of one level.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "state-persistence",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct FoldPersistState {
    pub pinned: Option<NodeId>,
    pub states: Vec<NodeState>,
    #[cfg_attr(feature = "state-persistence", serde(default))]
    pub granted: usize,
}

impl FoldStore {
    /// Capture the current decisions.
    #[must_use]
    pub fn save_state(&self) -> FoldPersistState {
        FoldPersistState {
            pinned: self.pinned.clone(),
            states: self.states.to_vec(),
            granted: self.granted,
        }
    }

    /// Restore saved decisions; the next sync reconciles them against the
    /// live sibling list.
    pub fn restore_state(&mut self, state: FoldPersistState) {
        self.pinned = state.pinned;
        self.granted = state.granted;
        self.replace(state.states);
    }
}
