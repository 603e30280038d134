//! Annotated per-sibling view state.
//!
//! # Invariants
//!
//! 1. `expanded_size <= own_size` for every entry.
//! 2. `Σ expanded_size <= budget` when the budget is limited (a pinned id may
//!    relax this by exactly one).
//! 3. An entry carries `collapsed_size` iff it is collapsed and it starts
//!    its run of collapsed siblings.
//! 4. A head's `collapsed_size` is the summed own size of its run.

use crate::node::{Node, NodeId};
use std::fmt;
use std::num::NonZeroUsize;

/// Node-count budget for one sibling level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "state-persistence",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum Budget {
    /// Everything is shown.
    #[default]
    Unlimited,
    /// At most this many nodes are shown.
    Limited(usize),
}

impl Budget {
    /// The limit, if any.
    #[must_use]
    pub const fn limit(self) -> Option<usize> {
        match self {
            Self::Unlimited => None,
            Self::Limited(n) => Some(n),
        }
    }

    /// Whether `used` fits inside this budget.
    #[must_use]
    pub const fn admits(self, used: usize) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Limited(n) => used <= n,
        }
    }
}

impl From<usize> for Budget {
    fn from(n: usize) -> Self {
        Self::Limited(n)
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => f.write_str("unlimited"),
            Self::Limited(n) => write!(f, "{n}"),
        }
    }
}

/// Parameters for one allocation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocParams {
    /// Total nodes visible at this level.
    pub budget: Budget,
    /// Per-sibling reservation before any subtree is deepened.
    pub min_subtree: NonZeroUsize,
    /// Sibling guaranteed at least one visible node.
    pub pinned: Option<NodeId>,
}

impl AllocParams {
    /// Parameters with the given budget, a reservation of one and no pin.
    #[must_use]
    pub fn new(budget: impl Into<Budget>) -> Self {
        Self {
            budget: budget.into(),
            min_subtree: NonZeroUsize::MIN,
            pinned: None,
        }
    }

    /// Parameters that show everything.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(Budget::Unlimited)
    }

    /// Set the per-sibling reservation.
    #[must_use]
    pub fn min_subtree(mut self, min: NonZeroUsize) -> Self {
        self.min_subtree = min;
        self
    }

    /// Pin a sibling.
    #[must_use]
    pub fn pinned(mut self, id: impl Into<NodeId>) -> Self {
        self.pinned = Some(id.into());
        self
    }

    /// Replace the pin.
    #[must_use]
    pub fn with_pin(mut self, pinned: Option<NodeId>) -> Self {
        self.pinned = pinned;
        self
    }
}

impl Default for AllocParams {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// One sibling's allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "state-persistence",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct NodeState {
    /// The input node, unmodified.
    pub node: Node,
    /// Nodes of this subtree currently counted as visible; `0` = folded away.
    pub expanded_size: usize,
    /// Summed own size of the collapsed run this entry heads.
    pub collapsed_size: Option<usize>,
}

impl NodeState {
    /// A fully expanded entry.
    #[must_use]
    pub fn expanded(node: Node) -> Self {
        let expanded_size = node.own_size();
        Self {
            node,
            expanded_size,
            collapsed_size: None,
        }
    }

    /// An entry with the given visible size and no group role.
    #[must_use]
    pub fn with_size(node: Node, expanded_size: usize) -> Self {
        Self {
            node,
            expanded_size,
            collapsed_size: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<&NodeId> {
        self.node.id()
    }

    #[inline]
    #[must_use]
    pub fn own_size(&self) -> usize {
        self.node.own_size()
    }

    /// Folded away entirely.
    #[inline]
    #[must_use]
    pub fn is_collapsed(&self) -> bool {
        self.expanded_size == 0
    }

    /// First member of a collapsed run.
    #[inline]
    #[must_use]
    pub fn is_group_head(&self) -> bool {
        self.collapsed_size.is_some()
    }

    #[must_use]
    pub fn is_fully_expanded(&self) -> bool {
        self.expanded_size >= self.own_size()
    }

    /// Nodes of this subtree that are not visible.
    #[must_use]
    pub fn hidden_count(&self) -> usize {
        self.own_size().saturating_sub(self.expanded_size)
    }
}

/// Summed visible size across a level.
#[must_use]
pub fn visible_total(states: &[NodeState]) -> usize {
    states
        .iter()
        .fold(0usize, |acc, s| acc.saturating_add(s.expanded_size))
}

/// Summed hidden size across a level.
#[must_use]
pub fn hidden_total(states: &[NodeState]) -> usize {
    states
        .iter()
        .fold(0usize, |acc, s| acc.saturating_add(s.hidden_count()))
}

/// Index of the entry with the given id.
#[must_use]
pub fn position_of(states: &[NodeState], id: &NodeId) -> Option<usize> {
    states.iter().position(|s| s.node.has_id(id))
}

/// Index of the head of the collapsed run containing `index`.
///
/// `index` must point at a collapsed entry.
pub(crate) fn run_head(states: &[NodeState], index: usize) -> usize {
    let mut head = index;
    while head > 0 && states[head - 1].is_collapsed() && !states[head].is_group_head() {
        head -= 1;
    }
    head
}

/// One past the last member of the collapsed run starting at `head`.
pub(crate) fn run_end(states: &[NodeState], head: usize) -> usize {
    let mut end = head + 1;
    while end < states.len() && states[end].is_collapsed() && !states[end].is_group_head() {
        end += 1;
    }
    end
}

/// Re-derive group heads and their sizes from the expanded sizes alone.
///
/// Adjacent collapsed entries are merged under the earliest one; a head
/// separated from members it used to absorb gets its size split back.
pub(crate) fn regroup(states: &mut [NodeState]) -> usize {
    let mut groups = 0;
    let mut head: Option<usize> = None;
    for i in 0..states.len() {
        if !states[i].is_collapsed() {
            states[i].collapsed_size = None;
            head = None;
            continue;
        }
        let own = states[i].own_size();
        match head {
            Some(h) => {
                states[i].collapsed_size = None;
                let merged = states[h].collapsed_size.unwrap_or(0).saturating_add(own);
                states[h].collapsed_size = Some(merged);
            }
            None => {
                states[i].collapsed_size = Some(own);
                head = Some(i);
                groups += 1;
            }
        }
    }
    groups
}

/// A broken invariant found by [`check_invariants`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// `expanded_size` exceeds the subtree's own size.
    Oversized {
        index: usize,
        expanded: usize,
        own: usize,
    },
    /// The level shows more than the budget allows.
    OverBudget { used: usize, budget: usize },
    /// A collapsed entry starting a run has no `collapsed_size`.
    MissingHead { index: usize },
    /// `collapsed_size` set on an entry that is not a run start.
    StrayHead { index: usize },
    /// A head's `collapsed_size` differs from its run's summed size.
    WrongGroupSize {
        index: usize,
        recorded: usize,
        actual: usize,
    },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Oversized {
                index,
                expanded,
                own,
            } => write!(f, "entry {index}: expanded {expanded} > own size {own}"),
            Self::OverBudget { used, budget } => {
                write!(f, "visible total {used} exceeds budget {budget}")
            }
            Self::MissingHead { index } => write!(f, "entry {index}: run start without head"),
            Self::StrayHead { index } => write!(f, "entry {index}: head outside run start"),
            Self::WrongGroupSize {
                index,
                recorded,
                actual,
            } => write!(f, "entry {index}: group size {recorded}, run holds {actual}"),
        }
    }
}

/// Check every structural invariant of a level.
///
/// `slack` is added to a limited budget before comparing; pass `1` when a
/// pin may have forced an overrun.
#[must_use]
pub fn check_invariants(
    states: &[NodeState],
    budget: Budget,
    slack: usize,
) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    for (index, state) in states.iter().enumerate() {
        let own = state.own_size();
        if state.expanded_size > own {
            violations.push(InvariantViolation::Oversized {
                index,
                expanded: state.expanded_size,
                own,
            });
        }
    }

    if let Some(limit) = budget.limit() {
        let used = visible_total(states);
        if used > limit.saturating_add(slack) {
            violations.push(InvariantViolation::OverBudget {
                used,
                budget: limit,
            });
        }
    }

    let mut i = 0;
    while i < states.len() {
        if !states[i].is_collapsed() {
            if states[i].is_group_head() {
                violations.push(InvariantViolation::StrayHead { index: i });
            }
            i += 1;
            continue;
        }
        let start = i;
        let mut actual = 0usize;
        while i < states.len() && states[i].is_collapsed() {
            actual = actual.saturating_add(states[i].own_size());
            if i != start && states[i].is_group_head() {
                violations.push(InvariantViolation::StrayHead { index: i });
            }
            i += 1;
        }
        match states[start].collapsed_size {
            None => violations.push(InvariantViolation::MissingHead { index: start }),
            Some(recorded) if recorded != actual => {
                violations.push(InvariantViolation::WrongGroupSize {
                    index: start,
                    recorded,
                    actual,
                });
            }
            Some(_) => {}
        }
    }

    violations
}
