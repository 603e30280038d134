//! Budget allocation across one sibling level.
//!
//! Siblings are visited left to right. Each one receives up to
//! `min_subtree` nodes (capped by what is left), so earlier siblings never
//! get less than later ones when the budget is tight. Once the budget is
//! spent, every remaining sibling folds into a single trailing run whose
//! head carries the run's total size. Budget left over after the first pass
//! deepens subtrees, again left to right.
//!
//! ```
//! use threadfold_core::{AllocParams, Node, allocate};
//!
//! let nodes = vec![
//!     Node::new("a"),
//!     Node::new("b").with_deep_count(1),
//!     Node::new("c"),
//! ];
//! let states = allocate(&nodes, &AllocParams::new(1)).unwrap();
//! assert_eq!(states[0].expanded_size, 1);
//! assert_eq!(states[1].collapsed_size, Some(3));
//! assert_eq!(states[2].collapsed_size, None);
//! ```

use crate::error::FoldError;
use crate::node::{Node, NodeId};
use crate::state::{AllocParams, Budget, NodeState, position_of, regroup, visible_total};
use rustc_hash::FxHashMap;

/// Allocate `params.budget` visible nodes across `nodes`.
///
/// The output has one entry per input node, in input order.
///
/// # Errors
///
/// Returns [`FoldError::DuplicateId`] if two siblings share an id.
pub fn allocate(nodes: &[Node], params: &AllocParams) -> Result<Vec<NodeState>, FoldError> {
    ensure_unique_ids(nodes)?;
    Ok(allocate_level(nodes.to_vec(), params))
}

/// Reject sibling lists where an id appears twice. Anonymous nodes never
/// collide.
///
/// # Errors
///
/// Returns [`FoldError::DuplicateId`] naming both positions.
pub fn ensure_unique_ids(nodes: &[Node]) -> Result<(), FoldError> {
    let mut seen: FxHashMap<&NodeId, usize> =
        FxHashMap::with_capacity_and_hasher(nodes.len(), Default::default());
    for (index, node) in nodes.iter().enumerate() {
        let Some(id) = node.id() else {
            continue;
        };
        if let Some(&first) = seen.get(id) {
            return Err(FoldError::DuplicateId {
                id: id.clone(),
                first,
                second: index,
            });
        }
        seen.insert(id, index);
    }
    Ok(())
}

/// Allocation over an already validated sibling list.
pub(crate) fn allocate_level(nodes: Vec<Node>, params: &AllocParams) -> Vec<NodeState> {
    #[cfg(feature = "tracing")]
    let span = tracing::debug_span!(
        "fold.allocate",
        siblings = nodes.len(),
        budget = %params.budget,
        groups = tracing::field::Empty,
    );
    #[cfg(feature = "tracing")]
    let _guard = span.enter();

    let Some(total) = params.budget.limit() else {
        return nodes.into_iter().map(NodeState::expanded).collect();
    };

    let min_subtree = params.min_subtree.get();
    let mut states = Vec::with_capacity(nodes.len());
    // Unsigned: once the run opens, the affordance has taken the (virtual)
    // last unit and `remaining` stays pinned at zero.
    let mut remaining = total;
    let mut group_head: Option<usize> = None;
    let mut group_overflow = 0usize;

    for (index, node) in nodes.into_iter().enumerate() {
        let own = node.own_size();
        if remaining > 0 {
            let cap = min_subtree.min(remaining);
            let expanded = cap.min(own);
            remaining -= expanded;
            states.push(NodeState::with_size(node, expanded));
        } else if group_head.is_none() {
            states.push(NodeState {
                node,
                expanded_size: 0,
                collapsed_size: Some(own),
            });
            group_head = Some(index);
        } else {
            group_overflow = group_overflow.saturating_add(own);
            states.push(NodeState::with_size(node, 0));
        }
    }

    if remaining > 0 {
        deepen(&mut states, remaining);
    }

    if let Some(head) = group_head {
        let size = states[head].collapsed_size.unwrap_or(0);
        states[head].collapsed_size = Some(size.saturating_add(group_overflow));
    }

    if let Some(pinned) = &params.pinned {
        honor_pin(&mut states, pinned, params.budget);
    }

    #[cfg(feature = "tracing")]
    span.record(
        "groups",
        states.iter().filter(|s| s.is_group_head()).count() as u64,
    );

    states
}

/// Spend leftover budget deepening subtrees, earliest sibling first.
fn deepen(states: &mut [NodeState], mut remaining: usize) {
    for state in states.iter_mut() {
        if remaining == 0 {
            break;
        }
        let missing = state.hidden_count();
        if missing == 0 {
            continue;
        }
        let extra = missing.min(remaining);
        state.expanded_size += extra;
        state.collapsed_size = None;
        remaining -= extra;
    }
}

/// Make sure the pinned sibling shows at least itself.
///
/// The unit is taken from the right-most sibling that can spare one without
/// folding away. With no such donor the level runs one over budget.
pub(crate) fn honor_pin(states: &mut [NodeState], pinned: &NodeId, budget: Budget) {
    let Some(index) = position_of(states, pinned) else {
        return;
    };
    if !states[index].is_collapsed() {
        return;
    }

    if !budget.admits(visible_total(states).saturating_add(1)) {
        match (0..states.len())
            .rev()
            .find(|&j| states[j].expanded_size >= 2)
        {
            Some(donor) => states[donor].expanded_size -= 1,
            None => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    message = "fold.pin_overrun",
                    pinned = %pinned,
                    budget = %budget,
                );
            }
        }
    }

    states[index].expanded_size = 1;
    regroup(states);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::check_invariants;
    use std::num::NonZeroUsize;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn sizes(states: &[NodeState]) -> Vec<(usize, Option<usize>)> {
        states
            .iter()
            .map(|s| (s.expanded_size, s.collapsed_size))
            .collect()
    }

    fn forum_level() -> Vec<Node> {
        vec![
            Node::new(0u64).with_deep_count(0),
            Node::new(1u64)
                .with_deep_count(2)
                .with_children(vec![Node::new("a"), Node::new("b")]),
            Node::new(2u64).with_deep_count(0),
            Node::new(3u64).with_deep_count(0),
        ]
    }

    #[test]
    fn wide_reservation_fills_second_subtree() {
        let params = AllocParams::new(5).min_subtree(nz(3));
        let states = allocate(&forum_level(), &params).unwrap();
        assert_eq!(
            sizes(&states),
            vec![(1, None), (3, None), (1, None), (0, Some(1))]
        );
        assert!(check_invariants(&states, params.budget, 0).is_empty());
    }

    #[test]
    fn narrow_reservation_leaves_subtree_partial() {
        let params = AllocParams::new(4).min_subtree(nz(2));
        let states = allocate(&forum_level(), &params).unwrap();
        assert_eq!(
            sizes(&states),
            vec![(1, None), (2, None), (1, None), (0, Some(1))]
        );
    }

    #[test]
    fn trailing_run_absorbs_overflow() {
        let nodes = vec![
            Node::new("a").with_deep_count(0),
            Node::new("b").with_deep_count(1),
            Node::new("c").with_deep_count(0),
        ];
        let states = allocate(&nodes, &AllocParams::new(1)).unwrap();
        assert_eq!(sizes(&states), vec![(1, None), (0, Some(3)), (0, None)]);
    }

    #[test]
    fn unlimited_budget_expands_everything() {
        let states = allocate(&forum_level(), &AllocParams::unlimited().pinned(3u64)).unwrap();
        assert_eq!(
            sizes(&states),
            vec![(1, None), (3, None), (1, None), (1, None)]
        );
        // Children pass through untouched.
        assert_eq!(states[1].node.children().len(), 2);
    }

    #[test]
    fn empty_level() {
        assert!(allocate(&[], &AllocParams::new(10)).unwrap().is_empty());
    }

    #[test]
    fn zero_budget_folds_everything() {
        let states = allocate(&forum_level(), &AllocParams::new(0)).unwrap();
        assert_eq!(
            sizes(&states),
            vec![(0, Some(6)), (0, None), (0, None), (0, None)]
        );
    }

    #[test]
    fn reservation_larger_than_budget_is_clamped() {
        let nodes = vec![Node::new("a").with_deep_count(9), Node::new("b")];
        let params = AllocParams::new(4).min_subtree(nz(100));
        let states = allocate(&nodes, &params).unwrap();
        assert_eq!(sizes(&states), vec![(4, None), (0, Some(1))]);
    }

    #[test]
    fn leftover_deepens_earliest_subtree_first() {
        let nodes = vec![
            Node::new("a").with_deep_count(2),
            Node::new("b").with_deep_count(2),
            Node::new("c").with_deep_count(2),
        ];
        let states = allocate(&nodes, &AllocParams::new(5)).unwrap();
        assert_eq!(sizes(&states), vec![(3, None), (1, None), (1, None)]);

        let states = allocate(&nodes, &AllocParams::new(8)).unwrap();
        assert_eq!(sizes(&states), vec![(3, None), (3, None), (2, None)]);
    }

    #[test]
    fn budget_larger_than_tree_shows_all() {
        let states = allocate(&forum_level(), &AllocParams::new(100)).unwrap();
        assert!(states.iter().all(NodeState::is_fully_expanded));
    }

    #[test]
    fn pin_takes_unit_from_rightmost_donor() {
        let nodes = vec![
            Node::new("a").with_deep_count(2),
            Node::new("b"),
            Node::new("c"),
        ];
        let params = AllocParams::new(3).min_subtree(nz(3)).pinned("c");
        let states = allocate(&nodes, &params).unwrap();
        assert_eq!(sizes(&states), vec![(2, None), (0, Some(1)), (1, None)]);
        assert!(check_invariants(&states, params.budget, 0).is_empty());
    }

    #[test]
    fn pin_without_donor_overruns_by_one() {
        let nodes: Vec<Node> = ["a", "b", "c", "d"].into_iter().map(Node::new).collect();
        let params = AllocParams::new(2).pinned("d");
        let states = allocate(&nodes, &params).unwrap();
        assert_eq!(
            sizes(&states),
            vec![(1, None), (1, None), (0, Some(1)), (1, None)]
        );
        assert_eq!(visible_total(&states), 3);
        assert!(check_invariants(&states, params.budget, 1).is_empty());
    }

    #[test]
    fn pin_in_middle_of_run_splits_it() {
        let nodes: Vec<Node> = ["a", "b", "c", "d", "e"]
            .into_iter()
            .map(|id| Node::new(id).with_deep_count(1))
            .collect();
        let params = AllocParams::new(2).min_subtree(nz(2)).pinned("c");
        let states = allocate(&nodes, &params).unwrap();
        assert_eq!(
            sizes(&states),
            vec![(1, None), (0, Some(2)), (1, None), (0, Some(4)), (0, None)]
        );
        assert!(check_invariants(&states, params.budget, 0).is_empty());
    }

    #[test]
    fn pin_already_visible_is_untouched() {
        let params = AllocParams::new(4).min_subtree(nz(2)).pinned(0u64);
        let pinned = allocate(&forum_level(), &params).unwrap();
        let plain = allocate(&forum_level(), &params.clone().with_pin(None)).unwrap();
        assert_eq!(pinned, plain);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let nodes = vec![Node::new("x"), Node::new("y"), Node::new("x")];
        assert_eq!(
            allocate(&nodes, &AllocParams::new(3)),
            Err(FoldError::DuplicateId {
                id: NodeId::from("x"),
                first: 0,
                second: 2
            })
        );
    }

    #[test]
    fn anonymous_nodes_never_collide() {
        let nodes = vec![Node::anonymous(), Node::anonymous()];
        let states = allocate(&nodes, &AllocParams::new(1)).unwrap();
        assert_eq!(sizes(&states), vec![(1, None), (0, Some(1))]);
    }
}
