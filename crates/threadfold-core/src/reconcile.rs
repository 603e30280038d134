//! Identity-based re-allocation after the sibling list changes.
//!
//! Siblings whose id was already present keep their previous
//! `expanded_size`, so a user's collapse or expand survives new replies
//! arriving, unrelated replies disappearing, and reordering. Only the new
//! siblings go through the allocator, funded by whatever the kept entries
//! leave of the budget. Group heads are then re-derived for the new order,
//! and a pinned sibling is brought back if it ended up folded.

use crate::allocate::{allocate_level, ensure_unique_ids, honor_pin};
use crate::error::FoldError;
use crate::node::{Node, NodeId};
use crate::state::{AllocParams, Budget, NodeState, regroup};
use rustc_hash::FxHashMap;

/// Re-allocate `nodes` while preserving the decisions in `previous`.
///
/// With an empty `previous` this is exactly [`allocate`](crate::allocate).
///
/// # Errors
///
/// Returns [`FoldError::DuplicateId`] if two siblings in `nodes` share an id.
pub fn reconcile(
    nodes: &[Node],
    previous: &[NodeState],
    params: &AllocParams,
) -> Result<Vec<NodeState>, FoldError> {
    ensure_unique_ids(nodes)?;

    let by_id: FxHashMap<&NodeId, usize> = previous
        .iter()
        .enumerate()
        .filter_map(|(index, state)| state.id().map(|id| (id, index)))
        .collect();

    // Slot per input position: reused size, or None for a fresh sibling.
    let mut reused: Vec<Option<usize>> = Vec::with_capacity(nodes.len());
    let mut fresh: Vec<Node> = Vec::new();
    let mut kept_total = 0usize;
    for node in nodes {
        let prior = node
            .id()
            .and_then(|id| by_id.get(id))
            .map(|&index| previous[index].expanded_size.min(node.own_size()));
        match prior {
            Some(size) => kept_total = kept_total.saturating_add(size),
            None => fresh.push(node.clone()),
        }
        reused.push(prior);
    }

    let leftover = match params.budget {
        Budget::Unlimited => Budget::Unlimited,
        Budget::Limited(total) => Budget::Limited(total.saturating_sub(kept_total)),
    };

    #[cfg(feature = "tracing")]
    tracing::debug!(
        message = "fold.reconcile",
        reused = nodes.len() - fresh.len(),
        fresh = fresh.len(),
        leftover = %leftover,
    );

    let fresh_params = AllocParams {
        budget: leftover,
        min_subtree: params.min_subtree,
        pinned: None,
    };
    let mut allocated = allocate_level(fresh, &fresh_params).into_iter();

    let mut states = Vec::with_capacity(nodes.len());
    for (node, prior) in nodes.iter().zip(reused) {
        let state = match prior {
            Some(size) => NodeState::with_size(node.clone(), size),
            // One allocated entry per fresh node, in the same order.
            None => match allocated.next() {
                Some(state) => state,
                None => NodeState::expanded(node.clone()),
            },
        };
        states.push(state);
    }

    regroup(&mut states);
    // The pin applies to reused siblings too, so it runs over the whole level.
    if let Some(pinned) = &params.pinned {
        honor_pin(&mut states, pinned, params.budget);
    }
    Ok(states)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocate::allocate;
    use crate::collapse::collapse;
    use crate::expand::expand;
    use crate::state::{check_invariants, visible_total};

    fn leaves(ids: &[&str]) -> Vec<Node> {
        ids.iter().map(|&id| Node::new(id)).collect()
    }

    fn sizes(states: &[NodeState]) -> Vec<(usize, Option<usize>)> {
        states
            .iter()
            .map(|s| (s.expanded_size, s.collapsed_size))
            .collect()
    }

    #[test]
    fn empty_previous_matches_allocate() {
        let nodes = vec![
            Node::new("a").with_deep_count(3),
            Node::new("b").with_deep_count(1),
            Node::new("c"),
        ];
        let params = AllocParams::new(3);
        assert_eq!(
            reconcile(&nodes, &[], &params).unwrap(),
            allocate(&nodes, &params).unwrap()
        );
    }

    #[test]
    fn user_expansion_survives_new_reply() {
        let nodes = leaves(&["a", "b", "c", "d"]);
        let params = AllocParams::new(2);
        let first = allocate(&nodes, &params).unwrap();
        let opened = expand(&first, &NodeId::from("c"), 2);
        assert_eq!(opened[2].expanded_size, 1);
        assert_eq!(opened[3].expanded_size, 1);

        let mut grown = nodes.clone();
        grown.insert(0, Node::new("new"));
        let states = reconcile(&grown, &opened, &params).unwrap();
        assert_eq!(
            sizes(&states),
            vec![(0, Some(1)), (1, None), (1, None), (1, None), (1, None)]
        );
    }

    #[test]
    fn new_siblings_get_leftover_budget() {
        let params = AllocParams::new(4);
        let first = allocate(&leaves(&["a", "b"]), &params).unwrap();
        let states = reconcile(&leaves(&["a", "b", "c", "d", "e"]), &first, &params).unwrap();
        assert_eq!(
            sizes(&states),
            vec![(1, None), (1, None), (1, None), (1, None), (0, Some(1))]
        );
        assert!(check_invariants(&states, params.budget, 0).is_empty());
    }

    #[test]
    fn removal_splits_group_sizes_back_apart() {
        let nodes = leaves(&["a", "b", "c", "d"]);
        let params = AllocParams::new(1);
        let first = allocate(&nodes, &params).unwrap();
        assert_eq!(first[1].collapsed_size, Some(3));

        // Drop the head; the next collapsed sibling takes over the run.
        let states = reconcile(&leaves(&["a", "c", "d"]), &first, &params).unwrap();
        assert_eq!(sizes(&states), vec![(1, None), (0, Some(2)), (0, None)]);
    }

    #[test]
    fn reorder_merges_collapsed_neighbours() {
        let nodes = leaves(&["a", "b", "c"]);
        let collapsed_a = collapse(&allocate(&nodes, &AllocParams::unlimited()).unwrap(), &"a".into());
        let collapsed_ac = collapse(&collapsed_a, &"c".into());
        assert_eq!(
            sizes(&collapsed_ac),
            vec![(0, Some(1)), (1, None), (0, Some(1))]
        );

        let states =
            reconcile(&leaves(&["a", "c", "b"]), &collapsed_ac, &AllocParams::unlimited()).unwrap();
        assert_eq!(sizes(&states), vec![(0, Some(2)), (0, None), (1, None)]);
    }

    #[test]
    fn pure_reorder_keeps_decisions() {
        let nodes = vec![
            Node::new("a").with_deep_count(2),
            Node::new("b").with_deep_count(5),
            Node::new("c"),
            Node::new("d").with_deep_count(1),
        ];
        let params = AllocParams::new(5);
        let first = allocate(&nodes, &params).unwrap();
        let reversed: Vec<Node> = nodes.iter().rev().cloned().collect();
        let states = reconcile(&reversed, &first, &params).unwrap();
        let expected: Vec<usize> = first.iter().rev().map(|s| s.expanded_size).collect();
        let got: Vec<usize> = states.iter().map(|s| s.expanded_size).collect();
        assert_eq!(got, expected);
        assert!(check_invariants(&states, params.budget, 0).is_empty());
    }

    #[test]
    fn shrunk_subtree_clamps_reused_size() {
        let params = AllocParams::unlimited();
        let first = allocate(&[Node::new("a").with_deep_count(5)], &params).unwrap();
        let states = reconcile(&[Node::new("a").with_deep_count(1)], &first, &params).unwrap();
        assert_eq!(states[0].expanded_size, 2);
    }

    #[test]
    fn grown_subtree_updates_group_size() {
        let params = AllocParams::new(1);
        let first = allocate(&leaves(&["a", "b"]), &params).unwrap();
        let grown = vec![Node::new("a"), Node::new("b").with_deep_count(6)];
        let states = reconcile(&grown, &first, &params).unwrap();
        assert_eq!(sizes(&states), vec![(1, None), (0, Some(7))]);
    }

    #[test]
    fn anonymous_nodes_are_always_fresh() {
        let params = AllocParams::new(1);
        let first = allocate(&[Node::anonymous()], &params).unwrap();
        let states = reconcile(&[Node::anonymous(), Node::new("x")], &first, &params).unwrap();
        assert_eq!(sizes(&states), vec![(1, None), (0, Some(1))]);
        assert_eq!(visible_total(&states), 1);
    }

    #[test]
    fn pin_reopens_reused_sibling() {
        let params = AllocParams::new(1);
        let first = allocate(&leaves(&["a", "b", "c"]), &params).unwrap();
        let states = reconcile(&leaves(&["a", "b", "c"]), &first, &params.pinned("c")).unwrap();
        assert_eq!(sizes(&states), vec![(1, None), (0, Some(1)), (1, None)]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = reconcile(&leaves(&["a", "a"]), &[], &AllocParams::new(2));
        assert!(matches!(err, Err(FoldError::DuplicateId { .. })));
    }
}
