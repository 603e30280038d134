//! Folding a sibling into its neighbouring collapsed run.

use crate::node::NodeId;
use crate::state::{NodeState, position_of, run_head};

/// Fold the sibling with `id` away.
///
/// The sibling joins the collapsed run directly before it, or starts a new
/// run. A run directly after it is absorbed, so the level never holds two
/// adjacent runs. Unknown ids and already collapsed siblings leave the
/// states unchanged.
#[must_use]
pub fn collapse(states: &[NodeState], id: &NodeId) -> Vec<NodeState> {
    let mut next = states.to_vec();
    let Some(index) = position_of(states, id) else {
        log_collapse(id, true);
        return next;
    };
    if next[index].is_collapsed() {
        log_collapse(id, true);
        return next;
    }

    let own = next[index].own_size();
    next[index].expanded_size = 0;

    let head = if index > 0 && next[index - 1].is_collapsed() {
        let head = run_head(&next, index - 1);
        next[index].collapsed_size = None;
        let merged = next[head].collapsed_size.unwrap_or(0).saturating_add(own);
        next[head].collapsed_size = Some(merged);
        head
    } else {
        next[index].collapsed_size = Some(own);
        index
    };

    let absorbed = next
        .get_mut(index + 1)
        .and_then(|after| after.collapsed_size.take());
    if let Some(absorbed) = absorbed {
        let merged = next[head].collapsed_size.unwrap_or(0).saturating_add(absorbed);
        next[head].collapsed_size = Some(merged);
    }

    log_collapse(id, false);
    next
}

#[cfg(feature = "tracing")]
fn log_collapse(id: &NodeId, noop: bool) {
    tracing::debug!(message = "fold.collapse", id = %id, noop);
}

#[cfg(not(feature = "tracing"))]
#[inline]
fn log_collapse(_id: &NodeId, _noop: bool) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocate::allocate;
    use crate::node::Node;
    use crate::state::{AllocParams, Budget, check_invariants};

    fn baseline() -> Vec<NodeState> {
        let nodes = vec![
            Node::new(0u64).with_deep_count(0),
            Node::new(1u64)
                .with_deep_count(2)
                .with_children(vec![Node::new("a"), Node::new("b")]),
            Node::new(2u64).with_deep_count(0),
            Node::new(3u64).with_deep_count(0),
        ];
        allocate(&nodes, &AllocParams::unlimited()).unwrap()
    }

    #[test]
    fn consecutive_collapses_share_one_head() {
        let once = collapse(&baseline(), &0u64.into());
        assert_eq!(once[0].collapsed_size, Some(1));

        let twice = collapse(&once, &1u64.into());
        assert_eq!(twice[0].expanded_size, 0);
        assert_eq!(twice[0].collapsed_size, Some(4));
        assert_eq!(twice[1].expanded_size, 0);
        assert_eq!(twice[1].collapsed_size, None);
        assert!(check_invariants(&twice, Budget::Unlimited, 0).is_empty());
    }

    #[test]
    fn collapse_is_idempotent() {
        let once = collapse(&baseline(), &1u64.into());
        assert_eq!(collapse(&once, &1u64.into()), once);
    }

    #[test]
    fn unknown_id_is_noop() {
        let states = baseline();
        assert_eq!(collapse(&states, &"missing".into()), states);
    }

    #[test]
    fn bridging_collapse_merges_both_runs() {
        let states = collapse(&baseline(), &0u64.into());
        let states = collapse(&states, &2u64.into());
        let states = collapse(&states, &3u64.into());
        assert_eq!(states[0].collapsed_size, Some(1));
        assert_eq!(states[2].collapsed_size, Some(2));

        let bridged = collapse(&states, &1u64.into());
        assert_eq!(bridged[0].collapsed_size, Some(6));
        assert!(bridged[1..].iter().all(|s| s.collapsed_size.is_none()));
        assert!(check_invariants(&bridged, Budget::Unlimited, 0).is_empty());
    }

    #[test]
    fn collapse_before_run_takes_over_head() {
        let states = collapse(&baseline(), &3u64.into());
        let states = collapse(&states, &2u64.into());
        assert_eq!(states[2].collapsed_size, Some(2));
        assert_eq!(states[3].collapsed_size, None);
    }

    #[test]
    fn partial_sibling_can_be_collapsed() {
        let nodes = vec![Node::new("a").with_deep_count(4), Node::new("b")];
        let states = allocate(&nodes, &AllocParams::new(3)).unwrap();
        assert_eq!(states[0].expanded_size, 2);
        let states = collapse(&states, &"a".into());
        assert_eq!(states[0].collapsed_size, Some(5));
    }
}
