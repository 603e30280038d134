//! Growing a collapsed run back out.
//!
//! The run holding the target is re-allocated on its own with the extra
//! budget, the target pinned so it always comes back. Whatever that budget
//! cannot pay for stays folded behind a (possibly new) head. Siblings
//! outside the run are untouched.

use crate::allocate::allocate_level;
use crate::node::{Node, NodeId};
use crate::state::{AllocParams, Budget, NodeState, position_of, run_end, run_head};
use std::num::NonZeroUsize;

/// Expand the collapsed sibling `id` using `additional` more visible nodes.
///
/// Equivalent to [`expand_with`] with a per-sibling reservation of one.
#[must_use]
pub fn expand(states: &[NodeState], id: &NodeId, additional: usize) -> Vec<NodeState> {
    expand_with(states, id, additional, NonZeroUsize::MIN)
}

/// Expand the collapsed sibling `id`, reserving `min_subtree` per run member.
///
/// Unknown ids, visible siblings and a zero `additional` budget leave the
/// states unchanged.
#[must_use]
pub fn expand_with(
    states: &[NodeState],
    id: &NodeId,
    additional: usize,
    min_subtree: NonZeroUsize,
) -> Vec<NodeState> {
    let target = position_of(states, id).filter(|&index| states[index].is_collapsed());
    let Some(index) = target.filter(|_| additional > 0) else {
        #[cfg(feature = "tracing")]
        tracing::debug!(message = "fold.expand", id = %id, noop = true);
        return states.to_vec();
    };

    let head = run_head(states, index);
    let end = run_end(states, head);
    let members: Vec<Node> = states[head..end].iter().map(|s| s.node.clone()).collect();
    let params = AllocParams {
        budget: Budget::Limited(additional),
        min_subtree,
        pinned: Some(id.clone()),
    };
    let run = allocate_level(members, &params);

    #[cfg(feature = "tracing")]
    tracing::debug!(
        message = "fold.expand",
        id = %id,
        noop = false,
        run_len = end - head,
        additional,
    );

    let mut next = Vec::with_capacity(states.len());
    next.extend_from_slice(&states[..head]);
    next.extend(run);
    next.extend_from_slice(&states[end..]);
    next
}
