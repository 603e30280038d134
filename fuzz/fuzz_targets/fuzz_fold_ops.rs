#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use std::num::NonZeroUsize;
use threadfold_core::{
    AllocParams, Budget, Node, NodeId, allocate, check_invariants, collapse, expand_with,
    reconcile, visible_total,
};

#[derive(Debug, Arbitrary)]
struct Input {
    budget: u8,
    min_subtree: u8,
    pinned: Option<u8>,
    siblings: Vec<u8>,
    ops: Vec<Op>,
}

#[derive(Debug, Arbitrary)]
enum Op {
    Collapse(u8),
    Expand(u8, u8),
    /// Drop one sibling and re-run reconciliation.
    Remove(u8),
    /// Append a fresh sibling with the given deep count.
    Append(u8),
}

fuzz_target!(|input: Input| {
    // Keep levels small so slow inputs stay interesting.
    if input.siblings.len() > 64 || input.ops.len() > 64 {
        return;
    }
    let min_subtree = NonZeroUsize::new(usize::from(input.min_subtree % 8).max(1))
        .unwrap_or(NonZeroUsize::MIN);
    let budget = Budget::Limited(usize::from(input.budget));
    let mut params = AllocParams::new(budget).min_subtree(min_subtree);
    if let Some(pin) = input.pinned {
        params = params.pinned(u64::from(pin) % 64);
    }

    let mut nodes: Vec<Node> = input
        .siblings
        .iter()
        .enumerate()
        .map(|(i, &deep)| Node::new(i as u64).with_deep_count(usize::from(deep % 16)))
        .collect();
    let mut next_id = nodes.len() as u64;

    let mut states = allocate(&nodes, &params).expect("ids are unique");
    assert_eq!(states.len(), nodes.len());
    let slack = usize::from(params.pinned.is_some());
    let violations = check_invariants(&states, budget, slack);
    assert!(violations.is_empty(), "allocate: {violations:?}");

    for op in input.ops {
        match op {
            Op::Collapse(i) => {
                let id = NodeId::from(u64::from(i) % next_id.max(1));
                let before = states.iter().map(|s| s.expanded_size).sum::<usize>();
                states = collapse(&states, &id);
                let after = states.iter().map(|s| s.expanded_size).sum::<usize>();
                assert!(after <= before, "collapse grew the level");
            }
            Op::Expand(i, extra) => {
                let id = NodeId::from(u64::from(i) % next_id.max(1));
                let before = visible_total(&states);
                states = expand_with(&states, &id, usize::from(extra % 16), min_subtree);
                // Revealed nodes are granted to the level.
                let revealed = visible_total(&states).saturating_sub(before);
                params.budget = match params.budget {
                    Budget::Limited(n) => Budget::Limited(n + revealed),
                    Budget::Unlimited => Budget::Unlimited,
                };
            }
            Op::Remove(i) => {
                if nodes.is_empty() {
                    continue;
                }
                nodes.remove(usize::from(i) % nodes.len());
                states = reconcile(&nodes, &states, &params).expect("ids are unique");
            }
            Op::Append(deep) => {
                nodes.push(Node::new(next_id).with_deep_count(usize::from(deep % 16)));
                next_id += 1;
                states = reconcile(&nodes, &states, &params).expect("ids are unique");
            }
        }

        assert_eq!(states.len(), nodes.len());
        let violations = check_invariants(&states, params.budget, slack);
        assert!(violations.is_empty(), "{violations:?}");
    }
});
