//! Reorganization scenarios and chain-shape properties.
//!
//! Chains are built from genesis on an in-memory store. Property tests pick
//! a main branch length, a fork point, and a competing branch length, then
//! check the common ancestor, the reorg count, and the transactions handed
//! back to the pool.

use std::collections::HashSet;
use std::sync::Arc;

use keel_core::error::ChainError;
use keel_core::traits::{ConsensusHandler, TransactionPool};
use keel_core::types::Hash256;
use keel_node_lib::fork_choice::LongestChain;
use keel_tests::helpers::*;
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

// ------------------------------------------------------------------
// Scenarios
// ------------------------------------------------------------------

#[test]
fn competing_branch_reverts_old_blocks() {
    let t = memory_chain();
    let g = t.chain.genesis();
    let ab = extend(&t.chain, &g, 2, 1);
    t.chain.set_tail(ab[1].clone()).unwrap();
    assert!(t.pool.is_empty());

    let cd = extend(&t.chain, &g, 2, 2);
    let switch = t.chain.set_tail(cd[1].clone()).unwrap();

    assert_eq!(switch.ancestor.hash(), g.hash());
    assert_eq!(switch.reverted, 2);
    assert!(switch.is_reorg());
    assert_eq!(t.chain.tail().hash(), cd[1].hash());
    let returned: HashSet<Hash256> = txids_of(&ab).into_iter().collect();
    assert_eq!(t.pool.len(), returned.len());
    for txid in &returned {
        assert!(t.pool.contains(txid));
    }
}

#[test]
fn forward_switch_returns_nothing() {
    let t = memory_chain();
    let g = t.chain.genesis();
    let blocks = extend(&t.chain, &g, 5, 1);
    t.chain.set_tail(blocks[1].clone()).unwrap();
    let switch = t.chain.set_tail(blocks[4].clone()).unwrap();
    assert_eq!(switch.reverted, 0);
    assert_eq!(switch.ancestor.hash(), blocks[1].hash());
    assert!(t.pool.is_empty());
}

#[test]
fn unknown_block_resolves_through_parent() {
    let t = memory_chain();
    let g = t.chain.genesis();
    let main = extend(&t.chain, &g, 3, 1);
    t.chain.set_tail(main[2].clone()).unwrap();

    let side = build_branch(&t.chain, &main[0], 1, 2);
    let ancestor = t.chain.find_common_ancestor(&side[0]).unwrap();
    assert_eq!(ancestor.hash(), main[0].hash());
}

#[test]
fn block_unknown_with_unknown_parent_is_not_located() {
    let t = memory_chain();
    let g = t.chain.genesis();
    let detached = build_branch(&t.chain, &g, 2, 3);
    let err = t.chain.find_common_ancestor(&detached[1]).unwrap_err();
    assert_eq!(err, ChainError::NotLocated(detached[1].hash()));
}

#[test]
fn window_from_non_canonical_block_fails() {
    let t = memory_chain();
    let g = t.chain.genesis();
    let main = extend(&t.chain, &g, 3, 1);
    let side = extend(&t.chain, &g, 1, 2);
    t.chain.set_tail(main[2].clone()).unwrap();
    let err = t.chain.descendant_window(4, &side[0]).unwrap_err();
    assert_eq!(err, ChainError::NotCanonical(side[0].hash()));
}

#[test]
fn unknown_lookup_leaves_detached_tips_untouched() {
    let t = memory_chain();
    let g = t.chain.genesis();
    let tips = build_branch(&t.chain, &g, 1, 4);
    t.chain.admit(&tips, &tips).unwrap();
    assert!(t.chain.get_block(&Hash256([0x77; 32])).is_none());
    let detached: Vec<Hash256> = t.chain.detached_tips().iter().map(|b| b.hash()).collect();
    assert_eq!(detached, vec![tips[0].hash()]);
}

#[test]
fn repeated_reorgs_return_each_transaction_once() {
    let t = memory_chain();
    let g = t.chain.genesis();
    let main = extend(&t.chain, &g, 3, 1);
    let side = extend(&t.chain, &g, 4, 2);

    t.chain.set_tail(main[2].clone()).unwrap();
    t.chain.set_tail(side[3].clone()).unwrap();
    t.chain.set_tail(main[2].clone()).unwrap();

    // Both branches have been reverted once; every id is pooled exactly once.
    let all: HashSet<Hash256> = txids_of(&main)
        .into_iter()
        .chain(txids_of(&side))
        .collect();
    assert_eq!(t.pool.len(), all.len());
}

#[test]
fn repeated_reorgs_return_each_block_once_per_reversion() {
    let (chain, pool) = recording_chain();
    let g = chain.genesis();
    let main = extend(&chain, &g, 3, 1);
    let side = extend(&chain, &g, 4, 2);

    chain.set_tail(main[2].clone()).unwrap();
    chain.set_tail(side[3].clone()).unwrap();
    chain.set_tail(main[2].clone()).unwrap();

    let expected: Vec<Hash256> = main
        .iter()
        .rev()
        .chain(side.iter().rev())
        .map(|b| b.hash())
        .collect();
    assert_eq!(pool.returned(), expected);
    assert!(!pool.returned().contains(&g.hash()));
}

#[test]
fn fork_choice_follows_longest_branch() {
    let t = memory_chain();
    let handler: Arc<dyn ConsensusHandler> = Arc::new(LongestChain);
    t.chain.set_consensus_handler(&handler);
    let g = t.chain.genesis();

    let main = build_branch(&t.chain, &g, 3, 1);
    t.chain.admit(&main, &main[2..]).unwrap();
    t.chain.consensus_handler().unwrap().fork_choice(&t.chain).unwrap();
    assert_eq!(t.chain.tail().hash(), main[2].hash());
    assert!(t.chain.detached_tips().is_empty());

    let side = build_branch(&t.chain, &main[0], 3, 2);
    t.chain.admit(&side, &side[2..]).unwrap();
    t.chain.consensus_handler().unwrap().fork_choice(&t.chain).unwrap();
    assert_eq!(t.chain.tail().hash(), side[2].hash());
    assert_eq!(t.pool.len(), 2);
    assert_eq!(
        t.chain.find_common_ancestor(&main[2]).unwrap().hash(),
        main[0].hash()
    );
}

#[test]
fn admission_order_does_not_change_outcome() {
    let t = memory_chain();
    let g = t.chain.genesis();
    let mut blocks = build_branch(&t.chain, &g, 12, 5);
    let tip = blocks[11].clone();
    blocks.shuffle(&mut StdRng::seed_from_u64(7));
    t.chain.admit(&blocks, &[]).unwrap();

    let switch = t.chain.set_tail(tip.clone()).unwrap();
    assert_eq!(switch.ancestor.hash(), g.hash());
    let window = t.chain.descendant_window(12, &g).unwrap();
    let heights: Vec<u64> = window.iter().map(|b| b.height()).collect();
    assert_eq!(heights, (1..=12).collect::<Vec<_>>());
}

#[test]
fn dump_walks_from_tail_to_genesis() {
    let t = memory_chain();
    let g = t.chain.genesis();
    let blocks = extend(&t.chain, &g, 3, 1);
    t.chain.set_tail(blocks[2].clone()).unwrap();

    let dump = t.chain.dump(10);
    let lines: Vec<&str> = dump.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("{3, hash: "));
    assert!(lines[3].starts_with("{0, hash: "));
}

// ------------------------------------------------------------------
// Properties
// ------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn tail_is_its_own_ancestor(len in 0usize..20) {
        let t = memory_chain();
        let g = t.chain.genesis();
        let blocks = extend(&t.chain, &g, len, 1);
        if let Some(last) = blocks.last() {
            t.chain.set_tail(last.clone()).unwrap();
        }
        let tail = t.chain.tail();
        let ancestor = t.chain.find_common_ancestor(&tail).unwrap();
        prop_assert_eq!(ancestor.hash(), tail.hash());
    }

    #[test]
    fn fork_at_prefix_reverts_divergent_suffix(
        main_len in 1usize..12,
        fork_seed in 0usize..12,
        extra in 1usize..6,
    ) {
        let fork_at = fork_seed % (main_len + 1);
        let t = memory_chain();
        let g = t.chain.genesis();
        let main = extend(&t.chain, &g, main_len, 1);
        t.chain.set_tail(main[main_len - 1].clone()).unwrap();

        let fork_block = if fork_at == 0 { g.clone() } else { main[fork_at - 1].clone() };
        let side_len = main_len - fork_at + extra;
        let side = extend(&t.chain, &fork_block, side_len, 2);

        let switch = t.chain.set_tail(side[side_len - 1].clone()).unwrap();
        prop_assert_eq!(switch.ancestor.hash(), fork_block.hash());
        prop_assert_eq!(switch.reverted, (main_len - fork_at) as u64);

        let reverted = txids_of(&main[fork_at..]);
        prop_assert_eq!(t.pool.len(), reverted.len());
        for txid in &reverted {
            prop_assert!(t.pool.contains(txid));
        }
        for txid in txids_of(&main[..fork_at]) {
            prop_assert!(!t.pool.contains(&txid));
        }
    }

    #[test]
    fn reverted_blocks_are_returned_once_each(
        main_len in 1usize..12,
        fork_seed in 0usize..12,
        extra in 1usize..6,
    ) {
        let fork_at = fork_seed % (main_len + 1);
        let (chain, pool) = recording_chain();
        let g = chain.genesis();
        let main = extend(&chain, &g, main_len, 1);
        chain.set_tail(main[main_len - 1].clone()).unwrap();
        prop_assert!(pool.returned().is_empty());

        let fork_block = if fork_at == 0 { g.clone() } else { main[fork_at - 1].clone() };
        let side = extend(&chain, &fork_block, main_len - fork_at + extra, 2);
        chain.set_tail(side.last().unwrap().clone()).unwrap();

        // Old tail first, down to but excluding the fork block.
        let expected: Vec<Hash256> = main[fork_at..].iter().rev().map(|b| b.hash()).collect();
        prop_assert_eq!(pool.returned(), expected);
    }

    #[test]
    fn forward_switch_never_reorgs(len in 1usize..15, split in 0usize..15) {
        let t = memory_chain();
        let g = t.chain.genesis();
        let blocks = extend(&t.chain, &g, len, 1);
        let first = split % len;
        t.chain.set_tail(blocks[first].clone()).unwrap();
        let switch = t.chain.set_tail(blocks[len - 1].clone()).unwrap();
        prop_assert_eq!(switch.reverted, 0);
        prop_assert!(!switch.is_reorg());
        prop_assert!(t.pool.is_empty());
    }

    #[test]
    fn window_is_bounded_and_ascending(
        len in 1usize..25,
        from_seed in 0usize..25,
        n in 0usize..30,
    ) {
        let t = memory_chain();
        let g = t.chain.genesis();
        let blocks = extend(&t.chain, &g, len, 1);
        t.chain.set_tail(blocks[len - 1].clone()).unwrap();

        let from_idx = from_seed % (len + 1);
        let from = if from_idx == 0 { g.clone() } else { blocks[from_idx - 1].clone() };
        let window = t.chain.descendant_window(n, &from).unwrap();

        let after = len - from_idx;
        prop_assert_eq!(window.len(), n.min(after));
        for (i, b) in window.iter().enumerate() {
            prop_assert_eq!(b.height(), from.height() + 1 + i as u64);
        }
    }
}
