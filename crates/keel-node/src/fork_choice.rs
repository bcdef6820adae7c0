//! Longest-chain fork choice.
//!
//! Picks the highest block among the detached tips. The tail only moves when
//! a tip is strictly higher; among equally high tips the lowest hash wins so
//! every node settles on the same head.

use std::sync::Arc;

use tracing::info;

use keel_core::block::ChainBlock;
use keel_core::chain::Blockchain;
use keel_core::error::ChainError;
use keel_core::traits::ConsensusHandler;

#[derive(Debug, Default, Clone, Copy)]
pub struct LongestChain;

impl LongestChain {
    /// The tip the tail should move to, if any.
    pub fn best_tip(tail: &ChainBlock, tips: &[Arc<ChainBlock>]) -> Option<Arc<ChainBlock>> {
        tips.iter()
            .filter(|tip| tip.height() > tail.height())
            .max_by(|a, b| {
                a.height()
                    .cmp(&b.height())
                    .then_with(|| b.hash().cmp(&a.hash()))
            })
            .cloned()
    }
}

impl ConsensusHandler for LongestChain {
    fn fork_choice(&self, chain: &Blockchain) -> Result<(), ChainError> {
        let snapshot = chain.head_snapshot();
        let Some(best) = Self::best_tip(&snapshot.tail, &snapshot.detached_tips) else {
            return Ok(());
        };
        let switch = chain.set_tail(Arc::clone(&best))?;
        info!(
            tail = %best.hash(),
            height = best.height(),
            reverted = switch.reverted,
            "fork choice moved tail"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::merkle::merkle_root;
    use keel_core::traits::RootStateBackend;
    use keel_core::types::{Block, BlockHeader, Hash256};

    fn block(height: u64, salt: u8) -> Arc<ChainBlock> {
        let b = Block {
            header: BlockHeader {
                version: 1,
                chain_id: 1,
                parent_hash: Hash256([salt; 32]),
                height,
                timestamp: 0,
                coinbase: Hash256([salt; 32]),
                state_root: Hash256::ZERO,
                txs_root: merkle_root(&[]),
                nonce: u64::from(salt),
            },
            transactions: vec![],
        };
        Arc::new(ChainBlock::bind(b, &RootStateBackend, None).unwrap())
    }

    #[test]
    fn no_tips_keeps_tail() {
        assert!(LongestChain::best_tip(&block(5, 0), &[]).is_none());
    }

    #[test]
    fn lower_or_equal_tips_keep_tail() {
        let tail = block(5, 0);
        assert!(LongestChain::best_tip(&tail, &[block(5, 1), block(3, 2)]).is_none());
    }

    #[test]
    fn highest_tip_wins() {
        let tail = block(5, 0);
        let tips = vec![block(6, 1), block(8, 2), block(7, 3)];
        let best = LongestChain::best_tip(&tail, &tips).unwrap();
        assert_eq!(best.height(), 8);
    }

    #[test]
    fn ties_break_on_lowest_hash() {
        let tail = block(1, 0);
        let tips = vec![block(4, 1), block(4, 2), block(4, 3)];
        let lowest = tips.iter().map(|t| t.hash()).min().unwrap();
        assert_eq!(LongestChain::best_tip(&tail, &tips).unwrap().hash(), lowest);
    }
}
