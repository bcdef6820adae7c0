//! Scenario and property tests for the Keel chain state.
//!
//! The tests drive the chain state through admission, tail switches, and
//! reorganizations across `keel-core` and `keel-node`, checking the
//! canonical-chain invariants under randomized chain shapes.

pub mod helpers;
