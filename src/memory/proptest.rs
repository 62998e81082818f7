//! Property-based tests for the memory store using proptest.
//!
//! These tests drive stores with arbitrary ordered event streams and check
//! the invariants that must hold regardless of input:
//!
//! - Strength and confidence stay in `[0, 1]`
//! - Evidence sub-counters always sum to their totals
//! - Decay is idempotent and never moves a node back to ACTIVE
//! - Revival lifts strength above its decayed value
//! - Identical inputs replay to identical state
