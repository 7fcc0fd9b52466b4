//! Hook execution ordering.
//!
//! A single permutation of hook indices drives both the prehook phase and
//! the posthook/cleanup phase. The sort is stable: ties on priority keep
//! registration order, so re-adding hooks with identical priorities is
//! deterministic.

use std::sync::Arc;

use crate::hook::Hook;

/// Compute the execution order for `hooks`: indices stable-sorted by
/// `(priority, registration index)` ascending.
///
/// The result is always a valid permutation of `0..hooks.len()`. It must be
/// recomputed whenever the hook list changes.
#[must_use]
pub fn execution_order(hooks: &[Arc<dyn Hook>]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..hooks.len()).collect();
    order.sort_by_key(|&index| (hooks[index].priority(), index));
    order
}
