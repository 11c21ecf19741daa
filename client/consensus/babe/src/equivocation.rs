//! Equivocation detection: the same authority producing two different headers for the same
//! slot. Recorded for reporting; it does not by itself block import — a block that otherwise
//! verifies is still a valid chain candidate even if its author also equivocated elsewhere.

use std::collections::HashMap;

use parking_lot::Mutex;
use sp_consensus::Slot;
use sp_consensus_babe::AuthorityIndex;
use sp_runtime::Hash;

/// Tracks the one header hash seen so far per `(slot, authority_index)`. A second, different
/// hash for a key already present is an equivocation.
pub struct EquivocationTracker {
	seen: Mutex<HashMap<(Slot, AuthorityIndex), Hash>>,
}

impl EquivocationTracker {
	pub fn new() -> Self {
		EquivocationTracker { seen: Mutex::new(HashMap::new()) }
	}

	/// Record that `authority_index` produced `header_hash` for `slot`. Returns the
	/// previously-seen hash if this is an equivocation (a different header for the same key).
	pub fn observe(&self, slot: Slot, authority_index: AuthorityIndex, header_hash: Hash) -> Option<Hash> {
		let mut seen = self.seen.lock();
		match seen.insert((slot, authority_index), header_hash) {
			Some(previous) if previous != header_hash => Some(previous),
			_ => None,
		}
	}
}

impl Default for EquivocationTracker {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn same_header_twice_is_not_an_equivocation() {
		let tracker = EquivocationTracker::new();
		assert!(tracker.observe(Slot(1), 0, [1; 32]).is_none());
		assert!(tracker.observe(Slot(1), 0, [1; 32]).is_none());
	}

	#[test]
	fn two_different_headers_for_the_same_slot_and_authority_is_an_equivocation() {
		let tracker = EquivocationTracker::new();
		assert!(tracker.observe(Slot(1), 0, [1; 32]).is_none());
		let previous = tracker.observe(Slot(1), 0, [2; 32]);
		assert_eq!(previous, Some([1; 32]));
	}

	#[test]
	fn different_authorities_in_the_same_slot_do_not_collide() {
		let tracker = EquivocationTracker::new();
		assert!(tracker.observe(Slot(1), 0, [1; 32]).is_none());
		assert!(tracker.observe(Slot(1), 1, [2; 32]).is_none());
	}
}
