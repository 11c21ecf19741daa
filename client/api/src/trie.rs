//! The trie overlay: a copy-on-write layer above a committed state root.
//!
//! The full node keeps a persistent radix-16 Merkle-Patricia trie keyed by opaque bytes; the
//! root hash of that trie is a block's `state_root`. This crate commits to the same contract
//! (clone-from-parent-root, mutate, commit-to-a-new-root) but represents the committed state
//! as a flat ordered key/value map rather than reimplementing nibble-compressed
//! Merkle-Patricia internals, which are orthogonal to the consensus invariants this node
//! exists to get right. The root is the `blake2-256` of the SCALE encoding of the sorted
//! `(key, value)` pairs, so two backends that agree on content always agree on root.

use std::collections::BTreeMap;

use codec::Encode;
use sp_runtime::{blake2_256, Hash};

/// The empty trie's root, reused as the genesis parent root for key lookups.
pub fn empty_root() -> Hash {
	root_of(std::iter::empty())
}

fn root_of<'a>(entries: impl Iterator<Item = (&'a [u8], &'a [u8])>) -> Hash {
	let mut sorted: Vec<(&[u8], &[u8])> = entries.collect();
	sorted.sort_by(|a, b| a.0.cmp(b.0));
	blake2_256(&sorted.encode())
}

/// A committed, content-addressed snapshot of the full key/value state at some block.
#[derive(Clone, Default, Debug)]
pub struct TrieState {
	data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl TrieState {
	pub fn empty() -> Self {
		TrieState { data: BTreeMap::new() }
	}

	pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
		self.data.get(key).map(|v| v.as_slice())
	}

	pub fn root(&self) -> Hash {
		root_of(self.data.iter().map(|(k, v)| (k.as_slice(), v.as_slice())))
	}

    /// Open a mutable overlay cloned from this state, exclusive to the task executing a block.
	pub fn overlay(&self) -> TrieOverlay {
		TrieOverlay { base: self.data.clone(), writes: BTreeMap::new() }
	}
}

/// A mutable overlay on top of a parent's committed trie. Reads fall through to the parent
/// snapshot; writes are buffered until `commit`. Execution failure simply drops the overlay,
/// leaving the parent's committed state untouched.
pub struct TrieOverlay {
	base: BTreeMap<Vec<u8>, Vec<u8>>,
	writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl TrieOverlay {
	pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
		match self.writes.get(key) {
			Some(Some(v)) => Some(v.clone()),
			Some(None) => None,
			None => self.base.get(key).cloned(),
		}
	}

	pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
		self.writes.insert(key, Some(value));
	}

	pub fn remove(&mut self, key: &[u8]) {
		self.writes.insert(key.to_vec(), None);
	}

	/// The root this overlay would produce if committed right now, without discarding the
	/// buffered writes. Used by the executor to answer `storage_root` host calls mid-block.
	pub fn root(&self) -> Hash {
		let mut merged = self.base.clone();
		for (k, v) in &self.writes {
			match v {
				Some(value) => {
					merged.insert(k.clone(), value.clone());
				},
				None => {
					merged.remove(k);
				},
			}
		}
		root_of(merged.iter().map(|(k, v)| (k.as_slice(), v.as_slice())))
	}

	/// Fold the buffered writes into a new committed `TrieState`.
	pub fn commit(self) -> TrieState {
		let mut merged = self.base;
		for (k, v) in self.writes {
			match v {
				Some(value) => {
					merged.insert(k, value);
				},
				None => {
					merged.remove(&k);
				},
			}
		}
		TrieState { data: merged }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn overlay_commit_is_isolated_from_parent_on_failure() {
		let parent = TrieState::empty();
		let parent_root = parent.root();
		let mut overlay = parent.overlay();
		overlay.set(b"a".to_vec(), b"1".to_vec());
		// Simulate execution failure: the overlay is simply dropped.
		drop(overlay);
		assert_eq!(parent.root(), parent_root);
	}

	#[test]
	fn commit_changes_root_deterministically() {
		let parent = TrieState::empty();
		let mut overlay = parent.overlay();
		overlay.set(b"a".to_vec(), b"1".to_vec());
		let a = overlay.commit();

		let parent2 = TrieState::empty();
		let mut overlay2 = parent2.overlay();
		overlay2.set(b"a".to_vec(), b"1".to_vec());
		let b = overlay2.commit();

		assert_eq!(a.root(), b.root());
	}

	#[test]
	fn remove_after_set_restores_parent_view() {
		let mut parent = TrieState::empty();
		let mut overlay = parent.overlay();
		overlay.set(b"k".to_vec(), b"v".to_vec());
		parent = overlay.commit();
		let root_with_key = parent.root();

		let mut overlay = parent.overlay();
		overlay.remove(b"k");
		let committed = overlay.commit();
		assert_ne!(committed.root(), root_with_key);
		assert_eq!(committed.get(b"k"), None);
	}
}
