//! Fork-aware epoch descriptor storage.
//!
//! At any imported block, its epoch descriptor is "the nearest ancestor that announced it via
//! a `NextEpochData` digest" — two competing forks can each announce a different authority set
//! for the same epoch index, and a lookup at a block on one fork must never see the other
//! fork's announcement. This is implemented the same way `sc-client-api`'s backend resolves
//! `:code` for a block: walk ancestors from the query point until a hash with a recorded
//! announcement is found.
//!
//! A general-purpose fork tree would also solve this, at the cost of a second branch-pruning
//! structure alongside the backend's own. This crate instead reuses the ancestor-walk idiom
//! `sc-client-api::InMemoryBackend` already establishes for the same kind of fork-aware lookup.
//! See `DESIGN.md` for why.

use std::collections::HashMap;

use parking_lot::RwLock;
use sp_blockchain::HeaderBackend;
use sp_consensus::Slot;
use sp_consensus_babe::Epoch;
use sp_runtime::Hash;

/// Epoch descriptors, keyed by the hash of the block whose digest announced them.
pub struct EpochChanges {
	announced: RwLock<HashMap<Hash, Epoch>>,
}

impl EpochChanges {
	pub fn new() -> Self {
		EpochChanges { announced: RwLock::new(HashMap::new()) }
	}

	/// Record that `announcing_block` carried a `NextEpochData` (or genesis config) digest
	/// naming `epoch`.
	pub fn import(&self, announcing_block: Hash, epoch: Epoch) {
		self.announced.write().insert(announcing_block, epoch);
	}

	/// The epoch active for `slot`, as seen from `at`: the nearest ancestor of `at` (inclusive)
	/// with a recorded announcement whose window contains `slot`.
	pub fn epoch_for(&self, backend: &dyn HeaderBackend, at: Hash, slot: Slot) -> Option<Epoch> {
		let announced = self.announced.read();
		let mut cursor = at;
		loop {
			if let Some(epoch) = announced.get(&cursor) {
				if epoch.contains_slot(slot) {
					return Some(epoch.clone());
				}
			}
			match backend.header(cursor).ok()? {
				Some(header) if !header.is_genesis() => cursor = header.parent_hash,
				Some(header) => {
					return announced.get(&header.hash()).filter(|e| e.contains_slot(slot)).cloned();
				},
				None => return None,
			}
		}
	}

	/// Drop every announcement that is not an ancestor of `retain_from`, called once a block is
	/// finalized so superseded forks' epoch data does not accumulate forever.
	pub fn prune(&self, backend: &dyn HeaderBackend, retain_from: Hash) {
		let ancestors: std::collections::HashSet<Hash> = {
			let mut set = std::collections::HashSet::new();
			let mut cursor = retain_from;
			loop {
				set.insert(cursor);
				match backend.header(cursor).ok().flatten() {
					Some(header) if !header.is_genesis() => cursor = header.parent_hash,
					Some(header) => {
						set.insert(header.hash());
						break;
					},
					None => break,
				}
			}
			set
		};
		self.announced.write().retain(|hash, _| ancestors.contains(hash));
	}
}

impl Default for EpochChanges {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use sp_blockchain::{BlockStatus, ChainInfo, Result as ClientResult};
	use sp_consensus_babe::{AllowedSlots, BabeEpochConfiguration};
	use sp_runtime::{BlockNumber, Digest, Header};
	use std::collections::HashMap as Map;

	struct FakeBackend {
		headers: Map<Hash, Header>,
	}
	impl HeaderBackend for FakeBackend {
		fn header(&self, hash: Hash) -> ClientResult<Option<Header>> {
			Ok(self.headers.get(&hash).cloned())
		}
		fn status(&self, _hash: Hash) -> ClientResult<BlockStatus> {
			Ok(BlockStatus::InChainWithState)
		}
		fn number(&self, hash: Hash) -> ClientResult<Option<BlockNumber>> {
			Ok(self.headers.get(&hash).map(|h| h.number))
		}
		fn hash(&self, _number: BlockNumber) -> ClientResult<Option<Hash>> {
			Ok(None)
		}
		fn info(&self) -> ChainInfo {
			unimplemented!()
		}
	}

	fn epoch(index: u64, start: u64) -> Epoch {
		Epoch {
			epoch_index: index,
			start_slot: Slot(start),
			duration: 10,
			authorities: vec![],
			randomness: [0; 32],
			config: BabeEpochConfiguration { c: (1, 4), allowed_slots: AllowedSlots::PrimaryOnly },
		}
	}

	#[test]
	fn lookup_walks_to_nearest_announcing_ancestor() {
		let genesis = Header::new(0, [0; 32], [0; 32], [0; 32], Digest::default());
		let genesis_hash = genesis.hash();
		let child = Header::new(1, [1; 32], [0; 32], genesis_hash, Digest::default());
		let child_hash = child.hash();
		let grandchild = Header::new(2, [2; 32], [0; 32], child_hash, Digest::default());
		let grandchild_hash = grandchild.hash();

		let mut headers = Map::new();
		headers.insert(genesis_hash, genesis);
		headers.insert(child_hash, child);
		headers.insert(grandchild_hash, grandchild);
		let backend = FakeBackend { headers };

		let changes = EpochChanges::new();
		changes.import(child_hash, epoch(1, 10));

		let found = changes.epoch_for(&backend, grandchild_hash, Slot(15)).unwrap();
		assert_eq!(found.epoch_index, 1);
	}

	#[test]
	fn unrelated_fork_does_not_see_a_different_announcement() {
		let genesis = Header::new(0, [0; 32], [0; 32], [0; 32], Digest::default());
		let genesis_hash = genesis.hash();
		let fork_a = Header::new(1, [9; 32], [0; 32], genesis_hash, Digest::default());
		let fork_a_hash = fork_a.hash();

		let mut headers = Map::new();
		headers.insert(genesis_hash, genesis);
		headers.insert(fork_a_hash, fork_a);
		let backend = FakeBackend { headers };

		let changes = EpochChanges::new();
		let unknown_block = [77; 32];
		changes.import(unknown_block, epoch(5, 10));

		assert!(changes.epoch_for(&backend, fork_a_hash, Slot(15)).is_none());
	}
}
