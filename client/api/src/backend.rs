//! The single writer of persisted chain data: block headers and bodies, trie state per
//! block, justifications, and the small auxiliary key/value store consensus engines persist
//! their own bookkeeping in (epoch descriptors, authority-set state).
//!
//! Every other component — BABE, GRANDPA, the import pipeline, the digest handler — holds a
//! read-only snapshot or talks to the backend through its transactional `commit`/`finalize`
//! API; nothing but the backend itself ever mutates the block tree directly.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use sp_blockchain::{BlockStatus, ChainInfo, Error as ClientError, HeaderBackend, Result as ClientResult};
use sp_runtime::{BlockNumber, EncodedJustification, Hash, Header, OpaqueExtrinsic};

use crate::{
	notifications::{BlockImportNotification, FinalityNotification, NotificationHub},
	trie::TrieState,
	tree::BlockTree,
};

/// Column-partitioned persisted data, matching the key/value store layout: headers, bodies,
/// justifications, trie nodes (via `TrieState`), and the catch-all `meta`/`offchain_persistent`
/// columns addressed through `aux_get`/`aux_set`.
pub trait Backend: Send + Sync + HeaderBackend {
	fn body(&self, hash: Hash) -> ClientResult<Option<Vec<OpaqueExtrinsic>>>;
	fn justification(&self, hash: Hash) -> ClientResult<Option<EncodedJustification>>;
	fn state_at(&self, hash: Hash) -> ClientResult<TrieState>;

	/// Commit a newly-executed block: its header, body, resulting state, and the
	/// weight contribution (0 or 1) its slot claim adds to the fork-choice weight.
	fn commit_block(
		&self,
		header: Header,
		body: Vec<OpaqueExtrinsic>,
		state: TrieState,
		weight_contribution: u128,
	) -> ClientResult<bool>;

	fn finalize(&self, hash: Hash, justification: Option<EncodedJustification>) -> ClientResult<()>;

	fn import_notifications(&self) -> futures::channel::mpsc::UnboundedReceiver<BlockImportNotification>;
	fn finality_notifications(&self) -> futures::channel::mpsc::UnboundedReceiver<FinalityNotification>;

	/// Small persistent key/value store consensus engines use for their own state (epoch
	/// descriptors, the GRANDPA authority set, `:code-substitutes`). Lives in the `meta`
	/// column.
	fn aux_get(&self, key: &[u8]) -> ClientResult<Option<Vec<u8>>>;
	fn aux_set(&self, key: &[u8], value: Vec<u8>) -> ClientResult<()>;

	fn code_at(&self, hash: Hash) -> ClientResult<Vec<u8>>;
	fn set_code_substitute(&self, at: Hash, code: Vec<u8>) -> ClientResult<()>;
}

struct Inner {
	tree: BlockTree,
	states: HashMap<Hash, TrieState>,
	bodies: HashMap<Hash, Vec<OpaqueExtrinsic>>,
	justifications: HashMap<Hash, EncodedJustification>,
	aux: HashMap<Vec<u8>, Vec<u8>>,
	code: HashMap<Hash, Vec<u8>>,
	code_substitutes: HashMap<Hash, Vec<u8>>,
	best_hash: Hash,
	finalized_hash: Hash,
	finalized_number: BlockNumber,
	genesis_hash: Hash,
}

/// The in-memory backend this node ships with. `sc-service` wires exactly one of these per
/// node; swapping in a disk-backed implementation later only has to satisfy the `Backend`
/// trait above.
pub struct InMemoryBackend {
	inner: RwLock<Inner>,
	import_hub: Arc<NotificationHub<BlockImportNotification>>,
	finality_hub: Arc<NotificationHub<FinalityNotification>>,
}

impl InMemoryBackend {
	pub fn new(genesis_header: Header, genesis_state: TrieState, genesis_code: Vec<u8>) -> Arc<Self> {
		let genesis_hash = genesis_header.hash();
		let mut tree = BlockTree::new();
		tree.insert_genesis(genesis_header);
		let mut states = HashMap::new();
		states.insert(genesis_hash, genesis_state);
		let mut code = HashMap::new();
		code.insert(genesis_hash, genesis_code);

		Arc::new(InMemoryBackend {
			inner: RwLock::new(Inner {
				tree,
				states,
				bodies: HashMap::new(),
				justifications: HashMap::new(),
				aux: HashMap::new(),
				code,
				code_substitutes: HashMap::new(),
				best_hash: genesis_hash,
				finalized_hash: genesis_hash,
				finalized_number: 0,
				genesis_hash,
			}),
			import_hub: NotificationHub::new(),
			finality_hub: NotificationHub::new(),
		})
	}

	/// Resolve the runtime code in effect at `hash` by walking to the nearest ancestor that
	/// set `:code` (here: the nearest ancestor recorded in the `code` map, or its
	/// code-substitute if one is registered for that ancestor).
	pub fn runtime_code_at(&self, hash: Hash) -> ClientResult<Vec<u8>> {
		self.code_at(hash)
	}
}

impl HeaderBackend for InMemoryBackend {
	fn header(&self, hash: Hash) -> ClientResult<Option<Header>> {
		Ok(self.inner.read().tree.header(&hash).cloned())
	}

	fn status(&self, hash: Hash) -> ClientResult<BlockStatus> {
		let inner = self.inner.read();
		if inner.tree.contains(&hash) {
			Ok(BlockStatus::InChainWithState)
		} else {
			Ok(BlockStatus::Unknown)
		}
	}

	fn number(&self, hash: Hash) -> ClientResult<Option<BlockNumber>> {
		Ok(self.inner.read().tree.number(&hash))
	}

	fn hash(&self, number: BlockNumber) -> ClientResult<Option<Hash>> {
		let inner = self.inner.read();
		Ok(inner
			.tree
			.header(&inner.best_hash)
			.filter(|_| true)
			.and_then(|_| {
				// Walk back from best to find the canonical block at `number`.
				let mut cursor = inner.best_hash;
				loop {
					let header = inner.tree.header(&cursor)?;
					if header.number == number {
						return Some(cursor);
					}
					if header.number < number || header.is_genesis() {
						return None;
					}
					cursor = header.parent_hash;
				}
			}))
	}

	fn info(&self) -> ChainInfo {
		let inner = self.inner.read();
		ChainInfo {
			best_hash: inner.best_hash,
			best_number: inner.tree.number(&inner.best_hash).unwrap_or_default(),
			genesis_hash: inner.genesis_hash,
			finalized_hash: inner.finalized_hash,
			finalized_number: inner.finalized_number,
		}
	}
}

impl Backend for InMemoryBackend {
	fn body(&self, hash: Hash) -> ClientResult<Option<Vec<OpaqueExtrinsic>>> {
		Ok(self.inner.read().bodies.get(&hash).cloned())
	}

	fn justification(&self, hash: Hash) -> ClientResult<Option<EncodedJustification>> {
		Ok(self.inner.read().justifications.get(&hash).cloned())
	}

	fn state_at(&self, hash: Hash) -> ClientResult<TrieState> {
		self.inner
			.read()
			.states
			.get(&hash)
			.cloned()
			.ok_or(ClientError::UnknownBlock(hash))
	}

	fn commit_block(
		&self,
		header: Header,
		body: Vec<OpaqueExtrinsic>,
		state: TrieState,
		weight_contribution: u128,
	) -> ClientResult<bool> {
		let hash = header.hash();
		let parent_hash = header.parent_hash;
		let number = header.number;

		let mut inner = self.inner.write();
		if inner.tree.contains(&hash) {
			return Err(ClientError::DuplicateBlock(hash));
		}
		if !inner.tree.contains(&parent_hash) {
			return Err(ClientError::UnknownParent(parent_hash));
		}
		if let Some(parent_code) = inner.code.get(&parent_hash).cloned() {
			inner.code.entry(hash).or_insert(parent_code);
		}
		inner
			.tree
			.insert(header, weight_contribution)
			.ok_or_else(|| ClientError::InvariantViolation("orphaned trie node".into()))?;
		inner.states.insert(hash, state);
		inner.bodies.insert(hash, body);

		let best_before = inner.best_hash;
		let new_best = inner.tree.best_leaf().unwrap_or(best_before);
		let is_new_best = new_best == hash;
		if is_new_best {
			inner.best_hash = hash;
		}
		drop(inner);

		self.import_hub.notify(BlockImportNotification { hash, number, parent_hash, is_new_best });
		Ok(is_new_best)
	}

	fn finalize(&self, hash: Hash, justification: Option<EncodedJustification>) -> ClientResult<()> {
		let mut inner = self.inner.write();
		let number = inner
			.tree
			.number(&hash)
			.ok_or_else(|| sp_blockchain::Error::UnknownBlock(hash))?;
		if number < inner.finalized_number || !inner.tree.is_ancestor(&inner.finalized_hash, &hash) {
			return Err(ClientError::FinalityRejected(sp_blockchain::FinalityFailure::BelowFinalized));
		}
		if let Some(justification) = justification {
			inner.justifications.insert(hash, justification);
		}
		inner.finalized_hash = hash;
		inner.finalized_number = number;
		inner.tree.prune_to_descendants_of(hash);
		drop(inner);

		self.finality_hub.notify(FinalityNotification { hash, number });
		Ok(())
	}

	fn import_notifications(&self) -> futures::channel::mpsc::UnboundedReceiver<BlockImportNotification> {
		self.import_hub.subscribe()
	}

	fn finality_notifications(&self) -> futures::channel::mpsc::UnboundedReceiver<FinalityNotification> {
		self.finality_hub.subscribe()
	}

	fn aux_get(&self, key: &[u8]) -> ClientResult<Option<Vec<u8>>> {
		Ok(self.inner.read().aux.get(key).cloned())
	}

	fn aux_set(&self, key: &[u8], value: Vec<u8>) -> ClientResult<()> {
		self.inner.write().aux.insert(key.to_vec(), value);
		Ok(())
	}

	fn code_at(&self, hash: Hash) -> ClientResult<Vec<u8>> {
		let inner = self.inner.read();
		if let Some(code) = inner.code_substitutes.get(&hash) {
			return Ok(code.clone());
		}
		let mut cursor = hash;
		loop {
			if let Some(code) = inner.code.get(&cursor) {
				return Ok(code.clone());
			}
			match inner.tree.header(&cursor) {
				Some(header) if !header.is_genesis() => cursor = header.parent_hash,
				_ => return Err(ClientError::StorageIo("no :code set on any ancestor".into())),
			}
		}
	}

	fn set_code_substitute(&self, at: Hash, code: Vec<u8>) -> ClientResult<()> {
		self.inner.write().code_substitutes.insert(at, code);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use sp_runtime::Digest;

	fn genesis() -> Header {
		Header::new(0, [0; 32], [0; 32], [0; 32], Digest::default())
	}

	#[test]
	fn commit_then_finalize_round_trip() {
		let backend = InMemoryBackend::new(genesis(), TrieState::empty(), vec![1, 2, 3]);
		let genesis_hash = backend.info().genesis_hash;

		let child = Header::new(1, [9; 32], genesis_hash, genesis_hash, Digest::default());
		let child_hash = child.hash();
		let is_best = backend.commit_block(child, vec![], TrieState::empty(), 1).unwrap();
		assert!(is_best);
		assert_eq!(backend.info().best_hash, child_hash);

		backend.finalize(child_hash, None).unwrap();
		assert_eq!(backend.info().finalized_hash, child_hash);
	}

	#[test]
	fn finalize_rejects_below_current_finalized() {
		let backend = InMemoryBackend::new(genesis(), TrieState::empty(), vec![]);
		let genesis_hash = backend.info().genesis_hash;
		let child = Header::new(1, [9; 32], genesis_hash, genesis_hash, Digest::default());
		let child_hash = child.hash();
		backend.commit_block(child, vec![], TrieState::empty(), 1).unwrap();
		backend.finalize(child_hash, None).unwrap();

		let err = backend.finalize(genesis_hash, None).unwrap_err();
		assert!(matches!(err, ClientError::FinalityRejected(_)));
	}

	#[test]
	fn code_lookup_walks_to_nearest_ancestor() {
		let backend = InMemoryBackend::new(genesis(), TrieState::empty(), vec![42]);
		let genesis_hash = backend.info().genesis_hash;
		let child = Header::new(1, [9; 32], genesis_hash, genesis_hash, Digest::default());
		let child_hash = child.hash();
		backend.commit_block(child, vec![], TrieState::empty(), 1).unwrap();
		assert_eq!(backend.code_at(child_hash).unwrap(), vec![42]);
	}
}
