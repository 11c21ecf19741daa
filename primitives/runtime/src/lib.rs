//! Block, header and digest primitives.
//!
//! These types are shared by every component of the node: the executor encodes and decodes
//! them across the host/runtime boundary, the import pipeline hashes and verifies them, and
//! the consensus services embed and strip digest items from them.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod offchain;

use alloc::vec::Vec;
use blake2::{digest::consts::U32, Blake2b, Digest as _};
use codec::{Decode, Encode};

#[cfg(feature = "std")]
use serde::{Deserialize, Serialize};

/// 256-bit opaque hash type used for block hashes, state roots and extrinsics roots.
pub type Hash = [u8; 32];

/// Block height. Genesis is block 0.
pub type BlockNumber = u64;

/// Four-byte tag identifying which consensus engine produced a digest item.
pub type ConsensusEngineId = [u8; 4];

/// Engine id carried by every BABE digest item.
pub const BABE_ENGINE_ID: ConsensusEngineId = *b"BABE";
/// Engine id carried by every GRANDPA digest item.
pub const GRANDPA_ENGINE_ID: ConsensusEngineId = *b"FRNK";

type Blake2b256 = Blake2b<U32>;

/// `blake2-256` of an arbitrary byte string, used throughout the node as the block-hashing
/// function and the trie hashing function.
pub fn blake2_256(data: &[u8]) -> Hash {
	let mut hasher = Blake2b256::new();
	hasher.update(data);
	let out = hasher.finalize();
	let mut hash = [0u8; 32];
	hash.copy_from_slice(&out);
	hash
}

/// Hash the SCALE encoding of any encodable value.
pub fn blake2_256_of<T: Encode>(value: &T) -> Hash {
	blake2_256(&value.encode())
}

/// A single entry in a block's digest.
///
/// Mirrors the tagged-union wire format used throughout the node: a one-byte discriminant
/// followed by `(engine_id, payload)`. The discriminant values match the ones historically
/// used on the wire so that digests produced here are indistinguishable from those of any
/// other node speaking the same protocol.
#[derive(Clone, PartialEq, Eq, Encode, Decode, Debug)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub enum DigestItem {
	/// Put in the digest by the consensus engine that authored the block, before import.
	/// Carries the data the block-import verifier needs: for BABE this is the
	/// `(authority_index, slot, vrf_output, vrf_proof)` tuple, SCALE-encoded.
	#[codec(index = 6)]
	PreRuntime(ConsensusEngineId, Vec<u8>),
	/// An encoded consensus-engine-specific item that isn't the seal: BABE epoch-change
	/// announcements, GRANDPA authority-set-change announcements, and similar.
	#[codec(index = 4)]
	Consensus(ConsensusEngineId, Vec<u8>),
	/// The final digest item in a sealed block: a signature over the blake2-256 hash of the
	/// header with this item stripped, by the key that claimed the slot.
	#[codec(index = 5)]
	Seal(ConsensusEngineId, Vec<u8>),
	/// Any other digest payload with no consensus meaning understood by this node.
	#[codec(index = 0)]
	Other(Vec<u8>),
}

impl DigestItem {
	/// If this is a `PreRuntime` item for the given engine, return its payload.
	pub fn as_pre_runtime(&self, engine: ConsensusEngineId) -> Option<&[u8]> {
		match self {
			DigestItem::PreRuntime(id, data) if *id == engine => Some(data),
			_ => None,
		}
	}

	/// If this is a `Consensus` item for the given engine, return its payload.
	pub fn as_consensus(&self, engine: ConsensusEngineId) -> Option<&[u8]> {
		match self {
			DigestItem::Consensus(id, data) if *id == engine => Some(data),
			_ => None,
		}
	}

	/// If this is a `Seal` item for the given engine, return its payload.
	pub fn as_seal(&self, engine: ConsensusEngineId) -> Option<&[u8]> {
		match self {
			DigestItem::Seal(id, data) if *id == engine => Some(data),
			_ => None,
		}
	}
}

/// A block's digest: an ordered, SCALE-length-prefixed sequence of digest items.
#[derive(Clone, PartialEq, Eq, Encode, Decode, Debug, Default)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub struct Digest {
	pub logs: Vec<DigestItem>,
}

impl Digest {
	pub fn push(&mut self, item: DigestItem) {
		self.logs.push(item);
	}

	/// Every digest item matching `f`, in order.
	pub fn logs(&self) -> &[DigestItem] {
		&self.logs
	}

	/// The last item, if it is a `Seal` for `engine`. Used by the import pipeline to strip
	/// the seal before re-hashing the header to check the signature.
	pub fn seal(&self, engine: ConsensusEngineId) -> Option<(&ConsensusEngineId, &[u8])> {
		match self.logs.last() {
			Some(DigestItem::Seal(id, data)) if *id == engine => Some((id, data)),
			_ => None,
		}
	}

	/// A copy of this digest with the trailing seal for `engine` removed, used to recompute
	/// the pre-seal hash that the seal signs over.
	pub fn without_seal(&self, engine: ConsensusEngineId) -> Digest {
		let mut logs = self.logs.clone();
		if matches!(logs.last(), Some(DigestItem::Seal(id, _)) if *id == engine) {
			logs.pop();
		}
		Digest { logs }
	}
}

/// Block header.
///
/// Wire layout: `parent_hash(32) ++ compact(number) ++ state_root(32) ++ extrinsics_root(32)
/// ++ digest`.
#[derive(Clone, PartialEq, Eq, Encode, Decode, Debug)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub struct Header {
	pub parent_hash: Hash,
	#[codec(compact)]
	pub number: BlockNumber,
	pub state_root: Hash,
	pub extrinsics_root: Hash,
	pub digest: Digest,
}

impl Header {
	pub fn new(
		number: BlockNumber,
		extrinsics_root: Hash,
		state_root: Hash,
		parent_hash: Hash,
		digest: Digest,
	) -> Self {
		Header { parent_hash, number, state_root, extrinsics_root, digest }
	}

	/// `blake2-256` of the SCALE encoding of this header. This is the canonical block hash.
	pub fn hash(&self) -> Hash {
		blake2_256_of(self)
	}

	/// The hash used as the pre-image for the seal signature: this header with its trailing
	/// seal for `engine` removed, then hashed.
	pub fn pre_seal_hash(&self, engine: ConsensusEngineId) -> Hash {
		let mut unsealed = self.clone();
		unsealed.digest = self.digest.without_seal(engine);
		blake2_256_of(&unsealed)
	}

	pub fn is_genesis(&self) -> bool {
		self.number == 0
	}
}

/// Opaque, already-encoded extrinsic. The node never decodes extrinsic internals; only the
/// runtime understands their contents.
#[derive(Clone, PartialEq, Eq, Encode, Decode, Debug)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub struct OpaqueExtrinsic(pub Vec<u8>);

impl OpaqueExtrinsic {
	pub fn from_bytes(bytes: Vec<u8>) -> Self {
		OpaqueExtrinsic(bytes)
	}
}

/// A full block: header plus body. Justifications are stored and transmitted separately
/// (see `sp_blockchain`), they are not part of the hashed block.
#[derive(Clone, PartialEq, Eq, Encode, Decode, Debug)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub struct Block {
	pub header: Header,
	pub extrinsics: Vec<OpaqueExtrinsic>,
}

impl Block {
	pub fn new(header: Header, extrinsics: Vec<OpaqueExtrinsic>) -> Self {
		Block { header, extrinsics }
	}

	pub fn hash(&self) -> Hash {
		self.header.hash()
	}

	pub fn number(&self) -> BlockNumber {
		self.header.number
	}
}

/// A GRANDPA finality justification, opaque to everything but `sc-consensus-grandpa`: a
/// SCALE-encoded `GrandpaJustification<Header>`.
pub type EncodedJustification = Vec<u8>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn header_hash_changes_with_digest() {
		let base = Header::new(1, [1; 32], [2; 32], [0; 32], Digest::default());
		let mut with_log = base.clone();
		with_log.digest.push(DigestItem::Other(vec![1, 2, 3]));
		assert_ne!(base.hash(), with_log.hash());
	}

	#[test]
	fn pre_seal_hash_ignores_seal_payload() {
		let mut header = Header::new(1, [1; 32], [2; 32], [0; 32], Digest::default());
		let before = header.pre_seal_hash(BABE_ENGINE_ID);
		header.digest.push(DigestItem::Seal(BABE_ENGINE_ID, vec![9; 64]));
		let after = header.pre_seal_hash(BABE_ENGINE_ID);
		assert_eq!(before, after);
		assert_ne!(header.hash(), after);
	}

	#[test]
	fn genesis_has_no_parent_by_convention() {
		let genesis = Header::new(0, [0; 32], [0; 32], [0; 32], Digest::default());
		assert!(genesis.is_genesis());
	}

	#[test]
	fn digest_scale_round_trips() {
		let mut digest = Digest::default();
		digest.push(DigestItem::PreRuntime(BABE_ENGINE_ID, vec![1, 2, 3]));
		digest.push(DigestItem::Consensus(GRANDPA_ENGINE_ID, vec![4, 5]));
		digest.push(DigestItem::Seal(BABE_ENGINE_ID, vec![6; 64]));
		let encoded = digest.encode();
		let decoded = Digest::decode(&mut &encoded[..]).unwrap();
		assert_eq!(digest, decoded);
	}
}
