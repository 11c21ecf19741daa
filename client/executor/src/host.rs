//! Host-side state and the host function table the WASM runtime calls into.
//!
//! Every host call receives a `&mut Caller<'_, HostState>` (per the wasmi 0.31 API) and reads
//! or writes the guest's linear memory directly; there is no process-wide registry of
//! in-flight calls; all mutable state lives in `HostState`, owned by the `Store` for the
//! duration of a single entry-point invocation. This is the per-instance-context
//! re-architecture called for over a pointer-to-pointer global callback table.

use std::sync::Arc;

use sc_client_api::TrieOverlay;
use sc_offchain::OffchainExt;
use sp_runtime::blake2_256;

/// A trivial bump allocator over the guest's own linear memory, starting just past the data
/// the runtime's linker placed there (`__heap_base`, read once at instantiation). Freed
/// blocks are never reclaimed within a single entry-point call; the whole arena is dropped
/// with the `Store` when the call returns, which is sufficient because RE never keeps a guest
/// instance alive across calls (see `pool.rs`).
pub struct BumpAllocator {
	next: u32,
	limit: u32,
}

impl BumpAllocator {
	pub fn new(heap_base: u32, memory_pages_bytes: u32) -> Self {
		BumpAllocator { next: heap_base, limit: memory_pages_bytes }
	}

	pub fn allocate(&mut self, size: u32) -> Result<u32, super::ExecutorError> {
		let ptr = self.next;
		let end = ptr.checked_add(size).ok_or(super::ExecutorError::AllocationFailed)?;
		if end > self.limit {
			return Err(super::ExecutorError::AllocationFailed);
		}
		self.next = (end + 7) & !7; // keep allocations 8-byte aligned
		Ok(ptr)
	}

	/// `ext_allocator_free_version_1` is a no-op under this arena allocator; see module docs.
	pub fn free(&mut self, _ptr: u32) {}
}

/// Everything a host call needs: the trie overlay the block is executing against, and an
/// optional handle to the offchain HTTP set (absent when replaying blocks that make no
/// offchain calls, e.g. ordinary import rather than authoring).
pub struct HostState {
	pub overlay: TrieOverlay,
	pub offchain: Option<Arc<dyn OffchainExt>>,
	pub allocator: BumpAllocator,
}

impl HostState {
	pub fn new(overlay: TrieOverlay, offchain: Option<Arc<dyn OffchainExt>>, heap_base: u32, memory_bytes: u32) -> Self {
		HostState { overlay, offchain, allocator: BumpAllocator::new(heap_base, memory_bytes) }
	}
}

/// Pack a guest pointer and length into the `i64` return value convention every host call
/// below that hands ownership of a byte buffer back to the runtime uses: high 32 bits the
/// pointer, low 32 bits the length.
pub fn pack_ptr_len(ptr: u32, len: u32) -> i64 {
	((ptr as i64) << 32) | (len as i64)
}

pub fn unpack_ptr_len(packed: i64) -> (u32, u32) {
	(((packed as u64) >> 32) as u32, packed as u32)
}

/// Verify an sr25519 signature. Shared by `ext_crypto_sr25519_verify_version_2` and BABE's own
/// VRF-adjacent seal checks, so it is exposed here rather than duplicated per call site.
pub fn sr25519_verify(signature: &[u8; 64], message: &[u8], public: &[u8; 32]) -> bool {
	use schnorrkel::{PublicKey, Signature};
	let (Ok(public), Ok(signature)) = (PublicKey::from_bytes(public), Signature::from_bytes(signature)) else {
		return false;
	};
	public.verify_simple(b"substrate", message, &signature).is_ok()
}

/// Verify an ed25519 signature, backing `ext_crypto_ed25519_verify_version_1` and GRANDPA vote
/// checks made from within the runtime (e.g. equivocation reporting).
pub fn ed25519_verify(signature: &[u8; 64], message: &[u8], public: &[u8; 32]) -> bool {
	use ed25519_zebra::{Signature, VerificationKey};
	let (Ok(key), Ok(signature)) = (VerificationKey::try_from(*public), Signature::try_from(*signature)) else {
		return false;
	};
	key.verify(&signature, message).is_ok()
}

/// `ext_hashing_blake2_256_version_1`.
pub fn hash_blake2_256(data: &[u8]) -> [u8; 32] {
	blake2_256(data)
}
