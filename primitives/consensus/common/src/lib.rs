//! Consensus-engine-agnostic primitives.
//!
//! Nothing in this crate knows about BABE or GRANDPA specifically; it names the shapes both
//! engines plug into: where a block came from, what a "slot" is, how a node picks its best
//! chain among several leaves, and the uniform error vocabulary engines raise into the import
//! pipeline.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use codec::{Decode, Encode};
use scale_info::TypeInfo;
use sp_runtime::{BlockNumber, Hash};

/// Where an imported block came from. Drives BIP's queueing behaviour: blocks from the
/// network with an unknown parent are queued, blocks authored locally never are.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BlockOrigin {
	/// Produced by this node's own authoring loop.
	Own,
	/// Received from a peer advertising it as newly produced.
	NetworkBroadcast,
	/// Received in response to an explicit block request (e.g. during sync).
	NetworkInitialSync,
	/// Inserted directly, bypassing network provenance (genesis, tests).
	File,
}

/// A discrete unit of wall-clock time: `floor(unix_millis / duration_ms)`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Encode, Decode, TypeInfo)]
pub struct Slot(pub u64);

impl Slot {
	/// The slot containing the current wall-clock time, for a chain with the given slot
	/// duration.
	pub fn now(duration: Duration) -> Self {
		let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64;
		Slot(millis / duration.as_millis() as u64)
	}

	/// The slot containing `unix_millis`, for a chain with the given slot duration in
	/// milliseconds.
	pub fn from_timestamp(unix_millis: u64, duration_ms: u64) -> Self {
		Slot(unix_millis / duration_ms.max(1))
	}

	/// Wall-clock instant at which this slot begins.
	pub fn start(&self, duration_ms: u64) -> Duration {
		Duration::from_millis(self.0.saturating_mul(duration_ms))
	}

	pub fn saturating_add(&self, n: u64) -> Slot {
		Slot(self.0.saturating_add(n))
	}
}

impl std::ops::Sub for Slot {
	type Output = i128;
	fn sub(self, rhs: Slot) -> i128 {
		self.0 as i128 - rhs.0 as i128
	}
}

impl std::ops::Add<u64> for Slot {
	type Output = Slot;
	fn add(self, rhs: u64) -> Slot {
		Slot(self.0 + rhs)
	}
}

/// Picks the node's preferred chain among the block-tree's current leaves. The import
/// pipeline's fork-choice rule (weight, then number, then hash) is the canonical
/// implementation; tests may substitute a fixed choice.
#[async_trait::async_trait]
pub trait SelectChain: Send + Sync + Clone {
	/// All current leaves of the block tree, in no particular order.
	async fn leaves(&self) -> Result<Vec<Hash>, Error>;

	/// The leaf this node currently considers best.
	async fn best_chain(&self) -> Result<(Hash, BlockNumber), Error>;
}

/// Uniform error vocabulary consensus engines raise; `sc-consensus` wraps these around every
/// verifier and importer call so the import pipeline can apply one failure-handling policy
/// (see the module docs on `BlockImportPipeline`) regardless of which engine produced them.
#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("client error: {0}")]
	Client(#[from] sp_blockchain::Error),
	#[error("parent of the block being imported is unknown")]
	UnknownParent,
	#[error("block verification failed: {0}")]
	InvalidBlock(String),
	#[error("cannot produce a proposal for this slot: {0}")]
	CannotPropose(String),
	#[error("the operation was cancelled")]
	Cancelled,
	#[error("{0}")]
	Other(String),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn slot_floors_to_duration() {
		assert_eq!(Slot::from_timestamp(2_500, 1_000), Slot(2));
		assert_eq!(Slot::from_timestamp(999, 1_000), Slot(0));
		assert_eq!(Slot::from_timestamp(1_000, 1_000), Slot(1));
	}

	#[test]
	fn slot_arithmetic() {
		let a = Slot(10);
		let b = Slot(4);
		assert_eq!(a - b, 6);
		assert_eq!(a + 5, Slot(15));
	}
}
