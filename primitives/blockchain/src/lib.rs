//! Error and status types shared by every component that reads chain data.
//!
//! This crate deliberately has no opinion on *how* blocks are stored; it only names the
//! vocabulary `sc-client-api`, the consensus services and the executor use to talk about
//! failures and lookups.

use sp_runtime::{BlockNumber, Hash};

/// Subsystem the failed verification step belonged to. Reported alongside `Error::VerifyFailed`
/// so peers (and metrics) can distinguish a bad header from a bad seal from a bad state root.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VerificationFailure {
	Header,
	Digest,
	Vrf,
	Seal,
	StateRoot,
}

impl std::fmt::Display for VerificationFailure {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			VerificationFailure::Header => "header",
			VerificationFailure::Digest => "digest",
			VerificationFailure::Vrf => "vrf",
			VerificationFailure::Seal => "seal",
			VerificationFailure::StateRoot => "state_root",
		};
		f.write_str(s)
	}
}

/// Why a finalization request was rejected.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FinalityFailure {
	/// The target is below, or otherwise not a descendant of, the current finalized block.
	BelowFinalized,
	/// The justification itself did not check out.
	BadJustification,
}

impl std::fmt::Display for FinalityFailure {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			FinalityFailure::BelowFinalized => "below_finalized",
			FinalityFailure::BadJustification => "bad_justification",
		};
		f.write_str(s)
	}
}

/// Error type threaded through every fallible operation on chain state.
#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("configuration is invalid: {0}")]
	ConfigInvalid(String),
	#[error("failed to load genesis: {0}")]
	GenesisLoadFailed(String),
	#[error("keystore is invalid: {0}")]
	KeystoreInvalid(String),
	#[error("no wasm interpreter available for runtime version {0}")]
	WasmInterpreterUnknown(u32),
	#[error("verification failed ({0})")]
	VerifyFailed(VerificationFailure),
	#[error("block execution failed: {0}")]
	ExecutionFailed(String),
	#[error("parent block {0:?} is unknown")]
	UnknownParent(Hash),
	#[error("block {0:?} was already imported")]
	DuplicateBlock(Hash),
	#[error("finality request rejected ({0})")]
	FinalityRejected(FinalityFailure),
	#[error("the offchain request id pool is exhausted")]
	OffchainBufferExhausted,
	#[error("the offchain request is invalid: {0}")]
	OffchainInvalidRequest(String),
	#[error("operation timed out")]
	Timeout,
	#[error("storage I/O error: {0}")]
	StorageIo(String),
	#[error("runtime api error: {0}")]
	RuntimeApi(String),
	#[error("operation was cancelled")]
	Cancelled,
	#[error("unknown block {0:?}")]
	UnknownBlock(Hash),
	#[error("backend invariant violated: {0}")]
	InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Where a block currently sits relative to the known chain, as seen by `HeaderBackend`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BlockStatus {
	InChainWithState,
	InChainPruned,
	Unknown,
}

/// Read-only access to header metadata. Implemented by `sc-client-api`'s backend and by every
/// light-weight view handed to the consensus services.
pub trait HeaderBackend: Send + Sync {
	fn header(&self, hash: Hash) -> Result<Option<sp_runtime::Header>>;
	fn status(&self, hash: Hash) -> Result<BlockStatus>;
	fn number(&self, hash: Hash) -> Result<Option<BlockNumber>>;
	fn hash(&self, number: BlockNumber) -> Result<Option<Hash>>;
	fn info(&self) -> ChainInfo;
}

/// Snapshot of the chain's well-known pointers.
#[derive(Clone, Debug)]
pub struct ChainInfo {
	pub best_hash: Hash,
	pub best_number: BlockNumber,
	pub genesis_hash: Hash,
	pub finalized_hash: Hash,
	pub finalized_number: BlockNumber,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn verification_failure_displays_subsystem_name() {
		assert_eq!(VerificationFailure::Vrf.to_string(), "vrf");
		assert_eq!(format!("{}", Error::VerifyFailed(VerificationFailure::Seal)), "verification failed (seal)");
	}
}
