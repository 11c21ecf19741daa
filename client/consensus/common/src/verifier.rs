//! The engine-specific half of block import: everything the pipeline itself cannot check
//! without knowing whether the chain runs BABE, some other slot-based scheme, or none at all.
//!
//! `sc-consensus-babe` supplies the concrete [`Verifier`] the pipeline drives; this crate only
//! names the contract and the failure vocabulary.

use sp_blockchain::VerificationFailure;
use sp_runtime::{Header, OpaqueExtrinsic};

/// Why a block failed the checks a `Verifier` is responsible for. Each variant names the
/// pipeline step from which it originates (see `import_queue`'s module docs).
#[derive(Clone, Copy, PartialEq, Eq, Debug, thiserror::Error)]
pub enum VerifierError {
	#[error("header shape invalid")]
	Header,
	#[error("consensus digest malformed or missing")]
	Digest,
	#[error("vrf verification failed")]
	Vrf,
	#[error("seal signature invalid")]
	Seal,
}

impl From<VerifierError> for VerificationFailure {
	fn from(err: VerifierError) -> Self {
		match err {
			VerifierError::Header => VerificationFailure::Header,
			VerifierError::Digest => VerificationFailure::Digest,
			VerifierError::Vrf => VerificationFailure::Vrf,
			VerifierError::Seal => VerificationFailure::Seal,
		}
	}
}

/// Outcome of a successful verification: everything the pipeline needs to finish importing the
/// block without re-deriving engine-specific facts about it.
pub struct Verified {
	/// The fork-choice weight this block contributes: 1 for a primary-slot claim, 0 otherwise.
	pub weight_contribution: u128,
}

/// Checks a header and body against everything statically knowable from the parent header
/// alone: digest shape, VRF eligibility, and the seal signature. Does *not* execute the block —
/// that is the pipeline's job, since it requires the executor and a trie overlay this trait
/// has no access to.
pub trait Verifier: Send + Sync {
	fn verify(&self, parent: &Header, header: &Header, body: &[OpaqueExtrinsic]) -> Result<Verified, VerifierError>;
}

/// Checks a GRANDPA (or other finality-gadget) justification against the authority set active
/// at the block it targets. Implemented by `sc-consensus-grandpa`.
pub trait JustificationVerifier: Send + Sync {
	fn verify(&self, header: &Header, justification: &[u8]) -> Result<(), sp_blockchain::FinalityFailure>;
}
