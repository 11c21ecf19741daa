//! VRF transcript construction, threshold computation and output/proof verification shared
//! between the authoring loop (which signs) and the import-pipeline verifier (which checks).

use merlin::Transcript;
use schnorrkel::{
	vrf::{VRFOutput, VRFProof},
	Keypair, PublicKey,
};
use sp_consensus::Slot;

use crate::{
	digests::{VrfOutput, VrfProof},
	AuthorityId, BabeAuthorityWeight, Randomness,
};

/// Domain-separation label mixed into every VRF pseudorandom-output derivation, so a BABE VRF
/// value can never be replayed as if it were e.g. a ticket VRF value from another engine.
const BABE_VRF_PREFIX: &[u8] = b"substrate-babe-vrf";

/// Builds the transcript `("babe", randomness, slot, epoch_index)` that both signer and
/// verifier hash into the VRF.
pub fn make_transcript(randomness: &Randomness, slot: Slot, epoch_index: u64) -> Transcript {
	let mut transcript = Transcript::new(b"BABE");
	transcript.append_u64(b"slot number", slot.0);
	transcript.append_u64(b"current epoch", epoch_index);
	transcript.append_message(b"chain randomness", &randomness[..]);
	transcript
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VrfError {
	#[error("authority public key is malformed")]
	BadPublicKey,
	#[error("vrf output is malformed")]
	BadOutput,
	#[error("vrf proof is malformed")]
	BadProof,
	#[error("vrf verification failed")]
	VerifyFailed,
}

/// Sign the slot transcript with `pair`, returning the digest payload plus the derived
/// pseudorandom value used for the primary-slot threshold check.
pub fn sign_vrf(
	pair: &Keypair,
	randomness: &Randomness,
	slot: Slot,
	epoch_index: u64,
) -> (VrfOutput, VrfProof, u128) {
	let transcript = make_transcript(randomness, slot, epoch_index);
	let (inout, proof, _batchable) = pair.vrf_sign(transcript);
	let output = VrfOutput(inout.to_output().to_bytes());
	let proof = VrfProof(proof.to_bytes());
	let pseudo_random = u128::from_le_bytes(inout.make_bytes::<[u8; 16]>(BABE_VRF_PREFIX));
	(output, proof, pseudo_random)
}

/// Verify `output`/`proof` against `public` for the given slot transcript, returning the same
/// pseudorandom value the signer derived so the caller can compare it against the epoch
/// threshold.
pub fn verify_vrf(
	public: &AuthorityId,
	randomness: &Randomness,
	slot: Slot,
	epoch_index: u64,
	output: &VrfOutput,
	proof: &VrfProof,
) -> Result<u128, VrfError> {
	let transcript = make_transcript(randomness, slot, epoch_index);
	let public_key = PublicKey::from_bytes(&public.0).map_err(|_| VrfError::BadPublicKey)?;
	let vrf_output = VRFOutput::from_bytes(&output.0).map_err(|_| VrfError::BadOutput)?;
	let vrf_proof = VRFProof::from_bytes(&proof.0).map_err(|_| VrfError::BadProof)?;
	let (inout, _) = public_key
		.vrf_verify(transcript, &vrf_output, &vrf_proof)
		.map_err(|_| VrfError::VerifyFailed)?;
	Ok(u128::from_le_bytes(inout.make_bytes::<[u8; 16]>(BABE_VRF_PREFIX)))
}

/// `threshold = 2^128 * (1 - (1 - c)^(1/n))`, the primary-slot eligibility threshold for an
/// epoch with `n` authorities and target density `c = numerator/denominator`.
///
/// This mirrors the reference BABE formula's shape; it is evaluated in `f64` rather than
/// fixed-point bigint arithmetic; both signer and verifier in this node run the same
/// evaluation so the VRF-under-threshold check stays self-consistent, but it should not be
/// read as bit-for-bit compatible with another implementation's fixed-point result.
pub fn calculate_primary_threshold(
	c: (u64, u64),
	authorities: &[(AuthorityId, BabeAuthorityWeight)],
	_total_weight: u64,
) -> u128 {
	let (num, den) = c;
	let n = authorities.len() as u32;
	if n == 0 || den == 0 {
		return 0;
	}
	let c = (num as f64 / den as f64).clamp(0.0, 1.0);
	let theta = 1.0 / n as f64;
	let p = (1.0 - (1.0 - c).powf(theta)).clamp(0.0, 1.0);
	(p * (u128::MAX as f64)) as u128
}

#[cfg(test)]
mod tests {
	use super::*;
	use schnorrkel::Keypair;

	#[test]
	fn sign_then_verify_round_trips() {
		let pair = Keypair::generate();
		let authority = AuthorityId(pair.public.to_bytes());
		let randomness = [7u8; 32];
		let slot = Slot(42);
		let (output, proof, expected) = sign_vrf(&pair, &randomness, slot, 3);
		let actual = verify_vrf(&authority, &randomness, slot, 3, &output, &proof).unwrap();
		assert_eq!(actual, expected);
	}

	#[test]
	fn verify_rejects_wrong_slot() {
		let pair = Keypair::generate();
		let authority = AuthorityId(pair.public.to_bytes());
		let randomness = [7u8; 32];
		let (output, proof, _) = sign_vrf(&pair, &randomness, Slot(42), 3);
		assert!(verify_vrf(&authority, &randomness, Slot(43), 3, &output, &proof).is_err());
	}

	#[test]
	fn threshold_increases_with_c() {
		let authorities = vec![(AuthorityId([0; 32]), 1u64), (AuthorityId([1; 32]), 1u64)];
		let low = calculate_primary_threshold((1, 10), &authorities, 2);
		let high = calculate_primary_threshold((9, 10), &authorities, 2);
		assert!(high > low);
	}

	#[test]
	fn threshold_max_always_wins() {
		let authorities = vec![(AuthorityId([0; 32]), 1u64)];
		let threshold = calculate_primary_threshold((1, 1), &authorities, 1);
		assert_eq!(threshold, u128::MAX);
	}
}
