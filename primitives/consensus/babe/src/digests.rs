//! The pre-runtime digest BABE embeds in every block it authors, and its seal.

use codec::{Decode, Encode};
use scale_info::TypeInfo;
use sp_consensus::Slot;

use crate::{AuthorityIndex, AuthoritySignature};

/// VRF output bytes, 32 bytes (an `sr25519` VRF pre-output).
#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode, TypeInfo, Debug)]
pub struct VrfOutput(pub [u8; 32]);

/// VRF proof bytes, 64 bytes (a batchable `sr25519` VRF proof).
#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode, TypeInfo, Debug)]
pub struct VrfProof(pub [u8; 64]);

/// The BABE `PreRuntime` digest payload: `(authority_index, slot, vrf_output, vrf_proof)`,
/// exactly as named in the data model. Used for both primary claims (must be under
/// threshold) and VRF-backed secondary claims (threshold not checked, slot assignment is).
#[derive(Clone, PartialEq, Eq, Encode, Decode, TypeInfo, Debug)]
pub struct PreDigest {
	pub authority_index: AuthorityIndex,
	pub slot: Slot,
	pub vrf_output: VrfOutput,
	pub vrf_proof: VrfProof,
}

/// Whether a pre-digest is claiming the slot as the primary (VRF-under-threshold) winner or
/// as the fixed-order secondary fallback.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PreDigestKind {
	Primary,
	Secondary,
}

/// The signature over `header.pre_seal_hash(BABE_ENGINE_ID)` that goes in the trailing
/// `Seal` digest item.
#[derive(Clone, Encode, Decode, Debug)]
pub struct Seal(pub AuthoritySignature);

impl Seal {
	pub fn encode_payload(&self) -> Vec<u8> {
		self.0 .0.to_vec()
	}

	pub fn from_payload(data: &[u8]) -> Option<Self> {
		let arr: [u8; 64] = data.try_into().ok()?;
		Some(Seal(AuthoritySignature(arr)))
	}
}
