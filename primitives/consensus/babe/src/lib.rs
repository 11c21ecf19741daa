//! BABE primitives: authority identity, epoch descriptors, slot-claim digests and the VRF
//! transcript the authoring loop and the import-pipeline verifier both build.

pub mod digests;
pub mod vrf;

use codec::{Decode, Encode};
use scale_info::TypeInfo;
use sp_consensus::Slot;
use sp_runtime::BlockNumber;

/// sr25519 public key of a BABE authority, 32 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode, TypeInfo, Debug, Hash, PartialOrd, Ord)]
pub struct AuthorityId(pub [u8; 32]);

/// sr25519 signature over a pre-seal block hash, 64 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode, TypeInfo, Debug)]
pub struct AuthoritySignature(pub [u8; 64]);

pub type AuthorityIndex = u32;
pub type BabeAuthorityWeight = u64;
pub type Randomness = [u8; 32];

/// `c = (numerator, denominator)`, the fraction of slots a primary authority should expect to
/// win per the BABE VRF threshold formula; carried in the epoch config so the threshold can
/// be recomputed.
pub type BabeEpochConfigurationRatio = (u64, u64);

/// Which kind of slot assignment an epoch permits beyond the primary VRF lottery.
#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode, TypeInfo, Debug)]
pub enum AllowedSlots {
	/// Only primary, VRF-eligible slots produce blocks; others are empty.
	PrimaryOnly,
	/// Slots nobody wins primarily fall back to a fixed-order secondary claim with no VRF.
	PrimaryAndSecondaryPlain,
	/// As above, but the secondary claim is also backed by a VRF output (used for
	/// second-order randomness contribution).
	PrimaryAndSecondaryVRF,
}

impl AllowedSlots {
	pub fn secondary_enabled(&self) -> bool {
		!matches!(self, AllowedSlots::PrimaryOnly)
	}

	pub fn secondary_vrf(&self) -> bool {
		matches!(self, AllowedSlots::PrimaryAndSecondaryVRF)
	}
}

/// `BabeEpochConfiguration` fixes the parameters that only change across config-upgrades
/// (rare), as opposed to `Epoch`, which changes every epoch.
#[derive(Clone, PartialEq, Eq, Encode, Decode, TypeInfo, Debug)]
pub struct BabeEpochConfiguration {
	pub c: BabeEpochConfigurationRatio,
	pub allowed_slots: AllowedSlots,
}

/// Full epoch descriptor: everything the slot-claim and verification logic need for every
/// slot in `[start_slot, start_slot + duration)`.
#[derive(Clone, PartialEq, Eq, Encode, Decode, TypeInfo, Debug)]
pub struct Epoch {
	pub epoch_index: u64,
	pub start_slot: Slot,
	pub duration: u64,
	pub authorities: Vec<(AuthorityId, BabeAuthorityWeight)>,
	pub randomness: Randomness,
	pub config: BabeEpochConfiguration,
}

impl Epoch {
	pub fn end_slot(&self) -> Slot {
		self.start_slot.saturating_add(self.duration)
	}

	pub fn contains_slot(&self, slot: Slot) -> bool {
		slot >= self.start_slot && slot < self.end_slot()
	}

	/// Threshold a primary VRF output must fall under to win the slot, scaled to the same
	/// 128-bit space `vrf_output` lives in. `threshold = 2^128 * (1 - (1 - c)^(1/authorities))`
	/// approximated with integer arithmetic identical to the reference implementation so two
	/// independently-built nodes agree on eligibility.
	pub fn threshold(&self) -> u128 {
		crate::vrf::calculate_primary_threshold(
			self.config.c,
			&self.authorities,
			self.authorities_weight_total(),
		)
	}

	fn authorities_weight_total(&self) -> u64 {
		self.authorities.iter().map(|(_, w)| *w).sum()
	}
}

/// Descriptor announced via `ConsensusLog::NextEpochData`, naming the authority set and
/// randomness for the epoch after the one containing the announcing block.
#[derive(Clone, PartialEq, Eq, Encode, Decode, TypeInfo, Debug)]
pub struct NextEpochDescriptor {
	pub authorities: Vec<(AuthorityId, BabeAuthorityWeight)>,
	pub randomness: Randomness,
}

/// Descriptor announced via `ConsensusLog::NextConfigData`, replacing the *next* epoch's
/// `BabeEpochConfiguration` (the `c` ratio and allowed-slots policy) without touching
/// authorities or randomness.
#[derive(Clone, PartialEq, Eq, Encode, Decode, TypeInfo, Debug)]
pub struct NextConfigDescriptor {
	pub c: BabeEpochConfigurationRatio,
	pub allowed_slots: AllowedSlots,
}

/// BABE's `Consensus` digest payload. Discriminants are fixed at 1/2/3 (0 is reserved) so
/// that a digest produced by this node round-trips through any other implementation of the
/// same wire format.
#[derive(Clone, PartialEq, Eq, Encode, Decode, TypeInfo, Debug)]
pub enum ConsensusLog {
	#[codec(index = 1)]
	NextEpochData(NextEpochDescriptor),
	#[codec(index = 2)]
	OnDisabled(AuthorityIndex),
	#[codec(index = 3)]
	NextConfigData(NextConfigDescriptor),
}

/// Proof that two blocks were authored for the same slot and authority but are not the same
/// block — an equivocation.
#[derive(Clone, PartialEq, Eq, Encode, Decode, Debug)]
pub struct EquivocationProof<Header> {
	pub offender: AuthorityId,
	pub slot: Slot,
	pub first_header: Header,
	pub second_header: Header,
}

/// Block number used when reasoning about epoch changes rooted at a particular block.
pub type BabeBlockNumber = BlockNumber;
