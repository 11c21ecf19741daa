//! The `Verifier` the import pipeline drives: checks a header's BABE pre-runtime digest and
//! seal without executing the block.

use std::sync::Arc;

use codec::{Decode, Encode};
use sc_consensus::{JustificationVerifier, Verified, Verifier, VerifierError};
use sc_consensus_epochs::EpochChanges;
use sc_executor::host::sr25519_verify;
use sp_blockchain::{FinalityFailure, HeaderBackend};
use sp_consensus_babe::{digests::PreDigest, vrf::verify_vrf, AllowedSlots};
use sp_runtime::{Header, OpaqueExtrinsic, BABE_ENGINE_ID};

use crate::equivocation::EquivocationTracker;
use crate::slot_claim::{secondary_slot_author, wins_primary};

/// Checks a block's BABE `PreRuntime` digest and seal against the epoch active at its parent.
/// Holds a read-only handle on the backend purely to resolve which epoch applies; it never
/// writes through it.
pub struct BabeVerifier {
	backend: Arc<dyn HeaderBackend>,
	epochs: Arc<EpochChanges>,
	equivocations: Option<Arc<EquivocationTracker>>,
}

impl BabeVerifier {
	pub fn new(backend: Arc<dyn HeaderBackend>, epochs: Arc<EpochChanges>) -> Self {
		BabeVerifier { backend, epochs, equivocations: None }
	}

	/// As [`Self::new`], but also records every accepted claim against `tracker` so a second,
	/// differing header for the same `(slot, authority_index)` can be flagged. `sc-service`
	/// shares one tracker between this verifier and anything else reporting equivocations.
	pub fn with_equivocation_tracker(mut self, tracker: Arc<EquivocationTracker>) -> Self {
		self.equivocations = Some(tracker);
		self
	}

	fn pre_digest(header: &Header) -> Result<PreDigest, VerifierError> {
		let payload = header
			.digest
			.logs()
			.iter()
			.find_map(|item| item.as_pre_runtime(BABE_ENGINE_ID))
			.ok_or(VerifierError::Digest)?;
		PreDigest::decode(&mut &payload[..]).map_err(|_| VerifierError::Digest)
	}

	fn seal_signature(header: &Header) -> Result<[u8; 64], VerifierError> {
		let (_, payload) = header.digest.seal(BABE_ENGINE_ID).ok_or(VerifierError::Seal)?;
		payload.try_into().map_err(|_| VerifierError::Seal)
	}
}

impl Verifier for BabeVerifier {
	fn verify(&self, parent: &Header, header: &Header, _body: &[OpaqueExtrinsic]) -> Result<Verified, VerifierError> {
		let pre_digest = Self::pre_digest(header)?;
		let epoch = self
			.epochs
			.epoch_for(self.backend.as_ref(), parent.hash(), pre_digest.slot)
			.ok_or(VerifierError::Digest)?;

		let authority = epoch
			.authorities
			.get(pre_digest.authority_index as usize)
			.ok_or(VerifierError::Digest)?
			.0;

		let value = verify_vrf(
			&authority,
			&epoch.randomness,
			pre_digest.slot,
			epoch.epoch_index,
			&pre_digest.vrf_output,
			&pre_digest.vrf_proof,
		)
		.map_err(|_| VerifierError::Vrf)?;

		let is_primary = wins_primary(&epoch, value);
		let is_secondary = !is_primary
			&& epoch.config.allowed_slots != AllowedSlots::PrimaryOnly
			&& secondary_slot_author(&epoch, pre_digest.slot) == pre_digest.authority_index;
		if !is_primary && !is_secondary {
			return Err(VerifierError::Vrf);
		}

		let signature = Self::seal_signature(header)?;
		let pre_seal_hash = header.pre_seal_hash(BABE_ENGINE_ID);
		if !sr25519_verify(&signature, &pre_seal_hash, &authority.0) {
			return Err(VerifierError::Seal);
		}

		if let Some(tracker) = &self.equivocations {
			if let Some(previous) = tracker.observe(pre_digest.slot, pre_digest.authority_index, header.hash()) {
				log::warn!(
					target: "babe",
					"equivocation: authority {} produced both {:?} and {:?} for slot {:?}",
					pre_digest.authority_index, previous, header.hash(), pre_digest.slot,
				);
			}
		}

		Ok(Verified { weight_contribution: if is_primary { 1 } else { 0 } })
	}
}

/// Placeholder `JustificationVerifier` used whenever BABE's block-import pipeline is wired
/// without GRANDPA finality (e.g. a standalone test chain): rejects every justification, since
/// without a finality gadget none can legitimately exist.
pub struct NoFinalityGadget;

impl JustificationVerifier for NoFinalityGadget {
	fn verify(&self, _header: &Header, _justification: &[u8]) -> Result<(), FinalityFailure> {
		Err(FinalityFailure::BadJustification)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use schnorrkel::Keypair;
	use sp_blockchain::{BlockStatus, ChainInfo, Result as ClientResult};
	use sp_consensus::Slot;
	use sp_consensus_babe::{AuthorityId, BabeEpochConfiguration, Epoch};
	use sp_runtime::{BlockNumber, Digest, DigestItem, Hash};
	use std::collections::HashMap;

	struct FakeBackend {
		headers: HashMap<Hash, Header>,
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

	fn primary_only_epoch(keypair: &Keypair) -> Epoch {
		Epoch {
			epoch_index: 0,
			start_slot: Slot(0),
			duration: 1000,
			authorities: vec![(AuthorityId(keypair.public.to_bytes()), 1)],
			randomness: [5; 32],
			config: BabeEpochConfiguration { c: (1, 1), allowed_slots: AllowedSlots::PrimaryOnly },
		}
	}

	fn sealed_header(parent_hash: Hash, slot: Slot, epoch: &Epoch, authority_index: u32, keypair: &Keypair) -> Header {
		let (vrf_output, vrf_proof, _) = sp_consensus_babe::vrf::sign_vrf(keypair, &epoch.randomness, slot, epoch.epoch_index);
		let pre_digest = PreDigest { authority_index, slot, vrf_output, vrf_proof };
		let mut digest = Digest::default();
		digest.push(DigestItem::PreRuntime(BABE_ENGINE_ID, pre_digest.encode()));
		let mut header = Header::new(1, [0; 32], [0; 32], parent_hash, digest);
		let pre_seal_hash = header.pre_seal_hash(BABE_ENGINE_ID);
		let signature = keypair.sign_simple(b"substrate", &pre_seal_hash).to_bytes();
		header.digest.push(DigestItem::Seal(BABE_ENGINE_ID, signature.to_vec()));
		header
	}

	fn setup(keypair: &Keypair) -> (Arc<FakeBackend>, Arc<EpochChanges>, Header, Epoch) {
		let genesis = Header::new(0, [0; 32], [0; 32], [0; 32], Digest::default());
		let genesis_hash = genesis.hash();
		let epoch = primary_only_epoch(keypair);
		let mut headers = HashMap::new();
		headers.insert(genesis_hash, genesis.clone());
		let backend = Arc::new(FakeBackend { headers });
		let epochs = Arc::new(EpochChanges::new());
		epochs.import(genesis_hash, epoch.clone());
		(backend, epochs, genesis, epoch)
	}

	#[test]
	fn accepts_a_correctly_sealed_primary_claim() {
		let keypair = Keypair::generate();
		let (backend, epochs, genesis, epoch) = setup(&keypair);
		let header = sealed_header(genesis.hash(), Slot(1), &epoch, 0, &keypair);

		let verifier = BabeVerifier::new(backend, epochs);
		let verified = verifier.verify(&genesis, &header, &[]).unwrap();
		assert_eq!(verified.weight_contribution, 1);
	}

	#[test]
	fn rejects_a_tampered_seal() {
		let keypair = Keypair::generate();
		let (backend, epochs, genesis, epoch) = setup(&keypair);
		let mut header = sealed_header(genesis.hash(), Slot(1), &epoch, 0, &keypair);
		if let Some(DigestItem::Seal(_, bytes)) = header.digest.logs.last_mut() {
			bytes[0] ^= 0xff;
		}

		let verifier = BabeVerifier::new(backend, epochs);
		assert_eq!(verifier.verify(&genesis, &header, &[]).unwrap_err(), VerifierError::Seal);
	}

	#[test]
	fn rejects_a_missing_pre_runtime_digest() {
		let keypair = Keypair::generate();
		let (backend, epochs, genesis, _epoch) = setup(&keypair);
		let header = Header::new(1, [0; 32], [0; 32], genesis.hash(), Digest::default());

		let verifier = BabeVerifier::new(backend, epochs);
		assert_eq!(verifier.verify(&genesis, &header, &[]).unwrap_err(), VerifierError::Digest);
	}

	#[test]
	fn no_finality_gadget_rejects_every_justification() {
		let header = Header::new(0, [0; 32], [0; 32], [0; 32], Digest::default());
		assert!(NoFinalityGadget.verify(&header, &[]).is_err());
	}
}
