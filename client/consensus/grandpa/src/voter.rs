//! The GRANDPA voter loop: drives successive rounds of prevote/precommit over the ancestor set
//! of the current best chain, finalizing through [`sc_consensus::BlockImportPipeline`] whenever
//! a round's precommits clear supermajority weight.
//!
//! There is no peer-to-peer vote gossip in this crate (see the crate's module docs): a single
//! local voter casts its own prevote and precommit each round and tallies them against
//! [`GrandpaAuthoritySet::current_authorities`] exactly as a networked voter would tally votes
//! received from its peers. Rounds are driven by the backend's best-block notification stream
//! rather than a fixed timer, since a round with nothing new to vote on has nothing to do.

use std::sync::Arc;

use codec::Encode;
use sc_client_api::Backend;
use sc_consensus::{AuthoritySetChangeSink, BlockImportPipeline, EpochChangeSink};
use sp_consensus_grandpa::{AuthorityId, Precommit, Prevote, RoundNumber};
use sp_runtime::Hash;

use crate::authority_set::GrandpaAuthoritySet;
use crate::justification::build_justification;
use crate::round::{sign_precommit, sign_prevote, VotingRound};

/// This node's local voting identity: an ed25519 signing key and the public id derived from
/// it, matching [`crate::authority_set::GrandpaAuthoritySet`]'s voter list entries.
pub struct LocalVoter {
	pub id: AuthorityId,
	pub signing_key: ed25519_zebra::SigningKey,
}

/// Drives GRANDPA rounds forward. One instance per running node, started once at service
/// startup; `sc-service` owns the task it runs on.
pub struct GrandpaVoter<E, G> {
	backend: Arc<dyn Backend>,
	pipeline: Arc<BlockImportPipeline<E, G>>,
	authorities: Arc<GrandpaAuthoritySet>,
	local: LocalVoter,
	round: parking_lot::Mutex<RoundNumber>,
	estimate: parking_lot::Mutex<Hash>,
}

impl<E, G> GrandpaVoter<E, G>
where
	E: EpochChangeSink,
	G: AuthoritySetChangeSink,
{
	pub fn new(
		backend: Arc<dyn Backend>,
		pipeline: Arc<BlockImportPipeline<E, G>>,
		authorities: Arc<GrandpaAuthoritySet>,
		local: LocalVoter,
	) -> Self {
		let genesis_hash = backend.info().genesis_hash;
		GrandpaVoter {
			backend,
			pipeline,
			authorities,
			local,
			round: parking_lot::Mutex::new(1),
			estimate: parking_lot::Mutex::new(genesis_hash),
		}
	}

	/// Drives rounds forever, advancing one round per best-block notification. Exits once the
	/// notification stream closes (backend dropped) or `cancel` resolves, finishing whatever
	/// round is in flight first.
	pub async fn run(&self, mut cancel: futures::channel::oneshot::Receiver<()>) {
		use futures::future::{select, Either};
		use futures::StreamExt;

		let mut imports = self.backend.import_notifications();
		loop {
			match select(imports.next(), &mut cancel).await {
				Either::Left((Some(notification), _)) => {
					if notification.is_new_best && !self.authorities.is_paused() {
						self.run_round();
					}
				},
				Either::Left((None, _)) => break,
				Either::Right(_) => break,
			}
		}
	}

	/// One full Prevote/Precommit/Finalize pass seeded from the current best chain.
	fn run_round(&self) {
		let info = self.backend.info();
		let target_hash = info.best_hash;
		let target_number = info.best_number;

		let authorities = self.authorities.current_authorities();
		let set_id = self.authorities.set_id();
		let round_number = {
			let mut round = self.round.lock();
			let current = *round;
			*round += 1;
			current
		};

		let mut round = VotingRound::new(round_number, set_id, authorities);

		let prevote = Prevote { target_hash, target_number };
		let signed_prevote = sign_prevote(&self.local.signing_key, self.local.id, prevote, round_number, set_id);
		if round.import_prevote(signed_prevote).is_err() {
			return;
		}
		let Some((ghost_hash, ghost_number)) = round.prevote_ghost() else { return };

		let precommit = Precommit { target_hash: ghost_hash, target_number: ghost_number };
		let signed_precommit = sign_precommit(&self.local.signing_key, self.local.id, precommit, round_number, set_id);
		if round.import_precommit(signed_precommit).is_err() {
			return;
		}

		let Some(commit) = round.finalizing_commit() else { return };
		let justification = build_justification(round_number, commit);
		let encoded = justification.encode();

		match self.pipeline.finalize(justification.commit.target_hash, Some(encoded)) {
			Ok(()) => {
				*self.estimate.lock() = justification.commit.target_hash;
				self.authorities.note_finalized(justification.commit.target_number);
				self.authorities.note_best_block(target_number);
				log::info!(
					target: "grandpa",
					"finalized {:?} (#{}) in round {round_number}",
					justification.commit.target_hash,
					justification.commit.target_number,
				);
			},
			Err(err) => log::warn!(target: "grandpa", "round {round_number} produced a commit but finalize failed: {err}"),
		}
	}

	/// This voter's best finality estimate: the target of the most recent round it finalized,
	/// or genesis before the first round completes.
	pub fn estimate(&self) -> Hash {
		*self.estimate.lock()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::rngs::OsRng;
	use sc_client_api::{trie::TrieState, InMemoryBackend};
	use sc_consensus::digest_handler::DigestHandler;
	use sc_consensus::verifier::{Verified, Verifier, VerifierError};
	use sp_runtime::{Digest, Header, OpaqueExtrinsic};

	struct NoopEpochSink;
	impl EpochChangeSink for NoopEpochSink {
		fn next_epoch_data(&self, _at: &Header, _descriptor: sp_consensus_babe::NextEpochDescriptor) {}
		fn next_config_data(&self, _at: &Header, _descriptor: sp_consensus_babe::NextConfigDescriptor) {}
		fn on_disabled(&self, _at: &Header, _authority_index: sp_consensus_babe::AuthorityIndex) {}
	}

	/// Unused by these tests (only `finalize` is exercised, never `import`), but required to
	/// construct a `BlockImportPipeline`.
	struct UnusedVerifier;
	impl Verifier for UnusedVerifier {
		fn verify(&self, _parent: &Header, _header: &Header, _body: &[OpaqueExtrinsic]) -> Result<Verified, VerifierError> {
			Err(VerifierError::Header)
		}
	}

	fn local_voter() -> (LocalVoter, AuthorityId) {
		let signing_key = ed25519_zebra::SigningKey::new(OsRng);
		let verification_key = ed25519_zebra::VerificationKey::from(&signing_key);
		let id = AuthorityId(verification_key.into());
		(LocalVoter { id, signing_key }, id)
	}

	fn pipeline_over(
		backend: &Arc<InMemoryBackend>,
		authorities: &Arc<GrandpaAuthoritySet>,
	) -> Arc<BlockImportPipeline<NoopEpochSink, Arc<GrandpaAuthoritySet>>> {
		let digests = DigestHandler::new(NoopEpochSink, Arc::clone(authorities));
		Arc::new(BlockImportPipeline::new(
			backend.clone(),
			Arc::new(sc_executor::CodeExecutor::new()),
			Arc::new(UnusedVerifier),
			Arc::new(crate::justification::GrandpaJustificationVerifier::new(Arc::clone(authorities))),
			digests,
		))
	}

	#[test]
	fn single_voter_finalizes_the_best_chain_head_in_one_round() {
		let genesis = Header::new(0, [0; 32], [0; 32], [0; 32], Digest::default());
		let backend = InMemoryBackend::new(genesis, TrieState::empty(), vec![]);
		let genesis_hash = backend.info().genesis_hash;

		let child = Header::new(1, [1; 32], genesis_hash, genesis_hash, Digest::default());
		let child_hash = child.hash();
		backend.commit_block(child, vec![], TrieState::empty(), 1).unwrap();
		assert_eq!(backend.info().best_hash, child_hash);

		let (local, id) = local_voter();
		let authorities = Arc::new(GrandpaAuthoritySet::new(vec![(id, 1)]));
		let pipeline = pipeline_over(&backend, &authorities);

		let voter = GrandpaVoter::new(backend.clone(), pipeline, authorities, local);
		voter.run_round();

		assert_eq!(backend.info().finalized_hash, child_hash);
		assert_eq!(voter.estimate(), child_hash);
	}

	#[test]
	fn a_round_with_no_quorum_does_not_advance_finality() {
		let genesis = Header::new(0, [0; 32], [0; 32], [0; 32], Digest::default());
		let backend = InMemoryBackend::new(genesis, TrieState::empty(), vec![]);
		let genesis_hash = backend.info().genesis_hash;

		let (local, id) = local_voter();
		let (_other_key, other_id) = local_voter();
		let authorities = Arc::new(GrandpaAuthoritySet::new(vec![(id, 1), (other_id, 2)]));
		let pipeline = pipeline_over(&backend, &authorities);

		let voter = GrandpaVoter::new(backend.clone(), pipeline, authorities, local);
		voter.run_round();

		assert_eq!(backend.info().finalized_hash, genesis_hash, "1-of-3 weight never clears 2/3");
	}
}
