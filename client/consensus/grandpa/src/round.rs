//! A single GRANDPA voting round: the Prevote, Precommit and Finalize phases, and the vote
//! tallying that decides when each phase's supermajority has been reached.
//!
//! This models the three-phase state machine without the full GHOST ancestor-weight
//! calculation real GRANDPA runs to find the best block *compatible with* every prevote: votes
//! are tallied by their exact target rather than folded up to a common ancestor. Documented in
//! `DESIGN.md`; grounded on the round/commit shapes `sp-consensus-grandpa` already names.

use std::collections::HashMap;

use ed25519_zebra::{Signature, VerificationKey};
use sp_consensus_grandpa::{
	AuthorityId, AuthorityList, Commit, Precommit, Prevote, RoundNumber, SetId, SignedPrecommit, SignedPrevote,
};
use sp_runtime::{BlockNumber, Hash};

#[derive(Clone, Copy, PartialEq, Eq, Debug, thiserror::Error)]
pub enum RoundError {
	#[error("vote is not scoped to this round/set")]
	WrongRoundOrSet,
	#[error("voter is not a member of the authority set")]
	NotAnAuthority,
	#[error("vote signature does not check out")]
	BadSignature,
}

/// Constructs the exact byte preimage a vote's signature covers: the vote's SCALE encoding,
/// domain-separated by round and set id so a vote can never be replayed into a different round
/// or across a set change.
pub(crate) fn signing_payload<V: codec::Encode>(vote: &V, round: RoundNumber, set_id: SetId) -> Vec<u8> {
	let mut payload = vote.encode();
	payload.extend_from_slice(&round.to_le_bytes());
	payload.extend_from_slice(&set_id.to_le_bytes());
	payload
}

fn verify_vote<V: codec::Encode>(vote: &V, signature: &[u8; 64], id: &AuthorityId, round: RoundNumber, set_id: SetId) -> bool {
	let (Ok(key), Ok(signature)) = (VerificationKey::try_from(id.0), Signature::try_from(*signature)) else {
		return false;
	};
	key.verify(&signature, &signing_payload(vote, round, set_id)).is_ok()
}

pub fn sign_prevote(
	signing_key: &ed25519_zebra::SigningKey,
	id: AuthorityId,
	vote: Prevote,
	round: RoundNumber,
	set_id: SetId,
) -> SignedPrevote {
	let payload = signing_payload(&vote, round, set_id);
	let signature = signing_key.sign(&payload);
	make_signed_vote(vote, signature, id, round, set_id)
}

pub fn sign_precommit(
	signing_key: &ed25519_zebra::SigningKey,
	id: AuthorityId,
	vote: Precommit,
	round: RoundNumber,
	set_id: SetId,
) -> SignedPrecommit {
	let payload = signing_payload(&vote, round, set_id);
	let signature = signing_key.sign(&payload);
	make_signed_vote(vote, signature, id, round, set_id)
}

fn make_signed_vote<V>(
	vote: V,
	signature: ed25519_zebra::Signature,
	id: AuthorityId,
	round: RoundNumber,
	set_id: SetId,
) -> sp_consensus_grandpa::SignedVote<V> {
	sp_consensus_grandpa::SignedVote {
		vote,
		signature: sp_consensus_grandpa::AuthoritySignature(signature.into()),
		id,
		round,
		set_id,
	}
}

/// Tallies prevotes and precommits for one `(set_id, round)` against a fixed authority list,
/// reporting a supermajority target as soon as one has unambiguous support.
pub struct VotingRound {
	round: RoundNumber,
	set_id: SetId,
	authorities: AuthorityList,
	prevotes: HashMap<AuthorityId, SignedPrevote>,
	precommits: HashMap<AuthorityId, SignedPrecommit>,
}

impl VotingRound {
	pub fn new(round: RoundNumber, set_id: SetId, authorities: AuthorityList) -> Self {
		VotingRound { round, set_id, authorities, prevotes: HashMap::new(), precommits: HashMap::new() }
	}

	fn weight_of(&self, id: &AuthorityId) -> Option<u64> {
		self.authorities.iter().find(|(a, _)| a == id).map(|(_, w)| *w)
	}

	fn total_weight(&self) -> u64 {
		self.authorities.iter().map(|(_, w)| w).sum()
	}

	/// `> 2/3` of total weight, the weight a block needs to be prevote-GHOST or committed.
	fn supermajority_threshold(&self) -> u64 {
		(self.total_weight() * 2) / 3 + 1
	}

	/// Import a prevote, checking set/round scoping, authority membership and signature.
	/// Re-importing the same vote from the same voter is idempotent; importing a *different*
	/// vote from a voter who already voted is reported as an equivocation by returning the
	/// earlier vote rather than silently overwriting it.
	pub fn import_prevote(&mut self, signed: SignedPrevote) -> Result<Option<SignedPrevote>, RoundError> {
		self.check_scope(signed.round, signed.set_id)?;
		self.weight_of(&signed.id).ok_or(RoundError::NotAnAuthority)?;
		if !verify_vote(&signed.vote, &signed.signature.0, &signed.id, signed.round, signed.set_id) {
			return Err(RoundError::BadSignature);
		}
		match self.prevotes.get(&signed.id) {
			Some(existing) if existing.vote != signed.vote => Ok(Some(existing.clone())),
			_ => {
				self.prevotes.insert(signed.id, signed);
				Ok(None)
			},
		}
	}

	pub fn import_precommit(&mut self, signed: SignedPrecommit) -> Result<Option<SignedPrecommit>, RoundError> {
		self.check_scope(signed.round, signed.set_id)?;
		self.weight_of(&signed.id).ok_or(RoundError::NotAnAuthority)?;
		if !verify_vote(&signed.vote, &signed.signature.0, &signed.id, signed.round, signed.set_id) {
			return Err(RoundError::BadSignature);
		}
		match self.precommits.get(&signed.id) {
			Some(existing) if existing.vote != signed.vote => Ok(Some(existing.clone())),
			_ => {
				self.precommits.insert(signed.id, signed);
				Ok(None)
			},
		}
	}

	fn check_scope(&self, round: RoundNumber, set_id: SetId) -> Result<(), RoundError> {
		if round != self.round || set_id != self.set_id {
			return Err(RoundError::WrongRoundOrSet);
		}
		Ok(())
	}

	/// The prevote-GHOST: the single target with supermajority prevote weight, if any exists.
	/// Real GRANDPA would also accept any ancestor of such a target; this tally only reports an
	/// exact match.
	pub fn prevote_ghost(&self) -> Option<(Hash, BlockNumber)> {
		self.tally(&self.prevotes.values().map(|v| (v.vote.target_hash, v.vote.target_number, v.id)).collect::<Vec<_>>())
	}

	/// A finished [`Commit`] once precommits for one target reach supermajority weight.
	pub fn finalizing_commit(&self) -> Option<Commit> {
		let (target_hash, target_number) = self.tally(
			&self.precommits.values().map(|v| (v.vote.target_hash, v.vote.target_number, v.id)).collect::<Vec<_>>(),
		)?;
		let precommits = self
			.precommits
			.values()
			.filter(|v| v.vote.target_hash == target_hash)
			.cloned()
			.collect();
		Some(Commit { target_hash, target_number, precommits })
	}

	fn tally(&self, votes: &[(Hash, BlockNumber, AuthorityId)]) -> Option<(Hash, BlockNumber)> {
		let mut weights: HashMap<Hash, (BlockNumber, u64)> = HashMap::new();
		for (hash, number, id) in votes {
			let weight = self.weight_of(id).unwrap_or(0);
			let entry = weights.entry(*hash).or_insert((*number, 0));
			entry.1 += weight;
		}
		let threshold = self.supermajority_threshold();
		weights.into_iter().find(|(_, (_, weight))| *weight >= threshold).map(|(hash, (number, _))| (hash, number))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::rngs::OsRng;

	fn authority() -> (ed25519_zebra::SigningKey, AuthorityId) {
		let signing_key = ed25519_zebra::SigningKey::new(OsRng);
		let verification_key = VerificationKey::from(&signing_key);
		(signing_key, AuthorityId(verification_key.into()))
	}

	#[test]
	fn precommit_commits_once_supermajority_agrees() {
		let (key_a, id_a) = authority();
		let (key_b, id_b) = authority();
		let (key_c, id_c) = authority();
		let authorities = vec![(id_a, 1), (id_b, 1), (id_c, 1)];
		let mut round = VotingRound::new(1, 0, authorities);

		let vote = Precommit { target_hash: [9; 32], target_number: 5 };
		round.import_precommit(sign_precommit(&key_a, id_a, vote, 1, 0)).unwrap();
		assert!(round.finalizing_commit().is_none());
		round.import_precommit(sign_precommit(&key_b, id_b, vote, 1, 0)).unwrap();
		assert!(round.finalizing_commit().is_none(), "2 of 3 is not yet > 2/3");
		round.import_precommit(sign_precommit(&key_c, id_c, vote, 1, 0)).unwrap();
		let commit = round.finalizing_commit().unwrap();
		assert_eq!(commit.target_hash, [9; 32]);
		assert_eq!(commit.precommits.len(), 3);
	}

	#[test]
	fn rejects_a_vote_signed_for_a_different_round() {
		let (key_a, id_a) = authority();
		let mut round = VotingRound::new(1, 0, vec![(id_a, 1)]);
		let vote = Precommit { target_hash: [1; 32], target_number: 1 };
		let signed = sign_precommit(&key_a, id_a, vote, 2, 0);
		assert_eq!(round.import_precommit(signed).unwrap_err(), RoundError::WrongRoundOrSet);
	}

	#[test]
	fn flags_an_equivocating_double_vote() {
		let (key_a, id_a) = authority();
		let mut round = VotingRound::new(1, 0, vec![(id_a, 1)]);
		let first = Precommit { target_hash: [1; 32], target_number: 1 };
		let second = Precommit { target_hash: [2; 32], target_number: 1 };
		round.import_precommit(sign_precommit(&key_a, id_a, first, 1, 0)).unwrap();
		let equivocation = round.import_precommit(sign_precommit(&key_a, id_a, second, 1, 0)).unwrap();
		assert!(equivocation.is_some());
	}
}
