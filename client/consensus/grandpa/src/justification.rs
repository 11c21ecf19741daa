//! Building a [`GrandpaJustification`] from a winning commit, and verifying one received from
//! elsewhere against the authority set active at the block it targets.

use std::sync::Arc;

use ed25519_zebra::{Signature, VerificationKey};
use sp_blockchain::FinalityFailure;
use sp_consensus_grandpa::{AuthorityId, Commit, GrandpaJustification, RoundNumber};
use sp_runtime::Header;

use crate::authority_set::GrandpaAuthoritySet;
use crate::round::signing_payload;

pub fn build_justification(round: RoundNumber, commit: Commit) -> GrandpaJustification {
	GrandpaJustification { round, commit, votes_ancestries: Vec::new() }
}

/// Checks a [`GrandpaJustification`] against the authority set this node currently tracks:
/// every precommit must be signed by a distinct current authority, target the header being
/// finalized, and carry the set id that set is currently at; their combined weight must clear
/// the `> 2/3` supermajority threshold.
pub struct GrandpaJustificationVerifier {
	authorities: Arc<GrandpaAuthoritySet>,
}

impl GrandpaJustificationVerifier {
	pub fn new(authorities: Arc<GrandpaAuthoritySet>) -> Self {
		GrandpaJustificationVerifier { authorities }
	}
}

impl sc_consensus::JustificationVerifier for GrandpaJustificationVerifier {
	fn verify(&self, header: &Header, justification: &[u8]) -> Result<(), FinalityFailure> {
		let justification =
			<GrandpaJustification as codec::Decode>::decode(&mut &justification[..]).map_err(|_| FinalityFailure::BadJustification)?;

		if justification.commit.target_hash != header.hash() {
			return Err(FinalityFailure::BadJustification);
		}

		let authorities = self.authorities.current_authorities();
		let set_id = self.authorities.set_id();
		let total_weight: u64 = authorities.iter().map(|(_, w)| w).sum();
		let threshold = (total_weight * 2) / 3 + 1;

		let mut seen: Vec<AuthorityId> = Vec::new();
		let mut weight = 0u64;
		for signed in &justification.commit.precommits {
			if signed.round != justification.round || signed.set_id != set_id {
				return Err(FinalityFailure::BadJustification);
			}
			if signed.vote.target_hash != justification.commit.target_hash {
				return Err(FinalityFailure::BadJustification);
			}
			let Some((_, authority_weight)) = authorities.iter().find(|(id, _)| *id == signed.id) else {
				return Err(FinalityFailure::BadJustification);
			};
			if seen.contains(&signed.id) {
				continue;
			}
			let payload = signing_payload(&signed.vote, signed.round, signed.set_id);
			let (Ok(key), Ok(signature)) = (VerificationKey::try_from(signed.id.0), Signature::try_from(signed.signature.0)) else {
				return Err(FinalityFailure::BadJustification);
			};
			if key.verify(&signature, &payload).is_err() {
				return Err(FinalityFailure::BadJustification);
			}
			seen.push(signed.id);
			weight += authority_weight;
		}

		if weight < threshold {
			return Err(FinalityFailure::BadJustification);
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::round::sign_precommit;
	use rand::rngs::OsRng;
	use sp_consensus_grandpa::Precommit;
	use sp_runtime::Digest;

	fn authority() -> (ed25519_zebra::SigningKey, AuthorityId) {
		let signing_key = ed25519_zebra::SigningKey::new(OsRng);
		let verification_key = VerificationKey::from(&signing_key);
		(signing_key, AuthorityId(verification_key.into()))
	}

	#[test]
	fn accepts_a_justification_with_supermajority_weight() {
		let (key_a, id_a) = authority();
		let (key_b, id_b) = authority();
		let (key_c, id_c) = authority();
		let authorities = Arc::new(GrandpaAuthoritySet::new(vec![(id_a, 1), (id_b, 1), (id_c, 1)]));

		let header = Header::new(5, [0; 32], [0; 32], [0; 32], Digest::default());
		let vote = Precommit { target_hash: header.hash(), target_number: 5 };
		let commit = Commit {
			target_hash: header.hash(),
			target_number: 5,
			precommits: vec![
				sign_precommit(&key_a, id_a, vote, 1, 0),
				sign_precommit(&key_b, id_b, vote, 1, 0),
				sign_precommit(&key_c, id_c, vote, 1, 0),
			],
		};
		let justification = build_justification(1, commit);

		let verifier = GrandpaJustificationVerifier::new(authorities);
		assert!(sc_consensus::JustificationVerifier::verify(&verifier, &header, &codec::Encode::encode(&justification)).is_ok());
	}

	#[test]
	fn rejects_below_threshold_weight() {
		let (key_a, id_a) = authority();
		let (_key_b, id_b) = authority();
		let (_key_c, id_c) = authority();
		let authorities = Arc::new(GrandpaAuthoritySet::new(vec![(id_a, 1), (id_b, 1), (id_c, 1)]));

		let header = Header::new(5, [0; 32], [0; 32], [0; 32], Digest::default());
		let vote = Precommit { target_hash: header.hash(), target_number: 5 };
		let commit =
			Commit { target_hash: header.hash(), target_number: 5, precommits: vec![sign_precommit(&key_a, id_a, vote, 1, 0)] };
		let justification = build_justification(1, commit);

		let verifier = GrandpaJustificationVerifier::new(authorities);
		assert!(sc_consensus::JustificationVerifier::verify(&verifier, &header, &codec::Encode::encode(&justification)).is_err());
	}
}
