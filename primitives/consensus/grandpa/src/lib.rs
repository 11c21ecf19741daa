//! GRANDPA primitives: authority identity, votes, justifications and the authority-set
//! change log the voter and the digest handler both speak.

use codec::{Decode, Encode};
use scale_info::TypeInfo;
use sp_runtime::{BlockNumber, Hash, Header};

/// ed25519 public key of a GRANDPA voter, 32 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode, TypeInfo, Debug, Hash, PartialOrd, Ord)]
pub struct AuthorityId(pub [u8; 32]);

/// ed25519 signature over a signed vote, 64 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode, TypeInfo, Debug)]
pub struct AuthoritySignature(pub [u8; 64]);

pub type AuthorityWeight = u64;
pub type AuthorityList = Vec<(AuthorityId, AuthorityWeight)>;
pub type SetId = u64;
pub type RoundNumber = u64;

/// A vote for a block to be the ancestor of the eventually-finalized chain.
#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode, TypeInfo, Debug)]
pub struct Prevote {
	pub target_hash: Hash,
	pub target_number: BlockNumber,
}

/// A vote to finalize a block.
#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode, TypeInfo, Debug)]
pub struct Precommit {
	pub target_hash: Hash,
	pub target_number: BlockNumber,
}

/// Any vote, signed by the voter that cast it, scoped to `(set_id, round)` so votes can never
/// be replayed across authority-set generations or rounds.
#[derive(Clone, PartialEq, Eq, Encode, Decode, Debug)]
pub struct SignedVote<V> {
	pub vote: V,
	pub signature: AuthoritySignature,
	pub id: AuthorityId,
	pub round: RoundNumber,
	pub set_id: SetId,
}

pub type SignedPrevote = SignedVote<Prevote>;
pub type SignedPrecommit = SignedVote<Precommit>;

/// The `>2/3`-weight set of precommits that finalize `target`.
#[derive(Clone, PartialEq, Eq, Encode, Decode, Debug)]
pub struct Commit {
	pub target_hash: Hash,
	pub target_number: BlockNumber,
	pub precommits: Vec<SignedPrecommit>,
}

/// A finality proof: the winning commit plus the headers of any ancestor blocks referenced
/// by precommits that voted for something deeper than `target`, so a verifier with only
/// `target`'s ancestors on hand can still check every precommit targets a descendant.
#[derive(Clone, PartialEq, Eq, Encode, Decode, Debug)]
pub struct GrandpaJustification {
	pub round: RoundNumber,
	pub commit: Commit,
	pub votes_ancestries: Vec<Header>,
}

/// A newly-scheduled authority set, to take effect `delay` blocks after the block that
/// announced it is finalized.
#[derive(Clone, PartialEq, Eq, Encode, Decode, TypeInfo, Debug)]
pub struct ScheduledChange {
	pub next_authorities: AuthorityList,
	pub delay: BlockNumber,
}

/// GRANDPA's `Consensus` digest payload. Discriminants fixed at 1..5 per the wire format this
/// node shares with every other GRANDPA implementation.
#[derive(Clone, PartialEq, Eq, Encode, Decode, TypeInfo, Debug)]
pub enum ConsensusLog {
	#[codec(index = 1)]
	ScheduledChange(ScheduledChange),
	#[codec(index = 2)]
	ForcedChange(BlockNumber, ScheduledChange),
	#[codec(index = 3)]
	OnDisabled(u64),
	#[codec(index = 4)]
	Pause(BlockNumber),
	#[codec(index = 5)]
	Resume(BlockNumber),
}

/// Proof that an authority signed two different precommits in the same round, or two
/// different prevotes in the same round.
#[derive(Clone, PartialEq, Eq, Encode, Decode, Debug)]
pub enum EquivocationProof {
	Prevote(Equivocation<Prevote>),
	Precommit(Equivocation<Precommit>),
}

#[derive(Clone, PartialEq, Eq, Encode, Decode, Debug)]
pub struct Equivocation<V> {
	pub round: RoundNumber,
	pub set_id: SetId,
	pub identity: AuthorityId,
	pub first: (V, AuthoritySignature),
	pub second: (V, AuthoritySignature),
}
