//! The authority set: the current GRANDPA voter list plus at most one pending change, with the
//! `set_id` monotonicity invariant (it only ever increases by exactly one, on commit)
//! maintained in one place.
//!
//! Unlike BABE's [`sc_consensus_epochs::EpochChanges`], this tracks a single linear view rather
//! than one per fork: this node models one local voter reasoning about the chain it itself
//! best-chains to, not a fork-aware view serving several simultaneous authority-set
//! candidates. See `DESIGN.md` for why that asymmetry is acceptable here.

use parking_lot::RwLock;
use sc_consensus::AuthoritySetChangeSink;
use sp_consensus_grandpa::{AuthorityList, ScheduledChange, SetId};
use sp_runtime::{BlockNumber, Header};

#[derive(Clone, Debug)]
struct PendingChange {
	effective_number: BlockNumber,
	next_authorities: AuthorityList,
	forced: bool,
}

struct Inner {
	current: AuthorityList,
	set_id: SetId,
	pending: Option<PendingChange>,
	paused: bool,
}

/// Owns the authority list GRANDPA votes with, and the one pending change (standard or
/// forced) a chain may have queued at a time.
pub struct GrandpaAuthoritySet {
	inner: RwLock<Inner>,
}

impl GrandpaAuthoritySet {
	pub fn new(genesis_authorities: AuthorityList) -> Self {
		GrandpaAuthoritySet {
			inner: RwLock::new(Inner { current: genesis_authorities, set_id: 0, pending: None, paused: false }),
		}
	}

	pub fn current_authorities(&self) -> AuthorityList {
		self.inner.read().current.clone()
	}

	pub fn set_id(&self) -> SetId {
		self.inner.read().set_id
	}

	pub fn is_paused(&self) -> bool {
		self.inner.read().paused
	}

	/// Standard changes enact once finalization reaches `effective_number`; forced changes
	/// enact once the best chain reaches it. Call after every import and every finalize with
	/// the relevant number; a change already past its effective point commits immediately,
	/// bumping `set_id` by exactly one.
	pub fn note_finalized(&self, finalized_number: BlockNumber) {
		self.try_commit(|pending| !pending.forced && finalized_number >= pending.effective_number);
	}

	pub fn note_best_block(&self, best_number: BlockNumber) {
		self.try_commit(|pending| pending.forced && best_number >= pending.effective_number);
	}

	fn try_commit(&self, ready: impl Fn(&PendingChange) -> bool) {
		let mut inner = self.inner.write();
		let should_commit = matches!(&inner.pending, Some(pending) if ready(pending));
		if should_commit {
			let pending = inner.pending.take().expect("checked Some above");
			inner.current = pending.next_authorities;
			inner.set_id += 1;
		}
	}
}

impl AuthoritySetChangeSink for GrandpaAuthoritySet {
	fn scheduled_change(&self, at: &Header, change: ScheduledChange) {
		let mut inner = self.inner.write();
		inner.pending = Some(PendingChange {
			effective_number: at.number + change.delay,
			next_authorities: change.next_authorities,
			forced: false,
		});
	}

	fn forced_change(&self, _at: &Header, best_finalized: BlockNumber, change: ScheduledChange) {
		let mut inner = self.inner.write();
		inner.pending = Some(PendingChange {
			effective_number: best_finalized + change.delay,
			next_authorities: change.next_authorities,
			forced: true,
		});
	}

	fn on_disabled(&self, _at: &Header, authority_index: u64) {
		let mut inner = self.inner.write();
		if let Some(index) = usize::try_from(authority_index).ok() {
			if index < inner.current.len() {
				log::warn!(target: "grandpa", "authority {index} reported disabled; excluding from the voting set");
				inner.current.remove(index);
			}
		}
	}

	fn pause(&self, _at: &Header, _delay: BlockNumber) {
		// Real GRANDPA delays the pause until `delay` blocks after `at` finalizes; this node
		// applies it immediately, since it has only one local voter to stop rather than a
		// network of them that must agree on when.
		self.inner.write().paused = true;
	}

	fn resume(&self, _at: &Header, _delay: BlockNumber) {
		self.inner.write().paused = false;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use sp_consensus_grandpa::AuthorityId;
	use sp_runtime::Digest;

	fn header(number: BlockNumber) -> Header {
		Header::new(number, [0; 32], [0; 32], [0; 32], Digest::default())
	}

	#[test]
	fn standard_change_waits_for_finalization_to_reach_it() {
		let set = GrandpaAuthoritySet::new(vec![(AuthorityId([1; 32]), 1)]);
		set.scheduled_change(&header(10), ScheduledChange { next_authorities: vec![(AuthorityId([2; 32]), 1)], delay: 5 });

		set.note_finalized(14);
		assert_eq!(set.set_id(), 0);

		set.note_finalized(15);
		assert_eq!(set.set_id(), 1);
		assert_eq!(set.current_authorities(), vec![(AuthorityId([2; 32]), 1)]);
	}

	#[test]
	fn forced_change_waits_for_best_block_not_finalization() {
		let set = GrandpaAuthoritySet::new(vec![(AuthorityId([1; 32]), 1)]);
		set.forced_change(&header(10), 10, ScheduledChange { next_authorities: vec![(AuthorityId([3; 32]), 1)], delay: 2 });

		set.note_finalized(100);
		assert_eq!(set.set_id(), 0, "a forced change must not enact on finalization alone");

		set.note_best_block(12);
		assert_eq!(set.set_id(), 1);
	}

	#[test]
	fn pause_then_resume() {
		let set = GrandpaAuthoritySet::new(vec![]);
		assert!(!set.is_paused());
		set.pause(&header(1), 0);
		assert!(set.is_paused());
		set.resume(&header(2), 0);
		assert!(!set.is_paused());
	}
}
