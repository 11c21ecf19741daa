//! The digest handler: a single operation, `handle`, that scans an imported block's consensus
//! digests and routes each one to whichever engine owns it.
//!
//! This module holds no state of its own — `sc-consensus-epochs` owns BABE's epoch index,
//! `sc-consensus-grandpa` owns the pending authority-set change queue. `DigestHandler` only
//! knows how to decode the two engines' `ConsensusLog` wire formats and which sink each
//! variant belongs to.

use std::sync::Arc;

use codec::Decode;
use sp_consensus_babe::{self as babe, ConsensusLog as BabeLog};
use sp_consensus_grandpa::{self as grandpa, ConsensusLog as GrandpaLog};
use sp_runtime::{BlockNumber, Header, BABE_ENGINE_ID, GRANDPA_ENGINE_ID};

/// Where BABE's `Consensus` digests land.
pub trait EpochChangeSink: Send + Sync {
	fn next_epoch_data(&self, at: &Header, descriptor: babe::NextEpochDescriptor);
	fn next_config_data(&self, at: &Header, descriptor: babe::NextConfigDescriptor);
	fn on_disabled(&self, at: &Header, authority_index: babe::AuthorityIndex);
}

/// Where GRANDPA's `Consensus` digests land.
pub trait AuthoritySetChangeSink: Send + Sync {
	fn scheduled_change(&self, at: &Header, change: grandpa::ScheduledChange);
	fn forced_change(&self, at: &Header, best_finalized: BlockNumber, change: grandpa::ScheduledChange);
	fn on_disabled(&self, at: &Header, authority_index: u64);
	fn pause(&self, at: &Header, delay: BlockNumber);
	fn resume(&self, at: &Header, delay: BlockNumber);
}

// `sc-service` shares one `Arc<GrandpaAuthoritySet>`/epoch-index between the digest handler and
// whichever engine owns the underlying state, so both sinks need to be usable through an `Arc`.
impl<T: EpochChangeSink + ?Sized> EpochChangeSink for Arc<T> {
	fn next_epoch_data(&self, at: &Header, descriptor: babe::NextEpochDescriptor) {
		(**self).next_epoch_data(at, descriptor)
	}
	fn next_config_data(&self, at: &Header, descriptor: babe::NextConfigDescriptor) {
		(**self).next_config_data(at, descriptor)
	}
	fn on_disabled(&self, at: &Header, authority_index: babe::AuthorityIndex) {
		(**self).on_disabled(at, authority_index)
	}
}

impl<T: AuthoritySetChangeSink + ?Sized> AuthoritySetChangeSink for Arc<T> {
	fn scheduled_change(&self, at: &Header, change: grandpa::ScheduledChange) {
		(**self).scheduled_change(at, change)
	}
	fn forced_change(&self, at: &Header, best_finalized: BlockNumber, change: grandpa::ScheduledChange) {
		(**self).forced_change(at, best_finalized, change)
	}
	fn on_disabled(&self, at: &Header, authority_index: u64) {
		(**self).on_disabled(at, authority_index)
	}
	fn pause(&self, at: &Header, delay: BlockNumber) {
		(**self).pause(at, delay)
	}
	fn resume(&self, at: &Header, delay: BlockNumber) {
		(**self).resume(at, delay)
	}
}

pub struct DigestHandler<E, G> {
	epochs: E,
	authorities: G,
}

impl<E: EpochChangeSink, G: AuthoritySetChangeSink> DigestHandler<E, G> {
	pub fn new(epochs: E, authorities: G) -> Self {
		DigestHandler { epochs, authorities }
	}

	/// Parse every consensus digest in `header`, in order, and dispatch it. Malformed payloads
	/// for a recognised engine are logged and skipped rather than failing the whole block —
	/// digest handling runs after the block has already passed verification and been
	/// committed, so there is nothing left to reject.
	pub fn handle(&self, header: &Header) {
		for item in header.digest.logs() {
			if let Some(payload) = item.as_consensus(BABE_ENGINE_ID) {
				match BabeLog::decode(&mut &payload[..]) {
					Ok(BabeLog::NextEpochData(descriptor)) => self.epochs.next_epoch_data(header, descriptor),
					Ok(BabeLog::NextConfigData(descriptor)) => self.epochs.next_config_data(header, descriptor),
					Ok(BabeLog::OnDisabled(index)) => self.epochs.on_disabled(header, index),
					Err(err) => log::warn!(target: "digest-handler", "malformed babe consensus digest: {err}"),
				}
			} else if let Some(payload) = item.as_consensus(GRANDPA_ENGINE_ID) {
				match GrandpaLog::decode(&mut &payload[..]) {
					Ok(GrandpaLog::ScheduledChange(change)) => self.authorities.scheduled_change(header, change),
					Ok(GrandpaLog::ForcedChange(best_finalized, change)) => {
						self.authorities.forced_change(header, best_finalized, change)
					},
					Ok(GrandpaLog::OnDisabled(index)) => self.authorities.on_disabled(header, index),
					Ok(GrandpaLog::Pause(delay)) => self.authorities.pause(header, delay),
					Ok(GrandpaLog::Resume(delay)) => self.authorities.resume(header, delay),
					Err(err) => log::warn!(target: "digest-handler", "malformed grandpa consensus digest: {err}"),
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use codec::Encode;
	use parking_lot::Mutex;
	use sp_runtime::{Digest, DigestItem};

	#[derive(Default)]
	struct RecordingEpochSink {
		next_epoch: Mutex<Vec<babe::NextEpochDescriptor>>,
	}
	impl EpochChangeSink for RecordingEpochSink {
		fn next_epoch_data(&self, _at: &Header, descriptor: babe::NextEpochDescriptor) {
			self.next_epoch.lock().push(descriptor);
		}
		fn next_config_data(&self, _at: &Header, _descriptor: babe::NextConfigDescriptor) {}
		fn on_disabled(&self, _at: &Header, _authority_index: babe::AuthorityIndex) {}
	}

	#[derive(Default)]
	struct RecordingAuthoritySink {
		scheduled: Mutex<Vec<grandpa::ScheduledChange>>,
	}
	impl AuthoritySetChangeSink for RecordingAuthoritySink {
		fn scheduled_change(&self, _at: &Header, change: grandpa::ScheduledChange) {
			self.scheduled.lock().push(change);
		}
		fn forced_change(&self, _at: &Header, _best_finalized: BlockNumber, _change: grandpa::ScheduledChange) {}
		fn on_disabled(&self, _at: &Header, _authority_index: u64) {}
		fn pause(&self, _at: &Header, _delay: BlockNumber) {}
		fn resume(&self, _at: &Header, _delay: BlockNumber) {}
	}

	#[test]
	fn routes_babe_and_grandpa_digests_to_their_own_sinks() {
		let handler = DigestHandler::new(RecordingEpochSink::default(), RecordingAuthoritySink::default());

		let next_epoch = babe::NextEpochDescriptor { authorities: vec![], randomness: [0; 32] };
		let scheduled = grandpa::ScheduledChange { next_authorities: vec![], delay: 10 };

		let mut header = Header::new(1, [0; 32], [0; 32], [0; 32], Digest::default());
		header.digest.push(DigestItem::Consensus(BABE_ENGINE_ID, BabeLog::NextEpochData(next_epoch.clone()).encode()));
		header
			.digest
			.push(DigestItem::Consensus(GRANDPA_ENGINE_ID, GrandpaLog::ScheduledChange(scheduled.clone()).encode()));

		handler.handle(&header);

		assert_eq!(handler.epochs.next_epoch.lock().as_slice(), &[next_epoch]);
		assert_eq!(handler.authorities.scheduled.lock().as_slice(), &[scheduled]);
	}
}
