//! Wires BABE's `Consensus` digests into [`sc_consensus_epochs::EpochChanges`].
//!
//! `EpochChanges` only knows how to store and look up already-built [`Epoch`]s; it has no
//! opinion on how a `NextEpochData`/`NextConfigData` digest pair turns into one. That
//! translation — carry the previous epoch's `start_slot`/`epoch_index` forward, splice in
//! whatever the digests named — lives here instead, as the concrete
//! [`sc_consensus::EpochChangeSink`] the import pipeline's [`sc_consensus::DigestHandler`]
//! dispatches to.

use parking_lot::Mutex;
use sc_consensus::EpochChangeSink;
use sc_consensus_epochs::EpochChanges;
use sp_consensus_babe::{
	AuthorityIndex, BabeEpochConfiguration, Epoch, NextConfigDescriptor, NextEpochDescriptor,
};
use sp_runtime::Header;
use std::sync::Arc;

/// Tracks the most recently computed epoch (by value, not by lookup) so the next
/// `NextEpochData` digest can be turned into a full [`Epoch`] without re-deriving its
/// `start_slot`/`epoch_index` from scratch.
pub struct BabeEpochSink {
	epochs: Arc<EpochChanges>,
	next_config_override: Mutex<Option<BabeEpochConfiguration>>,
	tail: Mutex<Epoch>,
}

impl BabeEpochSink {
	/// `genesis_epoch` seeds both the lookup table (keyed on `genesis_hash`, the block whose
	/// ancestor walk every later `epoch_for` query bottoms out at) and the rolling tail; it is
	/// the epoch active for every slot before the first `NextEpochData` digest is ever seen.
	pub fn new(epochs: Arc<EpochChanges>, genesis_hash: sp_runtime::Hash, genesis_epoch: Epoch) -> Self {
		epochs.import(genesis_hash, genesis_epoch.clone());
		BabeEpochSink { epochs, next_config_override: Mutex::new(None), tail: Mutex::new(genesis_epoch) }
	}
}

impl EpochChangeSink for BabeEpochSink {
	fn next_epoch_data(&self, at: &Header, descriptor: NextEpochDescriptor) {
		let mut tail = self.tail.lock();
		let config = self.next_config_override.lock().take().unwrap_or_else(|| tail.config.clone());
		let next = Epoch {
			epoch_index: tail.epoch_index + 1,
			start_slot: tail.end_slot(),
			duration: tail.duration,
			authorities: descriptor.authorities,
			randomness: descriptor.randomness,
			config,
		};
		self.epochs.import(at.hash(), next.clone());
		*tail = next;
	}

	fn next_config_data(&self, _at: &Header, descriptor: NextConfigDescriptor) {
		*self.next_config_override.lock() =
			Some(BabeEpochConfiguration { c: descriptor.c, allowed_slots: descriptor.allowed_slots });
	}

	fn on_disabled(&self, _at: &Header, authority_index: AuthorityIndex) {
		log::warn!(target: "babe", "authority {authority_index} disabled by runtime digest");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use sp_consensus::Slot;
	use sp_consensus_babe::AllowedSlots;
	use sp_runtime::Digest;

	fn genesis_epoch(duration: u64) -> Epoch {
		Epoch {
			epoch_index: 0,
			start_slot: Slot(0),
			duration,
			authorities: vec![],
			randomness: [0; 32],
			config: BabeEpochConfiguration { c: (1, 4), allowed_slots: AllowedSlots::PrimaryOnly },
		}
	}

	#[test]
	fn next_epoch_data_carries_start_slot_and_index_forward() {
		let epochs = Arc::new(EpochChanges::new());
		let sink = BabeEpochSink::new(epochs.clone(), [0; 32], genesis_epoch(10));

		let header = Header::new(1, [0; 32], [0; 32], [0; 32], Digest::default());
		sink.next_epoch_data(&header, NextEpochDescriptor { authorities: vec![], randomness: [1; 32] });

		assert_eq!(sink.tail.lock().epoch_index, 1);
		assert_eq!(sink.tail.lock().start_slot, Slot(10));
		assert_eq!(sink.tail.lock().randomness, [1; 32]);
	}

	#[test]
	fn next_config_data_overrides_only_the_following_epoch() {
		let epochs = Arc::new(EpochChanges::new());
		let sink = BabeEpochSink::new(epochs.clone(), [0; 32], genesis_epoch(10));
		let header = Header::new(1, [0; 32], [0; 32], [0; 32], Digest::default());

		sink.next_config_data(&header, NextConfigDescriptor { c: (1, 2), allowed_slots: AllowedSlots::PrimaryAndSecondaryPlain });
		sink.next_epoch_data(&header, NextEpochDescriptor { authorities: vec![], randomness: [0; 32] });
		assert_eq!(sink.tail.lock().config.c, (1, 2));

		sink.next_epoch_data(&header, NextEpochDescriptor { authorities: vec![], randomness: [0; 32] });
		assert_eq!(sink.tail.lock().config.c, (1, 2), "override without a following NextConfigData carries forward");
	}
}
