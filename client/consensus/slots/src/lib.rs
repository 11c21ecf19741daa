//! Slot timing: a stream of slot boundaries, and the worker contract a slot-based authoring
//! loop implements against it.
//!
//! This crate knows nothing about BABE specifically — `slot_duration` is just a parameter —
//! which is why it is its own crate rather than folded into `sc-consensus-babe`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sp_consensus::Slot;

/// What a worker is told at each slot boundary.
#[derive(Clone, Copy, Debug)]
pub struct SlotInfo {
	pub slot: Slot,
	pub duration: Duration,
}

/// Implemented by a slot-based authoring loop (BABE). `sc-consensus-slots` drives this once
/// per slot boundary reached; the worker decides whether it has anything to do.
#[async_trait::async_trait]
pub trait SlotWorker: Send {
	async fn on_slot(&mut self, slot_info: SlotInfo);
}

/// Drives `worker` forever, waking it at every slot boundary starting from the slot containing
/// the current wall-clock time. Slots are never replayed: if handling one slot takes longer
/// than `slot_duration`, the next call to `on_slot` is for whatever slot wall-clock has since
/// reached, skipping the ones missed in between — matching the authoring loop's documented
/// "slots missed due to execution exceeding slot duration are skipped" behaviour.
pub async fn run_slots<W: SlotWorker>(mut worker: W, slot_duration: Duration) {
	let mut last_slot = current_slot(slot_duration);
	loop {
		sleep_until_next_slot(last_slot, slot_duration).await;
		let slot = current_slot(slot_duration);
		last_slot = slot;
		worker.on_slot(SlotInfo { slot, duration: slot_duration }).await;
	}
}

fn current_slot(slot_duration: Duration) -> Slot {
	Slot::now(slot_duration)
}

async fn sleep_until_next_slot(last_slot: Slot, slot_duration: Duration) {
	loop {
		let now_millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64;
		let next_boundary = last_slot.saturating_add(1).start(slot_duration.as_millis() as u64);
		let next_boundary_millis = next_boundary.as_millis() as u64;
		if now_millis >= next_boundary_millis {
			return;
		}
		futures_timer::Delay::new(Duration::from_millis((next_boundary_millis - now_millis).min(50))).await;
		if current_slot(slot_duration) > last_slot {
			return;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::{Arc, Mutex};

	struct CountingWorker {
		calls: Arc<Mutex<Vec<Slot>>>,
	}

	#[async_trait::async_trait]
	impl SlotWorker for CountingWorker {
		async fn on_slot(&mut self, slot_info: SlotInfo) {
			self.calls.lock().unwrap().push(slot_info.slot);
		}
	}

	#[tokio::test(start_paused = true)]
	async fn drives_worker_at_successive_slot_boundaries() {
		let calls = Arc::new(Mutex::new(Vec::new()));
		let worker = CountingWorker { calls: calls.clone() };
		let duration = Duration::from_millis(10);

		let handle = tokio::spawn(run_slots(worker, duration));
		tokio::time::advance(Duration::from_millis(35)).await;
		handle.abort();

		assert!(calls.lock().unwrap().len() >= 2);
	}
}
