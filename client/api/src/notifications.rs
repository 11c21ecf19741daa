//! Broadcast hub for block-import and finality events.
//!
//! `BlockImportPipeline` and `sc-client-api`'s backend would naturally hold references to
//! each other (the pipeline needs to publish through the backend's hub; the backend's hub
//! needs no knowledge of the pipeline at all). This resolves the cycle: the backend owns the
//! hub and exposes only `notify`/`subscribe`; the pipeline holds a `Arc<NotificationHub<_>>`
//! and never an owning handle back into the backend from inside a callback.

use std::sync::Arc;

use futures::channel::mpsc;
use parking_lot::Mutex;
use sp_runtime::{BlockNumber, Hash};

/// Published once a block clears every `BlockImportPipeline::import` check and is committed.
#[derive(Clone, Debug)]
pub struct BlockImportNotification {
	pub hash: Hash,
	pub number: BlockNumber,
	pub parent_hash: Hash,
	pub is_new_best: bool,
}

/// Published once GRANDPA (or an externally supplied justification) advances the finalized
/// pointer. Never precedes the `BlockImportNotification` for the same block.
#[derive(Clone, Debug)]
pub struct FinalityNotification {
	pub hash: Hash,
	pub number: BlockNumber,
}

/// A single-topic broadcast hub: many subscribers, one producer side, unbounded delivery (a
/// slow subscriber cannot stall the block-import path).
pub struct NotificationHub<T> {
	subscribers: Mutex<Vec<mpsc::UnboundedSender<T>>>,
}

impl<T: Clone> Default for NotificationHub<T> {
	fn default() -> Self {
		NotificationHub { subscribers: Mutex::new(Vec::new()) }
	}
}

impl<T: Clone> NotificationHub<T> {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn subscribe(&self) -> mpsc::UnboundedReceiver<T> {
		let (tx, rx) = mpsc::unbounded();
		self.subscribers.lock().push(tx);
		rx
	}

	/// Deliver `event` to every live subscriber, in the order `import`/`finalize` calls
	/// `notify`, which is the order blocks are committed in — downstream subscribers always
	/// observe commit order.
	pub fn notify(&self, event: T) {
		let mut subs = self.subscribers.lock();
		subs.retain(|tx| tx.unbounded_send(event.clone()).is_ok());
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use futures::StreamExt;

	#[tokio::test]
	async fn subscribers_see_events_in_commit_order() {
		let hub = NotificationHub::<u32>::new();
		let mut rx = hub.subscribe();
		hub.notify(1);
		hub.notify(2);
		hub.notify(3);
		assert_eq!(rx.next().await, Some(1));
		assert_eq!(rx.next().await, Some(2));
		assert_eq!(rx.next().await, Some(3));
	}

	#[tokio::test]
	async fn dropped_subscriber_does_not_block_notify() {
		let hub = NotificationHub::<u32>::new();
		{
			let _rx = hub.subscribe();
		}
		hub.notify(1);
		let mut rx2 = hub.subscribe();
		hub.notify(2);
		assert_eq!(rx2.next().await, Some(2));
	}
}
