//! The bounded queue of blocks whose parent has not arrived yet.
//!
//! Only blocks sourced from the network are queued this way (locally-authored and file-origin
//! blocks always have a known parent by construction). The queue is bounded in total pending
//! blocks; once full, the oldest pending block is dropped to make room, per the pipeline's
//! failure semantics for `UnknownParent`.

use std::collections::{HashMap, VecDeque};

use sp_consensus::BlockOrigin;
use sp_runtime::{Hash, Header, OpaqueExtrinsic};

pub struct PendingBlock {
	pub header: Header,
	pub body: Vec<OpaqueExtrinsic>,
	pub origin: BlockOrigin,
}

/// FIFO-ordered, parent-hash-indexed queue of blocks awaiting their parent.
pub struct OrphanQueue {
	capacity: usize,
	by_parent: HashMap<Hash, Vec<PendingBlock>>,
	arrival_order: VecDeque<Hash>,
	len: usize,
}

impl OrphanQueue {
	pub fn new(capacity: usize) -> Self {
		OrphanQueue { capacity, by_parent: HashMap::new(), arrival_order: VecDeque::new(), len: 0 }
	}

	/// Queue `block` behind its (currently unknown) parent. Returns the hash of a block dropped
	/// to make room, if the queue was already at capacity.
	pub fn push(&mut self, block: PendingBlock) -> Option<Hash> {
		let parent = block.header.parent_hash;
		let dropped = if self.len >= self.capacity { self.drop_oldest() } else { None };
		self.by_parent.entry(parent).or_default().push(block);
		self.arrival_order.push_back(parent);
		self.len += 1;
		dropped
	}

	fn drop_oldest(&mut self) -> Option<Hash> {
		while let Some(parent) = self.arrival_order.pop_front() {
			if let Some(bucket) = self.by_parent.get_mut(&parent) {
				if !bucket.is_empty() {
					let dropped = bucket.remove(0).header.hash();
					if bucket.is_empty() {
						self.by_parent.remove(&parent);
					}
					self.len -= 1;
					return Some(dropped);
				}
			}
		}
		None
	}

	/// Every block that was waiting on `parent`, in arrival order, removed from the queue. Call
	/// this once `parent` is successfully imported so its children can be retried.
	pub fn take_children_of(&mut self, parent: Hash) -> Vec<PendingBlock> {
		let blocks = self.by_parent.remove(&parent).unwrap_or_default();
		self.len -= blocks.len();
		blocks
	}

	pub fn len(&self) -> usize {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use sp_runtime::Digest;

	fn header(number: u64, parent: Hash) -> Header {
		Header::new(number, [number as u8; 32], [0; 32], parent, Digest::default())
	}

	#[test]
	fn drops_oldest_once_over_capacity() {
		let mut queue = OrphanQueue::new(2);
		let a = header(1, [1; 32]);
		let b = header(2, [2; 32]);
		let c = header(3, [3; 32]);
		assert_eq!(queue.push(PendingBlock { header: a.clone(), body: vec![], origin: BlockOrigin::NetworkBroadcast }), None);
		assert_eq!(queue.push(PendingBlock { header: b, body: vec![], origin: BlockOrigin::NetworkBroadcast }), None);
		let dropped = queue.push(PendingBlock { header: c, body: vec![], origin: BlockOrigin::NetworkBroadcast });
		assert_eq!(dropped, Some(a.hash()));
		assert_eq!(queue.len(), 2);
	}

	#[test]
	fn take_children_returns_and_removes_waiting_blocks() {
		let mut queue = OrphanQueue::new(10);
		let parent = [9; 32];
		let child = header(1, parent);
		queue.push(PendingBlock { header: child.clone(), body: vec![], origin: BlockOrigin::NetworkBroadcast });
		let children = queue.take_children_of(parent);
		assert_eq!(children.len(), 1);
		assert_eq!(children[0].header.hash(), child.hash());
		assert!(queue.is_empty());
	}
}
