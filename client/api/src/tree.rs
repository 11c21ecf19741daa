//! The append-only block tree: every imported-but-not-yet-pruned block, its parent/child
//! links, and the fork-choice rule used to pick the best leaf.

use std::collections::{HashMap, HashSet};

use sp_runtime::{BlockNumber, Hash, Header};

/// A node in the block tree. `weight` accumulates the primary-slot contribution of every
/// block from genesis to this one, and is the quantity fork choice maximises.
#[derive(Clone, Debug)]
pub struct TreeNode {
	pub header: Header,
	pub weight: u128,
}

/// The set of all imported blocks not yet pruned, plus a fast-access leaf set.
#[derive(Default)]
pub struct BlockTree {
	nodes: HashMap<Hash, TreeNode>,
	children: HashMap<Hash, Vec<Hash>>,
	leaves: HashSet<Hash>,
}

impl BlockTree {
	pub fn new() -> Self {
		BlockTree::default()
	}

	pub fn insert_genesis(&mut self, header: Header) {
		let hash = header.hash();
		self.nodes.insert(hash, TreeNode { header, weight: 0 });
		self.leaves.insert(hash);
	}

	/// Insert a new block whose parent is already known. `weight_contribution` is added to
	/// the parent's accumulated weight to produce this block's weight (0 for a secondary-slot
	/// block, 1 for a primary-slot block, matching the "sum of primary-slot contributions"
	/// fork-choice rule).
	pub fn insert(&mut self, header: Header, weight_contribution: u128) -> Option<Hash> {
		let parent_hash = header.parent_hash;
		let parent_weight = self.nodes.get(&parent_hash)?.weight;
		let hash = header.hash();
		self.nodes.insert(hash, TreeNode { header, weight: parent_weight + weight_contribution });
		self.children.entry(parent_hash).or_default().push(hash);
		self.leaves.remove(&parent_hash);
		self.leaves.insert(hash);
		Some(hash)
	}

	pub fn contains(&self, hash: &Hash) -> bool {
		self.nodes.contains_key(hash)
	}

	pub fn header(&self, hash: &Hash) -> Option<&Header> {
		self.nodes.get(hash).map(|n| &n.header)
	}

	pub fn weight(&self, hash: &Hash) -> Option<u128> {
		self.nodes.get(hash).map(|n| n.weight)
	}

	pub fn leaves(&self) -> impl Iterator<Item = &Hash> {
		self.leaves.iter()
	}

	/// GHOST-like fork choice: maximum accumulated weight; ties broken by block number, then
	/// by lexicographically greatest hash.
	pub fn best_leaf(&self) -> Option<Hash> {
		self.leaves
			.iter()
			.map(|h| {
				let node = &self.nodes[h];
				(node.weight, node.header.number, *h)
			})
			.max_by(|a, b| a.cmp(b))
			.map(|(_, _, h)| h)
	}

	/// Is `maybe_ancestor` an ancestor of (or equal to) `descendant`?
	pub fn is_ancestor(&self, maybe_ancestor: &Hash, descendant: &Hash) -> bool {
		let mut cursor = *descendant;
		loop {
			if cursor == *maybe_ancestor {
				return true;
			}
			match self.nodes.get(&cursor) {
				Some(node) if node.header.number > 0 => cursor = node.header.parent_hash,
				_ => return false,
			}
		}
	}

	/// Remove every block that does not descend from `root`, keeping `root` itself. Used
	/// after finalization to bound memory: branches that can never be finalized (they forked
	/// off before the new finalized block) are dropped.
	pub fn prune_to_descendants_of(&mut self, root: Hash) {
		let keep: HashSet<Hash> =
			self.nodes.keys().filter(|h| self.is_ancestor(&root, h)).copied().collect();
		self.nodes.retain(|h, _| keep.contains(h));
		self.children.retain(|h, _| keep.contains(h));
		for children in self.children.values_mut() {
			children.retain(|c| keep.contains(c));
		}
		self.leaves.retain(|h| keep.contains(h));
	}

	pub fn number(&self, hash: &Hash) -> Option<BlockNumber> {
		self.nodes.get(hash).map(|n| n.header.number)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use sp_runtime::Digest;

	fn header(number: BlockNumber, parent: Hash, salt: u8) -> Header {
		Header::new(number, [salt; 32], [0; 32], parent, Digest::default())
	}

	#[test]
	fn fork_choice_prefers_higher_weight() {
		let mut tree = BlockTree::new();
		let genesis = header(0, [0; 32], 0);
		let genesis_hash = genesis.hash();
		tree.insert_genesis(genesis);

		let a = header(1, genesis_hash, 1);
		let a_hash = tree.insert(a, 1).unwrap();
		let b = header(1, genesis_hash, 2);
		let _b_hash = tree.insert(b, 0).unwrap();

		assert_eq!(tree.best_leaf(), Some(a_hash));
	}

	#[test]
	fn prune_drops_non_descendant_branches() {
		let mut tree = BlockTree::new();
		let genesis = header(0, [0; 32], 0);
		let genesis_hash = genesis.hash();
		tree.insert_genesis(genesis);

		let a = header(1, genesis_hash, 1);
		let a_hash = tree.insert(a, 1).unwrap();
		let b = header(1, genesis_hash, 2);
		let b_hash = tree.insert(b, 1).unwrap();

		tree.prune_to_descendants_of(a_hash);
		assert!(tree.contains(&a_hash));
		assert!(!tree.contains(&b_hash));
	}
}
