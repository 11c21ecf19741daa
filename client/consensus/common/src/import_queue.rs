//! The block-import pipeline: the only path through which a block becomes part of this node's
//! canonical history.
//!
//! `import` drives verification, execution and commit in a fixed order: reject unknown parents
//! (queueing network-sourced ones), check the header shape, verify the engine-specific digest
//! and seal, execute the block against a trie overlay, and only then commit it to storage and
//! hand its digests to the [`DigestHandler`].

use std::sync::Arc;

use sc_client_api::Backend;
use sc_executor::{entry_points, CodeExecutor};
use sp_blockchain::{Error as ClientError, FinalityFailure, VerificationFailure};
use sp_consensus::BlockOrigin;
use sp_runtime::{Block, EncodedJustification, Hash, Header, OpaqueExtrinsic};

use crate::digest_handler::{AuthoritySetChangeSink, DigestHandler, EpochChangeSink};
use crate::orphan::{OrphanQueue, PendingBlock};
use crate::verifier::{JustificationVerifier, Verifier};

const ORPHAN_QUEUE_CAPACITY: usize = 256;

#[derive(thiserror::Error, Debug)]
pub enum ImportError {
	#[error("verification failed ({0})")]
	VerifyFailed(VerificationFailure),
	#[error(transparent)]
	Client(#[from] ClientError),
	#[error("parent {0:?} unknown; block queued")]
	Queued(Hash),
	#[error("orphan queue overflowed; dropped oldest pending block {0:?}")]
	OrphanDropped(Hash),
	#[error("block execution failed: {0}")]
	ExecutionFailed(String),
	#[error("finality rejected ({0})")]
	FinalityRejected(FinalityFailure),
}

pub struct ImportResult {
	pub hash: Hash,
	pub is_new_best: bool,
}

/// Drives blocks from `import`/`finalize` calls through to committed chain state. One instance
/// per running node; `sc-service` wires it to the network collaborator's inbound block stream
/// and to `sc-consensus-babe`'s authoring loop.
pub struct BlockImportPipeline<E, G> {
	backend: Arc<dyn Backend>,
	executor: Arc<CodeExecutor>,
	verifier: Arc<dyn Verifier>,
	justifications: Arc<dyn JustificationVerifier>,
	digests: DigestHandler<E, G>,
	orphans: parking_lot::Mutex<OrphanQueue>,
}

impl<E, G> BlockImportPipeline<E, G>
where
	E: EpochChangeSink,
	G: AuthoritySetChangeSink,
{
	pub fn new(
		backend: Arc<dyn Backend>,
		executor: Arc<CodeExecutor>,
		verifier: Arc<dyn Verifier>,
		justifications: Arc<dyn JustificationVerifier>,
		digests: DigestHandler<E, G>,
	) -> Self {
		BlockImportPipeline {
			backend,
			executor,
			verifier,
			justifications,
			digests,
			orphans: parking_lot::Mutex::new(OrphanQueue::new(ORPHAN_QUEUE_CAPACITY)),
		}
	}

	/// Import a single block. Network-sourced blocks with an unknown parent are queued rather
	/// than rejected; every other failure mode is returned to the caller.
	pub fn import(&self, header: Header, body: Vec<OpaqueExtrinsic>, origin: BlockOrigin) -> Result<ImportResult, ImportError> {
		let parent_hash = header.parent_hash;
		if self.backend.header(parent_hash)?.is_none() {
			if origin == BlockOrigin::NetworkBroadcast || origin == BlockOrigin::NetworkInitialSync {
				let dropped = self.orphans.lock().push(PendingBlock { header, body, origin });
				if let Some(dropped) = dropped {
					log::warn!(target: "import-queue", "orphan queue full; dropped pending block {dropped:?}");
				}
				return Err(ImportError::Queued(parent_hash));
			}
			return Err(ClientError::UnknownParent(parent_hash).into());
		}

		let result = self.import_with_known_parent(header, body, origin)?;

		// Anything waiting on this block can now proceed.
		let unblocked = self.orphans.lock().take_children_of(result.hash);
		for child in unblocked {
			if let Err(err) = self.import(child.header, child.body, child.origin) {
				log::warn!(target: "import-queue", "requeued orphan failed to import: {err}");
			}
		}

		Ok(result)
	}

	fn import_with_known_parent(&self, header: Header, body: Vec<OpaqueExtrinsic>, _origin: BlockOrigin) -> Result<ImportResult, ImportError> {
		let parent = self
			.backend
			.header(header.parent_hash)?
			.ok_or(ClientError::UnknownParent(header.parent_hash))?;
		if header.number != parent.number + 1 {
			return Err(ImportError::VerifyFailed(VerificationFailure::Header));
		}

		let verified = self
			.verifier
			.verify(&parent, &header, &body)
			.map_err(|e| ImportError::VerifyFailed(e.into()))?;

		let code = self.backend.code_at(header.parent_hash)?;
		let parent_state = self.backend.state_at(header.parent_hash)?;
		let overlay = parent_state.overlay();

		let block = Block::new(header.clone(), body.clone());
		let input = codec::Encode::encode(&block);
		let (_output, executed_overlay) = self
			.executor
			.call(&code, entry_points::CORE_EXECUTE_BLOCK, &input, overlay, None)
			.map_err(|e| ImportError::ExecutionFailed(e.to_string()))?;

		if executed_overlay.root() != header.state_root {
			return Err(ImportError::VerifyFailed(VerificationFailure::StateRoot));
		}
		let new_state = executed_overlay.commit();

		let hash = header.hash();
		let is_new_best = self.backend.commit_block(header.clone(), body, new_state, verified.weight_contribution)?;
		self.digests.handle(&header);

		Ok(ImportResult { hash, is_new_best })
	}

	/// Finalize `hash`. When a justification is supplied it is checked against the authority
	/// set active at `hash` before the finalized pointer advances.
	pub fn finalize(&self, hash: Hash, justification: Option<EncodedJustification>) -> Result<(), ImportError> {
		if let Some(justification) = &justification {
			let header = self.backend.header(hash)?.ok_or(ClientError::UnknownBlock(hash))?;
			self.justifications
				.verify(&header, justification)
				.map_err(ImportError::FinalityRejected)?;
		}
		self.backend.finalize(hash, justification)?;
		Ok(())
	}
}
