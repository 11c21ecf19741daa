//! The BABE authoring loop: the [`SlotWorker`] that turns a precomputed slot claim into a
//! sealed block and feeds it back through the same [`BlockImportPipeline`] network-sourced
//! blocks go through.

use std::sync::Arc;

use codec::{Decode, Encode};
use parking_lot::Mutex;
use schnorrkel::Keypair;
use sc_client_api::Backend;
use sc_consensus::{AuthoritySetChangeSink, BlockImportPipeline, EpochChangeSink};
use sc_consensus_epochs::EpochChanges;
use sc_consensus_slots::{SlotInfo, SlotWorker};
use sc_executor::{entry_points, CodeExecutor};
use sp_consensus::BlockOrigin;
use sp_consensus_babe::AuthorityIndex;
use sp_runtime::{Digest, DigestItem, Header, OpaqueExtrinsic, BABE_ENGINE_ID};

use crate::epoch_handler::EpochHandler;

/// Supplies the extrinsics a freshly authored block should include. A full transaction pool
/// with a requires/provides tag graph is out of scope here; this trait is the seam a richer
/// pool would plug into without changing anything in this crate.
pub trait ExtrinsicSource: Send + Sync {
	fn ready_extrinsics(&self, max: usize) -> Vec<OpaqueExtrinsic>;
}

/// An `ExtrinsicSource` that never has anything ready, for chains authoring empty blocks.
pub struct NoExtrinsics;

impl ExtrinsicSource for NoExtrinsics {
	fn ready_extrinsics(&self, _max: usize) -> Vec<OpaqueExtrinsic> {
		Vec::new()
	}
}

const MAX_EXTRINSICS_PER_BLOCK: usize = 512;

/// Drives BABE authoring: on every slot this node has a precomputed claim for, builds a block
/// on top of the current best chain and imports it as [`BlockOrigin::Own`].
pub struct BabeWorker<E, G> {
	pipeline: Arc<BlockImportPipeline<E, G>>,
	backend: Arc<dyn Backend>,
	executor: Arc<CodeExecutor>,
	epochs: Arc<EpochChanges>,
	extrinsics: Arc<dyn ExtrinsicSource>,
	keypair: Arc<Keypair>,
	authority_index: AuthorityIndex,
	current_epoch: Mutex<Option<EpochHandler>>,
}

impl<E, G> BabeWorker<E, G>
where
	E: EpochChangeSink,
	G: AuthoritySetChangeSink,
{
	pub fn new(
		pipeline: Arc<BlockImportPipeline<E, G>>,
		backend: Arc<dyn Backend>,
		executor: Arc<CodeExecutor>,
		epochs: Arc<EpochChanges>,
		extrinsics: Arc<dyn ExtrinsicSource>,
		keypair: Arc<Keypair>,
		authority_index: AuthorityIndex,
	) -> Self {
		BabeWorker {
			pipeline,
			backend,
			executor,
			epochs,
			extrinsics,
			keypair,
			authority_index,
			current_epoch: Mutex::new(None),
		}
	}

	/// Build and seal a block claiming `slot` on top of `parent`, applying as many of
	/// `extrinsics` as the runtime accepts.
	fn author_block(&self, parent: &Header, pre_digest: sp_consensus_babe::digests::PreDigest) -> Option<(Header, Vec<OpaqueExtrinsic>)> {
		let parent_hash = parent.hash();
		let code = self.backend.code_at(parent_hash).ok()?;
		let state = self.backend.state_at(parent_hash).ok()?;

		let mut digest = Digest::default();
		digest.push(DigestItem::PreRuntime(BABE_ENGINE_ID, pre_digest.encode()));

		let skeleton = Header::new(parent.number + 1, [0; 32], [0; 32], parent_hash, digest.clone());

		let overlay = state.overlay();
		let (_, overlay) = self
			.executor
			.call(&code, entry_points::CORE_INITIALIZE_BLOCK, &skeleton.encode(), overlay, None)
			.ok()?;

		let candidates = self.extrinsics.ready_extrinsics(MAX_EXTRINSICS_PER_BLOCK);
		let mut included = Vec::new();
		let mut overlay = overlay;
		for extrinsic in candidates {
			let (output, next_overlay) = match self.executor.call(
				&code,
				entry_points::BLOCK_BUILDER_APPLY_EXTRINSIC,
				&extrinsic.encode(),
				overlay,
				None,
			) {
				Ok(result) => result,
				Err(err) => {
					log::warn!(target: "babe", "apply_extrinsic trapped, dropping extrinsic: {err}");
					break;
				},
			};
			overlay = next_overlay;
			match sc_executor::validity::decode_apply_extrinsic_result(&output) {
				Ok(Ok(Ok(()))) => included.push(extrinsic),
				Ok(outcome) => log::debug!(target: "babe", "extrinsic rejected by runtime: {outcome:?}"),
				Err(err) => log::warn!(target: "babe", "malformed apply_extrinsic result: {err}"),
			}
		}

		let (finalized, overlay) = self
			.executor
			.call(&code, entry_points::BLOCK_BUILDER_FINALIZE_BLOCK, &[], overlay, None)
			.ok()?;
		let mut header = Header::decode(&mut &finalized[..]).ok()?;
		header.digest = digest;
		if overlay.root() != header.state_root {
			header.state_root = overlay.root();
		}

		let pre_seal_hash = header.pre_seal_hash(BABE_ENGINE_ID);
		let signature = self.keypair.sign_simple(b"substrate", &pre_seal_hash).to_bytes();
		header.digest.push(DigestItem::Seal(BABE_ENGINE_ID, signature.to_vec()));

		Some((header, included))
	}
}

#[async_trait::async_trait]
impl<E, G> SlotWorker for BabeWorker<E, G>
where
	E: EpochChangeSink + 'static,
	G: AuthoritySetChangeSink + 'static,
{
	async fn on_slot(&mut self, slot_info: SlotInfo) {
		let info = self.backend.info();
		let Some(parent) = self.backend.header(info.best_hash).ok().flatten() else { return };

		{
			let mut current = self.current_epoch.lock();
			let needs_refresh = match current.as_ref() {
				Some(handler) => !handler.epoch().contains_slot(slot_info.slot),
				None => true,
			};
			if needs_refresh {
				let Some(epoch) = self.epochs.epoch_for(self.backend.as_ref(), info.best_hash, slot_info.slot) else {
					log::warn!(target: "babe", "no epoch descriptor covers slot {:?}; skipping", slot_info.slot);
					return;
				};
				*current = Some(EpochHandler::new(epoch, self.authority_index, self.keypair.clone()));
			}
		}

		let pre_digest = {
			let current = self.current_epoch.lock();
			current.as_ref().and_then(|handler| handler.digest_for(slot_info.slot).cloned())
		};
		let Some(pre_digest) = pre_digest else { return };

		let Some((header, body)) = self.author_block(&parent, pre_digest) else {
			log::warn!(target: "babe", "failed to author a block for slot {:?}", slot_info.slot);
			return;
		};

		match self.pipeline.import(header, body, BlockOrigin::Own) {
			Ok(result) => log::info!(target: "babe", "authored block {:?} (best: {})", result.hash, result.is_new_best),
			Err(err) => log::warn!(target: "babe", "failed to import authored block: {err}"),
		}
	}
}
