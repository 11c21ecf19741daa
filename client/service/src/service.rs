//! [`NodeService`]: owns one instance of every other component in this workspace and starts the
//! BABE authoring loop and the GRANDPA voter loop on the async runtime.
//!
//! Construction (`new`) never spawns anything — it only wires state together, so a caller can
//! inspect a freshly constructed service (e.g. in a test) without any background task running
//! yet. `spawn` starts the long-running tasks and returns their handles; the caller decides how
//! long to keep them alive.

use std::sync::Arc;

use futures::channel::oneshot;
use futures::StreamExt;
use sc_client_api::{Backend, InMemoryBackend};
use sc_consensus::BlockImportPipeline;
use sc_consensus_babe::{BabeEpochSink, BabeVerifier, BabeWorker, EquivocationTracker, NoExtrinsics};
use sc_consensus_epochs::EpochChanges;
use sc_consensus_grandpa::{GrandpaAuthoritySet, GrandpaJustificationVerifier, GrandpaVoter, LocalVoter};
use sc_executor::CodeExecutor;
use sp_blockchain::HeaderBackend;
use sp_consensus::Slot;
use sp_consensus_babe::{AllowedSlots, BabeEpochConfiguration, Epoch};
use tokio::task::JoinHandle;

use crate::config::NodeConfig;
use crate::genesis::load_genesis;
use crate::keystore::NodeKeystore;
use crate::metrics::Metrics;
use crate::ServiceError;

/// Slots per BABE epoch. Arbitrary but fixed: this node has no governance surface to change it
/// at runtime, unlike a real chain's `EpochDuration` constant.
const EPOCH_DURATION_SLOTS: u64 = 200;

type Pipeline = BlockImportPipeline<BabeEpochSink, Arc<GrandpaAuthoritySet>>;

/// One running node: the backend, executor, offchain pool, import pipeline, and (if a keystore
/// was loaded) the BABE and GRANDPA identities this node authors and votes with.
pub struct NodeService {
	config: NodeConfig,
	backend: Arc<InMemoryBackend>,
	executor: Arc<CodeExecutor>,
	offchain: Arc<sc_offchain::OffchainPool>,
	epochs: Arc<EpochChanges>,
	authorities: Arc<GrandpaAuthoritySet>,
	pipeline: Arc<Pipeline>,
	metrics: Option<Arc<Metrics>>,
	babe_identity: Option<(Arc<schnorrkel::Keypair>, sp_consensus_babe::AuthorityIndex)>,
	grandpa_identity: parking_lot::Mutex<Option<LocalVoter>>,
	grandpa_cancel: parking_lot::Mutex<Option<oneshot::Sender<()>>>,
}

impl NodeService {
	/// Load the genesis chain spec, build the backend from it, and wire the consensus and
	/// execution stack together. A missing `--key` file leaves this node sync-only: it still
	/// verifies and imports blocks but authors and votes for none.
	pub fn new(config: NodeConfig) -> Result<Self, ServiceError> {
		let (state, code, genesis_header) = load_genesis(&config.chain_spec)?;
		let genesis_hash = genesis_header.hash();
		let backend = InMemoryBackend::new(genesis_header, state, code);

		let keystore = match &config.key_file {
			Some(path) => Some(NodeKeystore::load(path)?),
			None => None,
		};

		// A single-authority development chain derives its genesis voter/authority lists from
		// whichever identity it was started with, rather than from a session-management pallet
		// this node does not implement (see `DESIGN.md`).
		let babe_authorities =
			keystore.as_ref().map(|ks| vec![(ks.babe_authority_id(), 1)]).unwrap_or_default();
		let grandpa_authorities =
			keystore.as_ref().map(|ks| vec![(ks.grandpa_authority_id(), 1)]).unwrap_or_default();

		let genesis_epoch = Epoch {
			epoch_index: 0,
			start_slot: Slot(0),
			duration: EPOCH_DURATION_SLOTS,
			authorities: babe_authorities,
			randomness: [0; 32],
			config: BabeEpochConfiguration { c: (1, 4), allowed_slots: AllowedSlots::PrimaryOnly },
		};

		let epochs = Arc::new(EpochChanges::new());
		let epoch_sink = BabeEpochSink::new(epochs.clone(), genesis_hash, genesis_epoch);
		let authorities = Arc::new(GrandpaAuthoritySet::new(grandpa_authorities));
		let digests = sc_consensus::DigestHandler::new(epoch_sink, authorities.clone());

		let header_backend: Arc<dyn HeaderBackend> = backend.clone();
		let equivocations = Arc::new(EquivocationTracker::new());
		let verifier = Arc::new(
			BabeVerifier::new(header_backend, epochs.clone()).with_equivocation_tracker(equivocations),
		);
		let justifications = Arc::new(GrandpaJustificationVerifier::new(authorities.clone()));
		let executor = Arc::new(CodeExecutor::new());

		let backend_dyn: Arc<dyn Backend> = backend.clone();
		let pipeline =
			Arc::new(BlockImportPipeline::new(backend_dyn, executor.clone(), verifier, justifications, digests));

		let offchain = Arc::new(sc_offchain::OffchainPool::new());
		let metrics = if config.publish_metrics { Some(Arc::new(Metrics::new()?)) } else { None };

		let babe_identity = keystore.as_ref().map(|ks| (Arc::new(clone_babe_keypair(&ks.babe)), 0u32));
		let grandpa_identity =
			parking_lot::Mutex::new(keystore.map(|ks| LocalVoter { id: ks.grandpa_authority_id(), signing_key: ks.grandpa }));

		Ok(NodeService {
			config,
			backend,
			executor,
			offchain,
			epochs,
			authorities,
			pipeline,
			metrics,
			babe_identity,
			grandpa_identity,
			grandpa_cancel: parking_lot::Mutex::new(None),
		})
	}

	pub fn backend(&self) -> Arc<InMemoryBackend> {
		self.backend.clone()
	}

	pub fn metrics(&self) -> Option<Arc<Metrics>> {
		self.metrics.clone()
	}

	/// The offchain HTTP request pool backing this node's runtime calls. Exposed so a richer
	/// `ExtrinsicSource`/host wiring can share the same pool `sc-executor` is handed at call
	/// time (see `sc-offchain`'s own module docs on its process-wide lifecycle).
	pub fn offchain(&self) -> Arc<sc_offchain::OffchainPool> {
		self.offchain.clone()
	}

	/// Starts every long-running task this node needs: the BABE authoring loop and the GRANDPA
	/// voter loop (both only if a keystore was loaded), plus a small observer task that keeps
	/// the metrics gauges in step with the backend's own notifications. Returns their handles;
	/// dropping or aborting them stops the corresponding task.
	pub fn spawn(&self) -> Vec<JoinHandle<()>> {
		let mut handles = Vec::new();

		if let Some((keypair, authority_index)) = self.babe_identity.clone() {
			let worker = BabeWorker::new(
				self.pipeline.clone(),
				self.backend.clone() as Arc<dyn Backend>,
				self.executor.clone(),
				self.epochs.clone(),
				Arc::new(NoExtrinsics),
				keypair,
				authority_index,
			);
			let slot_duration = self.config.slot_duration;
			handles.push(tokio::spawn(async move {
				sc_consensus_slots::run_slots(worker, slot_duration).await;
			}));
		}

		if let Some(local) = self.grandpa_identity.lock().take() {
			let voter = Arc::new(GrandpaVoter::new(
				self.backend.clone() as Arc<dyn Backend>,
				self.pipeline.clone(),
				self.authorities.clone(),
				local,
			));
			let (tx, rx) = oneshot::channel();
			*self.grandpa_cancel.lock() = Some(tx);
			handles.push(tokio::spawn(async move {
				voter.run(rx).await;
			}));
		}

		// Two small observer tasks rather than one multiplexed over both streams: the backend's
		// import and finality notifications are independent, and `sc-consensus-grandpa::voter`'s
		// own precedent (see its module docs) is to drive one notification stream per task
		// rather than reach for `select!`'s fused-future requirements.
		if let Some(metrics) = self.metrics.clone() {
			let backend = self.backend.clone() as Arc<dyn Backend>;
			handles.push(tokio::spawn(async move {
				let mut imports = backend.import_notifications();
				while let Some(notification) = imports.next().await {
					if notification.is_new_best {
						metrics.note_best_block(notification.number);
					}
				}
			}));
		}

		if let Some(metrics) = self.metrics.clone() {
			let backend = self.backend.clone() as Arc<dyn Backend>;
			handles.push(tokio::spawn(async move {
				let mut finality = backend.finality_notifications();
				while let Some(notification) = finality.next().await {
					metrics.note_finalized_block(notification.number);
				}
			}));
		}

		if let Some(metrics) = self.metrics.clone() {
			let addr = self.config.metrics_address;
			handles.push(tokio::spawn(async move {
				if let Err(e) = crate::metrics::serve(metrics, addr).await {
					tracing::error!(error = %e, "metrics exporter stopped");
				}
			}));
		}

		handles
	}

	/// Signal the GRANDPA voter (if running) to stop after finishing whatever round is in
	/// flight. A no-op if no voter was spawned, or if it was already signalled.
	pub fn stop_grandpa(&self) {
		if let Some(tx) = self.grandpa_cancel.lock().take() {
			let _ = tx.send(());
		}
	}
}

fn clone_babe_keypair(keypair: &schnorrkel::Keypair) -> schnorrkel::Keypair {
	schnorrkel::Keypair::from_bytes(&keypair.to_bytes()).expect("a keypair's own byte encoding always decodes")
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::genesis::create_genesis_with_runtime;

	fn write_chain_spec(dir: &std::path::Path) -> std::path::PathBuf {
		let spec = create_genesis_with_runtime("dev", "dev-1", vec![1, 2, 3]);
		let path = dir.join("chain-spec.json");
		std::fs::write(&path, serde_json::to_string(&spec).unwrap()).unwrap();
		path
	}

	#[test]
	fn constructs_sync_only_without_a_key_file() {
		let dir = std::env::temp_dir().join(format!("sc-service-test-{:?}", std::thread::current().id()));
		std::fs::create_dir_all(&dir).unwrap();
		let chain_spec = write_chain_spec(&dir);

		let config = NodeConfig { chain_spec, key_file: None, ..NodeConfig::dev() };
		let service = NodeService::new(config).unwrap();

		assert!(service.babe_identity.is_none());
		assert!(service.grandpa_identity.lock().is_none());
		assert_eq!(service.backend().info().best_number, 0);

		std::fs::remove_file(&dir.join("chain-spec.json")).ok();
	}

	#[test]
	fn constructs_an_authoring_node_with_a_key_file() {
		let dir = std::env::temp_dir().join(format!("sc-service-test-keyed-{:?}", std::thread::current().id()));
		std::fs::create_dir_all(&dir).unwrap();
		let chain_spec = write_chain_spec(&dir);
		let key_path = dir.join("key");
		std::fs::write(&key_path, [9u8; 32]).unwrap();

		let config = NodeConfig { chain_spec, key_file: Some(key_path.clone()), ..NodeConfig::dev() };
		let service = NodeService::new(config).unwrap();

		assert!(service.babe_identity.is_some());
		assert!(service.grandpa_identity.lock().is_some());

		std::fs::remove_file(&dir.join("chain-spec.json")).ok();
		std::fs::remove_file(&key_path).ok();
	}
}
