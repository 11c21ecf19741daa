//! NS: assembles one running node out of every other crate in this workspace — the backend, the
//! executor, the offchain pool, the import pipeline, BABE and GRANDPA — and exposes the surfaces
//! a CLI binary drives: configuration, genesis loading, keystore management, metrics, logging,
//! and JSON-RPC.
//!
//! Nothing in [`service`] runs until [`service::NodeService::new`] assembles it; this crate is
//! the seam between the library crates under `client/` and `primitives/` and the `node` binary.

pub mod config;
pub mod genesis;
pub mod keystore;
pub mod metrics;
pub mod rpc;
pub mod service;
pub mod telemetry;

pub use config::NodeConfig;
pub use keystore::NodeKeystore;
pub use metrics::Metrics;
pub use service::NodeService;
pub use telemetry::init_logging;

/// Failures raised assembling or running a node, distinct from [`sp_blockchain::Error`]: these
/// are failures in the shell around the chain (a bad chain-spec path, an unreadable key file, a
/// port already in use), not failures in chain state itself.
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
	#[error("failed to load genesis chain spec: {0}")]
	GenesisLoad(String),
	#[error("failed to load keystore: {0}")]
	KeystoreLoad(String),
	#[error("failed to initialize metrics: {0}")]
	Metrics(String),
	#[error("rpc server error: {0}")]
	Rpc(String),
	#[error(transparent)]
	Client(#[from] sp_blockchain::Error),
}
