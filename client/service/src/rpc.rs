//! The JSON-RPC surface: a `chain` namespace for querying headers and finality, and a `system`
//! namespace for basic node health, served over `jsonrpsee`.
//!
//! There is no transaction-submission RPC here — this node has no transaction pool (see
//! [`sc_consensus_babe::ExtrinsicSource`]'s own module docs), so there is nothing for an
//! `author_submitExtrinsic`-style method to feed.

use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{ServerBuilder, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use sc_client_api::Backend;
use sp_blockchain::HeaderBackend;
use sp_runtime::Hash;

use crate::config::NodeConfig;
use crate::ServiceError;

/// Default port the RPC server listens on, matching the port the wider Substrate ecosystem
/// defaults to; this node's CLI surface has no dedicated `--rpc-port` flag (see `DESIGN.md`).
const DEFAULT_RPC_PORT: u16 = 9944;

#[rpc(server, namespace = "chain")]
pub trait ChainApi {
	/// The hex-encoded hash of the most recently finalized block.
	#[method(name = "getFinalizedHead")]
	fn finalized_head(&self) -> RpcResult<String>;

	/// The SCALE-encoded header at `hash`, or the best block's header if `hash` is omitted.
	#[method(name = "getHeader")]
	fn header(&self, hash: Option<String>) -> RpcResult<Option<String>>;

	/// The best known block number.
	#[method(name = "getBestNumber")]
	fn best_number(&self) -> RpcResult<u64>;
}

#[rpc(server, namespace = "system")]
pub trait SystemApi {
	#[method(name = "health")]
	fn health(&self) -> RpcResult<SystemHealth>;
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct SystemHealth {
	pub peers: usize,
	pub is_syncing: bool,
	pub should_have_peers: bool,
}

/// Implements both RPC namespaces over a shared backend handle. Cloning is cheap: the only
/// field is an `Arc`.
#[derive(Clone)]
pub struct RpcHandlers {
	backend: Arc<dyn Backend>,
}

impl RpcHandlers {
	pub fn new(backend: Arc<dyn Backend>) -> Self {
		RpcHandlers { backend }
	}
}

fn decode_hash(hex_hash: &str) -> Result<Hash, ErrorObjectOwned> {
	let bytes = hex::decode(hex_hash.trim_start_matches("0x"))
		.map_err(|e| ErrorObjectOwned::owned(-32602, format!("invalid hash: {e}"), None::<()>))?;
	bytes
		.try_into()
		.map_err(|_| ErrorObjectOwned::owned(-32602, "hash must be 32 bytes", None::<()>))
}

fn internal_error(err: impl std::fmt::Display) -> ErrorObjectOwned {
	ErrorObjectOwned::owned(-32603, err.to_string(), None::<()>)
}

impl ChainApiServer for RpcHandlers {
	fn finalized_head(&self) -> RpcResult<String> {
		Ok(format!("0x{}", hex::encode(self.backend.info().finalized_hash)))
	}

	fn header(&self, hash: Option<String>) -> RpcResult<Option<String>> {
		let target = match hash {
			Some(raw) => decode_hash(&raw)?,
			None => self.backend.info().best_hash,
		};
		let header = self.backend.header(target).map_err(internal_error)?;
		Ok(header.map(|h| format!("0x{}", hex::encode(codec::Encode::encode(&h)))))
	}

	fn best_number(&self) -> RpcResult<u64> {
		Ok(self.backend.info().best_number)
	}
}

impl SystemApiServer for RpcHandlers {
	fn health(&self) -> RpcResult<SystemHealth> {
		// `peers` is always 0: this node has no networking layer (see the purpose-and-scope
		// non-goals), so there is never anyone to be syncing with or to have as a peer.
		Ok(SystemHealth { peers: 0, is_syncing: false, should_have_peers: false })
	}
}

/// Starts the RPC server, bound to loopback unless `config.rpc_external` is set. Returns the
/// handle the caller keeps alive for as long as the server should keep running; dropping it (or
/// calling `.stop()`) shuts the server down.
pub async fn start(config: &NodeConfig, backend: Arc<dyn Backend>) -> Result<ServerHandle, ServiceError> {
	let host = if config.rpc_external { "0.0.0.0" } else { "127.0.0.1" };
	let addr: SocketAddr = format!("{host}:{DEFAULT_RPC_PORT}").parse().expect("constant host/port always parse");

	let server = ServerBuilder::new().build(addr).await.map_err(|e| ServiceError::Rpc(e.to_string()))?;

	let handlers = RpcHandlers::new(backend);
	let mut module = ChainApiServer::into_rpc(handlers.clone());
	module
		.merge(SystemApiServer::into_rpc(handlers))
		.map_err(|e| ServiceError::Rpc(e.to_string()))?;

	Ok(server.start(module))
}
