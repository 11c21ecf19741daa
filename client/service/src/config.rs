//! Node configuration: everything the CLI binary gathers from flags and hands to
//! [`crate::service::NodeService::new`] in one struct, independent of how those values were
//! sourced.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Assembled configuration for a single running node. Every field here corresponds to a flag
/// named in the node's CLI surface (`--key`, `--chain`, `--port`, `--rpc`, `--rpc-external`,
/// `--publish-metrics`, `--metrics-address`, `--babe-lead`, `--pubdns`).
#[derive(Clone, Debug)]
pub struct NodeConfig {
	/// Path to the genesis chain spec (raw or human-readable; see [`crate::genesis`]).
	pub chain_spec: PathBuf,
	/// Path to a raw keystore seed file. Absent means this node runs without authoring or
	/// voting keys (sync-only).
	pub key_file: Option<PathBuf>,
	/// p2p listen port. Named for completeness; this node has no networking layer (see
	/// `DESIGN.md`), so nothing currently binds it.
	pub port: u16,
	/// Whether the JSON-RPC server is enabled at all.
	pub rpc_enabled: bool,
	/// Bind the RPC server to all interfaces rather than loopback only.
	pub rpc_external: bool,
	/// Whether the Prometheus metrics exporter is enabled.
	pub publish_metrics: bool,
	/// Address the metrics exporter listens on, when enabled.
	pub metrics_address: SocketAddr,
	/// Slot duration BABE claims against.
	pub slot_duration: Duration,
	/// When set, this node claims every slot it is eligible for without waiting for its
	/// ordinary authoring window to open — used to drive a local development chain forward
	/// without waiting out a full epoch's authority rotation.
	pub babe_lead: bool,
	/// Public DNS name this node advertises to peers. Named for completeness; unused without a
	/// networking layer.
	pub pubdns: Option<String>,
}

impl NodeConfig {
	pub fn dev() -> Self {
		NodeConfig {
			chain_spec: PathBuf::from("chain-spec.json"),
			key_file: None,
			port: 30333,
			rpc_enabled: true,
			rpc_external: false,
			publish_metrics: false,
			metrics_address: "127.0.0.1:9615".parse().expect("valid socket address literal"),
			slot_duration: Duration::from_secs(6),
			babe_lead: true,
			pubdns: None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn dev_config_has_a_loopback_metrics_address() {
		assert!(NodeConfig::dev().metrics_address.ip().is_loopback());
	}
}
