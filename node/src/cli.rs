//! Command-line surface. Every flag here corresponds 1:1 to a field on
//! [`sc_service::NodeConfig`]; [`Cli::into_config`] is the only place that mapping happens.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use sc_service::NodeConfig;

#[derive(Parser, Debug)]
#[command(name = "node", about = "A standalone BABE/GRANDPA block-producing node")]
pub struct Cli {
	/// Path to the genesis chain spec (raw or human-readable).
	#[arg(long, default_value = "chain-spec.json")]
	pub chain: PathBuf,

	/// Path to a raw 32-byte keystore seed file. Omit to run sync-only, with no authoring or
	/// voting keys.
	#[arg(long)]
	pub key: Option<PathBuf>,

	/// p2p listen port. Accepted for parity with a networked deployment; this binary has no
	/// networking layer to bind it to.
	#[arg(long, default_value_t = 30333)]
	pub port: u16,

	/// Enable the JSON-RPC server.
	#[arg(long, default_value_t = true)]
	pub rpc: bool,

	/// Bind the JSON-RPC server to all interfaces instead of loopback only.
	#[arg(long)]
	pub rpc_external: bool,

	/// Enable the Prometheus metrics exporter.
	#[arg(long)]
	pub publish_metrics: bool,

	/// Address the metrics exporter listens on.
	#[arg(long, default_value = "127.0.0.1:9615")]
	pub metrics_address: SocketAddr,

	/// Slot duration in seconds BABE claims against.
	#[arg(long, default_value_t = 6)]
	pub slot_duration_secs: u64,

	/// Claim every eligible slot without waiting for this node's ordinary authoring window,
	/// so a single-node development chain advances without waiting out a full epoch rotation.
	#[arg(long)]
	pub babe_lead: bool,

	/// Public DNS name this node advertises to peers. Accepted for parity with a networked
	/// deployment; unused without a networking layer.
	#[arg(long)]
	pub pubdns: Option<String>,
}

impl Cli {
	pub fn into_config(self) -> NodeConfig {
		NodeConfig {
			chain_spec: self.chain,
			key_file: self.key,
			port: self.port,
			rpc_enabled: self.rpc,
			rpc_external: self.rpc_external,
			publish_metrics: self.publish_metrics,
			metrics_address: self.metrics_address,
			slot_duration: Duration::from_secs(self.slot_duration_secs),
			babe_lead: self.babe_lead,
			pubdns: self.pubdns,
		}
	}
}
