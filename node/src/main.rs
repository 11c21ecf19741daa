//! Entry point: parse flags, assemble a [`sc_service::NodeService`], start its background
//! tasks and (if enabled) its RPC server, then run until `Ctrl-C`.

mod cli;

use std::sync::Arc;

use clap::Parser;
use sc_client_api::Backend;
use sc_service::{rpc, NodeService};

use cli::Cli;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
	sc_service::init_logging();

	let config = Cli::parse().into_config();

	let service = match NodeService::new(config.clone()) {
		Ok(service) => service,
		Err(e) => {
			tracing::error!(error = %e, "failed to assemble node");
			std::process::exit(1);
		}
	};

	tracing::info!(
		chain_spec = %config.chain_spec.display(),
		sync_only = config.key_file.is_none(),
		"starting node"
	);

	let handles = service.spawn();

	let rpc_handle = if config.rpc_enabled {
		let backend = service.backend() as Arc<dyn Backend>;
		match rpc::start(&config, backend).await {
			Ok(handle) => Some(handle),
			Err(e) => {
				tracing::error!(error = %e, "failed to start rpc server");
				std::process::exit(1);
			}
		}
	} else {
		None
	};

	if tokio::signal::ctrl_c().await.is_err() {
		tracing::error!("failed to install ctrl-c handler, shutting down immediately");
	}

	tracing::info!("shutting down");
	service.stop_grandpa();
	if let Some(handle) = rpc_handle {
		let _ = handle.stop();
	}
	for handle in handles {
		handle.abort();
	}
}
