//! Minimal Prometheus metrics surface, enabled by `--publish-metrics`. Just enough for an
//! operator to see the node is alive and making progress; real dashboards would want far more,
//! but the registry is the seam they'd hang off of.

use std::net::SocketAddr;
use std::sync::Arc;

use prometheus::{Encoder, Gauge, Registry, TextEncoder};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::ServiceError;

pub struct Metrics {
	pub registry: Registry,
	pub best_block_number: Gauge,
	pub finalized_block_number: Gauge,
}

impl Metrics {
	pub fn new() -> Result<Self, ServiceError> {
		let registry = Registry::new();
		let best_block_number = Gauge::new("node_best_block_number", "Height of the best known block")
			.map_err(|e| ServiceError::Metrics(e.to_string()))?;
		let finalized_block_number =
			Gauge::new("node_finalized_block_number", "Height of the last finalized block")
				.map_err(|e| ServiceError::Metrics(e.to_string()))?;

		registry
			.register(Box::new(best_block_number.clone()))
			.map_err(|e| ServiceError::Metrics(e.to_string()))?;
		registry
			.register(Box::new(finalized_block_number.clone()))
			.map_err(|e| ServiceError::Metrics(e.to_string()))?;

		Ok(Metrics { registry, best_block_number, finalized_block_number })
	}

	pub fn note_best_block(&self, number: u64) {
		self.best_block_number.set(number as f64);
	}

	pub fn note_finalized_block(&self, number: u64) {
		self.finalized_block_number.set(number as f64);
	}
}

/// Serves the registry in Prometheus text format over plain HTTP on `addr`. Every request, no
/// matter the path or method, gets the same scrape response — there is exactly one thing to
/// expose here, so there is no router to speak of.
pub async fn serve(metrics: Arc<Metrics>, addr: SocketAddr) -> Result<(), ServiceError> {
	let listener = TcpListener::bind(addr).await.map_err(|e| ServiceError::Metrics(e.to_string()))?;

	loop {
		let (mut socket, _) = match listener.accept().await {
			Ok(pair) => pair,
			Err(_) => continue,
		};
		let metrics = metrics.clone();

		tokio::spawn(async move {
			let mut buf = [0u8; 1024];
			// We only need to know a request arrived, not parse it: drain whatever the client
			// sent before writing the response so the kernel doesn't see an unread-then-closed
			// socket as a reset.
			let _ = socket.read(&mut buf).await;

			let encoder = TextEncoder::new();
			let families = metrics.registry.gather();
			let mut body = Vec::new();
			if encoder.encode(&families, &mut body).is_err() {
				return;
			}

			let response = format!(
				"HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
				encoder.format_type(),
				body.len(),
			);
			let _ = socket.write_all(response.as_bytes()).await;
			let _ = socket.write_all(&body).await;
			let _ = socket.shutdown().await;
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn gauges_reflect_the_latest_observation() {
		let metrics = Metrics::new().unwrap();
		metrics.note_best_block(42);
		metrics.note_finalized_block(40);
		assert_eq!(metrics.best_block_number.get(), 42.0);
		assert_eq!(metrics.finalized_block_number.get(), 40.0);
	}

	#[test]
	fn gauges_are_registered_and_gatherable() {
		let metrics = Metrics::new().unwrap();
		metrics.note_best_block(7);
		let families = metrics.registry.gather();
		assert!(families.iter().any(|f| f.get_name() == "node_best_block_number"));
	}
}
