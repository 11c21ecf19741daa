//! Caches compiled runtimes keyed by code hash.
//!
//! Compiling a WASM module is the expensive part of handling a runtime call; instantiating it
//! against a particular overlay is comparatively cheap and must happen fresh per call anyway,
//! since each call's overlay and offchain handle are exclusive to the invoking task (see
//! `sc-client-api`'s trie overlay docs). So "pooled per code-hash" here means the compiled
//! module is cached, not that instances are checked out and returned.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use sc_client_api::TrieOverlay;
use sc_offchain::OffchainExt;
use sp_runtime::{blake2_256, Hash};

use crate::wasm::CompiledRuntime;
use crate::ExecutorError;

pub struct CodeExecutor {
	cache: Mutex<HashMap<Hash, Arc<CompiledRuntime>>>,
}

impl CodeExecutor {
	pub fn new() -> Self {
		CodeExecutor { cache: Mutex::new(HashMap::new()) }
	}

	/// Resolve (compiling and caching on first use) the runtime for `code`, then invoke
	/// `method` against `overlay`.
	pub fn call(
		&self,
		code: &[u8],
		method: &str,
		input: &[u8],
		overlay: TrieOverlay,
		offchain: Option<Arc<dyn OffchainExt>>,
	) -> Result<(Vec<u8>, TrieOverlay), ExecutorError> {
		let runtime = self.runtime_for(code)?;
		runtime.call(method, input, overlay, offchain)
	}

	fn runtime_for(&self, code: &[u8]) -> Result<Arc<CompiledRuntime>, ExecutorError> {
		let hash = blake2_256(code);
		if let Some(runtime) = self.cache.lock().get(&hash) {
			return Ok(runtime.clone());
		}
		let runtime = Arc::new(CompiledRuntime::compile(code)?);
		self.cache.lock().insert(hash, runtime.clone());
		Ok(runtime)
	}
}

impl Default for CodeExecutor {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn new_executor_starts_with_an_empty_cache() {
		let executor = CodeExecutor::new();
		assert!(executor.cache.lock().is_empty());
	}
}
