//! The WASM code executor: compiles a runtime blob, wires up the host function table, and
//! invokes a single entry point against a caller-supplied trie overlay.
//!
//! The ABI mirrors the one real Substrate-family runtimes compile against: every entry point
//! is exported as `(ptr: i32, len: i32) -> i64`, taking its SCALE-encoded argument tuple as a
//! byte slice in guest memory and returning a packed `(ptr, len)` pointing at its SCALE-encoded
//! result, also allocated in guest memory via the imported `ext_allocator_malloc_version_1`.
//! Host calls this crate implements are a representative subset — storage, hashing, the two
//! signature schemes the node's consensus engines use, logging, and the offchain HTTP calls —
//! not the full host-call surface a production runtime would import.

use std::sync::Arc;

use codec::Encode;
use sc_client_api::TrieOverlay;
use sc_offchain::OffchainExt;
use wasmi::{Caller, Engine, Extern, Linker, Memory, Module, Store};

use crate::host::{ed25519_verify, hash_blake2_256, pack_ptr_len, sr25519_verify, unpack_ptr_len, HostState};
use crate::ExecutorError;

const HEAP_BASE_GLOBAL: &str = "__heap_base";

fn read_memory(caller: &Caller<'_, HostState>, memory: Memory, ptr: u32, len: u32) -> Result<Vec<u8>, ExecutorError> {
	let mut buf = vec![0u8; len as usize];
	memory
		.read(caller, ptr as usize, &mut buf)
		.map_err(|_| ExecutorError::MemoryAccess)?;
	Ok(buf)
}

fn write_memory(caller: &mut Caller<'_, HostState>, memory: Memory, ptr: u32, data: &[u8]) -> Result<(), ExecutorError> {
	memory.write(caller, ptr as usize, data).map_err(|_| ExecutorError::MemoryAccess)
}

fn allocate_and_write(caller: &mut Caller<'_, HostState>, memory: Memory, data: &[u8]) -> Result<i64, ExecutorError> {
	let ptr = caller.data_mut().allocator.allocate(data.len() as u32)?;
	write_memory(caller, memory, ptr, data)?;
	Ok(pack_ptr_len(ptr, data.len() as u32))
}

fn memory_of(caller: &mut Caller<'_, HostState>) -> Result<Memory, ExecutorError> {
	match caller.get_export("memory") {
		Some(Extern::Memory(memory)) => Ok(memory),
		_ => Err(ExecutorError::MissingExport("memory".into())),
	}
}

/// Register every host function the runtime may import under the `env` module.
fn link_host_functions(linker: &mut Linker<HostState>) -> Result<(), ExecutorError> {
	linker
		.func_wrap(
			"env",
			"ext_storage_get_version_1",
			|mut caller: Caller<'_, HostState>, key_ptr: u32, key_len: u32| -> Result<i64, wasmi::Error> {
				let memory = memory_of(&mut caller).map_err(to_trap)?;
				let key = read_memory(&caller, memory, key_ptr, key_len).map_err(to_trap)?;
				let value = caller.data().overlay.get(&key);
				let encoded = value.encode();
				allocate_and_write(&mut caller, memory, &encoded).map_err(to_trap)
			},
		)
		.map_err(|_| ExecutorError::LinkFailed("ext_storage_get_version_1"))?;

	linker
		.func_wrap(
			"env",
			"ext_storage_set_version_1",
			|mut caller: Caller<'_, HostState>, key_ptr: u32, key_len: u32, value_ptr: u32, value_len: u32| -> Result<(), wasmi::Error> {
				let memory = memory_of(&mut caller).map_err(to_trap)?;
				let key = read_memory(&caller, memory, key_ptr, key_len).map_err(to_trap)?;
				let value = read_memory(&caller, memory, value_ptr, value_len).map_err(to_trap)?;
				caller.data_mut().overlay.set(key, value);
				Ok(())
			},
		)
		.map_err(|_| ExecutorError::LinkFailed("ext_storage_set_version_1"))?;

	linker
		.func_wrap(
			"env",
			"ext_storage_clear_version_1",
			|mut caller: Caller<'_, HostState>, key_ptr: u32, key_len: u32| -> Result<(), wasmi::Error> {
				let memory = memory_of(&mut caller).map_err(to_trap)?;
				let key = read_memory(&caller, memory, key_ptr, key_len).map_err(to_trap)?;
				caller.data_mut().overlay.remove(&key);
				Ok(())
			},
		)
		.map_err(|_| ExecutorError::LinkFailed("ext_storage_clear_version_1"))?;

	linker
		.func_wrap(
			"env",
			"ext_storage_root_version_1",
			|mut caller: Caller<'_, HostState>| -> Result<i64, wasmi::Error> {
				let memory = memory_of(&mut caller).map_err(to_trap)?;
				let root = caller.data().overlay.root();
				allocate_and_write(&mut caller, memory, &root).map_err(to_trap)
			},
		)
		.map_err(|_| ExecutorError::LinkFailed("ext_storage_root_version_1"))?;

	linker
		.func_wrap(
			"env",
			"ext_hashing_blake2_256_version_1",
			|mut caller: Caller<'_, HostState>, data_ptr: u32, data_len: u32| -> Result<i64, wasmi::Error> {
				let memory = memory_of(&mut caller).map_err(to_trap)?;
				let data = read_memory(&caller, memory, data_ptr, data_len).map_err(to_trap)?;
				let hash = hash_blake2_256(&data);
				allocate_and_write(&mut caller, memory, &hash).map_err(to_trap)
			},
		)
		.map_err(|_| ExecutorError::LinkFailed("ext_hashing_blake2_256_version_1"))?;

	linker
		.func_wrap(
			"env",
			"ext_crypto_sr25519_verify_version_2",
			|mut caller: Caller<'_, HostState>, sig_ptr: u32, msg_ptr: u32, msg_len: u32, key_ptr: u32| -> Result<i32, wasmi::Error> {
				let memory = memory_of(&mut caller).map_err(to_trap)?;
				let signature: [u8; 64] = read_memory(&caller, memory, sig_ptr, 64).map_err(to_trap)?.try_into().unwrap();
				let message = read_memory(&caller, memory, msg_ptr, msg_len).map_err(to_trap)?;
				let public: [u8; 32] = read_memory(&caller, memory, key_ptr, 32).map_err(to_trap)?.try_into().unwrap();
				Ok(sr25519_verify(&signature, &message, &public) as i32)
			},
		)
		.map_err(|_| ExecutorError::LinkFailed("ext_crypto_sr25519_verify_version_2"))?;

	linker
		.func_wrap(
			"env",
			"ext_crypto_ed25519_verify_version_1",
			|mut caller: Caller<'_, HostState>, sig_ptr: u32, msg_ptr: u32, msg_len: u32, key_ptr: u32| -> Result<i32, wasmi::Error> {
				let memory = memory_of(&mut caller).map_err(to_trap)?;
				let signature: [u8; 64] = read_memory(&caller, memory, sig_ptr, 64).map_err(to_trap)?.try_into().unwrap();
				let message = read_memory(&caller, memory, msg_ptr, msg_len).map_err(to_trap)?;
				let public: [u8; 32] = read_memory(&caller, memory, key_ptr, 32).map_err(to_trap)?.try_into().unwrap();
				Ok(ed25519_verify(&signature, &message, &public) as i32)
			},
		)
		.map_err(|_| ExecutorError::LinkFailed("ext_crypto_ed25519_verify_version_1"))?;

	linker
		.func_wrap(
			"env",
			"ext_logging_log_version_1",
			|mut caller: Caller<'_, HostState>, level: u32, target_ptr: u32, target_len: u32, msg_ptr: u32, msg_len: u32| -> Result<(), wasmi::Error> {
				let memory = memory_of(&mut caller).map_err(to_trap)?;
				let target = read_memory(&caller, memory, target_ptr, target_len).map_err(to_trap)?;
				let msg = read_memory(&caller, memory, msg_ptr, msg_len).map_err(to_trap)?;
				let target = String::from_utf8_lossy(&target);
				let msg = String::from_utf8_lossy(&msg);
				match level {
					0 => log::error!(target: "runtime", "{target}: {msg}"),
					1 => log::warn!(target: "runtime", "{target}: {msg}"),
					2 => log::info!(target: "runtime", "{target}: {msg}"),
					3 => log::debug!(target: "runtime", "{target}: {msg}"),
					_ => log::trace!(target: "runtime", "{target}: {msg}"),
				}
				Ok(())
			},
		)
		.map_err(|_| ExecutorError::LinkFailed("ext_logging_log_version_1"))?;

	linker
		.func_wrap(
			"env",
			"ext_allocator_malloc_version_1",
			|mut caller: Caller<'_, HostState>, size: u32| -> Result<u32, wasmi::Error> {
				caller.data_mut().allocator.allocate(size).map_err(to_trap)
			},
		)
		.map_err(|_| ExecutorError::LinkFailed("ext_allocator_malloc_version_1"))?;

	linker
		.func_wrap(
			"env",
			"ext_allocator_free_version_1",
			|mut caller: Caller<'_, HostState>, ptr: u32| {
				caller.data_mut().allocator.free(ptr);
			},
		)
		.map_err(|_| ExecutorError::LinkFailed("ext_allocator_free_version_1"))?;

	linker
		.func_wrap(
			"env",
			"ext_offchain_http_request_start_version_1",
			|mut caller: Caller<'_, HostState>, method_ptr: u32, method_len: u32, uri_ptr: u32, uri_len: u32| -> Result<i64, wasmi::Error> {
				let memory = memory_of(&mut caller).map_err(to_trap)?;
				let method = read_memory(&caller, memory, method_ptr, method_len).map_err(to_trap)?;
				let uri = read_memory(&caller, memory, uri_ptr, uri_len).map_err(to_trap)?;
				let method = String::from_utf8_lossy(&method).into_owned();
				let result = match &caller.data().offchain {
					Some(offchain) => offchain.start_request(method, uri).map_err(|_| ()),
					None => Err(()),
				};
				let encoded = result.map(|id| id.0).encode();
				allocate_and_write(&mut caller, memory, &encoded).map_err(to_trap)
			},
		)
		.map_err(|_| ExecutorError::LinkFailed("ext_offchain_http_request_start_version_1"))?;

	Ok(())
}

fn to_trap(err: ExecutorError) -> wasmi::Error {
	wasmi::Error::new(err.to_string())
}

/// A compiled runtime blob, ready to be instantiated and called into repeatedly. Kept behind
/// an `Arc` so the code-hash-keyed pool (`pool.rs`) can hand it to concurrent calling tasks
/// without recompiling.
pub struct CompiledRuntime {
	engine: Engine,
	module: Module,
}

impl CompiledRuntime {
	pub fn compile(code: &[u8]) -> Result<Self, ExecutorError> {
		let engine = Engine::default();
		let module = Module::new(&engine, code).map_err(|e| ExecutorError::Instantiate(e.to_string()))?;
		Ok(CompiledRuntime { engine, module })
	}

	/// Invoke `method(input)` against a fresh instance of this runtime, threading `overlay`
	/// through the storage host calls and `offchain` through the offchain ones. Returns the
	/// entry point's raw SCALE-encoded result and the overlay with whatever writes the call
	/// made applied.
	pub fn call(
		&self,
		method: &str,
		input: &[u8],
		overlay: TrieOverlay,
		offchain: Option<Arc<dyn OffchainExt>>,
	) -> Result<(Vec<u8>, TrieOverlay), ExecutorError> {
		let mut linker = Linker::new(&self.engine);
		link_host_functions(&mut linker)?;

		let mut store = Store::new(&self.engine, HostState::new(overlay, offchain, 0, 0));
		let instance = linker
			.instantiate(&mut store, &self.module)
			.and_then(|pre| pre.start(&mut store))
			.map_err(|e| ExecutorError::Instantiate(e.to_string()))?;

		let memory = instance
			.get_export(&store, "memory")
			.and_then(Extern::into_memory)
			.ok_or_else(|| ExecutorError::MissingExport("memory".into()))?;

		let heap_base = instance
			.get_export(&store, HEAP_BASE_GLOBAL)
			.and_then(Extern::into_global)
			.and_then(|g| g.get(&store).i32())
			.unwrap_or(0) as u32;
		store.data_mut().allocator = crate::host::BumpAllocator::new(heap_base, (memory.data_size(&store) as u32).max(heap_base));

		let entry = instance
			.get_typed_func::<(u32, u32), i64>(&store, method)
			.map_err(|_| ExecutorError::MissingExport(method.to_string()))?;

		let input_ptr = store.data_mut().allocator.allocate(input.len() as u32)?;
		memory
			.write(&mut store, input_ptr as usize, input)
			.map_err(|_| ExecutorError::MemoryAccess)?;

		let packed = entry
			.call(&mut store, (input_ptr, input.len() as u32))
			.map_err(|e| ExecutorError::Trap(e.to_string()))?;
		let (out_ptr, out_len) = unpack_ptr_len(packed);

		let mut output = vec![0u8; out_len as usize];
		memory
			.read(&store, out_ptr as usize, &mut output)
			.map_err(|_| ExecutorError::MemoryAccess)?;

		let state = store.into_data();
		Ok((output, state.overlay))
	}
}
