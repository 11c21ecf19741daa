//! `sc-executor`: loads a WASM runtime blob, exposes the host function table it calls back
//! into, and executes its versioned entry points against a mutable trie overlay.
//!
//! This crate owns nothing persistent; `sc-client-api::Backend` resolves which code hash
//! applies to a given block and hands this crate the bytes. Instances are transient — see
//! `pool.rs` for what is and isn't cached across calls.

pub mod host;
pub mod pool;
pub mod validity;
pub mod version;
pub mod wasm;

pub use pool::CodeExecutor;
pub use validity::{
	ApiError, ApplyExtrinsicResult, InvalidTransaction, Tag, TransactionValidity, TransactionValidityError,
	UnknownTransaction, Validity,
};
pub use version::{ApiId, RuntimeVersion};

/// Everything that can go wrong loading or invoking a runtime.
#[derive(thiserror::Error, Debug)]
pub enum ExecutorError {
	#[error("failed to instantiate runtime: {0}")]
	Instantiate(String),
	#[error("runtime entry point trapped: {0}")]
	Trap(String),
	#[error("runtime is missing expected export: {0}")]
	MissingExport(String),
	#[error("failed to link host function {0}")]
	LinkFailed(&'static str),
	#[error("out-of-bounds guest memory access")]
	MemoryAccess,
	#[error("guest heap allocation failed")]
	AllocationFailed,
	#[error("failed to decode runtime return value: {0}")]
	Decode(#[from] codec::Error),
}

impl From<ExecutorError> for sp_blockchain::Error {
	fn from(err: ExecutorError) -> Self {
		sp_blockchain::Error::ExecutionFailed(err.to_string())
	}
}

/// Well-known entry point names. Kept as associated constants rather than an enum since the
/// core relies on calling them by their exact exported symbol name.
pub mod entry_points {
	pub const CORE_VERSION: &str = "Core_version";
	pub const CORE_EXECUTE_BLOCK: &str = "Core_execute_block";
	pub const CORE_INITIALIZE_BLOCK: &str = "Core_initialize_block";
	pub const BLOCK_BUILDER_APPLY_EXTRINSIC: &str = "BlockBuilder_apply_extrinsic";
	pub const BLOCK_BUILDER_FINALIZE_BLOCK: &str = "BlockBuilder_finalize_block";
	pub const BLOCK_BUILDER_INHERENT_EXTRINSICS: &str = "BlockBuilder_inherent_extrinsics";
	pub const TAGGED_TRANSACTION_QUEUE_VALIDATE_TRANSACTION: &str = "TaggedTransactionQueue_validate_transaction";
	pub const BABE_API_CONFIGURATION: &str = "BabeApi_configuration";
	pub const GRANDPA_API_GRANDPA_AUTHORITIES: &str = "GrandpaApi_grandpa_authorities";
}
