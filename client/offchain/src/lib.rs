//! `sc-offchain`: the bounded pool of outbound HTTP requests the runtime drives through its
//! `ext_offchain_http_*` host calls.
//!
//! A single mutex guards the `{id -> request}` map; each request's body and response buffers
//! are owned by that request, so concurrent calls against *different* ids never contend beyond
//! the map lookup itself. The pool never hands out an id still in use, and never reuses one
//! until [`OffchainPool::remove`] returns it — see `pool.rs` for the ring that enforces this.

mod pool;

pub use pool::OffchainPool;
pub use sp_runtime::offchain::{HttpHeader, HttpMethod, HttpRequestStatus};

/// Failure modes raised by the pool's own operations, distinct from [`sp_runtime::offchain::HttpError`]
/// (which is what the *runtime* sees once a failure crosses the host boundary).
#[derive(Clone, Copy, PartialEq, Eq, Debug, thiserror::Error)]
pub enum OffchainError {
	/// All 1000 ids are checked out.
	#[error("the request id pool is exhausted")]
	IntBufferEmpty,
	/// A mutating call was made against a request already in `Sent` state.
	#[error("the request has already been sent")]
	RequestAlreadyStarted,
	/// The id does not name a live request.
	#[error("the request id is invalid or unknown")]
	Invalid,
	/// `add_header` was called with an empty key.
	#[error("header key must not be empty")]
	InvalidHeaderKey,
	/// `write_body` exceeded its caller-supplied deadline.
	#[error("writing the request body exceeded its deadline")]
	TimeoutWriteBody,
	/// `response_read` exceeded its caller-supplied deadline.
	#[error("reading the response body exceeded its deadline")]
	TimeoutReadBody,
}

/// The object RE's host functions dispatch offchain calls through. Implemented by
/// [`OffchainPool`]; named independently so the executor crate does not have to depend on the
/// pool's internals, only this contract.
pub trait OffchainExt: Send + Sync {
	fn start_request(&self, method: HttpMethod, uri: Vec<u8>) -> Result<sp_runtime::offchain::HttpRequestId, OffchainError>;
}

impl OffchainExt for OffchainPool {
	fn start_request(&self, method: HttpMethod, uri: Vec<u8>) -> Result<sp_runtime::offchain::HttpRequestId, OffchainError> {
		OffchainPool::start_request(self, method, uri, Vec::new())
	}
}
