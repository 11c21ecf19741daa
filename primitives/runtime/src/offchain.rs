//! Types shared across the host/runtime boundary for offchain worker HTTP access.
//!
//! These are the primitives the runtime passes to and receives from the host functions that
//! `sc-offchain` implements; they carry no behaviour of their own.

use alloc::{string::String, vec::Vec};
use codec::{Decode, Encode};

#[cfg(feature = "std")]
use serde::{Deserialize, Serialize};

/// Identifier of an in-flight HTTP request, valid for the lifetime of that request. Drawn
/// from a bounded pool of `1..=1000` by `sc-offchain`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode, Debug)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub struct HttpRequestId(pub i16);

/// Milliseconds since the Unix epoch, as seen by the host.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Encode, Decode, Debug)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub struct Timestamp(pub u64);

impl Timestamp {
	pub fn unix_millis(&self) -> u64 {
		self.0
	}

	pub fn add(&self, millis: u64) -> Timestamp {
		Timestamp(self.0.saturating_add(millis))
	}
}

/// Failure modes surfaced by the HTTP host functions.
#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode, Debug, thiserror::Error)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub enum HttpError {
	#[error("the request deadline was reached before the operation completed")]
	DeadlineReached,
	#[error("the request id pool is exhausted")]
	IoError,
	#[error("the request id is not recognised or is in an invalid state for this call")]
	Invalid,
}

/// State of an individual in-flight request, as observed by the runtime.
#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode, Debug)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub enum HttpRequestStatus {
	/// No such request, or it was already read to completion and removed.
	Invalid,
	/// Not yet finished; retry after the given deadline.
	DeadlineReached,
	/// Finished with an HTTP status code.
	Finished(u16),
	/// The request errored out before a response was obtained.
	IoError,
}

/// A single HTTP header as `(name, value)`.
pub type HttpHeader = (Vec<u8>, Vec<u8>);

/// Which storage partition a `local_storage_*` host call should touch.
#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode, Debug)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub enum StorageKind {
	/// Shared, persisted across restarts.
	Persistent,
	/// Local to the current invocation only.
	Local,
}

/// Owned representation of an HTTP method understood by `sc-offchain`.
pub type HttpMethod = String;
