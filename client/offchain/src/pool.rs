//! The request pool itself: a fixed ring of 1000 ids and a map from a checked-out id to its
//! in-flight request state.

use std::{
	collections::{HashMap, VecDeque},
	time::{Duration, Instant},
};

use parking_lot::Mutex;
use sp_runtime::offchain::{HttpHeader, HttpMethod, HttpRequestId};

use crate::OffchainError;

const CAPACITY: i16 = 1000;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum RequestState {
	Draft,
	Sent,
	Done,
}

struct Response {
	code: u16,
	headers: Vec<HttpHeader>,
	body: Vec<u8>,
	cursor: usize,
}

struct Request {
	#[allow(dead_code)]
	method: HttpMethod,
	#[allow(dead_code)]
	uri: Vec<u8>,
	headers: Vec<HttpHeader>,
	body: Vec<u8>,
	state: RequestState,
	response: Option<Response>,
}

struct Inner {
	requests: HashMap<i16, Request>,
	free_ids: VecDeque<i16>,
}

/// The process-wide offchain HTTP request set. One instance is created at runtime startup and
/// torn down at shutdown; `sc-service` hands an `Arc<OffchainPool>` to every RE invocation that
/// may make offchain calls.
pub struct OffchainPool {
	inner: Mutex<Inner>,
}

impl OffchainPool {
	pub fn new() -> Self {
		OffchainPool {
			inner: Mutex::new(Inner { requests: HashMap::new(), free_ids: (1..=CAPACITY).collect() }),
		}
	}

	/// Draw a fresh id and record a `Draft` request. Fails with [`OffchainError::IntBufferEmpty`]
	/// once all 1000 ids are checked out.
	pub fn start_request(&self, method: HttpMethod, uri: Vec<u8>, initial_headers: Vec<HttpHeader>) -> Result<HttpRequestId, OffchainError> {
		let mut inner = self.inner.lock();
		let id = inner.free_ids.pop_front().ok_or(OffchainError::IntBufferEmpty)?;
		inner.requests.insert(
			id,
			Request { method, uri, headers: initial_headers, body: Vec::new(), state: RequestState::Draft, response: None },
		);
		Ok(HttpRequestId(id))
	}

	pub fn add_header(&self, id: HttpRequestId, key: &[u8], value: &[u8]) -> Result<(), OffchainError> {
		if key.is_empty() {
			return Err(OffchainError::InvalidHeaderKey);
		}
		let mut inner = self.inner.lock();
		let request = inner.requests.get_mut(&id.0).ok_or(OffchainError::Invalid)?;
		match request.state {
			RequestState::Draft => {
				request.headers.push((key.to_vec(), value.to_vec()));
				Ok(())
			},
			RequestState::Sent | RequestState::Done => Err(OffchainError::RequestAlreadyStarted),
		}
	}

	/// Append `chunk` to the request body. `deadline` is honoured cooperatively: a deadline
	/// already in the past fails immediately with [`OffchainError::TimeoutWriteBody`]; body
	/// writes themselves never block, so a future deadline always succeeds.
	pub fn write_body(&self, id: HttpRequestId, chunk: &[u8], deadline: Option<Instant>) -> Result<(), OffchainError> {
		if let Some(deadline) = deadline {
			if Instant::now() > deadline {
				return Err(OffchainError::TimeoutWriteBody);
			}
		}
		let mut inner = self.inner.lock();
		let request = inner.requests.get_mut(&id.0).ok_or(OffchainError::Invalid)?;
		match request.state {
			RequestState::Draft => {
				request.body.extend_from_slice(chunk);
				Ok(())
			},
			RequestState::Sent | RequestState::Done => Err(OffchainError::RequestAlreadyStarted),
		}
	}

	/// Mark the request `Sent`. The actual network transport is a collaborator outside this
	/// node's scope (see the purpose-and-scope non-goals); this pool synthesizes an empty
	/// `200` response immediately so callers above it observe a consistent, testable
	/// state-machine without a live network dependency.
	pub fn send(&self, id: HttpRequestId) -> Result<(), OffchainError> {
		let mut inner = self.inner.lock();
		let request = inner.requests.get_mut(&id.0).ok_or(OffchainError::Invalid)?;
		match request.state {
			RequestState::Draft => {
				request.state = RequestState::Sent;
				request.response = Some(Response { code: 200, headers: Vec::new(), body: Vec::new(), cursor: 0 });
				Ok(())
			},
			RequestState::Sent | RequestState::Done => Err(OffchainError::RequestAlreadyStarted),
		}
	}

	/// Copy up to `buf.len()` bytes of the response body into `buf`, returning how many were
	/// copied (`0` once the body is exhausted).
	pub fn response_read(&self, id: HttpRequestId, buf: &mut [u8], deadline: Option<Instant>) -> Result<usize, OffchainError> {
		if let Some(deadline) = deadline {
			if Instant::now() > deadline {
				return Err(OffchainError::TimeoutReadBody);
			}
		}
		let mut inner = self.inner.lock();
		let request = inner.requests.get_mut(&id.0).ok_or(OffchainError::Invalid)?;
		let response = match request.state {
			RequestState::Sent => request.response.as_mut().ok_or(OffchainError::Invalid)?,
			RequestState::Draft => return Err(OffchainError::Invalid),
			RequestState::Done => return Ok(0),
		};
		let remaining = &response.body[response.cursor..];
		let n = remaining.len().min(buf.len());
		buf[..n].copy_from_slice(&remaining[..n]);
		response.cursor += n;
		if response.cursor >= response.body.len() {
			request.state = RequestState::Done;
		}
		Ok(n)
	}

	pub fn response_code(&self, id: HttpRequestId) -> Result<u16, OffchainError> {
		let inner = self.inner.lock();
		let request = inner.requests.get(&id.0).ok_or(OffchainError::Invalid)?;
		request.response.as_ref().map(|r| r.code).ok_or(OffchainError::Invalid)
	}

	/// Return `id` to the free pool. The id is eligible for reuse by the very next
	/// `start_request` call.
	pub fn remove(&self, id: HttpRequestId) -> Result<(), OffchainError> {
		let mut inner = self.inner.lock();
		inner.requests.remove(&id.0).ok_or(OffchainError::Invalid)?;
		inner.free_ids.push_back(id.0);
		Ok(())
	}

	#[cfg(test)]
	fn in_use(&self) -> usize {
		self.inner.lock().requests.len()
	}
}

impl Default for OffchainPool {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn exhausts_after_1000_outstanding_requests() {
		let pool = OffchainPool::new();
		let mut ids = Vec::new();
		for _ in 0..CAPACITY {
			ids.push(pool.start_request("GET".into(), b"https://example.invalid".to_vec(), vec![]).unwrap());
		}
		assert_eq!(pool.in_use(), CAPACITY as usize);
		let err = pool.start_request("GET".into(), b"https://example.invalid".to_vec(), vec![]).unwrap_err();
		assert_eq!(err, OffchainError::IntBufferEmpty);
	}

	#[test]
	fn removed_id_is_immediately_reusable() {
		let pool = OffchainPool::new();
		let mut ids = Vec::new();
		for _ in 0..CAPACITY {
			ids.push(pool.start_request("GET".into(), b"https://example.invalid".to_vec(), vec![]).unwrap());
		}
		let freed = ids[500];
		pool.remove(freed).unwrap();
		let reused = pool.start_request("GET".into(), b"https://example.invalid".to_vec(), vec![]).unwrap();
		assert_eq!(reused, freed);
	}

	#[test]
	fn add_header_rejects_empty_key() {
		let pool = OffchainPool::new();
		let id = pool.start_request("GET".into(), b"https://example.invalid".to_vec(), vec![]).unwrap();
		assert_eq!(pool.add_header(id, b"", b"v").unwrap_err(), OffchainError::InvalidHeaderKey);
	}

	#[test]
	fn add_header_after_send_is_rejected() {
		let pool = OffchainPool::new();
		let id = pool.start_request("GET".into(), b"https://example.invalid".to_vec(), vec![]).unwrap();
		pool.send(id).unwrap();
		assert_eq!(pool.add_header(id, b"k", b"v").unwrap_err(), OffchainError::RequestAlreadyStarted);
	}

	#[test]
	fn response_read_past_deadline_times_out() {
		let pool = OffchainPool::new();
		let id = pool.start_request("GET".into(), b"https://example.invalid".to_vec(), vec![]).unwrap();
		pool.send(id).unwrap();
		let mut buf = [0u8; 16];
		let past = Instant::now() - Duration::from_millis(1);
		assert_eq!(pool.response_read(id, &mut buf, Some(past)).unwrap_err(), OffchainError::TimeoutReadBody);
	}

	#[test]
	fn unknown_id_is_invalid_everywhere() {
		let pool = OffchainPool::new();
		let ghost = HttpRequestId(12345);
		assert_eq!(pool.add_header(ghost, b"k", b"v").unwrap_err(), OffchainError::Invalid);
		assert_eq!(pool.send(ghost).unwrap_err(), OffchainError::Invalid);
		assert_eq!(pool.remove(ghost).unwrap_err(), OffchainError::Invalid);
	}
}
