//! `RuntimeVersion`, as returned by the `Core_version` entry point.
//!
//! The executor decodes this once per distinct runtime code blob and caches it alongside the
//! compiled module; everything above this crate (BIP, BS, GS) reads it to decide which API
//! version of an entry point to invoke.

use codec::{Decode, Encode};

/// An API a runtime declares support for: an 8-byte identifier and the version it implements.
/// Entry points like `BlockBuilder_apply_extrinsic` are versioned independently of
/// `spec_version`, so the executor consults this table before picking which host-call
/// signature to use.
pub type ApiId = [u8; 8];

#[derive(Clone, PartialEq, Eq, Encode, Decode, Debug)]
pub struct RuntimeVersion {
	pub spec_name: String,
	pub impl_name: String,
	pub authoring_version: u32,
	pub spec_version: u32,
	pub impl_version: u32,
	pub apis: Vec<(ApiId, u32)>,
	pub transaction_version: u32,
}

impl RuntimeVersion {
	/// The version this runtime implements for `api`, if it declares support for it at all.
	pub fn api_version(&self, api: &ApiId) -> Option<u32> {
		self.apis.iter().find(|(id, _)| id == api).map(|(_, version)| *version)
	}

	pub fn decode(bytes: &[u8]) -> Result<Self, codec::Error> {
		<RuntimeVersion as Decode>::decode(&mut &bytes[..])
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn api_version_looks_up_by_id() {
		let version = RuntimeVersion {
			spec_name: "node".into(),
			impl_name: "node".into(),
			authoring_version: 1,
			spec_version: 100,
			impl_version: 0,
			apis: vec![(*b"BabeApi1", 2), (*b"GrandpaA", 3)],
			transaction_version: 1,
		};
		assert_eq!(version.api_version(b"BabeApi1"), Some(2));
		assert_eq!(version.api_version(b"Unknown!"), None);
	}

	#[test]
	fn round_trips_through_scale() {
		let version = RuntimeVersion {
			spec_name: "node".into(),
			impl_name: "node".into(),
			authoring_version: 1,
			spec_version: 1,
			impl_version: 0,
			apis: vec![],
			transaction_version: 1,
		};
		let encoded = version.encode();
		assert_eq!(RuntimeVersion::decode(&encoded).unwrap(), version);
	}
}
