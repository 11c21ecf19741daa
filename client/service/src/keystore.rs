//! Loads or generates the two keys a node needs to participate rather than merely sync:
//! a schnorrkel keypair for BABE block authoring and VRF claims, and an ed25519 signing key
//! for GRANDPA votes. Both are derived from the same 32-byte seed, read from `--key`'s file, so
//! operators manage one secret rather than two.

use std::path::Path;

use rand::{rngs::OsRng, RngCore};
use schnorrkel::Keypair as BabeKeypair;
use sp_consensus_babe::AuthorityId as BabeAuthorityId;
use sp_consensus_grandpa::AuthorityId as GrandpaAuthorityId;

use crate::ServiceError;

const SEED_LEN: usize = 32;

/// The authoring/voting identity for a single node: a BABE keypair and a GRANDPA signing key
/// derived from the same seed.
pub struct NodeKeystore {
	pub babe: BabeKeypair,
	pub grandpa: ed25519_zebra::SigningKey,
}

impl NodeKeystore {
	pub fn babe_authority_id(&self) -> BabeAuthorityId {
		BabeAuthorityId(self.babe.public.to_bytes())
	}

	pub fn grandpa_authority_id(&self) -> GrandpaAuthorityId {
		let verification_key = ed25519_zebra::VerificationKey::from(&self.grandpa);
		GrandpaAuthorityId(verification_key.into())
	}

	fn from_seed(seed: [u8; SEED_LEN]) -> Self {
		let mini_secret =
			schnorrkel::MiniSecretKey::from_bytes(&seed).expect("32 bytes is a valid mini secret key length");
		let babe = mini_secret.expand_to_keypair(schnorrkel::ExpansionMode::Ed25519);
		let grandpa = ed25519_zebra::SigningKey::from(seed);
		NodeKeystore { babe, grandpa }
	}

	/// Generate a fresh keystore from OS randomness, for nodes started without `--key`.
	pub fn generate() -> Self {
		let mut seed = [0u8; SEED_LEN];
		OsRng.fill_bytes(&mut seed);
		Self::from_seed(seed)
	}

	/// Load a keystore from a 32-byte raw seed file, or a `0x`-prefixed hex encoding of one.
	pub fn load(path: &Path) -> Result<Self, ServiceError> {
		let contents = std::fs::read_to_string(path).map_err(|e| ServiceError::KeystoreLoad(e.to_string()))?;
		let trimmed = contents.trim();
		let bytes = if let Some(hex_part) = trimmed.strip_prefix("0x") {
			hex::decode(hex_part).map_err(|e| ServiceError::KeystoreLoad(e.to_string()))?
		} else {
			std::fs::read(path).map_err(|e| ServiceError::KeystoreLoad(e.to_string()))?
		};
		let seed: [u8; SEED_LEN] = bytes
			.try_into()
			.map_err(|_| ServiceError::KeystoreLoad(format!("key seed must be exactly {SEED_LEN} bytes")))?;
		Ok(Self::from_seed(seed))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn loading_the_same_seed_twice_yields_the_same_identities() {
		let dir = std::env::temp_dir().join(format!("sc-service-keystore-test-{:?}", std::thread::current().id()));
		std::fs::create_dir_all(&dir).unwrap();
		let path = dir.join("key");
		std::fs::write(&path, [7u8; SEED_LEN]).unwrap();

		let a = NodeKeystore::load(&path).unwrap();
		let b = NodeKeystore::load(&path).unwrap();
		assert_eq!(a.babe_authority_id(), b.babe_authority_id());
		assert_eq!(a.grandpa_authority_id(), b.grandpa_authority_id());

		std::fs::remove_file(&path).ok();
	}

	#[test]
	fn hex_seed_file_decodes_the_same_as_raw_bytes() {
		let dir = std::env::temp_dir().join(format!("sc-service-keystore-hex-test-{:?}", std::thread::current().id()));
		std::fs::create_dir_all(&dir).unwrap();
		let raw_path = dir.join("key-raw");
		let hex_path = dir.join("key-hex");
		std::fs::write(&raw_path, [3u8; SEED_LEN]).unwrap();
		std::fs::write(&hex_path, format!("0x{}", hex::encode([3u8; SEED_LEN]))).unwrap();

		let raw = NodeKeystore::load(&raw_path).unwrap();
		let from_hex = NodeKeystore::load(&hex_path).unwrap();
		assert_eq!(raw.babe_authority_id(), from_hex.babe_authority_id());

		std::fs::remove_file(&raw_path).ok();
		std::fs::remove_file(&hex_path).ok();
	}

	#[test]
	fn a_seed_of_the_wrong_length_is_rejected() {
		let dir = std::env::temp_dir().join(format!("sc-service-keystore-bad-test-{:?}", std::thread::current().id()));
		std::fs::create_dir_all(&dir).unwrap();
		let path = dir.join("key");
		std::fs::write(&path, [1u8; 10]).unwrap();

		assert!(NodeKeystore::load(&path).is_err());

		std::fs::remove_file(&path).ok();
	}
}
