//! Genesis chain specs, in the two shapes the CLI accepts: a human-readable spec naming a
//! runtime's initial storage by field, and a raw spec naming the same storage as literal
//! hex-encoded key/value pairs. Both reduce to the same `(genesis state, genesis code,
//! genesis header)` triple [`crate::service::NodeService::new`] starts a chain from.

use std::collections::BTreeMap;
use std::path::Path;

use sc_client_api::trie::{empty_root, TrieState};
use serde::{Deserialize, Serialize};
use sp_runtime::{Digest, Header};

use crate::ServiceError;

const CODE_KEY: &str = ":code";

/// The human-readable spec produced by `createGenesisWithRuntime`: names the runtime's WASM
/// blob once, as hex, under `genesis.runtime.system.code`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HumanReadableGenesis {
	pub name: String,
	pub id: String,
	pub genesis: GenesisRuntimeSection,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenesisRuntimeSection {
	pub runtime: RuntimeSection,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuntimeSection {
	pub system: SystemSection,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemSection {
	/// Hex-encoded WASM runtime blob, unprefixed (`to_raw` prepends `0x` when flattening to
	/// the raw storage form).
	pub code: String,
}

/// The same genesis, flattened to literal storage key/value pairs (only `:code` is modelled;
/// a production chain spec's raw form carries every pallet's initial storage this way).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawGenesis {
	pub name: String,
	pub id: String,
	pub top: BTreeMap<String, String>,
}

/// Builds the human-readable spec a genesis-authoring tool would hand the node: wraps `wasm`
/// as the runtime code, hex-encoded.
pub fn create_genesis_with_runtime(name: &str, id: &str, wasm: Vec<u8>) -> HumanReadableGenesis {
	HumanReadableGenesis {
		name: name.to_string(),
		id: id.to_string(),
		genesis: GenesisRuntimeSection { runtime: RuntimeSection { system: SystemSection { code: hex::encode(wasm) } } },
	}
}

pub fn to_raw(genesis: &HumanReadableGenesis) -> RawGenesis {
	let mut top = BTreeMap::new();
	top.insert(hex::encode(CODE_KEY), format!("0x{}", genesis.genesis.runtime.system.code));
	RawGenesis { name: genesis.name.clone(), id: genesis.id.clone(), top }
}

/// Load a chain spec from `path`, accepting either shape: a raw spec (detected by the presence
/// of a `top` field) or a human-readable one.
pub fn load_genesis(path: &Path) -> Result<(TrieState, Vec<u8>, Header), ServiceError> {
	let text = std::fs::read_to_string(path).map_err(|e| ServiceError::GenesisLoad(e.to_string()))?;
	let code = if let Ok(raw) = serde_json::from_str::<RawGenesis>(&text) {
		let encoded_key = hex::encode(CODE_KEY);
		let hex_code = raw
			.top
			.get(&encoded_key)
			.ok_or_else(|| ServiceError::GenesisLoad("raw genesis missing :code".into()))?;
		decode_hex_code(hex_code)?
	} else {
		let human: HumanReadableGenesis =
			serde_json::from_str(&text).map_err(|e| ServiceError::GenesisLoad(e.to_string()))?;
		decode_hex_code(&human.genesis.runtime.system.code)?
	};

	let mut state = TrieState::empty();
	let mut overlay = state.overlay();
	overlay.set(CODE_KEY.as_bytes().to_vec(), code.clone());
	state = overlay.commit();

	let header = Header::new(0, empty_root(), state.root(), [0; 32], Digest::default());
	Ok((state, code, header))
}

fn decode_hex_code(hex_code: &str) -> Result<Vec<u8>, ServiceError> {
	hex::decode(hex_code.trim_start_matches("0x")).map_err(|e| ServiceError::GenesisLoad(e.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn human_readable_round_trips_through_raw() {
		let genesis = create_genesis_with_runtime("dev", "dev-1", vec![1, 2, 3, 4]);
		assert_eq!(genesis.genesis.runtime.system.code, "01020304");

		let raw = to_raw(&genesis);
		let encoded_key = hex::encode(":code");
		assert_eq!(raw.top.get(&encoded_key).unwrap(), "0x01020304");
	}

	#[test]
	fn load_genesis_from_human_readable_json() {
		let dir = std::env::temp_dir().join(format!("sc-service-genesis-test-{:?}", std::thread::current().id()));
		std::fs::create_dir_all(&dir).unwrap();
		let path = dir.join("chain-spec.json");
		let genesis = create_genesis_with_runtime("dev", "dev-1", vec![9, 9, 9]);
		std::fs::write(&path, serde_json::to_string(&genesis).unwrap()).unwrap();

		let (state, code, header) = load_genesis(&path).unwrap();
		assert_eq!(code, vec![9, 9, 9]);
		assert_eq!(header.number, 0);
		assert_eq!(state.get(b":code"), Some([9, 9, 9].as_slice()));

		std::fs::remove_file(&path).ok();
	}
}
