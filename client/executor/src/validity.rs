//! Decoders for the two runtime-API result shapes the executor cares about: transaction
//! validity (from `TaggedTransactionQueue_validate_transaction`) and apply-extrinsic outcomes
//! (from `BlockBuilder_apply_extrinsic`).
//!
//! Both are plain SCALE tagged unions; deriving `Decode` on them directly, with explicit
//! `#[codec(index = ..)]` on every variant, is enough to reproduce the wire format exactly —
//! no hand-rolled byte parsing is needed once the discriminants are pinned down correctly.

use codec::{Decode, Encode};

/// An opaque transaction tag (a `requires`/`provides` entry in the tag graph the transaction
/// pool orders extrinsics by).
pub type Tag = Vec<u8>;

/// A valid transaction's scheduling metadata, as returned by
/// `TaggedTransactionQueue_validate_transaction`.
#[derive(Clone, PartialEq, Eq, Encode, Decode, Debug)]
pub struct Validity {
	pub priority: u64,
	pub requires: Vec<Tag>,
	pub provides: Vec<Tag>,
	pub longevity: u64,
	pub propagate: bool,
}

/// Why a transaction is invalid outright (resubmitting it can never make it valid).
#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode, Debug)]
pub enum InvalidTransaction {
	#[codec(index = 0)]
	Call,
	#[codec(index = 1)]
	Payment,
	#[codec(index = 2)]
	Future,
	#[codec(index = 3)]
	Stale,
	#[codec(index = 4)]
	BadProof,
	#[codec(index = 5)]
	AncientBirthBlock,
	#[codec(index = 6)]
	ExhaustsResources,
	#[codec(index = 7)]
	Custom(u8),
	#[codec(index = 8)]
	Mandatory,
	#[codec(index = 9)]
	BadMandatory,
}

/// Why a transaction's validity could not be determined right now (it may become valid
/// later: resubmitting can help).
#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode, Debug)]
pub enum UnknownTransaction {
	#[codec(index = 0)]
	CannotLookup,
	#[codec(index = 1)]
	NoUnsignedValidator,
	#[codec(index = 2)]
	Custom(u8),
}

/// Either half of why a transaction failed validation.
#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode, Debug)]
pub enum TransactionValidityError {
	#[codec(index = 0)]
	Invalid(InvalidTransaction),
	#[codec(index = 1)]
	Unknown(UnknownTransaction),
}

/// The full `TaggedTransactionQueue_validate_transaction` return value.
pub type TransactionValidity = Result<Validity, TransactionValidityError>;

/// A runtime-API call itself failing (as opposed to the call succeeding and reporting an
/// *invalid transaction*). Only the two forms this node's decoder distinguishes are modelled;
/// any other discriminant is left unrepresented rather than guessed at.
#[derive(Clone, PartialEq, Eq, Encode, Decode, Debug)]
pub enum ApiError {
	/// The call returned bytes that could not be decoded as the expected return type. Carries
	/// the byte that triggered the failure.
	#[codec(index = 0)]
	FailedToDecodeReturnValue(u8),
	/// An application-level error surfaced transparently from the runtime, with no further
	/// structure interpreted by the host.
	#[codec(index = 3)]
	TransparentApi,
}

/// The runtime's own outcome for a successfully-validated, successfully-applied extrinsic.
/// The node does not interpret dispatch errors beyond propagating that one occurred.
pub type DispatchOutcome = Result<(), ()>;

/// The full `BlockBuilder_apply_extrinsic` return value: a call-level `ApiError`, or the
/// extrinsic's own dispatch/validity outcome.
pub type ApplyExtrinsicResult = Result<Result<(), TransactionValidityError>, ApiError>;

/// Decode a `TransactionValidity` from raw SCALE bytes.
pub fn decode_transaction_validity(bytes: &[u8]) -> Result<TransactionValidity, codec::Error> {
	TransactionValidity::decode(&mut &bytes[..])
}

/// Decode an `ApplyExtrinsicResult` from raw SCALE bytes.
pub fn decode_apply_extrinsic_result(bytes: &[u8]) -> Result<ApplyExtrinsicResult, codec::Error> {
	ApplyExtrinsicResult::decode(&mut &bytes[..])
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decodes_valid_transaction() {
		let mut bytes = vec![0x00];
		bytes.extend(1000u64.to_le_bytes());
		bytes.push(0); // requires: empty Vec<Tag>
		bytes.push(0); // provides: empty Vec<Tag>
		bytes.extend(64u64.to_le_bytes());
		bytes.push(0x01); // propagate = true
		let validity = decode_transaction_validity(&bytes).unwrap().unwrap();
		assert_eq!(validity.priority, 1000);
		assert_eq!(validity.longevity, 64);
		assert!(validity.propagate);
		assert!(validity.requires.is_empty());
		assert!(validity.provides.is_empty());
	}

	#[test]
	fn apply_extrinsic_lookup_failed() {
		let result = decode_apply_extrinsic_result(&[0, 1, 1, 0]).unwrap();
		assert_eq!(
			result,
			Ok(Err(TransactionValidityError::Unknown(UnknownTransaction::CannotLookup)))
		);
	}

	#[test]
	fn apply_extrinsic_unexpected_tx_call() {
		let result = decode_apply_extrinsic_result(&[0, 1, 0, 0]).unwrap();
		assert_eq!(result, Ok(Err(TransactionValidityError::Invalid(InvalidTransaction::Call))));
	}

	#[test]
	fn apply_extrinsic_api_error_failed_to_decode() {
		let result = decode_apply_extrinsic_result(&[1, 0, 5]).unwrap();
		assert_eq!(result, Err(ApiError::FailedToDecodeReturnValue(5)));
	}

	#[test]
	fn validity_round_trips_through_scale() {
		let validity = Validity {
			priority: 7,
			requires: vec![vec![1, 2]],
			provides: vec![vec![3, 4], vec![5]],
			longevity: 64,
			propagate: true,
		};
		let encoded = validity.encode();
		let decoded = Validity::decode(&mut &encoded[..]).unwrap();
		assert_eq!(validity, decoded);
	}
}
