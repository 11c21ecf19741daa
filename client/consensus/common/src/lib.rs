//! `sc-consensus`: the block-import pipeline and the digest handler that feeds its findings to
//! the engines.
//!
//! This crate is deliberately engine-agnostic. `sc-consensus-babe` and `sc-consensus-grandpa`
//! plug their own [`Verifier`]/[`JustificationVerifier`] and digest sinks in; nothing here
//! knows what a VRF or a prevote is.

pub mod digest_handler;
pub mod import_queue;
pub mod orphan;
pub mod verifier;

pub use digest_handler::{AuthoritySetChangeSink, DigestHandler, EpochChangeSink};
pub use import_queue::{BlockImportPipeline, ImportError, ImportResult};
pub use orphan::{OrphanQueue, PendingBlock};
pub use verifier::{JustificationVerifier, Verified, Verifier, VerifierError};
