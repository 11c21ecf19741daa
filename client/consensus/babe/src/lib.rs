//! BS: BABE, the slot-based VRF leader-election scheme this node uses for block production.
//!
//! Splits across five modules mirroring the lifecycle of a slot claim: [`slot_claim`] names
//! the pure eligibility rules, [`epoch_handler`] eagerly precomputes every slot this node
//! claims across an epoch at epoch entry, [`verifier`] checks another node's claim during
//! import, [`authorship`] drives the claims this node makes into authored blocks, and
//! [`equivocation`] flags when the same authority claims the same slot twice with different
//! headers.

pub mod authorship;
pub mod epoch_handler;
pub mod epoch_sink;
pub mod equivocation;
pub mod slot_claim;
pub mod verifier;

pub use authorship::{BabeWorker, ExtrinsicSource, NoExtrinsics};
pub use epoch_handler::EpochHandler;
pub use epoch_sink::BabeEpochSink;
pub use equivocation::EquivocationTracker;
pub use slot_claim::{secondary_slot_author, wins_primary, ClaimKind};
pub use verifier::{BabeVerifier, NoFinalityGadget};
