//! GS: GRANDPA, the BFT finality gadget voting over the chain BABE produces.
//!
//! [`authority_set`] owns the current voter list and its one pending change; [`round`] is the
//! Prevote/Precommit tally for a single round; [`justification`] turns a winning commit into
//! the wire-format proof the import pipeline's [`sc_consensus::JustificationVerifier`] checks;
//! [`voter`] drives successive rounds forward off the backend's best-block notifications and
//! submits finalized commits back through [`sc_consensus::BlockImportPipeline`]. There is no
//! peer-to-peer vote gossip here (out of scope, see `DESIGN.md`): [`round`] and [`voter`] are
//! the voting and justification machinery a networked voter would be built on top of, run here
//! as a single local voter that tallies only its own votes.

pub mod authority_set;
pub mod justification;
pub mod round;
pub mod voter;

pub use authority_set::GrandpaAuthoritySet;
pub use justification::{build_justification, GrandpaJustificationVerifier};
pub use round::{sign_precommit, sign_prevote, RoundError, VotingRound};
pub use voter::{GrandpaVoter, LocalVoter};
