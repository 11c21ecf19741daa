//! `sc-client-api`: the append-only block tree, trie state, and notification hub that make up
//! the node's single writer of persisted chain data.
//!
//! Every other subsystem — the import pipeline, BABE, GRANDPA, the digest handler — holds a
//! `Arc<dyn Backend>` (or a concrete `Arc<InMemoryBackend>`) and talks to storage only
//! through the transactional API in [`backend`]. Nothing outside this crate mutates the
//! block tree directly.

pub mod backend;
pub mod notifications;
pub mod trie;
pub mod tree;

pub use backend::{Backend, InMemoryBackend};
pub use notifications::{BlockImportNotification, FinalityNotification, NotificationHub};
pub use trie::{TrieOverlay, TrieState};
pub use tree::BlockTree;
