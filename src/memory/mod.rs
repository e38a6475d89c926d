//! Session memory
//!
//! Namespaced key-value storage shared by every conversation, plus the
//! end-of-turn peer list update that writes into it.

pub mod peers;
pub mod store;

pub use peers::{update_peer_memory, PeerUpdate};
pub use store::{
    build_memory_store, InMemoryStore, MemoryItem, MemoryStore, Namespace, PostgresMemoryStore,
};
