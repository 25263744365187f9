//! Primitives for exchanging Merkle-Patricia trie nodes during state sync.
//!
//! A node catching up to the network fetches the content-addressed state
//! tries piece by piece from peers instead of replaying history. This crate
//! covers the part of that protocol that deals with individual trie nodes:
//! - [`TrieNodeMessage`][message::TrieNodeMessage] is the wire unit bundling
//!   a node's key, raw encoding, referenced children, and target database,
//!   with strict decode validation against untrusted input.
//! - [`referenced_keys`][node_refs::referenced_keys] finds the child hashes
//!   embedded in a node's structural encoding that still need fetching.
//! - [`import_trie_node`][import::import_trie_node] merges a received node
//!   into local storage and classifies the outcome, so an orchestrator can
//!   decide whether to request the node's children next, retry, or penalize
//!   the supplying peer.
//!
//! Peer management, request scheduling, and the persistent store
//! implementation itself are external collaborators; the store is reached
//! through the [`TrieDb`][db::TrieDb] trait.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]
#![deny(missing_docs)]

pub mod db;
pub mod import;
pub mod message;
pub mod node_refs;

#[cfg(test)]
pub(crate) mod testing_utils;
