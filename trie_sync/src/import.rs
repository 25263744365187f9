//! Import of received trie nodes into local storage.

use ethereum_types::H256;
use log::{trace, warn};
use serde::{Deserialize, Serialize};

use crate::{
    db::{TrieDb, TrieDbSet},
    message::TrieNodeMessage,
    node_refs::{NodeShape, HASH_LEN},
};

/// Terminal classification of one import attempt. Computed fresh per
/// attempt and never persisted; the orchestrator turns it into retry or
/// peer-penalization policy.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum ImportOutcome {
    /// The pair was new and has been written.
    Imported,
    /// The store already held this exact pair.
    Known,
    /// The store holds a different value under the same key. Either the
    /// content-address invariant is broken or the supplying peer is
    /// misbehaving or corrupted.
    Inconsistent,
    /// The key is not structurally valid.
    InvalidKey,
    /// The value is not structurally valid.
    InvalidValue,
}

impl ImportOutcome {
    /// True exactly for the outcomes that leave the store durably holding
    /// the expected pair. The remaining outcomes mean the orchestrator
    /// must not rely on this node (or its peer) for further progress.
    pub const fn is_successful(&self) -> bool {
        matches!(self, ImportOutcome::Imported | ImportOutcome::Known)
    }
}

/// Merges one (key, value) pair into `db` and classifies the result.
///
/// The key crosses this boundary as raw bytes so its structural check is
/// enforced here rather than assumed; both validity checks run before any
/// store access. The check-then-write itself is a single atomic store
/// operation, so concurrent importers of the same key serialize inside
/// the store, nothing partially written ever becomes visible, and
/// repeating an import after success always classifies as `Known`.
pub fn import_trie_node(db: &dyn TrieDb, key: &[u8], value: &[u8]) -> ImportOutcome {
    if key.len() != HASH_LEN {
        return ImportOutcome::InvalidKey;
    }
    if NodeShape::classify(value).is_none() {
        return ImportOutcome::InvalidValue;
    }

    let key = H256::from_slice(key);
    match db.put_if_absent(key, value.to_vec()) {
        None => {
            trace!("imported trie node {key:?}");
            ImportOutcome::Imported
        }
        Some(existing) if existing == value => ImportOutcome::Known,
        Some(_) => {
            warn!("conflicting values stored under trie node key {key:?}");
            ImportOutcome::Inconsistent
        }
    }
}

/// Imports the node a message carries into the store its kind selects.
/// Scheduling fetches for the message's references stays with the caller.
pub fn import_message(dbs: &TrieDbSet, msg: &TrieNodeMessage) -> ImportOutcome {
    import_trie_node(dbs.db(msg.db()), msg.key().as_bytes(), msg.value())
}
