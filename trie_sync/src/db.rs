//! The database-kind registry and the per-kind node store abstraction.

use std::{
    collections::HashMap,
    fmt::{self, Debug, Display},
    str::FromStr,
    sync::Arc,
};

use ethereum_types::H256;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The logical trie partition a node belongs to. Each kind maps to one
/// independent persistent store.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum TrieDatabase {
    /// The account-state trie.
    State,
    /// The contract-storage tries.
    Storage,
    /// The account-details trie.
    Details,
}

/// All kinds, in wire-name order. Useful for iterating stores exhaustively.
pub const ALL_DATABASES: [TrieDatabase; 3] = [
    TrieDatabase::State,
    TrieDatabase::Storage,
    TrieDatabase::Details,
];

impl TrieDatabase {
    /// The exact name used for this kind on the wire.
    pub const fn wire_name(&self) -> &'static str {
        match self {
            TrieDatabase::State => "STATE",
            TrieDatabase::Storage => "STORAGE",
            TrieDatabase::Details => "DETAILS",
        }
    }
}

impl Display for TrieDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

/// Error returned when a string names no known [`TrieDatabase`].
#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
#[error("not a trie database name: {0:?}")]
pub struct UnknownDatabase(pub String);

impl FromStr for TrieDatabase {
    type Err = UnknownDatabase;

    /// Wire names are matched exactly; no case folding.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STATE" => Ok(TrieDatabase::State),
            "STORAGE" => Ok(TrieDatabase::Storage),
            "DETAILS" => Ok(TrieDatabase::Details),
            other => Err(UnknownDatabase(other.to_string())),
        }
    }
}

/// One per-kind node store.
///
/// `put_if_absent` is the atomic check-then-write primitive the import
/// engine relies on: concurrent writers targeting the same key serialize
/// inside it, and an aborted attempt leaves no partially written value
/// visible to readers.
pub trait TrieDb: Debug + Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &H256) -> Option<Vec<u8>>;

    /// Writes `value` under `key` unless the key is already present.
    /// Returns the previously stored value without overwriting it, or
    /// `None` when the write happened.
    fn put_if_absent(&self, key: H256, value: Vec<u8>) -> Option<Vec<u8>>;
}

/// In-memory [`TrieDb`] backed by a [`HashMap`] behind a [`RwLock`]. The
/// reference store implementation; production deployments substitute a
/// persistent one.
#[derive(Debug, Default)]
pub struct MemoryTrieDb {
    entries: RwLock<HashMap<H256, Vec<u8>>>,
}

impl MemoryTrieDb {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored nodes.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl TrieDb for MemoryTrieDb {
    fn get(&self, key: &H256) -> Option<Vec<u8>> {
        self.entries.read().get(key).cloned()
    }

    fn put_if_absent(&self, key: H256, value: Vec<u8>) -> Option<Vec<u8>> {
        let mut entries = self.entries.write();
        match entries.get(&key) {
            Some(existing) => Some(existing.clone()),
            None => {
                entries.insert(key, value);
                None
            }
        }
    }
}

/// The full set of per-kind stores, one per [`TrieDatabase`]. Writes to
/// different kinds never touch the same store.
#[derive(Clone, Debug)]
pub struct TrieDbSet {
    state: Arc<dyn TrieDb>,
    storage: Arc<dyn TrieDb>,
    details: Arc<dyn TrieDb>,
}

impl TrieDbSet {
    /// Builds a set from one store per kind.
    pub fn new(state: Arc<dyn TrieDb>, storage: Arc<dyn TrieDb>, details: Arc<dyn TrieDb>) -> Self {
        Self {
            state,
            storage,
            details,
        }
    }

    /// Builds a set of three independent in-memory stores.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryTrieDb::new()),
            Arc::new(MemoryTrieDb::new()),
            Arc::new(MemoryTrieDb::new()),
        )
    }

    /// The store backing the given kind. Exhaustive; adding a kind extends
    /// this table and nothing else.
    pub fn db(&self, db: TrieDatabase) -> &dyn TrieDb {
        match db {
            TrieDatabase::State => self.state.as_ref(),
            TrieDatabase::Storage => self.storage.as_ref(),
            TrieDatabase::Details => self.details.as_ref(),
        }
    }
}
