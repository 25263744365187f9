//! The trie-node wire message and its strict decode validation.
//!
//! One message carries one trie node between peers. The sender bundles the
//! node's key, its raw encoding, the child nodes it references, and the
//! database the node belongs to; the receiver validates every field before
//! letting the node anywhere near its stores. Decoding never panics:
//! the input comes from an untrusted peer, and a bad message must degrade
//! to an explicit rejection the orchestrator can act on.

use std::collections::BTreeMap;

use bytes::Bytes;
use ethereum_types::H256;
use rlp::{Rlp, RlpStream};
use thiserror::Error;

use crate::{db::TrieDatabase, node_refs::HASH_LEN};

/// Child nodes referenced from within a node's encoding, keyed by their
/// content-addressed hash. Built once at extraction time; the ascending
/// key order makes the wire encoding deterministic.
pub type ReferencedNodes = BTreeMap<H256, Vec<u8>>;

/// Field count of the top-level message list.
const MESSAGE_FIELDS: usize = 4;
/// Field count of one `[key, value]` reference entry.
const REFERENCE_FIELDS: usize = 2;

/// Why a received encoding was rejected. Every variant is data-driven and
/// recoverable; the orchestrator decides whether to re-request or penalize
/// the sender.
#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
pub enum MsgDecodeError {
    /// The input held no bytes at all.
    #[error("empty message")]
    Empty,

    /// The top level was not a list of exactly four fields.
    #[error("expected a {MESSAGE_FIELDS}-field message list")]
    NotAMessageList,

    /// The key field was not a raw item of exactly 32 bytes.
    #[error("message key must be {HASH_LEN} raw bytes")]
    BadKey,

    /// The value field was empty or not a raw item.
    #[error("message value must be non-empty raw bytes")]
    BadValue,

    /// The references field, or one of its entries, was not structured as
    /// a list of `[key, value]` pairs.
    #[error("references must be a list of {REFERENCE_FIELDS}-field entries")]
    BadReferencePair,

    /// A reference key was not a raw item of exactly 32 bytes.
    #[error("reference keys must be {HASH_LEN} raw bytes")]
    BadReferenceKey,

    /// A reference value was empty or not a raw item.
    #[error("reference values must be non-empty raw bytes")]
    BadReferenceValue,

    /// The kind field named no known trie database.
    #[error("unknown trie database {0:?}")]
    UnknownDatabase(String),
}

/// One trie node in flight between peers: the node's content-addressed
/// key, its raw encoding, the children it references, and the database it
/// belongs to.
///
/// Messages are immutable value objects with no identity beyond their
/// fields; they are built, put on the wire, imported, and discarded.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TrieNodeMessage {
    key: H256,
    value: Vec<u8>,
    references: ReferencedNodes,
    db: TrieDatabase,
}

impl TrieNodeMessage {
    /// Creates a message with an explicit reference map.
    pub fn new(key: H256, value: Vec<u8>, references: ReferencedNodes, db: TrieDatabase) -> Self {
        Self {
            key,
            value,
            references,
            db,
        }
    }

    /// Creates a message carrying no references. Encodes identically to
    /// [`TrieNodeMessage::new`] with an empty map.
    pub fn without_references(key: H256, value: Vec<u8>, db: TrieDatabase) -> Self {
        Self::new(key, value, ReferencedNodes::new(), db)
    }

    /// The node's content-addressed key.
    pub const fn key(&self) -> H256 {
        self.key
    }

    /// The node's raw encoded payload, opaque at this layer.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// The child nodes referenced from within the payload.
    pub const fn references(&self) -> &ReferencedNodes {
        &self.references
    }

    /// The database the node belongs to.
    pub const fn db(&self) -> TrieDatabase {
        self.db
    }

    /// Encodes the message as the ordered 4-field wire list: key, value,
    /// `[key, value]` reference entries ascending by key bytes, and the
    /// database's wire name.
    pub fn encode(&self) -> Bytes {
        let mut stream = RlpStream::new_list(MESSAGE_FIELDS);

        stream.append(&self.key.as_bytes());
        stream.append(&self.value.as_slice());

        stream.begin_list(self.references.len());
        for (key, value) in &self.references {
            stream.begin_list(REFERENCE_FIELDS);
            stream.append(&key.as_bytes());
            stream.append(&value.as_slice());
        }

        stream.append(&self.db.wire_name().as_bytes());

        stream.out().into()
    }

    /// Decodes and validates one wire message.
    ///
    /// Never panics on malformed input; every rejection is an explicit
    /// [`MsgDecodeError`]. Accepts exactly the layout [`encode`] produces:
    /// extra fields, missing fields, or reordered fields reject the whole
    /// message, as do a key of the wrong length, an empty value, an
    /// ill-formed reference entry, or an unrecognized database name.
    ///
    /// [`encode`]: TrieNodeMessage::encode
    pub fn decode(encoding: &[u8]) -> Result<Self, MsgDecodeError> {
        if encoding.is_empty() {
            return Err(MsgDecodeError::Empty);
        }

        let rlp = Rlp::new(encoding);
        if !rlp.is_list() || !matches!(rlp.item_count(), Ok(MESSAGE_FIELDS)) {
            return Err(MsgDecodeError::NotAMessageList);
        }

        let key = decode_hash(&field(&rlp, 0)?).ok_or(MsgDecodeError::BadKey)?;
        let value = decode_payload(&field(&rlp, 1)?).ok_or(MsgDecodeError::BadValue)?;
        let references = decode_references(&field(&rlp, 2)?)?;
        let db = decode_database(&field(&rlp, 3)?)?;

        Ok(Self::new(key, value, references, db))
    }
}

fn field<'a>(rlp: &Rlp<'a>, index: usize) -> Result<Rlp<'a>, MsgDecodeError> {
    rlp.at(index).map_err(|_| MsgDecodeError::NotAMessageList)
}

/// A raw item of exactly [`HASH_LEN`] bytes, or `None`.
fn decode_hash(item: &Rlp<'_>) -> Option<H256> {
    if !item.is_data() {
        return None;
    }
    let data = item.data().ok()?;
    (data.len() == HASH_LEN).then(|| H256::from_slice(data))
}

/// A raw non-empty item, or `None`.
fn decode_payload(item: &Rlp<'_>) -> Option<Vec<u8>> {
    if !item.is_data() {
        return None;
    }
    let data = item.data().ok()?;
    (!data.is_empty()).then(|| data.to_vec())
}

fn decode_references(list: &Rlp<'_>) -> Result<ReferencedNodes, MsgDecodeError> {
    if !list.is_list() {
        return Err(MsgDecodeError::BadReferencePair);
    }
    let count = list
        .item_count()
        .map_err(|_| MsgDecodeError::BadReferencePair)?;

    let mut references = ReferencedNodes::new();
    for index in 0..count {
        let entry = list
            .at(index)
            .map_err(|_| MsgDecodeError::BadReferencePair)?;
        if !entry.is_list() || !matches!(entry.item_count(), Ok(REFERENCE_FIELDS)) {
            return Err(MsgDecodeError::BadReferencePair);
        }

        let key = entry.at(0).map_err(|_| MsgDecodeError::BadReferencePair)?;
        let key = decode_hash(&key).ok_or(MsgDecodeError::BadReferenceKey)?;
        let value = entry.at(1).map_err(|_| MsgDecodeError::BadReferencePair)?;
        let value = decode_payload(&value).ok_or(MsgDecodeError::BadReferenceValue)?;

        references.insert(key, value);
    }

    Ok(references)
}

fn decode_database(item: &Rlp<'_>) -> Result<TrieDatabase, MsgDecodeError> {
    if !item.is_data() {
        return Err(MsgDecodeError::NotAMessageList);
    }
    let raw = item.data().map_err(|_| MsgDecodeError::NotAMessageList)?;

    let name = std::str::from_utf8(raw)
        .map_err(|_| MsgDecodeError::UnknownDatabase(String::from_utf8_lossy(raw).into_owned()))?;
    name.parse()
        .map_err(|e: crate::db::UnknownDatabase| MsgDecodeError::UnknownDatabase(e.0))
}
