//! Extraction of child-node references from a trie node's RLP encoding.
//!
//! During sync a supplying peer walks the node it is about to send and
//! collects the hashes of the children embedded in it, so the receiver
//! knows what to request next. Only hash references count: children whose
//! encoding is shorter than 32 bytes are inlined in the parent and need no
//! separate fetch.

use std::collections::BTreeSet;

use ethereum_types::H256;
use rlp::Rlp;

use crate::{db::TrieDb, message::ReferencedNodes};

/// Length of a content-addressed node key, in bytes.
pub(crate) const HASH_LEN: usize = 32;

/// Structural shape of an encoded trie node.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum NodeShape {
    /// Two fields: hex-prefixed partial path and an inline value.
    Leaf,
    /// Two fields: hex-prefixed partial path and a single child.
    Extension,
    /// Seventeen fields: sixteen child slots and a value.
    Branch,
}

impl NodeShape {
    /// Classifies `node` by its top-level RLP structure, or `None` for
    /// anything that is not a recognizable leaf, extension, or branch
    /// encoding.
    pub fn classify(node: &[u8]) -> Option<Self> {
        let rlp = Rlp::new(node);
        if !rlp.is_list() {
            return None;
        }

        match rlp.item_count().ok()? {
            2 => {
                let path = rlp.at(0).ok()?;
                if !path.is_data() {
                    return None;
                }
                // The high nibble of the first path byte is the hex-prefix
                // flag: 0/1 marks an extension, 2/3 a leaf.
                match path.data().ok()?.first()? >> 4 {
                    0 | 1 => Some(NodeShape::Extension),
                    2 | 3 => Some(NodeShape::Leaf),
                    _ => None,
                }
            }
            17 => Some(NodeShape::Branch),
            _ => None,
        }
    }
}

/// Collects the keys of the child nodes referenced from within `node`.
///
/// A pure function of the node bytes. A leaf never points elsewhere. An
/// extension contributes its child when the child slot holds exactly 32
/// raw bytes. A branch contributes each of its 16 child slots
/// independently, under the same rule. Empty slots, inlined children, and
/// unrecognized shapes contribute nothing; extraction never fails, and
/// rejecting a malformed encompassing message is the caller's concern.
pub fn referenced_keys(node: &[u8]) -> BTreeSet<H256> {
    let mut refs = BTreeSet::new();
    let rlp = Rlp::new(node);

    match NodeShape::classify(node) {
        Some(NodeShape::Extension) => {
            if let Ok(child) = rlp.at(1) {
                insert_if_hash(&mut refs, &child);
            }
        }
        Some(NodeShape::Branch) => {
            for slot in 0..16 {
                if let Ok(child) = rlp.at(slot) {
                    insert_if_hash(&mut refs, &child);
                }
            }
        }
        Some(NodeShape::Leaf) | None => (),
    }

    refs
}

fn insert_if_hash(refs: &mut BTreeSet<H256>, child: &Rlp<'_>) {
    if !child.is_data() {
        return;
    }
    if let Ok(data) = child.data() {
        if data.len() == HASH_LEN {
            refs.insert(H256::from_slice(data));
        }
    }
}

/// Supplier-side helper: resolves each key referenced from `node` to its
/// value in the local store, omitting keys the store does not hold.
pub fn collect_referenced_nodes(db: &dyn TrieDb, node: &[u8]) -> ReferencedNodes {
    referenced_keys(node)
        .into_iter()
        .filter_map(|key| db.get(&key).map(|value| (key, value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use rlp::RlpStream;

    use super::*;
    use crate::{
        db::MemoryTrieDb,
        testing_utils::{branch_node, common_setup, extension_node, leaf_node, rand_key},
    };

    #[test]
    fn shapes_are_recognized() {
        common_setup();

        assert_eq!(
            NodeShape::classify(&leaf_node(&[3, 7], b"payload")),
            Some(NodeShape::Leaf)
        );
        assert_eq!(
            NodeShape::classify(&extension_node(&[0, 5], &[8; 32])),
            Some(NodeShape::Extension)
        );
        assert_eq!(
            NodeShape::classify(&branch_node(&[(0, [1; 32])], &[])),
            Some(NodeShape::Branch)
        );
    }

    #[test]
    fn malformed_shapes_are_unrecognized() {
        // Not a list.
        assert_eq!(NodeShape::classify(&rlp::encode(&b"data".as_slice())), None);
        // Wrong item counts.
        for count in [0, 1, 3, 16, 18] {
            let mut stream = RlpStream::new_list(count);
            for _ in 0..count {
                stream.append_empty_data();
            }
            assert_eq!(NodeShape::classify(&stream.out()), None);
        }
        // Invalid hex-prefix flag nibble.
        let mut stream = RlpStream::new_list(2);
        stream.append(&[0x40u8].as_slice());
        stream.append(&b"payload".as_slice());
        assert_eq!(NodeShape::classify(&stream.out()), None);
        // Garbage.
        assert_eq!(NodeShape::classify(&[]), None);
        assert_eq!(NodeShape::classify(&[0xff, 0x00, 0x13]), None);
    }

    #[test]
    fn leaves_reference_nothing() {
        assert!(referenced_keys(&leaf_node(&[1, 2, 3], b"account")).is_empty());
    }

    #[test]
    fn extension_references_its_hashed_child() {
        let child = rand_key(4);
        let refs = referenced_keys(&extension_node(&[0xa], child.as_bytes()));

        assert_eq!(refs, BTreeSet::from([child]));
    }

    #[test]
    fn inlined_extension_child_needs_no_fetch() {
        // A child encoding shorter than 32 bytes is stored inline.
        assert!(referenced_keys(&extension_node(&[0xa], &[5; 20])).is_empty());

        // So is a nested (already decoded) child node.
        let mut stream = RlpStream::new_list(2);
        stream.append(&[0x10u8].as_slice());
        stream.append_raw(&leaf_node(&[7], b"x"), 1);
        assert!(referenced_keys(&stream.out()).is_empty());
    }

    #[test]
    fn branch_references_exactly_its_hashed_slots() {
        let (first, second) = (rand_key(1), rand_key(2));
        let node = branch_node(&[(2, first.0), (11, second.0)], b"value");

        assert_eq!(referenced_keys(&node), BTreeSet::from([first, second]));
    }

    #[test]
    fn empty_branch_references_nothing() {
        assert!(referenced_keys(&branch_node(&[], &[])).is_empty());
    }

    #[test]
    fn extraction_is_deterministic() {
        let node = branch_node(&[(0, [3; 32]), (9, [4; 32]), (15, [5; 32])], &[]);

        assert_eq!(referenced_keys(&node), referenced_keys(&node));
    }

    #[test]
    fn collect_resolves_only_locally_known_references() {
        let db = MemoryTrieDb::new();
        let (held, missing) = (rand_key(8), rand_key(9));
        let held_value = leaf_node(&[4], b"held");

        assert_eq!(db.put_if_absent(held, held_value.clone()), None);

        let node = branch_node(&[(1, held.0), (6, missing.0)], &[]);
        let resolved = collect_referenced_nodes(&db, &node);

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved.get(&held), Some(&held_value));
    }
}
