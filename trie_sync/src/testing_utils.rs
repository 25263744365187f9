use ethereum_types::H256;
use keccak_hash::keccak;
use rand::{rngs::StdRng, RngCore, SeedableRng};
use rlp::RlpStream;

pub(crate) fn common_setup() {
    // Try init since multiple tests calling `init` will cause an error.
    let _ = pretty_env_logger::try_init();
}

/// A deterministic pseudo-random 32-byte key for the given seed.
pub(crate) fn rand_key(seed: u64) -> H256 {
    let mut bytes = [0; 32];
    StdRng::seed_from_u64(seed).fill_bytes(&mut bytes);
    H256(bytes)
}

/// The content-addressed key of a node value.
pub(crate) fn content_key(value: &[u8]) -> H256 {
    keccak(value)
}

/// Hex-prefix encodes a partial path: flag nibble 2/3 for leaves, 0/1 for
/// extensions, low bit set when the nibble count is odd.
pub(crate) fn hex_prefix(nibbles: &[u8], is_leaf: bool) -> Vec<u8> {
    let flag: u8 = if is_leaf { 2 } else { 0 };

    let (mut out, rest) = match nibbles.len() % 2 == 0 {
        true => (vec![flag << 4], nibbles),
        false => (vec![((flag | 1) << 4) | nibbles[0]], &nibbles[1..]),
    };
    for pair in rest.chunks(2) {
        out.push((pair[0] << 4) | pair[1]);
    }

    out
}

/// RLP encoding of a leaf node holding `value` under `path`.
pub(crate) fn leaf_node(path: &[u8], value: &[u8]) -> Vec<u8> {
    let mut stream = RlpStream::new_list(2);
    stream.append(&hex_prefix(path, true).as_slice());
    stream.append(&value);
    stream.out().to_vec()
}

/// RLP encoding of an extension node pointing at `child` (raw child slot
/// bytes, typically a 32-byte hash).
pub(crate) fn extension_node(path: &[u8], child: &[u8]) -> Vec<u8> {
    let mut stream = RlpStream::new_list(2);
    stream.append(&hex_prefix(path, false).as_slice());
    stream.append(&child);
    stream.out().to_vec()
}

/// RLP encoding of a branch node with hashed children in the given slots
/// (0..16) and `value` in the 17th field. Unlisted slots stay empty.
pub(crate) fn branch_node(children: &[(usize, [u8; 32])], value: &[u8]) -> Vec<u8> {
    let mut stream = RlpStream::new_list(17);

    for slot in 0..16 {
        match children.iter().find(|(s, _)| *s == slot) {
            Some((_, hash)) => stream.append(&hash.as_slice()),
            None => stream.append_empty_data(),
        };
    }
    match value.is_empty() {
        false => stream.append(&value),
        true => stream.append_empty_data(),
    };

    stream.out().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_prefix_flags_and_parity() {
        assert_eq!(hex_prefix(&[], false), vec![0x00]);
        assert_eq!(hex_prefix(&[1, 2], false), vec![0x00, 0x12]);
        assert_eq!(hex_prefix(&[1], false), vec![0x11]);
        assert_eq!(hex_prefix(&[1, 2], true), vec![0x20, 0x12]);
        assert_eq!(hex_prefix(&[1], true), vec![0x31]);
    }
}
