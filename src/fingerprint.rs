// Structural fingerprints for fragment trees.
//
// A fingerprint is a running SHA-256 digest. Every fold hashes the previous
// digest together with the new parts, so the final value depends on the order
// in which codecs fired, the order of siblings, and the nesting depth.

use std::fmt;

use sha2::{Digest, Sha256};

/// Width of a non-empty fingerprint in bytes.
pub const FINGERPRINT_LEN: usize = 32;

/// Order- and path-sensitive structural hash of a fragment subtree.
///
/// A freshly constructed fragment carries the empty fingerprint. After
/// decomposition, a node whose codecs produced no children keeps the empty
/// value; every other node holds a [`FINGERPRINT_LEN`]-byte digest.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(Vec<u8>);

impl Fingerprint {
    /// The empty fingerprint (no codec has contributed yet).
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Hash `existing || parts[0] || parts[1] || ...` into a new fingerprint.
    pub fn folded(existing: &Fingerprint, parts: &[&[u8]]) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(&existing.0);
        for part in parts {
            hasher.update(part);
        }
        Fingerprint(hasher.finalize().to_vec())
    }

    /// Fold `parts` into `self`, replacing the current value.
    pub fn fold(&mut self, parts: &[&[u8]]) {
        *self = Self::folded(self, parts);
    }

    /// Lowercase hex rendering, empty string for the empty fingerprint.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl AsRef<[u8]> for Fingerprint {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("Fingerprint(empty)")
        } else {
            write!(f, "Fingerprint({})", self.to_hex())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_by_default() {
        let fp = Fingerprint::default();
        assert!(fp.is_empty());
        assert_eq!(fp.to_hex(), "");
        assert_eq!(fp, Fingerprint::empty());
    }

    #[test]
    fn fold_has_fixed_width() {
        let mut fp = Fingerprint::empty();
        fp.fold(&[b"a"]);
        assert_eq!(fp.as_bytes().len(), FINGERPRINT_LEN);
        fp.fold(&[b"much longer input than the digest itself, several times over"]);
        assert_eq!(fp.as_bytes().len(), FINGERPRINT_LEN);
    }

    #[test]
    fn fold_is_concatenation_of_parts() {
        let split = Fingerprint::folded(&Fingerprint::empty(), &[b"ab", b"cd"]);
        let joined = Fingerprint::folded(&Fingerprint::empty(), &[b"abcd"]);
        assert_eq!(split, joined);
    }

    #[test]
    fn fold_depends_on_previous_digest() {
        let base = Fingerprint::folded(&Fingerprint::empty(), &[b"x"]);
        let a = Fingerprint::folded(&base, &[b"y"]);
        let b = Fingerprint::folded(&Fingerprint::empty(), &[b"y"]);
        assert_ne!(a, b);
    }

    #[test]
    fn fold_is_order_sensitive() {
        let mut ab = Fingerprint::empty();
        ab.fold(&[b"a"]);
        ab.fold(&[b"b"]);

        let mut ba = Fingerprint::empty();
        ba.fold(&[b"b"]);
        ba.fold(&[b"a"]);

        assert_ne!(ab, ba);
    }

    #[test]
    fn hex_is_two_lowercase_digits_per_byte() {
        let fp = Fingerprint::folded(&Fingerprint::empty(), &[b"x"]);
        let hex = fp.to_hex();
        assert_eq!(hex.len(), FINGERPRINT_LEN * 2);
        assert!(hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')));
        assert_eq!(hex::decode(&hex).unwrap(), fp.as_bytes());
        assert_eq!(format!("{fp}"), hex);
    }

    #[test]
    fn known_sha256_vector() {
        let fp = Fingerprint::folded(&Fingerprint::empty(), &[b"abc"]);
        assert_eq!(
            fp.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
