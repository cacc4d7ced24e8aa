//! Interface identifiers.
//!
//! An [`InterfaceId`] is a 64-bit value derived from a human-chosen name. The
//! derivation is the byte hash used by the GNU C++ standard library for
//! `std::hash<std::string>` (a 64-bit MurmurHash2 variant with a fixed seed),
//! which keeps identifiers stable across builds and toolchains and lets them be
//! computed in `const` context.

use core::fmt;

/// Multiplier of the 64-bit MurmurHash2 variant.
const MUL: u64 = (0xc6a4a793_u64 << 32) + 0x5bd1e995;

/// Seed used for string hashing.
const SEED: u64 = 0xc70f6907;

/// Final avalanche step of the hash.
const fn shift_mix(v: u64) -> u64 {
    v ^ (v >> 47)
}

/// Hashes `bytes` with the 64-bit MurmurHash2 variant.
const fn hash_bytes(bytes: &[u8], seed: u64) -> u64 {
    let len = bytes.len();
    let aligned = len & !0x7;
    let mut hash = seed ^ (len as u64).wrapping_mul(MUL);

    let mut offset = 0;
    while offset < aligned {
        let block = u64::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
            bytes[offset + 4],
            bytes[offset + 5],
            bytes[offset + 6],
            bytes[offset + 7],
        ]);
        let data = shift_mix(block.wrapping_mul(MUL)).wrapping_mul(MUL);
        hash ^= data;
        hash = hash.wrapping_mul(MUL);
        offset += 8;
    }

    if len & 0x7 != 0 {
        // The tail is folded starting from its last byte.
        let mut data: u64 = 0;
        let mut index = len;
        while index > aligned {
            index -= 1;
            data = (data << 8).wrapping_add(bytes[index] as u64);
        }
        hash ^= data;
        hash = hash.wrapping_mul(MUL);
    }

    hash = shift_mix(hash).wrapping_mul(MUL);
    shift_mix(hash)
}

/// Identifier of an interface type.
///
/// Identifiers belong to interface *types*, never to instances. Two interface
/// types that are meant to be the same contract must be declared with the same
/// name; unrelated interfaces must use distinct names, since the scheme is
/// deterministic but not collision free.
///
/// Identifiers computed from names are stable across builds, but they are not
/// intended as an on-disk format.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct InterfaceId(u64);

impl InterfaceId {
    /// Derives the identifier for the interface named `name`.
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        Self(hash_bytes(name.as_bytes(), SEED))
    }

    /// Wraps an already computed identifier value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier value.
    #[must_use]
    pub const fn to_raw(self) -> u64 {
        self.0
    }

    /// Compares two identifiers, usable in `const` context.
    #[must_use]
    pub const fn equals(self, other: Self) -> bool {
        self.0 == other.0
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

impl fmt::Debug for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InterfaceId({:#018x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;

    use super::*;

    #[test]
    fn test_known_hashes() {
        assert_eq!(InterfaceId::from_name("").to_raw(), 0x553e93901e462a6e);
        assert_eq!(InterfaceId::from_name(" ").to_raw(), 0xf8e5e1651bd01df3);
        assert_eq!(
            InterfaceId::from_name("B4FF784E-2DDA-4CA2-BC84-4AAD35FCAAF3").to_raw(),
            0xdc1bb37e5ceab0cb
        );
        assert_eq!(
            InterfaceId::from_name("632B176F-E7B9-4557-9657-15DB3AC94FBC").to_raw(),
            0x3137d9e333ec18e0
        );
        assert_eq!(
            InterfaceId::from_name("B7914714-4159-48C6-BFF3-A21C6F0BB1CA").to_raw(),
            0xddde57c5e192042a
        );
    }

    #[test]
    fn test_const_evaluation() {
        const A: InterfaceId = InterfaceId::from_name("com.example.IFoo");
        const B: InterfaceId = InterfaceId::from_name("com.example.IBar");
        const SAME: bool = A.equals(InterfaceId::from_name("com.example.IFoo"));

        assert!(SAME);
        assert!(!A.equals(B));
        assert_eq!(A, InterfaceId::from_raw(A.to_raw()));
    }

    #[test]
    fn test_tail_lengths_differ() {
        // Block-aligned names and names with short and long tails.
        let names = ["abcdefgh", "abcdefghi", "abcdefghij", "abcdefghijk", "abcdefghijklmno"];
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                assert_ne!(InterfaceId::from_name(a), InterfaceId::from_name(b));
            }
        }
    }

    #[test]
    fn test_formatting() {
        let id = InterfaceId::from_raw(0xab);
        assert_eq!(format!("{id}"), "0x00000000000000ab");
        assert_eq!(format!("{id:?}"), "InterfaceId(0x00000000000000ab)");
    }
}
