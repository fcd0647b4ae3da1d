use std::io::Cursor;

use oxirdiff::engine;
use oxirdiff::hash::ChecksumVariant;

#[derive(Debug)]
struct Vector {
    name: &'static str,
    basis: &'static [u8],
    new: &'static [u8],
    block_len: u32,
    delta: &'static str,
}

// Byte-exact deltas (hex) as librsync lays them out.
const VECTORS: &[Vector] = &[
    Vector {
        name: "identical",
        basis: b"ABCDEFGH",
        new: b"ABCDEFGH",
        block_len: 4,
        delta: "72730236 450008 00",
    },
    Vector {
        name: "literal-copy-literal",
        basis: b"ABCDEFGH",
        new: b"XXABCDEFGHYY",
        block_len: 4,
        delta: "72730236 025858 450008 025959 00",
    },
    Vector {
        name: "disjoint",
        basis: b"ABCDEFGH",
        new: b"zz",
        block_len: 4,
        delta: "72730236 027a7a 00",
    },
    Vector {
        name: "empty-new",
        basis: b"ABCDEFGH",
        new: b"",
        block_len: 4,
        delta: "72730236 00",
    },
    Vector {
        name: "empty-basis",
        basis: b"",
        new: b"hello",
        block_len: 4,
        delta: "72730236 0568656c6c6f 00",
    },
    Vector {
        name: "reordered-blocks",
        basis: b"ABCDEFGH",
        new: b"EFGHABCD",
        block_len: 4,
        delta: "72730236 450404 450004 00",
    },
    Vector {
        name: "literal-then-tail",
        basis: b"ABCDEFGHIJ",
        new: b"IJABCD",
        block_len: 4,
        delta: "72730236 02494a 450004 00",
    },
];

fn hex_to_bytes(s: &str) -> Vec<u8> {
    let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    assert!(
        s.len().is_multiple_of(2),
        "hex string must have even length"
    );
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}

fn delta_for(basis: &[u8], new: &[u8], block_len: u32, variant: ChecksumVariant) -> Vec<u8> {
    let sig_bytes = engine::build_signature(&mut &basis[..], block_len, 0, variant).unwrap();
    let sig = engine::load_signature(&mut &sig_bytes[..]).unwrap();
    engine::compute_delta(&sig, &mut &new[..]).unwrap()
}

#[test]
fn vector_table_is_non_empty() {
    assert!(!VECTORS.is_empty());
}

#[test]
fn encoder_matches_all_vectors() {
    for v in VECTORS {
        for variant in ChecksumVariant::ALL {
            let delta = delta_for(v.basis, v.new, v.block_len, variant);
            assert_eq!(delta, hex_to_bytes(v.delta), "vector {} ({variant})", v.name);
        }
    }
}

#[test]
fn patcher_replays_all_vectors() {
    for v in VECTORS {
        let mut out = Vec::new();
        engine::apply_patch(Cursor::new(v.basis), &hex_to_bytes(v.delta)[..], &mut out)
            .unwrap_or_else(|e| panic!("vector {}: {e}", v.name));
        assert_eq!(out, v.new, "vector {}", v.name);
    }
}

#[test]
fn blake2_signature_bytes() {
    let sig = engine::build_signature(&mut &b"ABCDEFGHIJ"[..], 4, 8, ChecksumVariant::Blake2)
        .unwrap();
    assert_eq!(
        sig,
        hex_to_bytes(
            "72730137 00000004 00000008
             03ca0186 58c7dab691f514e0
             03f20196 db80b2e5a50b4eba
             013900d1 d2343faa68c9680c"
        )
    );
}

#[test]
fn md4_signature_bytes() {
    let sig =
        engine::build_signature(&mut &b"ABCDEFGHIJ"[..], 4, 0, ChecksumVariant::Md4).unwrap();
    assert_eq!(
        sig,
        hex_to_bytes(
            "72730136 00000004 00000010
             03ca0186 3f2c0aa4c07611846ea33f44a8cc9e32
             03f20196 3265738426f0e4ad54831a080ff7f095
             013900d1 fa1ac5816b9633ba35027f6e1c483640"
        )
    );
}

#[test]
fn long_literal_uses_explicit_length() {
    let new = vec![b'x'; 100];
    let delta = delta_for(b"", &new, 4, ChecksumVariant::Blake2);
    assert_eq!(&delta[..6], &hex_to_bytes("72730236 41 64")[..]);
    assert_eq!(&delta[6..106], &new[..]);
    assert_eq!(delta[106], 0x00);
    assert_eq!(delta.len(), 107);
}
