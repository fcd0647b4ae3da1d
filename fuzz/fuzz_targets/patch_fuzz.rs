#![no_main]
use libfuzzer_sys::fuzz_target;
use oxirdiff::engine;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must only ever produce errors, never panics.
    let mut out = Vec::new();
    let _ = engine::apply_patch(Cursor::new(&[0u8; 0][..]), data, &mut out);

    // Same again with a real magic and a non-empty basis.
    if data.len() >= 2 {
        let split = data.len() / 2;
        let (basis, body) = data.split_at(split);
        let mut delta = 0x7273_0236u32.to_be_bytes().to_vec();
        delta.extend_from_slice(body);
        out.clear();
        let _ = engine::apply_patch(Cursor::new(basis), &delta[..], &mut out);
    }
});
