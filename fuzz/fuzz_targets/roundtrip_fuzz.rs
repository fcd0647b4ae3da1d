#![no_main]
use libfuzzer_sys::fuzz_target;
use oxirdiff::engine;
use oxirdiff::hash::ChecksumVariant;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }

    // First two bytes pick the options, the rest splits into basis and new.
    let variant = if data[0] & 1 == 0 {
        ChecksumVariant::Md4
    } else {
        ChecksumVariant::Blake2
    };
    let block_len = u32::from(data[1] % 64) + 1;
    let payload = &data[2..];
    let split = usize::from(data[0] >> 1) % payload.len();
    let (basis, new) = payload.split_at(split);

    let sig_bytes = engine::build_signature(&mut &basis[..], block_len, 0, variant).unwrap();
    let sig = engine::load_signature(&mut &sig_bytes[..]).unwrap();
    let delta = engine::compute_delta(&sig, &mut &new[..]).unwrap();

    let mut out = Vec::new();
    engine::apply_patch(Cursor::new(basis), &delta[..], &mut out).unwrap();
    assert_eq!(out, new);
});
