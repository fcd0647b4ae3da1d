#![no_main]
use libfuzzer_sys::fuzz_target;
use oxirdiff::engine;
use oxirdiff::hash::BlockIndex;

fuzz_target!(|data: &[u8]| {
    // Any signature that loads must also index and drive the encoder.
    let Ok(sig) = engine::load_signature(&mut &data[..]) else {
        return;
    };
    assert_eq!(sig.to_bytes(), data);
    if BlockIndex::new(&sig).is_ok() {
        let _ = engine::compute_delta(&sig, &mut &data[..]).unwrap();
    }
});
