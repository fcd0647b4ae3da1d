// High-level operations: signature, delta and patch over generic streams.
//
// Thin orchestration over the `delta` building blocks:
//   - build_signature: basis -> signature bytes
//   - load_signature:  signature bytes -> Signature
//   - compute_delta:   Signature + new -> delta bytes
//   - apply_patch:     basis + delta -> new
//
// The `*_to` variants stream into a caller-supplied sink and return the
// operation statistics.

use std::io::{Read, Seek, Write};

use log::debug;

use crate::cancel::CancelFlag;
use crate::delta::stats::{DeltaStats, PatchStats, SignatureStats};
use crate::delta::{encoder, patcher, signer};
use crate::error::Result;
use crate::format::signature::Signature;
use crate::hash::config::SignatureOptions;
use crate::hash::strong::ChecksumVariant;
use crate::hash::table::BlockIndex;

/// Build the serialized signature of `basis`.
///
/// `strong_len == 0` selects the variant's full digest length.
pub fn build_signature<R: Read>(
    basis: &mut R,
    block_len: u32,
    strong_len: u32,
    variant: ChecksumVariant,
) -> Result<Vec<u8>> {
    let opts = SignatureOptions::new(block_len, strong_len, variant);
    let mut out = Vec::new();
    build_signature_to(basis, &mut out, &opts, None)?;
    Ok(out)
}

/// Build the signature of `basis` and write it to `out`.
pub fn build_signature_to<R: Read, W: Write>(
    basis: &mut R,
    out: &mut W,
    opts: &SignatureOptions,
    cancel: Option<CancelFlag>,
) -> Result<SignatureStats> {
    debug!(
        "signature: block_len={} strong_len={} variant={}",
        opts.block_len, opts.strong_len, opts.variant
    );
    signer::write_signature(basis, out, opts, cancel)
}

/// Parse a serialized signature.
pub fn load_signature<R: Read>(bytes: &mut R) -> Result<Signature> {
    Signature::read_from(bytes)
}

/// Compute the delta turning the signature's basis into `new`.
pub fn compute_delta<R: Read>(signature: &Signature, new: &mut R) -> Result<Vec<u8>> {
    let (out, _) = compute_delta_to(signature, new, Vec::new(), None)?;
    Ok(out)
}

/// Compute the delta and stream it into `out`.
pub fn compute_delta_to<R: Read, W: Write>(
    signature: &Signature,
    new: &mut R,
    out: W,
    cancel: Option<CancelFlag>,
) -> Result<(W, DeltaStats)> {
    let index = BlockIndex::new(signature)?;
    encoder::encode(&index, new, out, cancel)
}

/// Reconstruct the new stream from `basis` and `delta` into `output`.
pub fn apply_patch<B: Read + Seek, R: Read, W: Write + ?Sized>(
    basis: B,
    delta: R,
    output: &mut W,
) -> Result<PatchStats> {
    apply_patch_with_cancel(basis, delta, output, None)
}

pub fn apply_patch_with_cancel<B: Read + Seek, R: Read, W: Write + ?Sized>(
    basis: B,
    delta: R,
    output: &mut W,
    cancel: Option<CancelFlag>,
) -> Result<PatchStats> {
    patcher::apply(basis, delta, output, cancel)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
