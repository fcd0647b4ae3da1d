//! Oxirdiff: rsync-style signatures, deltas and patches in Rust.
//!
//! Reads and writes librsync's signature and delta formats. The crate
//! provides:
//! - Rolling and strong checksums plus the block index (`hash`)
//! - Signature and delta wire formats (`format`)
//! - Streaming signer, delta encoder and patcher (`delta`)
//! - The four top-level operations (`engine`)
//! - File-oriented helpers with scoped output (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use std::io::Cursor;
//! use oxirdiff::engine;
//! use oxirdiff::hash::ChecksumVariant;
//!
//! let basis = b"hello old world, hello old world";
//! let new = b"hello new world, hello old world";
//!
//! let sig_bytes = engine::build_signature(&mut &basis[..], 8, 0, ChecksumVariant::Blake2).unwrap();
//! let sig = engine::load_signature(&mut &sig_bytes[..]).unwrap();
//! let delta = engine::compute_delta(&sig, &mut &new[..]).unwrap();
//!
//! let mut out = Vec::new();
//! engine::apply_patch(Cursor::new(&basis[..]), &delta[..], &mut out).unwrap();
//! assert_eq!(out, new);
//! ```

pub mod cancel;
pub mod delta;
pub mod engine;
pub mod error;
pub mod format;
pub mod hash;
pub mod io;

#[cfg(feature = "cli")]
pub mod cli;

pub use cancel::CancelFlag;
pub use error::{Error, FormatError, Result};
