// Binary formats shared by signature producers, delta producers and
// patchers (librsync-compatible).
//
// # Modules
//
// - `netint`    : fixed-width big-endian integers
// - `signature` : signature model, header and block records
// - `command`   : delta command model and tag-byte table
// - `delta`     : delta stream writer and reader

pub mod command;
pub mod delta;
pub mod netint;
pub mod signature;

// Re-export key types for convenience.
pub use command::Command;
pub use delta::{DELTA_MAGIC, DeltaReader, DeltaWriter};
pub use signature::{Block, SIG_MAGIC_BLAKE2, SIG_MAGIC_MD4, Signature};
