// Checksums and block lookup for rsync-style delta computation.
//
// This module provides:
// - The rolling weak checksum (`rolling`)
// - Truncatable strong checksums, MD4 and BLAKE2 (`strong`)
// - Signature options and size-based recommendations (`config`)
// - The weak-sum block index used while matching (`table`)

pub mod config;
pub mod rolling;
pub mod strong;
pub mod table;

pub use config::SignatureOptions;
pub use rolling::Rollsum;
pub use strong::ChecksumVariant;
pub use table::BlockIndex;
