// The three rsync-style operations over byte streams.
//
// - `signer`   : basis -> signature
// - `encoder`  : signature + new -> delta (with `pipeline` coalescing)
// - `patcher`  : basis + delta -> new
// - `stats`    : per-operation counters

pub mod encoder;
pub mod patcher;
pub mod pipeline;
pub mod signer;
pub mod stats;

pub use encoder::DeltaEncoder;
pub use patcher::Patcher;
pub use pipeline::CommandCoalescer;
pub use signer::SignatureBuilder;
pub use stats::{DeltaStats, PatchStats, SignatureStats};
