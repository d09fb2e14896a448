//! Reasoning checkpoints (spec §4.10): observability and post-hoc replay,
//! not correctness.

#![deny(missing_docs)]

mod checkpoint;
mod protocol;

pub use checkpoint::Checkpoint;
pub use protocol::{MemoryProtocol, DEFAULT_MAX_CHECKPOINTS, DEFAULT_THOUGHTS_PER_CHECKPOINT};
