//! Consistent on-disk checkpoints
//!
//! A checkpoint is an openable point-in-time copy of the engine's state
//! under a caller-chosen directory: the live tables (hard-linked where
//! the filesystem allows), the manifest truncated to its pinned size,
//! the CURRENT pointer, and the WAL segments needed to recover anything
//! not yet in the tables.

mod builder;
mod placement;

pub use builder::{CheckpointBuilder, CheckpointError};
pub use placement::{decide, FileAction, PlacementTarget};
