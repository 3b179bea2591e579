//! Core types for Rift
//!
//! This crate defines the foundational types shared across the engine:
//! - FileCategory / LiveFileRef: classification of engine-owned files
//! - WalSegmentRef: write-ahead-log segment descriptors
//! - ConsistencyWatermark: the (sequence, manifest size) pair a
//!   checkpoint is pinned to
//! - Error: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod filename;
pub mod types;

pub use error::{Error, Result};
pub use filename::{parse_file_name, FileCategory, LiveFileRef};
pub use types::{ConsistencyWatermark, WalSegmentLiveness, WalSegmentRef};
