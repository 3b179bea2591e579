//! Durability layer for Rift
//!
//! This crate handles everything that touches disk:
//!
//! - Checkpoints: consistent, openable, point-in-time copies of a live
//!   engine (hard-link where possible, copy across filesystem
//!   boundaries, atomic install)
//! - Storage environment abstraction (injectable filesystem boundary)
//! - Engine handle boundary (watermark capture, deletion suppression)
//! - Test support (scripted engine, instrumented environment)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
pub mod engine;
pub mod env;
pub mod testing;

pub use checkpoint::{decide, CheckpointBuilder, CheckpointError, FileAction, PlacementTarget};
pub use engine::{DeletionGuard, EngineHandle};
pub use env::{EnvError, EnvResult, StdEnv, StorageEnv};
