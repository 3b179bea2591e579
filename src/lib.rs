//! RiftDB - embedded LSM storage engine
//!
//! This facade re-exports the public API of the member crates. The
//! checkpoint subsystem is the main entry point here:
//!
//! ```ignore
//! use riftdb::{CheckpointBuilder, StdEnv};
//!
//! let env = StdEnv::new();
//! let builder = CheckpointBuilder::new(&engine, &env);
//! builder.create_checkpoint(Path::new("/backups/snap-001"))?;
//! ```

pub use rift_core::{
    parse_file_name, ConsistencyWatermark, Error, FileCategory, LiveFileRef, Result,
    WalSegmentLiveness, WalSegmentRef,
};
pub use rift_durability::{
    CheckpointBuilder, CheckpointError, DeletionGuard, EngineHandle, EnvError, FileAction,
    PlacementTarget, StdEnv, StorageEnv,
};
