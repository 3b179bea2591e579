//! Engine handle boundary
//!
//! The checkpoint pipeline sees the running engine only through
//! [`EngineHandle`]: watermark capture (sequence number, pinned manifest
//! size, live file listing), WAL segment listing, and the
//! deletion-suppression gate.
//!
//! Deletion suppression is a reference count owned by the engine, not a
//! boolean: overlapping checkpoint calls (and other suppression
//! requesters) each hold their own window, and the gate stays closed
//! until every window is released. [`DeletionGuard`] scopes one window
//! so it is released on every exit path.

use std::path::PathBuf;

use rift_core::{Result, WalSegmentRef};
use tracing::warn;

/// Interface to the live storage engine
///
/// Contract: the live-file listing and the WAL listing, taken while
/// deletion suppression is held, represent one mutually consistent
/// instant. The manifest bytes up to the pinned size reference only
/// files present in the listing, and WAL segments at or after the
/// captured sequence number suffice to recover anything not yet in the
/// listed tables.
pub trait EngineHandle {
    /// Latest sequence number assigned by the write path
    fn latest_sequence_number(&self) -> u64;

    /// Increment the deletion-suppression reference count
    fn disable_file_deletions(&self) -> Result<()>;

    /// Decrement the deletion-suppression reference count
    ///
    /// With `force = true` the count is reset to zero regardless of
    /// other holders.
    fn enable_file_deletions(&self, force: bool) -> Result<()>;

    /// List live files relative to the base directory
    ///
    /// Names carry a leading `/`. With `pin_manifest = true` the engine
    /// also reports the manifest size the listing is consistent with;
    /// the checkpoint copies exactly that many manifest bytes.
    fn live_files(&self, pin_manifest: bool) -> Result<(Vec<String>, u64)>;

    /// List WAL segments, ascending by start sequence
    ///
    /// Sizes are as of enumeration time; for the still-growing tail
    /// segment that recorded size is the one a checkpoint must honor.
    fn sorted_wal_segments(&self) -> Result<Vec<WalSegmentRef>>;

    /// Directory holding tables, manifest, and CURRENT
    fn base_directory(&self) -> PathBuf;

    /// Directory holding WAL segments (may equal the base directory)
    fn wal_directory(&self) -> PathBuf;
}

/// Scoped deletion-suppression window
///
/// Acquiring the guard increments the engine's suppression count;
/// dropping it (or calling [`DeletionGuard::release`]) decrements it.
/// Release failures on the drop path are logged, never propagated.
pub struct DeletionGuard<'a> {
    engine: &'a dyn EngineHandle,
    released: bool,
}

impl<'a> DeletionGuard<'a> {
    /// Open a suppression window on `engine`
    pub fn acquire(engine: &'a dyn EngineHandle) -> Result<Self> {
        engine.disable_file_deletions()?;
        Ok(DeletionGuard {
            engine,
            released: false,
        })
    }

    /// Close the window explicitly
    ///
    /// Errors are logged and swallowed: the window is over either way,
    /// and a release failure must not mask the caller's own outcome.
    pub fn release(mut self) {
        self.released = true;
        if let Err(e) = self.engine.enable_file_deletions(false) {
            warn!(error = %e, "failed to re-enable file deletions");
        }
    }
}

impl Drop for DeletionGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.engine.enable_file_deletions(false) {
                warn!(error = %e, "failed to re-enable file deletions");
            }
        }
    }
}
