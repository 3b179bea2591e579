//! Checkpoint builder
//!
//! Orchestrates one consistent on-disk checkpoint of a live engine:
//!
//! 1. Probe the target path; a pre-existing entry is a caller error
//! 2. Open a deletion-suppression window on the engine
//! 3. Capture the watermark, live-file listing, and WAL listing
//! 4. Materialize every captured file into a `.tmp` staging directory,
//!    hard-linking where the filesystem allows and copying otherwise
//! 5. Close the suppression window
//! 6. Atomically rename staging into place and fsync the directory
//!    entries so the rename survives a crash
//!
//! On any failure after the staging directory exists, the staging tree
//! is deleted best-effort and the original error is returned; a failed
//! call leaves no trace under the target name.

use std::io;
use std::path::{Path, PathBuf};

use rift_core::{ConsistencyWatermark, FileCategory, LiveFileRef, WalSegmentRef};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::checkpoint::placement::{self, FileAction, PlacementTarget};
use crate::engine::{DeletionGuard, EngineHandle};
use crate::env::{EnvError, StorageEnv};

/// Suffix appended to the target path for the staging directory.
/// Engine file names never end in `.tmp`, so this cannot collide with a
/// legitimate checkpoint name.
const STAGING_SUFFIX: &str = ".tmp";

/// Errors surfaced by checkpoint creation
///
/// Cross-device link failures never appear here; they are absorbed by
/// the downgrade-to-copy path during materialization.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// The target directory already exists; nothing was mutated
    #[error("checkpoint target already exists: {0}")]
    AlreadyExists(PathBuf),

    /// A filesystem or engine operation failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A live-file name could not be classified; the engine's own
    /// bookkeeping is inconsistent
    #[error("corruption: {0}")]
    Corruption(String),
}

impl From<rift_core::Error> for CheckpointError {
    fn from(e: rift_core::Error) -> Self {
        match e {
            rift_core::Error::Io(e) => CheckpointError::Io(e),
            rift_core::Error::Corruption(msg) => CheckpointError::Corruption(msg),
        }
    }
}

impl From<EnvError> for CheckpointError {
    fn from(e: EnvError) -> Self {
        match e {
            EnvError::Io(e) => CheckpointError::Io(e),
            // Link sites handle Unsupported before it can reach here;
            // this arm covers non-link operations only.
            EnvError::Unsupported(msg) => {
                CheckpointError::Io(io::Error::new(io::ErrorKind::Unsupported, msg))
            }
        }
    }
}

/// Progress of one checkpoint invocation. Nothing persists across calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckpointState {
    Initiated,
    WatermarkCaptured,
    Staging,
    Materializing,
    Installed,
}

/// Everything captured under the suppression window, immutable afterward
struct Capture {
    watermark: ConsistencyWatermark,
    live_files: Vec<String>,
    wal_segments: Vec<WalSegmentRef>,
}

/// Builds openable point-in-time checkpoints of a live engine
pub struct CheckpointBuilder<'a> {
    engine: &'a dyn EngineHandle,
    env: &'a dyn StorageEnv,
}

impl<'a> CheckpointBuilder<'a> {
    /// Create a builder over an engine handle and a storage environment
    pub fn new(engine: &'a dyn EngineHandle, env: &'a dyn StorageEnv) -> Self {
        CheckpointBuilder { engine, env }
    }

    /// Create a checkpoint at `target`
    ///
    /// `target` must not exist. On success it holds a complete, durable,
    /// openable copy of the engine state at the captured watermark. On
    /// failure neither `target` nor the staging directory remains.
    pub fn create_checkpoint(&self, target: &Path) -> Result<(), CheckpointError> {
        let mut state = CheckpointState::Initiated;
        info!(state = ?state, path = %target.display(), "starting checkpoint");

        if self.env.exists(target)? {
            return Err(CheckpointError::AlreadyExists(target.to_path_buf()));
        }

        // Suppression must be active before either listing is taken;
        // the guard releases on every exit path below.
        let guard = DeletionGuard::acquire(self.engine)?;

        let capture = self.capture()?;
        state = CheckpointState::WatermarkCaptured;
        debug!(state = ?state, sequence_number = capture.watermark.sequence_number, "watermark captured");

        let staging = staging_path(target);
        self.env.create_dir(&staging)?;
        state = CheckpointState::Staging;
        debug!(state = ?state, staging = %staging.display(), "staging directory created");

        state = CheckpointState::Materializing;
        let materialized = self.materialize(&staging, &capture);

        // End of the window in which live files must not be deleted;
        // released before the rename on both outcomes.
        guard.release();

        let installed = materialized.and_then(|()| self.install(&staging, target));
        match installed {
            Ok(()) => {
                state = CheckpointState::Installed;
                info!(
                    state = ?state,
                    path = %target.display(),
                    sequence_number = capture.watermark.sequence_number,
                    "checkpoint installed"
                );
                Ok(())
            }
            Err(e) => {
                warn!(state = ?state, error = %e, "checkpoint failed, rolling back staging");
                self.rollback(&staging);
                Err(e)
            }
        }
    }

    /// Capture the watermark and both listings as one consistent pair.
    /// Caller holds deletion suppression across this.
    fn capture(&self) -> Result<Capture, CheckpointError> {
        let sequence_number = self.engine.latest_sequence_number();
        let (live_files, manifest_pinned_size) = self.engine.live_files(true)?;
        let wal_segments = self.engine.sorted_wal_segments()?;

        debug!(
            sequence_number,
            manifest_pinned_size,
            live_files = live_files.len(),
            wal_segments = wal_segments.len(),
            "captured engine state"
        );

        Ok(Capture {
            watermark: ConsistencyWatermark {
                sequence_number,
                manifest_pinned_size,
            },
            live_files,
            wal_segments,
        })
    }

    fn materialize(&self, staging: &Path, capture: &Capture) -> Result<(), CheckpointError> {
        // Same-device capability is rediscovered per call; filesystem
        // topology can change between calls.
        let mut same_device = true;

        let base_dir = self.engine.base_directory();
        for name in &capture.live_files {
            let file = LiveFileRef::classify(name).ok_or_else(|| {
                CheckpointError::Corruption(format!("cannot parse live file name: {name}"))
            })?;

            let target = match file.category {
                FileCategory::Table => PlacementTarget::Table,
                FileCategory::TableSideBlock => PlacementTarget::TableSideBlock,
                FileCategory::Descriptor => PlacementTarget::Descriptor {
                    pinned_size: capture.watermark.manifest_pinned_size,
                },
                FileCategory::Current => PlacementTarget::Current,
            };
            self.materialize_one(&base_dir, &file.name, staging, target, &mut same_device)?;
        }

        let wal_dir = self.engine.wal_directory();
        let segments = &capture.wal_segments;
        let sequence_number = capture.watermark.sequence_number;
        let tail_index =
            (0..segments.len()).rev().find(|&i| wal_qualifies(segments, i, sequence_number));

        for (index, segment) in segments.iter().enumerate() {
            if !wal_qualifies(segments, index, sequence_number) {
                continue;
            }
            let tail = Some(index) == tail_index;
            self.materialize_one(
                &wal_dir,
                &segment.name,
                staging,
                PlacementTarget::WalSegment {
                    tail,
                    size_bytes: segment.size_bytes,
                },
                &mut same_device,
            )?;
            if tail {
                break;
            }
        }

        Ok(())
    }

    /// Execute the placement decision for one file, downgrading
    /// `same_device` (at most once per call) when a link attempt reports
    /// the filesystem cannot link.
    fn materialize_one(
        &self,
        src_dir: &Path,
        name: &str,
        staging: &Path,
        target: PlacementTarget,
        same_device: &mut bool,
    ) -> Result<(), CheckpointError> {
        let rel = name.trim_start_matches('/');
        let src = src_dir.join(rel);
        let dst = staging.join(rel);

        loop {
            match placement::decide(target, *same_device) {
                FileAction::Link => match self.env.link(&src, &dst) {
                    Ok(()) => {
                        debug!(file = rel, "hard linked");
                        return Ok(());
                    }
                    Err(EnvError::Unsupported(reason)) => {
                        debug!(file = rel, reason = %reason, "link unsupported, copying for the rest of this checkpoint");
                        *same_device = false;
                    }
                    Err(EnvError::Io(e)) => return Err(e.into()),
                },
                FileAction::CopyFull => {
                    self.env.copy_range(&src, &dst, None)?;
                    debug!(file = rel, "copied");
                    return Ok(());
                }
                FileAction::CopyTruncated(limit) => {
                    self.env.copy_range(&src, &dst, Some(limit))?;
                    debug!(file = rel, limit, "copied with size limit");
                    return Ok(());
                }
            }
        }
    }

    /// Atomic visibility transition: single rename, then fsync the new
    /// directory and its parent entry.
    ///
    /// If the durability barrier fails after the rename, the rename is
    /// undone so the tree sits under the staging name again and the
    /// caller's rollback removes it; a failed call must not leave a
    /// populated directory under the target name.
    fn install(&self, staging: &Path, target: &Path) -> Result<(), CheckpointError> {
        self.env.rename(staging, target)?;
        if let Err(e) = self.sync_installed(target) {
            if let Err(undo) = self.env.rename(target, staging) {
                warn!(path = %target.display(), error = %undo, "failed to undo checkpoint rename");
                self.rollback(target);
            }
            return Err(e);
        }
        Ok(())
    }

    fn sync_installed(&self, target: &Path) -> Result<(), CheckpointError> {
        self.env.sync_dir(target)?;
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                self.env.sync_dir(parent)?;
            }
        }
        Ok(())
    }

    /// Best-effort removal of the staging tree. Failures are logged,
    /// never propagated: the original error is what the caller observes.
    fn rollback(&self, staging: &Path) {
        match self.env.list_entries(staging) {
            Ok(entries) => {
                for entry in entries {
                    match self.env.delete_file(&entry) {
                        Ok(()) => debug!(path = %entry.display(), "deleted staging entry"),
                        Err(e) => {
                            warn!(path = %entry.display(), error = %e, "failed to delete staging entry")
                        }
                    }
                }
            }
            Err(e) => warn!(path = %staging.display(), error = %e, "failed to list staging directory"),
        }

        match self.env.delete_dir(staging) {
            Ok(()) => debug!(path = %staging.display(), "deleted staging directory"),
            Err(e) => {
                warn!(path = %staging.display(), error = %e, "failed to delete staging directory")
            }
        }
    }
}

/// A WAL segment participates when it can contain sequences at or after
/// the watermark: it is alive and either the last listed segment or its
/// successor starts after the watermark. This keeps the segment that
/// spans the watermark, whose start sequence may be below it.
fn wal_qualifies(segments: &[WalSegmentRef], index: usize, sequence_number: u64) -> bool {
    let segment = &segments[index];
    if !segment.is_alive() {
        return false;
    }
    match segments.get(index + 1) {
        None => true,
        Some(next) => next.start_sequence > sequence_number,
    }
}

fn staging_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(STAGING_SUFFIX);
    PathBuf::from(name)
}
