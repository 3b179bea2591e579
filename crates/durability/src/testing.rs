//! Testing utilities for the durability layer
//!
//! - [`MemEngine`]: a scripted [`EngineHandle`] over a real directory
//!   tree, with an observable deletion-suppression counter
//! - [`InstrumentedEnv`]: a [`StorageEnv`] wrapper that can deny links
//!   (simulated cross-device), inject failures into chosen operations,
//!   and grow source files between capture and copy

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use rift_core::{Result, WalSegmentLiveness, WalSegmentRef};

use crate::engine::EngineHandle;
use crate::env::{EnvError, EnvResult, StdEnv, StorageEnv};

/// Scripted engine over a real directory tree
///
/// Files registered through the helpers are written under `root/db` and
/// `root/wal` and reported through the [`EngineHandle`] listings exactly
/// as registered, so tests can mutate the files afterwards without the
/// listings noticing (the checkpoint must honor capture-time state).
pub struct MemEngine {
    base_dir: PathBuf,
    wal_dir: PathBuf,
    sequence: AtomicU64,
    suppression: AtomicU64,
    manifest_pinned_size: AtomicU64,
    live_files: Mutex<Vec<String>>,
    wal_segments: Mutex<Vec<WalSegmentRef>>,
}

impl MemEngine {
    /// Create an engine rooted at `root`, with `root/db` and `root/wal`
    pub fn new(root: &Path) -> io::Result<Self> {
        let base_dir = root.join("db");
        let wal_dir = root.join("wal");
        fs::create_dir_all(&base_dir)?;
        fs::create_dir_all(&wal_dir)?;
        Ok(MemEngine {
            base_dir,
            wal_dir,
            sequence: AtomicU64::new(0),
            suppression: AtomicU64::new(0),
            manifest_pinned_size: AtomicU64::new(0),
            live_files: Mutex::new(Vec::new()),
            wal_segments: Mutex::new(Vec::new()),
        })
    }

    /// Set the sequence number reported at capture time
    pub fn set_sequence(&self, sequence: u64) {
        self.sequence.store(sequence, Ordering::Release);
    }

    /// Current deletion-suppression depth
    pub fn suppression_depth(&self) -> u64 {
        self.suppression.load(Ordering::Acquire)
    }

    /// Write and register a table file `NNNNNN.sst`
    pub fn add_table_file(&self, number: u64, contents: &[u8]) -> io::Result<()> {
        self.add_base_file(&format!("/{:06}.sst", number), contents)
    }

    /// Write and register a side block `NNNNNN.sbk`
    pub fn add_side_block(&self, number: u64, contents: &[u8]) -> io::Result<()> {
        self.add_base_file(&format!("/{:06}.sbk", number), contents)
    }

    /// Write and register `MANIFEST-NNNNNN`, pinning `pinned_size`
    pub fn set_manifest(&self, number: u64, contents: &[u8], pinned_size: u64) -> io::Result<()> {
        self.manifest_pinned_size.store(pinned_size, Ordering::Release);
        self.add_base_file(&format!("/MANIFEST-{:06}", number), contents)
    }

    /// Write and register the `CURRENT` pointer
    pub fn set_current(&self, contents: &[u8]) -> io::Result<()> {
        self.add_base_file("/CURRENT", contents)
    }

    /// Register a listing entry without any backing file; for driving
    /// the corruption path with names outside the naming scheme
    pub fn register_raw_file(&self, name: &str) {
        self.live_files.lock().push(name.to_string());
    }

    /// Write and register a WAL segment `NNNNNN.log` named after its
    /// start sequence; the recorded size is the size at registration
    pub fn add_wal_segment(
        &self,
        start_sequence: u64,
        liveness: WalSegmentLiveness,
        contents: &[u8],
    ) -> io::Result<()> {
        let name = format!("/{:06}.log", start_sequence);
        fs::write(self.wal_dir.join(name.trim_start_matches('/')), contents)?;
        self.wal_segments.lock().push(WalSegmentRef {
            start_sequence,
            liveness,
            size_bytes: contents.len() as u64,
            name,
        });
        Ok(())
    }

    fn add_base_file(&self, name: &str, contents: &[u8]) -> io::Result<()> {
        fs::write(self.base_dir.join(name.trim_start_matches('/')), contents)?;
        self.live_files.lock().push(name.to_string());
        Ok(())
    }
}

impl EngineHandle for MemEngine {
    fn latest_sequence_number(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    fn disable_file_deletions(&self) -> Result<()> {
        self.suppression.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn enable_file_deletions(&self, force: bool) -> Result<()> {
        if force {
            self.suppression.store(0, Ordering::Release);
        } else {
            let _ = self
                .suppression
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |depth| {
                    Some(depth.saturating_sub(1))
                });
        }
        Ok(())
    }

    fn live_files(&self, pin_manifest: bool) -> Result<(Vec<String>, u64)> {
        let pinned = if pin_manifest {
            self.manifest_pinned_size.load(Ordering::Acquire)
        } else {
            0
        };
        Ok((self.live_files.lock().clone(), pinned))
    }

    fn sorted_wal_segments(&self) -> Result<Vec<WalSegmentRef>> {
        let mut segments = self.wal_segments.lock().clone();
        segments.sort_by_key(|segment| segment.start_sequence);
        Ok(segments)
    }

    fn base_directory(&self) -> PathBuf {
        self.base_dir.clone()
    }

    fn wal_directory(&self) -> PathBuf {
        self.wal_dir.clone()
    }
}

/// Storage environment operations that can be failure-injected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvOp {
    /// Existence probe
    Exists,
    /// Directory creation
    CreateDir,
    /// Hard link
    Link,
    /// Byte-range copy
    CopyRange,
    /// Atomic rename
    Rename,
    /// File deletion
    DeleteFile,
    /// Directory deletion
    DeleteDir,
    /// Directory listing
    ListEntries,
    /// Directory fsync
    SyncDir,
}

/// Instrumented wrapper around [`StdEnv`]
#[derive(Default)]
pub struct InstrumentedEnv {
    inner: StdEnv,
    deny_links: AtomicBool,
    link_attempts: AtomicU64,
    copy_calls: AtomicU64,
    fail: Mutex<Option<EnvOp>>,
    grow_before_copy: Mutex<Vec<(PathBuf, Vec<u8>)>>,
}

impl InstrumentedEnv {
    /// Create a pass-through instrumented environment
    pub fn new() -> Self {
        InstrumentedEnv::default()
    }

    /// Make every link attempt report unsupported (cross-device)
    pub fn deny_links(&self, deny: bool) {
        self.deny_links.store(deny, Ordering::Release);
    }

    /// Number of link attempts that reached the environment
    pub fn link_attempts(&self) -> u64 {
        self.link_attempts.load(Ordering::Acquire)
    }

    /// Number of copy calls that reached the environment
    pub fn copy_calls(&self) -> u64 {
        self.copy_calls.load(Ordering::Acquire)
    }

    /// Fail every subsequent call of the given operation
    pub fn fail_on(&self, op: EnvOp) {
        *self.fail.lock() = Some(op);
    }

    /// Append `extra` to `src` immediately before it is next copied,
    /// simulating a concurrent writer growing the live file
    pub fn grow_before_copy(&self, src: &Path, extra: Vec<u8>) {
        self.grow_before_copy.lock().push((src.to_path_buf(), extra));
    }

    fn check(&self, op: EnvOp) -> EnvResult<()> {
        if *self.fail.lock() == Some(op) {
            return Err(EnvError::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("injected failure: {:?}", op),
            )));
        }
        Ok(())
    }
}

impl StorageEnv for InstrumentedEnv {
    fn exists(&self, path: &Path) -> EnvResult<bool> {
        self.check(EnvOp::Exists)?;
        self.inner.exists(path)
    }

    fn create_dir(&self, path: &Path) -> EnvResult<()> {
        self.check(EnvOp::CreateDir)?;
        self.inner.create_dir(path)
    }

    fn link(&self, src: &Path, dst: &Path) -> EnvResult<()> {
        self.check(EnvOp::Link)?;
        self.link_attempts.fetch_add(1, Ordering::AcqRel);
        if self.deny_links.load(Ordering::Acquire) {
            return Err(EnvError::Unsupported(format!(
                "link denied: {} -> {}",
                src.display(),
                dst.display()
            )));
        }
        self.inner.link(src, dst)
    }

    fn copy_range(&self, src: &Path, dst: &Path, limit: Option<u64>) -> EnvResult<()> {
        self.check(EnvOp::CopyRange)?;
        self.copy_calls.fetch_add(1, Ordering::AcqRel);

        let mut pending = self.grow_before_copy.lock();
        if let Some(position) = pending.iter().position(|(path, _)| path == src) {
            let (_, extra) = pending.remove(position);
            let mut file = OpenOptions::new().append(true).open(src)?;
            file.write_all(&extra)?;
        }
        drop(pending);

        self.inner.copy_range(src, dst, limit)
    }

    fn rename(&self, src: &Path, dst: &Path) -> EnvResult<()> {
        self.check(EnvOp::Rename)?;
        self.inner.rename(src, dst)
    }

    fn delete_file(&self, path: &Path) -> EnvResult<()> {
        self.check(EnvOp::DeleteFile)?;
        self.inner.delete_file(path)
    }

    fn delete_dir(&self, path: &Path) -> EnvResult<()> {
        self.check(EnvOp::DeleteDir)?;
        self.inner.delete_dir(path)
    }

    fn list_entries(&self, path: &Path) -> EnvResult<Vec<PathBuf>> {
        self.check(EnvOp::ListEntries)?;
        self.inner.list_entries(path)
    }

    fn sync_dir(&self, path: &Path) -> EnvResult<()> {
        self.check(EnvOp::SyncDir)?;
        self.inner.sync_dir(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mem_engine_listings() {
        let temp_dir = TempDir::new().unwrap();
        let engine = MemEngine::new(temp_dir.path()).unwrap();
        engine.add_table_file(7, b"t").unwrap();
        engine.set_manifest(1, b"manifest", 8).unwrap();

        let (files, pinned) = engine.live_files(true).unwrap();
        assert_eq!(files, vec!["/000007.sst", "/MANIFEST-000001"]);
        assert_eq!(pinned, 8);

        let (_, unpinned) = engine.live_files(false).unwrap();
        assert_eq!(unpinned, 0);
    }

    #[test]
    fn test_mem_engine_sorts_wal_segments() {
        let temp_dir = TempDir::new().unwrap();
        let engine = MemEngine::new(temp_dir.path()).unwrap();
        engine
            .add_wal_segment(45, WalSegmentLiveness::Alive, b"b")
            .unwrap();
        engine
            .add_wal_segment(40, WalSegmentLiveness::Alive, b"a")
            .unwrap();

        let segments = engine.sorted_wal_segments().unwrap();
        assert_eq!(segments[0].start_sequence, 40);
        assert_eq!(segments[1].start_sequence, 45);
    }

    #[test]
    fn test_suppression_never_underflows() {
        let temp_dir = TempDir::new().unwrap();
        let engine = MemEngine::new(temp_dir.path()).unwrap();
        engine.enable_file_deletions(false).unwrap();
        assert_eq!(engine.suppression_depth(), 0);
    }

    #[test]
    fn test_instrumented_env_denies_links() {
        let temp_dir = TempDir::new().unwrap();
        let env = InstrumentedEnv::new();
        env.deny_links(true);

        let src = temp_dir.path().join("a");
        fs::write(&src, b"x").unwrap();

        let err = env.link(&src, &temp_dir.path().join("b")).unwrap_err();
        assert!(matches!(err, EnvError::Unsupported(_)));
        assert_eq!(env.link_attempts(), 1);
    }

    #[test]
    fn test_instrumented_env_grows_source_before_copy() {
        let temp_dir = TempDir::new().unwrap();
        let env = InstrumentedEnv::new();

        let src = temp_dir.path().join("a");
        let dst = temp_dir.path().join("b");
        fs::write(&src, b"12345").unwrap();
        env.grow_before_copy(&src, b"67890".to_vec());

        env.copy_range(&src, &dst, Some(5)).unwrap();
        assert_eq!(fs::metadata(&src).unwrap().len(), 10);
        assert_eq!(fs::read(&dst).unwrap(), b"12345");
    }

    #[test]
    fn test_instrumented_env_injects_failures() {
        let temp_dir = TempDir::new().unwrap();
        let env = InstrumentedEnv::new();
        env.fail_on(EnvOp::CreateDir);

        let err = env.create_dir(&temp_dir.path().join("d")).unwrap_err();
        assert!(matches!(err, EnvError::Io(_)));
        // Other operations are unaffected.
        assert!(env.exists(temp_dir.path()).unwrap());
    }
}
