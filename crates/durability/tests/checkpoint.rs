//! End-to-end checkpoint tests against a real filesystem

use std::fs;
use std::path::Path;

use rift_core::WalSegmentLiveness;
use rift_durability::testing::{InstrumentedEnv, MemEngine};
use rift_durability::{CheckpointBuilder, EngineHandle, StdEnv};
use tempfile::TempDir;

#[cfg(unix)]
fn link_count(path: &Path) -> u64 {
    use std::os::unix::fs::MetadataExt;
    fs::metadata(path).unwrap().nlink()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// The reference scenario: one table, a manifest pinned at 500 bytes,
/// watermark 42, and WAL segments starting at 40 (100 bytes) and 45
/// (the 10-byte tail).
fn reference_engine(root: &Path) -> MemEngine {
    let engine = MemEngine::new(root).unwrap();
    engine.add_table_file(10, b"sorted table payload").unwrap();
    engine.set_manifest(1, &vec![b'm'; 500], 500).unwrap();
    engine.set_current(b"MANIFEST-000001\n").unwrap();
    engine.set_sequence(42);
    engine
        .add_wal_segment(40, WalSegmentLiveness::Alive, &vec![b'w'; 100])
        .unwrap();
    engine
        .add_wal_segment(45, WalSegmentLiveness::Alive, &vec![b'x'; 10])
        .unwrap();
    engine
}

#[test]
fn reference_scenario_materializes_as_specified() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let engine = reference_engine(temp_dir.path());
    let env = StdEnv::new();
    let target = temp_dir.path().join("snap");

    CheckpointBuilder::new(&engine, &env)
        .create_checkpoint(&target)
        .unwrap();

    assert_eq!(
        fs::read(target.join("000010.sst")).unwrap(),
        b"sorted table payload"
    );
    assert_eq!(fs::metadata(target.join("MANIFEST-000001")).unwrap().len(), 500);
    assert_eq!(fs::metadata(target.join("000040.log")).unwrap().len(), 100);
    assert_eq!(fs::metadata(target.join("000045.log")).unwrap().len(), 10);

    #[cfg(unix)]
    {
        // Table and the non-tail WAL segment share their source inode;
        // the tail segment and the manifest are private copies.
        assert_eq!(link_count(&target.join("000010.sst")), 2);
        assert_eq!(link_count(&target.join("000040.log")), 2);
        assert_eq!(link_count(&target.join("000045.log")), 1);
        assert_eq!(link_count(&target.join("MANIFEST-000001")), 1);
    }
}

#[test]
fn checkpoint_survives_source_mutation_after_install() {
    let temp_dir = TempDir::new().unwrap();
    let engine = reference_engine(temp_dir.path());
    let env = StdEnv::new();
    let target = temp_dir.path().join("snap");

    CheckpointBuilder::new(&engine, &env)
        .create_checkpoint(&target)
        .unwrap();

    // Tail-segment copy is immune to later appends on the live file.
    let live_tail = engine.wal_directory().join("000045.log");
    let mut grown = fs::read(&live_tail).unwrap();
    grown.extend_from_slice(&[b'y'; 50]);
    fs::write(&live_tail, grown).unwrap();

    assert_eq!(fs::metadata(target.join("000045.log")).unwrap().len(), 10);
}

#[test]
fn cross_device_checkpoint_is_all_copies() {
    let temp_dir = TempDir::new().unwrap();
    let engine = reference_engine(temp_dir.path());
    let env = InstrumentedEnv::new();
    env.deny_links(true);
    let target = temp_dir.path().join("snap");

    CheckpointBuilder::new(&engine, &env)
        .create_checkpoint(&target)
        .unwrap();

    #[cfg(unix)]
    {
        assert_eq!(link_count(&target.join("000010.sst")), 1);
        assert_eq!(link_count(&target.join("000040.log")), 1);
    }
    assert_eq!(
        fs::read(target.join("000010.sst")).unwrap(),
        b"sorted table payload"
    );
}

#[test]
fn concurrent_checkpoints_to_distinct_targets_succeed() {
    let temp_dir = TempDir::new().unwrap();
    let engine = reference_engine(temp_dir.path());
    let env = StdEnv::new();

    std::thread::scope(|scope| {
        for index in 0..4 {
            let engine = &engine;
            let env = &env;
            let target = temp_dir.path().join(format!("snap-{index}"));
            scope.spawn(move || {
                CheckpointBuilder::new(engine, env)
                    .create_checkpoint(&target)
                    .unwrap();
            });
        }
    });

    for index in 0..4 {
        let target = temp_dir.path().join(format!("snap-{index}"));
        assert!(target.join("000010.sst").exists());
        assert!(!temp_dir.path().join(format!("snap-{index}.tmp")).exists());
    }
    // Every suppression window was released.
    assert_eq!(engine.suppression_depth(), 0);
}

#[test]
fn same_target_race_fails_cleanly_for_the_loser() {
    let temp_dir = TempDir::new().unwrap();
    let engine = reference_engine(temp_dir.path());
    let env = StdEnv::new();
    let target = temp_dir.path().join("snap");
    let builder = CheckpointBuilder::new(&engine, &env);

    builder.create_checkpoint(&target).unwrap();
    let err = builder.create_checkpoint(&target).unwrap_err();

    assert!(matches!(
        err,
        rift_durability::CheckpointError::AlreadyExists(_)
    ));
    // The winner's checkpoint is untouched.
    assert_eq!(
        fs::read(target.join("000010.sst")).unwrap(),
        b"sorted table payload"
    );
}
