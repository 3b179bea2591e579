//! File placement strategy
//!
//! Pure decision table mapping a materialization target and the
//! currently-discovered filesystem capability to an action. No I/O here;
//! the policy (which targets are linkable, which are always copied,
//! which are size-limited) is testable without touching a filesystem.
//!
//! Rules, from the engine's materialization contract:
//! - tables and side blocks are immutable and shared, so they hard-link
//!   while the destination is on the same device
//! - the descriptor is copied and limited to the pinned size, so the
//!   snapshot's manifest never references state beyond the watermark
//! - CURRENT is tiny and always copied in full
//! - the tail WAL segment is still being appended to, so it is copied
//!   at the size recorded at enumeration time, never linked
//! - non-tail WAL segments behave like tables

/// What to materialize, with the sizing inputs the decision needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementTarget {
    /// Sorted table file
    Table,
    /// Table side block
    TableSideBlock,
    /// Manifest, with the size pinned at watermark capture
    Descriptor {
        /// Bytes of the manifest the watermark covers
        pinned_size: u64,
    },
    /// Current-descriptor pointer
    Current,
    /// WAL segment
    WalSegment {
        /// True for the highest qualifying (still-growing) segment
        tail: bool,
        /// Segment size recorded at enumeration time
        size_bytes: u64,
    },
}

/// How to materialize a file into the staging directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    /// Hard-link the source into staging
    Link,
    /// Copy the whole file
    CopyFull,
    /// Copy at most this many bytes
    CopyTruncated(u64),
}

/// Decide the materialization action for one target
///
/// `same_device` is the caller's one-way capability flag: `true` until a
/// link attempt reports unsupported, `false` afterwards for the rest of
/// the checkpoint call.
pub fn decide(target: PlacementTarget, same_device: bool) -> FileAction {
    match target {
        PlacementTarget::Table | PlacementTarget::TableSideBlock => {
            if same_device {
                FileAction::Link
            } else {
                FileAction::CopyFull
            }
        }
        PlacementTarget::Descriptor { pinned_size } => FileAction::CopyTruncated(pinned_size),
        PlacementTarget::Current => FileAction::CopyFull,
        PlacementTarget::WalSegment {
            tail: true,
            size_bytes,
        } => FileAction::CopyTruncated(size_bytes),
        PlacementTarget::WalSegment { tail: false, .. } => {
            if same_device {
                FileAction::Link
            } else {
                FileAction::CopyFull
            }
        }
    }
}
