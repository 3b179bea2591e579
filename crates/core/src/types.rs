//! Watermark and WAL segment descriptors

/// The consistency point a checkpoint is pinned to
///
/// Captured once per checkpoint call, immutable afterward. The engine
/// guarantees that every file referenced by the first
/// `manifest_pinned_size` bytes of the descriptor is present in the
/// live-file listing taken at the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsistencyWatermark {
    /// Latest sequence number at capture time
    pub sequence_number: u64,
    /// Descriptor size pinned at capture time; the checkpoint copies
    /// exactly this many bytes of the descriptor
    pub manifest_pinned_size: u64,
}

/// Whether a WAL segment is still part of the active log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSegmentLiveness {
    /// Segment is part of the active log
    Alive,
    /// Segment has been moved to the archive
    Archived,
}

/// One entry from a sorted WAL segment listing
///
/// Listings are ordered ascending by `start_sequence`. `size_bytes` is
/// the segment size at enumeration time; for the still-growing tail
/// segment this is the size the checkpoint must materialize, not the
/// size the live file may have grown to since.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalSegmentRef {
    /// First sequence number recorded in the segment
    pub start_sequence: u64,
    /// Active-log membership at enumeration time
    pub liveness: WalSegmentLiveness,
    /// Size in bytes at enumeration time
    pub size_bytes: u64,
    /// Name relative to the WAL directory, leading `/` included
    pub name: String,
}

impl WalSegmentRef {
    /// True when the segment is part of the active log
    pub fn is_alive(&self) -> bool {
        self.liveness == WalSegmentLiveness::Alive
    }
}
