//! Engine file naming and classification
//!
//! The engine names every file it owns by a fixed scheme:
//!
//! - `NNNNNN.sst`: table file
//! - `NNNNNN.sbk`: table side block (bloom/index data kept beside a table)
//! - `MANIFEST-NNNNNN`: descriptor recording the current table set
//! - `CURRENT`: pointer to the active descriptor
//!
//! Live-file listings hand these names out prefixed with `/`, relative to
//! the engine base directory. A name that does not match the scheme is a
//! corruption signal: the engine's own bookkeeping produced it, so a parse
//! failure means the bookkeeping is inconsistent, not that the input was
//! merely invalid.

/// Category of an engine-owned live file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileCategory {
    /// Sorted table file (`NNNNNN.sst`)
    Table,
    /// Side block kept beside a table (`NNNNNN.sbk`)
    TableSideBlock,
    /// Manifest / descriptor file (`MANIFEST-NNNNNN`)
    Descriptor,
    /// Current-descriptor pointer (`CURRENT`)
    Current,
}

/// A classified entry from a live-file listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveFileRef {
    /// File number (0 for `CURRENT`, which carries none)
    pub number: u64,
    /// Parsed category
    pub category: FileCategory,
    /// Name as supplied by the listing, leading `/` included
    pub name: String,
}

/// Parse a live-file name into its number and category
///
/// Accepts names with or without the leading `/` the engine prefixes
/// listing entries with. Returns `None` for names outside the engine's
/// naming scheme; callers treat that as corruption.
pub fn parse_file_name(name: &str) -> Option<(u64, FileCategory)> {
    let base = name.strip_prefix('/').unwrap_or(name);

    if base == "CURRENT" {
        return Some((0, FileCategory::Current));
    }

    if let Some(digits) = base.strip_prefix("MANIFEST-") {
        let number = parse_decimal(digits)?;
        return Some((number, FileCategory::Descriptor));
    }

    if let Some(digits) = base.strip_suffix(".sst") {
        let number = parse_decimal(digits)?;
        return Some((number, FileCategory::Table));
    }

    if let Some(digits) = base.strip_suffix(".sbk") {
        let number = parse_decimal(digits)?;
        return Some((number, FileCategory::TableSideBlock));
    }

    None
}

fn parse_decimal(digits: &str) -> Option<u64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

impl LiveFileRef {
    /// Classify a raw listing entry
    ///
    /// Returns `None` when the name is outside the naming scheme.
    pub fn classify(name: &str) -> Option<LiveFileRef> {
        let (number, category) = parse_file_name(name)?;
        Some(LiveFileRef {
            number,
            category,
            name: name.to_string(),
        })
    }
}
