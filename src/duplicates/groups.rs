//! Size buckets and signature groups.
//!
//! # Overview
//!
//! Grouping happens twice per directory:
//!
//! 1. **By size.** Files are bucketed by exact byte length. Duplicates always
//!    share a size, so a bucket with one member can never collide and is
//!    dropped before any hashing happens.
//! 2. **By signature.** Fingerprinted files are bucketed by
//!    [`SignatureKey`], which carries the signature *kind* and the byte
//!    size as well as the value. An image and a video never land in the
//!    same group even if their hex strings happen to be equal, and neither
//!    do two images of different sizes that look alike.
//!
//! # Example
//!
//! ```
//! use mediavault::scanner::{MediaFile, MediaKind};
//! use mediavault::duplicates::group_by_size;
//! use std::path::PathBuf;
//! use std::time::SystemTime;
//!
//! let files = vec![
//!     MediaFile::new(PathBuf::from("/d/a.jpg"), 1024, SystemTime::now(), MediaKind::Raster),
//!     MediaFile::new(PathBuf::from("/d/b.jpg"), 1024, SystemTime::now(), MediaKind::Raster),
//!     MediaFile::new(PathBuf::from("/d/c.mp4"), 2048, SystemTime::now(), MediaKind::Opaque),
//! ];
//!
//! let (groups, stats) = group_by_size(files);
//!
//! assert_eq!(stats.total_files, 3);
//! assert_eq!(stats.potential_duplicates, 2);
//! assert_eq!(groups.len(), 1);
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::scanner::{FileSignature, MediaFile, SignatureKind};

/// Files sharing one exact byte size.
#[derive(Debug, Clone)]
pub struct SizeGroup {
    /// File size in bytes (shared by all files in this group)
    pub size: u64,
    /// Files with this exact size, in listing order
    pub files: Vec<MediaFile>,
}

impl SizeGroup {
    #[must_use]
    pub fn new(size: u64) -> Self {
        Self {
            size,
            files: Vec::new(),
        }
    }

    /// Add a file to this group.
    ///
    /// # Panics
    ///
    /// Debug assertion fails if file size doesn't match group size.
    pub fn add(&mut self, file: MediaFile) {
        debug_assert_eq!(
            file.size, self.size,
            "File size {} doesn't match group size {}",
            file.size, self.size
        );
        self.files.push(file);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Check if this group has potential duplicates (2+ files).
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        self.files.len() > 1
    }
}

/// Statistics from the size grouping pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupingStats {
    /// Total number of files seen
    pub total_files: usize,
    /// Number of distinct sizes
    pub unique_sizes: usize,
    /// Files in groups of 2+ (these get fingerprinted)
    pub potential_duplicates: usize,
    /// Files dropped because no other file shares their size
    pub eliminated_unique: usize,
    /// Number of size groups with 2+ files
    pub candidate_groups: usize,
}

impl GroupingStats {
    /// Percentage of files eliminated without hashing.
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.eliminated_unique as f64 / self.total_files as f64) * 100.0
        }
    }
}

/// Bucket files by exact size, keeping only buckets with 2+ members.
///
/// Zero-length files are bucketed like any other size: two empty videos
/// are byte-identical, and two empty images fail to decode and are left
/// alone later anyway.
///
/// Groups come back in ascending size order, files within a group in
/// the order they were given.
#[must_use]
pub fn group_by_size(files: impl IntoIterator<Item = MediaFile>) -> (Vec<SizeGroup>, GroupingStats) {
    let mut all_groups: BTreeMap<u64, SizeGroup> = BTreeMap::new();
    let mut stats = GroupingStats::default();

    for file in files {
        stats.total_files += 1;
        all_groups
            .entry(file.size)
            .or_insert_with(|| SizeGroup::new(file.size))
            .add(file);
    }

    stats.unique_sizes = all_groups.len();

    let groups: Vec<SizeGroup> = all_groups
        .into_values()
        .filter(|group| {
            if group.has_duplicates() {
                stats.potential_duplicates += group.len();
                stats.candidate_groups += 1;
                log::debug!(
                    "Size group {} bytes: {} candidates",
                    group.size,
                    group.len()
                );
                true
            } else {
                stats.eliminated_unique += 1;
                log::trace!(
                    "Unique size {}: {}",
                    group.size,
                    group.files[0].path.display()
                );
                false
            }
        })
        .collect();

    log::debug!(
        "Size grouping: {} files -> {} candidates ({:.1}% eliminated)",
        stats.total_files,
        stats.potential_duplicates,
        stats.elimination_rate()
    );

    (groups, stats)
}

/// Grouping key: a signature value qualified by how it was computed and
/// by the exact size of the file it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignatureKey {
    pub kind: SignatureKind,
    pub size: u64,
    pub value: String,
}

impl SignatureKey {
    /// Key for a signature of a `size`-byte file, or `None` if the
    /// signature is empty.
    #[must_use]
    pub fn of(signature: &FileSignature, size: u64) -> Option<Self> {
        if signature.is_empty() {
            return None;
        }
        Some(Self {
            kind: signature.kind,
            size,
            value: signature.value.clone(),
        })
    }
}

/// Files sharing one signature, canonical file first.
#[derive(Debug, Clone)]
pub struct SignatureGroup {
    pub key: SignatureKey,
    /// Sorted by (modification time, path) ascending.
    pub files: Vec<MediaFile>,
}

impl SignatureGroup {
    fn new(key: SignatureKey, mut files: Vec<MediaFile>) -> Self {
        files.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
        Self { key, files }
    }

    /// The file that is kept: oldest modification time, then lowest path.
    #[must_use]
    pub fn canonical(&self) -> Option<&MediaFile> {
        self.files.first()
    }

    /// Every member except the canonical file.
    #[must_use]
    pub fn redundant(&self) -> &[MediaFile] {
        self.files.get(1..).unwrap_or(&[])
    }

    /// Number of copies beyond the canonical one.
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.files.len().saturating_sub(1)
    }

    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }
}

/// Group fingerprinted files by [`SignatureKey`].
///
/// Files of different sizes never share a group, whatever their
/// signatures. Empty signatures are dropped. Only groups with 2+ members
/// are returned, ordered by key.
#[must_use]
pub fn group_by_signature(
    signed: impl IntoIterator<Item = (FileSignature, MediaFile)>,
) -> Vec<SignatureGroup> {
    let mut by_key: BTreeMap<SignatureKey, Vec<MediaFile>> = BTreeMap::new();

    for (signature, file) in signed {
        match SignatureKey::of(&signature, file.size) {
            Some(key) => by_key.entry(key).or_default().push(file),
            None => log::debug!("No signature for {}, leaving it alone", file.path.display()),
        }
    }

    by_key
        .into_iter()
        .filter(|(_, files)| files.len() > 1)
        .map(|(key, files)| SignatureGroup::new(key, files))
        .collect()
}
