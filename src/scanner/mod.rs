//! Media discovery and content fingerprinting.
//!
//! This module provides functionality for:
//! - Listing the immediate media files of a directory
//! - Classifying files as opaque (video-like) or raster (image-like) media
//! - Cryptographic content hashing (SHA-256 or BLAKE3, streamed)
//! - Perceptual image hashing (equalised gradient hash)
//!
//! # Architecture
//!
//! - [`lister`]: directory listing and classification
//! - [`hasher`]: streamed cryptographic hashing
//! - [`perceptual`]: perceptual hashing of decodable images
//! - [`fingerprint`]: the pure file -> [`FileSignature`] function
//!
//! # Example
//!
//! ```no_run
//! use mediavault::scanner::{list_media, MediaClassifier};
//! use std::path::Path;
//!
//! let classifier = MediaClassifier::new(["jpg", "png", "mp4"], ["mp4"], false);
//! let listing = list_media(Path::new("downloads/alice"), &classifier).unwrap();
//! for file in &listing.files {
//!     println!("{} ({:?}, {} bytes)", file.path.display(), file.kind, file.size);
//! }
//! ```

pub mod fingerprint;
pub mod hasher;
pub mod lister;
pub mod perceptual;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

pub use fingerprint::{FileSignature, Fingerprinter, SignatureKind};
pub use hasher::{ContentHasher, HashAlgorithm, DEFAULT_HASH_CHUNK_SIZE};
pub use lister::{list_media, MediaListing};
pub use perceptual::{PerceptualError, PerceptualHasher};

/// Extensions of animated image formats.
///
/// Whether these are fingerprinted as pixels or as bytes is a policy
/// decision, see [`MediaClassifier::new`].
pub const ANIMATED_EXTENSIONS: &[&str] = &["gif"];

/// How a media file is fingerprinted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// High-entropy media (video-like): hashed as an opaque byte stream.
    Opaque,
    /// Low-entropy media (image-like): decoded and hashed perceptually.
    Raster,
}

/// A media file discovered in a directory.
#[derive(Debug, Clone)]
pub struct MediaFile {
    /// Path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: SystemTime,
    /// Fingerprinting class
    pub kind: MediaKind,
}

impl MediaFile {
    /// Create a new MediaFile.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: SystemTime, kind: MediaKind) -> Self {
        Self {
            path,
            size,
            modified,
            kind,
        }
    }

    /// Whether this file is hashed as an opaque byte stream.
    #[must_use]
    pub fn is_high_entropy(&self) -> bool {
        self.kind == MediaKind::Opaque
    }
}

/// Decides which files are media and how each is fingerprinted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaClassifier {
    allowed: BTreeSet<String>,
    opaque: BTreeSet<String>,
}

impl MediaClassifier {
    /// Build a classifier.
    ///
    /// # Arguments
    ///
    /// * `allowed` - Extensions (case-insensitive, with or without dot) to consider at all
    /// * `video` - Extensions treated as opaque, high-entropy media
    /// * `animated_as_video` - Treat [`ANIMATED_EXTENSIONS`] as opaque instead of raster
    #[must_use]
    pub fn new<A, V>(allowed: A, video: V, animated_as_video: bool) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        V: IntoIterator,
        V::Item: AsRef<str>,
    {
        let allowed = allowed
            .into_iter()
            .map(|e| normalize_extension(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        let mut opaque: BTreeSet<String> = video
            .into_iter()
            .map(|e| normalize_extension(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        if animated_as_video {
            opaque.extend(ANIMATED_EXTENSIONS.iter().map(|e| (*e).to_string()));
        }
        Self { allowed, opaque }
    }

    /// Classify a path by extension, or `None` if it is not allowed media.
    #[must_use]
    pub fn classify(&self, path: &Path) -> Option<MediaKind> {
        let ext = normalize_extension(path.extension()?.to_str()?);
        if !self.allowed.contains(&ext) {
            return None;
        }
        if self.opaque.contains(&ext) {
            Some(MediaKind::Opaque)
        } else {
            Some(MediaKind::Raster)
        }
    }

    /// Allowed extensions, normalised.
    #[must_use]
    pub fn allowed_extensions(&self) -> &BTreeSet<String> {
        &self.allowed
    }

    /// Whether nothing would ever be classified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}

/// Lowercase an extension and strip a leading dot.
#[must_use]
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Errors that can occur while listing a directory.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    pub(crate) fn from_io(path: &Path, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

/// Errors that can occur during content hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Hashing stopped because the run was cancelled.
    #[error("Hashing cancelled: {0}")]
    Cancelled(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    pub(crate) fn from_io(path: &Path, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}
