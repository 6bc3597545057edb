//! File -> signature.
//!
//! Opaque media gets a cryptographic digest of its bytes, raster media a
//! perceptual hash of its pixels. A file whose signature cannot be
//! computed gets an empty value and takes no part in grouping.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{ContentHasher, MediaFile, MediaKind, PerceptualHasher};

/// How a signature was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureKind {
    /// Perceptual hash of decoded pixels.
    Perceptual,
    /// Cryptographic digest of raw bytes.
    Cryptographic,
}

impl From<MediaKind> for SignatureKind {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Raster => Self::Perceptual,
            MediaKind::Opaque => Self::Cryptographic,
        }
    }
}

/// Signature of one scanned file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSignature {
    pub path: PathBuf,
    /// Lowercase hex, or empty when computation failed.
    pub value: String,
    pub kind: SignatureKind,
}

impl FileSignature {
    /// A signature that excludes `path` from grouping.
    #[must_use]
    pub fn empty(path: PathBuf, kind: SignatureKind) -> Self {
        Self {
            path,
            value: String::new(),
            kind,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// Stateless fingerprinting of media files.
///
/// Cheap to clone; each rayon worker gets its own copy.
#[derive(Debug, Clone, Default)]
pub struct Fingerprinter {
    content: ContentHasher,
    perceptual: PerceptualHasher,
}

impl Fingerprinter {
    #[must_use]
    pub fn new(content: ContentHasher, perceptual: PerceptualHasher) -> Self {
        Self {
            content,
            perceptual,
        }
    }

    #[must_use]
    pub fn content_hasher(&self) -> &ContentHasher {
        &self.content
    }

    /// Fingerprint one file. Never fails; failures yield an empty value.
    #[must_use]
    pub fn fingerprint(&self, file: &MediaFile) -> FileSignature {
        self.fingerprint_path(&file.path, file.kind)
    }

    /// Fingerprint `path` as media of the given kind.
    #[must_use]
    pub fn fingerprint_path(&self, path: &Path, kind: MediaKind) -> FileSignature {
        let signature_kind = SignatureKind::from(kind);
        let value = match kind {
            MediaKind::Opaque => self.content.hash_file(path).map_err(|e| e.to_string()),
            MediaKind::Raster => self.perceptual.compute_hash(path).map_err(|e| e.to_string()),
        };

        match value {
            Ok(value) => {
                log::trace!("{} -> {}:{}", path.display(), signature_kind_label(signature_kind), value);
                FileSignature {
                    path: path.to_path_buf(),
                    value,
                    kind: signature_kind,
                }
            }
            Err(e) => {
                log::warn!("Excluding {} from duplicate detection: {}", path.display(), e);
                FileSignature::empty(path.to_path_buf(), signature_kind)
            }
        }
    }
}

fn signature_kind_label(kind: SignatureKind) -> &'static str {
    match kind {
        SignatureKind::Perceptual => "phash",
        SignatureKind::Cryptographic => "digest",
    }
}
