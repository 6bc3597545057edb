//! Immediate-children media listing using walkdir.
//!
//! Only the top level of the directory is listed; subdirectories belong
//! to other archive runs. Entries come back sorted by file name so the
//! listing order, and therefore every tie-break derived from it, is
//! deterministic.

use std::path::Path;

use walkdir::WalkDir;

use super::{MediaClassifier, MediaFile, ScanError};

/// Result of listing a directory.
#[derive(Debug, Default)]
pub struct MediaListing {
    /// Media files, in file-name order.
    pub files: Vec<MediaFile>,
    /// Entries that could not be inspected. They are skipped, never guessed.
    pub errors: Vec<ScanError>,
}

/// List the immediate media files of `dir`.
///
/// Symlinks and subdirectories are ignored. Files whose metadata cannot
/// be read are reported in [`MediaListing::errors`] and left out.
///
/// # Errors
///
/// Fails only when `dir` itself is missing, unreadable or not a directory.
pub fn list_media(dir: &Path, classifier: &MediaClassifier) -> Result<MediaListing, ScanError> {
    let meta = std::fs::metadata(dir).map_err(|e| ScanError::from_io(dir, e))?;
    if !meta.is_dir() {
        return Err(ScanError::NotADirectory(dir.to_path_buf()));
    }

    let mut listing = MediaListing::default();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(dir).to_path_buf();
                log::warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                listing.errors.push(match e.into_io_error() {
                    Some(io) => ScanError::from_io(&path, io),
                    None => ScanError::NotFound(path),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(kind) = classifier.classify(path) else {
            log::trace!("Not media, skipping: {}", path.display());
            continue;
        };

        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(e) => {
                log::warn!("Cannot stat {}: {}", path.display(), e);
                listing.errors.push(match e.into_io_error() {
                    Some(io) => ScanError::from_io(path, io),
                    None => ScanError::NotFound(path.to_path_buf()),
                });
                continue;
            }
        };

        let modified = meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
        listing
            .files
            .push(MediaFile::new(path.to_path_buf(), meta.len(), modified, kind));
    }

    log::debug!(
        "Listed {} media file(s) in {}",
        listing.files.len(),
        dir.display()
    );
    Ok(listing)
}
