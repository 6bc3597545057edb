//! Turning content items into download requests.
//!
//! File names are `<YYYY-MM-DD>-<id>.<ext>` for single items and
//! `<YYYY-MM-DD>-<id>-<n>.<ext>` for gallery members, `n` being the
//! member's 1-based position in the gallery. The extension comes from the
//! URL and must be one of the allowed extensions. Items whose id could
//! name a path outside the target directory are skipped.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::item::ContentItem;
use crate::download::{DownloadRequest, MediaResolver};

static URL_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.([a-zA-Z0-9]+)(?:\?|$)").unwrap());

/// Lowercased extension of the last path segment before the query.
#[must_use]
pub fn extract_extension(url: &str) -> Option<String> {
    URL_EXTENSION
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}

/// An id usable inside a file name: non-empty, no separators, no NUL.
fn is_safe_id(id: &str) -> bool {
    !id.is_empty() && !id.contains(['/', '\\', '\0']) && id != "." && id != ".."
}

/// Why a URL produced no request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedMedia {
    pub item_id: String,
    pub url: String,
    pub reason: String,
}

/// Requests for a batch of items, plus what was left out.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub requests: Vec<DownloadRequest>,
    pub skipped: Vec<SkippedMedia>,
}

impl Plan {
    fn push(&mut self, outcome: Result<DownloadRequest, SkippedMedia>) {
        match outcome {
            Ok(request) => self.requests.push(request),
            Err(skip) => {
                log::debug!("Skipping {} from {}: {}", skip.url, skip.item_id, skip.reason);
                self.skipped.push(skip);
            }
        }
    }
}

/// Plans requests for items whose single-item URLs are already resolved.
#[derive(Debug, Clone)]
pub struct Planner<'a> {
    directory: &'a Path,
    allowed: BTreeSet<String>,
}

impl<'a> Planner<'a> {
    #[must_use]
    pub fn new<I, S>(directory: &'a Path, allowed_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            directory,
            allowed: allowed_extensions
                .into_iter()
                .map(|e| crate::scanner::normalize_extension(e.as_ref()))
                .collect(),
        }
    }

    fn request(&self, item: &ContentItem, url: &str, index: Option<usize>) -> Result<DownloadRequest, SkippedMedia> {
        let skip = |reason: String| SkippedMedia {
            item_id: item.id.clone(),
            url: url.to_string(),
            reason,
        };
        if !is_safe_id(&item.id) {
            return Err(skip(format!("item id {:?} is not a plain file name", item.id)));
        }
        let ext = extract_extension(url).ok_or_else(|| skip("no file extension".into()))?;
        if !self.allowed.contains(&ext) {
            return Err(skip(format!("extension .{ext} not allowed")));
        }
        let filename = match index {
            Some(n) => format!("{}-{}-{}.{}", item.date_str(), item.id, n, ext),
            None => format!("{}-{}.{}", item.date_str(), item.id, ext),
        };
        Ok(DownloadRequest::new(url, self.directory, filename))
    }

    /// Request for a single item using `url` (normally the resolved URL).
    ///
    /// # Errors
    ///
    /// Returns the skip record when the URL has no allowed extension.
    pub fn single(&self, item: &ContentItem, url: &str) -> Result<DownloadRequest, SkippedMedia> {
        self.request(item, url, None)
    }

    /// Requests for every usable gallery member.
    #[must_use]
    pub fn gallery(&self, item: &ContentItem) -> Vec<Result<DownloadRequest, SkippedMedia>> {
        item.gallery
            .iter()
            .enumerate()
            .map(|(i, media)| match media.media_url() {
                Some(url) => self.request(item, url, Some(i + 1)),
                None => Err(SkippedMedia {
                    item_id: item.id.clone(),
                    url: String::new(),
                    reason: format!("gallery entry {} has no media URL", i + 1),
                }),
            })
            .collect()
    }
}

/// Plan every item, resolving single-item URLs through `resolver`.
pub async fn plan_requests<S: AsRef<str>>(
    items: &[ContentItem],
    directory: &Path,
    allowed_extensions: &[S],
    resolver: &MediaResolver,
) -> Plan {
    let planner = Planner::new(directory, allowed_extensions);
    let mut plan = Plan::default();

    for item in items {
        if item.has_gallery() {
            for outcome in planner.gallery(item) {
                plan.push(outcome);
            }
        } else {
            let url = resolver.resolve(&item.url).await;
            plan.push(planner.single(item, &url));
        }
    }

    log::debug!(
        "Planned {} request(s), skipped {}",
        plan.requests.len(),
        plan.skipped.len()
    );
    plan
}
