//! Media URL resolution.
//!
//! Some hosts put the real file behind an interstitial page. For those,
//! the page is fetched and the direct link extracted; everything else
//! passes through. Resolution is best effort: any failure yields the
//! input URL unchanged.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use reqwest::Url;

use super::source::MediaSource;

static REDGIFS_POSTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(https://media\.redgifs\.com/.*?-mobile\.jpg)").unwrap());

/// Rewrites embed-page URLs to direct media URLs.
#[derive(Clone)]
pub struct MediaResolver {
    source: Arc<dyn MediaSource>,
}

impl std::fmt::Debug for MediaResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaResolver").finish_non_exhaustive()
    }
}

impl MediaResolver {
    #[must_use]
    pub fn new(source: Arc<dyn MediaSource>) -> Self {
        Self { source }
    }

    /// Direct media URL for `url`, or `url` itself.
    pub async fn resolve(&self, url: &str) -> String {
        if url.contains("redgifs.com") {
            if let Some(direct) = self.resolve_redgifs(url).await {
                return direct;
            }
        }
        if url.contains("vidble.com/watch") {
            if let Some(direct) = resolve_vidble(url) {
                return direct;
            }
        }
        url.to_string()
    }

    /// The watch page links a `-mobile.jpg` poster; the video sits beside
    /// it with an `.mp4` suffix.
    async fn resolve_redgifs(&self, url: &str) -> Option<String> {
        let page = match self.source.fetch_text(url).await {
            Ok(page) => page,
            Err(e) => {
                log::debug!("Could not resolve {}: {}", url, e);
                return None;
            }
        };
        let poster = REDGIFS_POSTER.captures(&page)?.get(1)?.as_str();
        let direct = poster.replace("-mobile.jpg", ".mp4");
        log::debug!("Resolved {} -> {}", url, direct);
        Some(direct)
    }
}

/// `vidble.com/watch?v=<id>` -> `https://vidble.com/<id>.mp4`.
fn resolve_vidble(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let id = parsed
        .query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty())?;
    Some(format!("https://vidble.com/{id}.mp4"))
}
