//! Progress reporting for downloads and duplicate removal.
//!
//! Both engines report through a caller-supplied [`ProgressSink`]. The
//! sink is called from the engine's own concurrency domain (tokio tasks
//! for downloads, the resolver's coordinator for duplicate removal), so
//! implementations must not block.
//!
//! # Sinks
//!
//! - [`NullSink`]: discards everything.
//! - [`ChannelSink`]: forwards [`ProgressUpdate`]s over an unbounded
//!   tokio channel, for UIs or orchestration layers.
//! - [`TerminalProgress`]: indicatif bars for the CLI.
//!
//! # Example
//!
//! ```
//! use mediavault::progress::{ChannelSink, ProgressSink, ProgressUpdate};
//!
//! let (sink, mut rx) = ChannelSink::new();
//! # let _ = &sink;
//! while let Ok(update) = rx.try_recv() {
//!     match update {
//!         ProgressUpdate::Download(event) => println!("{} {}", event.download_id, event.phase),
//!         ProgressUpdate::Removal(progress) => println!("{:?}", progress.status),
//!     }
//! }
//! ```

pub mod events;
pub mod terminal;

use tokio::sync::mpsc;

pub use events::{
    DownloadPhase, DuplicateRemovalProgress, ProgressEvent, ProgressUpdate, RemovalStatus,
};
pub use terminal::TerminalProgress;

/// Receiver of progress updates.
pub trait ProgressSink: Send + Sync {
    /// Called for every download event.
    fn on_download(&self, event: &ProgressEvent);

    /// Called for every duplicate-removal progress snapshot.
    fn on_removal(&self, progress: &DuplicateRemovalProgress);
}

/// Sink that drops all updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_download(&self, _event: &ProgressEvent) {}

    fn on_removal(&self, _progress: &DuplicateRemovalProgress) {}
}

/// Sink forwarding updates over an unbounded channel.
///
/// Sending never blocks; updates are dropped silently once the receiver
/// is gone.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressUpdate>,
}

impl ChannelSink {
    /// Create a sink and the receiver that observes it.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Wrap an existing sender.
    #[must_use]
    pub fn from_sender(tx: mpsc::UnboundedSender<ProgressUpdate>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelSink {
    fn on_download(&self, event: &ProgressEvent) {
        let _ = self.tx.send(ProgressUpdate::Download(event.clone()));
    }

    fn on_removal(&self, progress: &DuplicateRemovalProgress) {
        let _ = self.tx.send(ProgressUpdate::Removal(progress.clone()));
    }
}
